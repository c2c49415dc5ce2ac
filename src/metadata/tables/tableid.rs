use strum::{EnumCount, EnumIter};

/// Identifiers of the metadata tables.
///
/// The discriminant of each variant is the table number used in tokens, in the `Valid` and
/// `Sorted` bit vectors of the tables stream header, and in coded indexes. Tables
/// `0x00..=0x2C` are the type system tables of ECMA-335 Partition II, Section 22; tables
/// `0x30..=0x37` are the debug tables that only appear in portable PDBs.
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Metadata Tables
/// * [Portable PDB v1.0](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md) - Debug tables
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TableId {
    /// `Module` table (0x00) - The single row describing this module.
    Module = 0x00,
    /// `TypeRef` table (0x01) - References to types in other scopes.
    TypeRef = 0x01,
    /// `TypeDef` table (0x02) - Types defined in this module, owning contiguous
    /// runs of `Field` and `MethodDef` rows.
    TypeDef = 0x02,
    /// `FieldPtr` table (0x03) - Indirection for unoptimized metadata.
    FieldPtr = 0x03,
    /// `Field` table (0x04)
    Field = 0x04,
    /// `MethodPtr` table (0x05) - Indirection for unoptimized metadata.
    MethodPtr = 0x05,
    /// `MethodDef` table (0x06) - Method definitions, owning contiguous runs of `Param` rows.
    MethodDef = 0x06,
    /// `ParamPtr` table (0x07) - Indirection for unoptimized metadata.
    ParamPtr = 0x07,
    /// `Param` table (0x08)
    Param = 0x08,
    /// `InterfaceImpl` table (0x09)
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A) - References to fields and methods of other types.
    MemberRef = 0x0A,
    /// `Constant` table (0x0B)
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C)
    CustomAttribute = 0x0C,
    /// `FieldMarshal` table (0x0D)
    FieldMarshal = 0x0D,
    /// `DeclSecurity` table (0x0E)
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F)
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10)
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11)
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12)
    EventMap = 0x12,
    /// `EventPtr` table (0x13)
    EventPtr = 0x13,
    /// `Event` table (0x14)
    Event = 0x14,
    /// `PropertyMap` table (0x15)
    PropertyMap = 0x15,
    /// `PropertyPtr` table (0x16)
    PropertyPtr = 0x16,
    /// `Property` table (0x17)
    Property = 0x17,
    /// `MethodSemantics` table (0x18) - Links getters, setters and event accessors.
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19) - Explicit interface implementations.
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A)
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B)
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C) - P/Invoke mappings.
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D)
    FieldRVA = 0x1D,
    /// `EncLog` table (0x1E)
    EncLog = 0x1E,
    /// `EncMap` table (0x1F)
    EncMap = 0x1F,
    /// `Assembly` table (0x20) - The assembly manifest, including the public key.
    Assembly = 0x20,
    /// `AssemblyProcessor` table (0x21)
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` table (0x22)
    AssemblyOS = 0x22,
    /// `AssemblyRef` table (0x23)
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` table (0x24)
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` table (0x25)
    AssemblyRefOS = 0x25,
    /// `File` table (0x26)
    File = 0x26,
    /// `ExportedType` table (0x27)
    ExportedType = 0x27,
    /// `ManifestResource` table (0x28)
    ManifestResource = 0x28,
    /// `NestedClass` table (0x29)
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A)
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B)
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C)
    GenericParamConstraint = 0x2C,
    /// `Document` table (0x30) - Source documents of a portable PDB.
    Document = 0x30,
    /// `MethodDebugInformation` table (0x31) - One row per `MethodDef`, in the same order.
    MethodDebugInformation = 0x31,
    /// `LocalScope` table (0x32)
    LocalScope = 0x32,
    /// `LocalVariable` table (0x33)
    LocalVariable = 0x33,
    /// `LocalConstant` table (0x34)
    LocalConstant = 0x34,
    /// `ImportScope` table (0x35)
    ImportScope = 0x35,
    /// `StateMachineMethod` table (0x36)
    StateMachineMethod = 0x36,
    /// `CustomDebugInformation` table (0x37)
    CustomDebugInformation = 0x37,
}

impl TableId {
    /// Map a table number back to its id.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        TableId::iter().find(|id| *id as u8 == value)
    }

    /// Whether this is one of the portable PDB debug tables.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        *self as u8 >= TableId::Document as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        assert_eq!(TableId::MethodDef as u8, 0x06);
        assert_eq!(TableId::GenericParamConstraint as u8, 0x2C);
        assert_eq!(TableId::from_u8(0x37), Some(TableId::CustomDebugInformation));
        assert_eq!(TableId::from_u8(0x2D), None);
        assert_eq!(TableId::COUNT, 53);
        assert!(TableId::LocalScope.is_debug());
        assert!(!TableId::Assembly.is_debug());
    }
}
