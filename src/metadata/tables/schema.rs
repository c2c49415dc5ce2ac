//! Column layout of every metadata table.
//!
//! Rows are stored generically as one `u32` per column. The schema tells the reader and the
//! writer how wide each column is on disk and what it points at, which is all the rewriter
//! needs: it never interprets most tables, it only has to find and renumber the columns that
//! reference `MethodDef` (and the rows of re-sorted tables).

use crate::metadata::tables::{CodedIndexType, TableId};

/// The kind of one table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    /// A 2-byte constant
    U16,
    /// A 4-byte constant
    U32,
    /// Index into `#Strings`
    Str,
    /// 1-based index into `#GUID`
    Guid,
    /// Index into `#Blob`
    Blob,
    /// Row id of a single referenced table
    Index(TableId),
    /// First row id of a contiguous run owned by this row (`MethodList`, `ParamList`, ...)
    List(TableId),
    /// Coded index over several tables
    Coded(CodedIndexType),
}

impl Column {
    /// Whether this column can hold a reference to a row of `table`.
    ///
    /// List columns are excluded; they describe ownership ranges and are recomputed rather
    /// than renumbered.
    #[must_use]
    pub fn references(&self, table: TableId) -> bool {
        match self {
            Column::Index(target) => *target == table,
            Column::Coded(coded) => coded.tables().contains(&Some(table)),
            _ => false,
        }
    }
}

use Column::{Blob, Coded, Guid, Index, List, Str, U16, U32};
use CodedIndexType as C;

impl TableId {
    /// The columns of this table, in on-disk order.
    #[must_use]
    pub fn columns(&self) -> &'static [Column] {
        match self {
            TableId::Module => &[U16, Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            TableId::TypeDef => &[
                U32,
                Str,
                Str,
                Coded(C::TypeDefOrRef),
                List(TableId::Field),
                List(TableId::MethodDef),
            ],
            TableId::FieldPtr => &[Index(TableId::Field)],
            TableId::Field => &[U16, Str, Blob],
            TableId::MethodPtr => &[Index(TableId::MethodDef)],
            TableId::MethodDef => &[U32, U16, U16, Str, Blob, List(TableId::Param)],
            TableId::ParamPtr => &[Index(TableId::Param)],
            TableId::Param => &[U16, U16, Str],
            TableId::InterfaceImpl => &[Index(TableId::TypeDef), Coded(C::TypeDefOrRef)],
            TableId::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            // Type is a single byte followed by a padding byte
            TableId::Constant => &[U16, Coded(C::HasConstant), Blob],
            TableId::CustomAttribute => &[
                Coded(C::HasCustomAttribute),
                Coded(C::CustomAttributeType),
                Blob,
            ],
            TableId::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[U16, Coded(C::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[U16, U32, Index(TableId::TypeDef)],
            TableId::FieldLayout => &[U32, Index(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Index(TableId::TypeDef), List(TableId::Event)],
            TableId::EventPtr => &[Index(TableId::Event)],
            TableId::Event => &[U16, Str, Coded(C::TypeDefOrRef)],
            TableId::PropertyMap => &[Index(TableId::TypeDef), List(TableId::Property)],
            TableId::PropertyPtr => &[Index(TableId::Property)],
            TableId::Property => &[U16, Str, Blob],
            TableId::MethodSemantics => &[U16, Index(TableId::MethodDef), Coded(C::HasSemantics)],
            TableId::MethodImpl => &[
                Index(TableId::TypeDef),
                Coded(C::MethodDefOrRef),
                Coded(C::MethodDefOrRef),
            ],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[
                U16,
                Coded(C::MemberForwarded),
                Str,
                Index(TableId::ModuleRef),
            ],
            TableId::FieldRVA => &[U32, Index(TableId::Field)],
            TableId::EncLog => &[U32, U32],
            TableId::EncMap => &[U32],
            TableId::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
            TableId::AssemblyProcessor => &[U32],
            TableId::AssemblyOS => &[U32, U32, U32],
            TableId::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
            TableId::AssemblyRefProcessor => &[U32, Index(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[U32, U32, U32, Index(TableId::AssemblyRef)],
            TableId::File => &[U32, Str, Blob],
            TableId::ExportedType => &[U32, U32, Str, Str, Coded(C::Implementation)],
            TableId::ManifestResource => &[U32, U32, Str, Coded(C::Implementation)],
            TableId::NestedClass => &[Index(TableId::TypeDef), Index(TableId::TypeDef)],
            TableId::GenericParam => &[U16, U16, Coded(C::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => {
                &[Index(TableId::GenericParam), Coded(C::TypeDefOrRef)]
            }
            TableId::Document => &[Blob, Guid, Blob, Guid],
            TableId::MethodDebugInformation => &[Index(TableId::Document), Blob],
            TableId::LocalScope => &[
                Index(TableId::MethodDef),
                Index(TableId::ImportScope),
                List(TableId::LocalVariable),
                List(TableId::LocalConstant),
                U32,
                U32,
            ],
            TableId::LocalVariable => &[U16, U16, Str],
            TableId::LocalConstant => &[Str, Blob],
            TableId::ImportScope => &[Index(TableId::ImportScope), Blob],
            TableId::StateMachineMethod => {
                &[Index(TableId::MethodDef), Index(TableId::MethodDef)]
            }
            TableId::CustomDebugInformation => {
                &[Coded(C::HasCustomDebugInformation), Guid, Blob]
            }
        }
    }

    /// Key columns of the tables that must be kept sorted, primary key first.
    ///
    /// `None` for tables without an ordering requirement.
    #[must_use]
    pub fn sort_key(&self) -> Option<&'static [usize]> {
        match self {
            TableId::InterfaceImpl => Some(&[0, 1]),
            TableId::Constant => Some(&[1]),
            TableId::CustomAttribute => Some(&[0]),
            TableId::FieldMarshal => Some(&[0]),
            TableId::DeclSecurity => Some(&[1]),
            TableId::ClassLayout => Some(&[2]),
            TableId::FieldLayout => Some(&[1]),
            TableId::MethodSemantics => Some(&[2]),
            TableId::MethodImpl => Some(&[0]),
            TableId::ImplMap => Some(&[1]),
            TableId::FieldRVA => Some(&[1]),
            TableId::NestedClass => Some(&[0]),
            TableId::GenericParam => Some(&[2, 0]),
            TableId::GenericParamConstraint => Some(&[0]),
            TableId::LocalScope => Some(&[0]),
            TableId::StateMachineMethod => Some(&[0]),
            TableId::CustomDebugInformation => Some(&[0]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn method_def_references() {
        let referencing: Vec<TableId> = TableId::iter()
            .filter(|table| {
                table
                    .columns()
                    .iter()
                    .any(|column| column.references(TableId::MethodDef))
            })
            .collect();

        assert!(referencing.contains(&TableId::CustomAttribute));
        assert!(referencing.contains(&TableId::MethodSemantics));
        assert!(referencing.contains(&TableId::GenericParam));
        assert!(referencing.contains(&TableId::StateMachineMethod));
        assert!(referencing.contains(&TableId::CustomDebugInformation));
        // MethodList describes ownership and is recomputed instead
        assert!(!referencing.contains(&TableId::TypeDef));
        assert!(!referencing.contains(&TableId::Param));
    }

    #[test]
    fn sort_keys_are_columns() {
        for table in TableId::iter() {
            if let Some(key) = table.sort_key() {
                assert!(key.iter().all(|column| *column < table.columns().len()));
            }
        }
    }
}
