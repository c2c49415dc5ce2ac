//! Flag sets of `MethodDef` rows and of method body headers (II.23.1.10, II.23.1.11, II.25.4).
//!
//! `MethodAttributes` mixes an access enumeration (the low three bits) with independent
//! modifier bits, so the two halves get separate types: [`MethodAccessFlags`] is compared
//! with `==`, [`MethodModifiers`] with `contains`.

use bitflags::bitflags;

/// Low bits of `MethodImplAttributes` holding the code type
pub const METHOD_IMPL_CODE_TYPE_MASK: u32 = 0x0003;
/// Low bits of `MethodAttributes` holding the access level
pub const METHOD_ACCESS_MASK: u32 = 0x0007;
/// `NewSlot`, the vtable layout bit, which is not a modifier
pub const METHOD_VTABLE_LAYOUT_MASK: u32 = 0x0100;

bitflags! {
    /// What kind of code a method body holds
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodImplCodeType: u32 {
        /// CIL
        const IL = 0x0000;
        /// Native code
        const NATIVE = 0x0001;
        /// Optimized IL (reserved)
        const OPTIL = 0x0002;
        /// Supplied by the runtime
        const RUNTIME = 0x0003;
    }
}

impl MethodImplCodeType {
    /// The code type bits of `MethodDef.ImplFlags`.
    #[must_use]
    pub fn from_impl_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & METHOD_IMPL_CODE_TYPE_MASK)
    }
}

bitflags! {
    /// Access level of a method
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAccessFlags: u32 {
        /// Only reachable through its token
        const COMPILER_CONTROLLED = 0x0000;
        /// `private`
        const PRIVATE = 0x0001;
        /// `private protected`
        const FAM_AND_ASSEM = 0x0002;
        /// `internal`
        const ASSEM = 0x0003;
        /// `protected`
        const FAMILY = 0x0004;
        /// `protected internal`
        const FAM_OR_ASSEM = 0x0005;
        /// `public`
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// The access bits of `MethodDef.Flags`.
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & METHOD_ACCESS_MASK)
    }

    /// The C# keyword for this access level.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self.bits() {
            0x0001 => "private",
            0x0002 => "private protected",
            0x0003 => "internal",
            0x0004 => "protected",
            0x0005 => "protected internal",
            0x0006 => "public",
            _ => "compiler controlled",
        }
    }
}

bitflags! {
    /// Modifier bits of a method
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodModifiers: u32 {
        /// No `this`
        const STATIC = 0x0010;
        /// `sealed`
        const FINAL = 0x0020;
        /// `virtual`
        const VIRTUAL = 0x0040;
        /// Overloads hide by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Overridable only where accessible
        const STRICT = 0x0200;
        /// No body
        const ABSTRACT = 0x0400;
        /// Name has a meaning to tools
        const SPECIAL_NAME = 0x0800;
        /// Name has a meaning to the runtime (`.ctor`, `.cctor`)
        const RTSPECIAL_NAME = 0x1000;
        /// Implemented through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Carries declarative security
        const HAS_SECURITY = 0x4000;
        /// Calls a method with security requirements
        const REQUIRE_SEC_OBJECT = 0x8000;
        /// Reserved
        const UNMANAGED_EXPORT = 0x0008;
    }
}

impl MethodModifiers {
    /// The modifier bits of `MethodDef.Flags`.
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !(METHOD_ACCESS_MASK | METHOD_VTABLE_LAYOUT_MASK))
    }
}

bitflags! {
    /// Bits of the first header byte (tiny) or word (fat) of a method body
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// One byte header, up to 63 bytes of code
        const TINY_FORMAT = 0x2;
        /// Twelve byte header
        const FAT_FORMAT = 0x3;
        /// Data sections follow the code
        const MORE_SECTS = 0x8;
        /// Locals are zero-initialized
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Kind bits of a method data section
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// Exception handling clauses
        const EHTABLE = 0x1;
        /// Reserved
        const OPT_ILTABLE = 0x2;
        /// 24 byte clauses and a 3 byte size
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}
