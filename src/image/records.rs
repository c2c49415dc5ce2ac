use crate::{
    disassembler::Instruction,
    metadata::{
        method::{MethodAccessFlags, MethodBody, MethodModifiers},
        signatures::SignatureMethod,
        tables::TableId,
        token::Token,
    },
};

/// Index of a type in the arena of its [`super::Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

/// Index of a method in the arena of its [`super::Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub(crate) usize);

impl TypeId {
    /// Position in the type arena
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl MethodId {
    /// Position in the method arena
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A type defined in the image (`TypeDef` row)
#[derive(Debug, Clone)]
pub struct TypeRecord {
    /// `TypeDef` row id
    pub rid: Option<u32>,
    /// Simple name
    pub name: String,
    /// Namespace, empty for the global namespace and nested types
    pub namespace: String,
    /// `TypeAttributes`
    pub flags: u32,
    /// Methods in declaration order
    pub methods: Vec<MethodId>,
}

impl TypeRecord {
    /// `Namespace.Name`, or just the name without a namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// A parameter of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Name from the `Param` table, if the compiler emitted one
    pub name: Option<String>,
    /// 1-based position
    pub sequence: u16,
    /// Canonical full name of the parameter type
    pub type_name: String,
}

/// A method of the image (`MethodDef` row), or one added by the synthesizer
#[derive(Debug, Clone)]
pub struct MethodRecord {
    /// `MethodDef` row id, `None` for methods that are not in the tables yet
    pub rid: Option<u32>,
    /// Name
    pub name: String,
    /// RVA of the body, 0 for methods without one
    pub rva: u32,
    /// `MethodAttributes`
    pub flags: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u32,
    /// The decoded signature
    pub signature: SignatureMethod,
    /// Canonical full name of the return type
    pub return_type: String,
    /// Parameters in signature order
    pub params: Vec<Param>,
    /// Header information of the body
    pub body: Option<MethodBody>,
    /// The decoded IL
    pub instructions: Vec<Instruction>,
    /// Complete encoded body (header included) of a method that is not in the image yet
    pub encoded_body: Option<Vec<u8>>,
    /// Signature blob of a method that is not in the image yet
    pub encoded_signature: Option<Vec<u8>>,
}

impl MethodRecord {
    /// The `MethodDef` token, for methods that exist in the tables.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.rid
            .map(|rid| Token::from_parts(TableId::MethodDef, rid))
    }

    /// The access level.
    #[must_use]
    pub fn access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_method_flags(self.flags)
    }

    /// Remaining attribute flags.
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.flags)
    }

    /// Whether the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// Whether the method was added after the image was read.
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.rid.is_none()
    }
}
