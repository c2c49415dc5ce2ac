use crate::metadata::token::Token;

/// Element type constants of signature blobs (II.23.1.16)
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    pub const PTR: u8 = 0x0f;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// A type as encoded in a signature blob (II.23.2.12)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    /// `System.Void`
    Void,
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    I1,
    /// `System.Byte`
    U1,
    /// `System.Int16`
    I2,
    /// `System.UInt16`
    U2,
    /// `System.Int32`
    I4,
    /// `System.UInt32`
    U4,
    /// `System.Int64`
    I8,
    /// `System.UInt64`
    U8,
    /// `System.Single`
    R4,
    /// `System.Double`
    R8,
    /// `System.String`
    String,
    /// Unmanaged pointer, `T*`
    Ptr(SignaturePointer),
    /// Managed reference, `T&`
    ByRef(Box<TypeSignature>),
    /// Value type, by `TypeDefOrRef` token
    ValueType(Token),
    /// Reference type, by `TypeDefOrRef` token
    Class(Token),
    /// `!n`, a type parameter of the enclosing type
    GenericParamType(u32),
    /// Multi-dimensional array
    Array(SignatureArray),
    /// Instantiation of a generic type
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// `System.TypedReference`
    TypedByRef,
    /// `System.IntPtr`
    I,
    /// `System.UIntPtr`
    U,
    /// Function pointer
    FnPtr(Box<SignatureMethod>),
    /// `System.Object`
    Object,
    /// Zero based vector, `T[]`
    SzArray(SignatureSzArray),
    /// `!!n`, a type parameter of the enclosing method
    GenericParamMethod(u32),
    /// A type preceded by a `modreq` or `modopt`
    Modified(CustomModifier, Box<TypeSignature>),
    /// Runtime internal type
    Internal,
    /// Pinned local
    Pinned(Box<TypeSignature>),
}

/// A custom modifier (`modreq` or `modopt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomModifier {
    /// `modreq` if set, `modopt` otherwise
    pub required: bool,
    /// The modifier type - `TypeDefOrRefOrSpecEncoded`
    pub modifier: Token,
}

/// The dimensions of a general array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayDimensions {
    /// The size of this dimension
    pub size: Option<u32>,
    /// The lower bound of this dimension (lowest index that can be used to access an element)
    pub lower_bound: Option<u32>,
}

/// A general (possibly multi-dimensional) array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureArray {
    /// The type in the array
    pub base: Box<TypeSignature>,
    /// The number of dimensions
    pub rank: u32,
    /// The dimensions (can be less than 'rank', are in order from 0..count)
    pub dimensions: Vec<ArrayDimensions>,
}

/// A single dimension, zero based array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSzArray {
    /// Custom modifiers of the element type
    pub modifiers: Vec<CustomModifier>,
    /// The type in the array
    pub base: Box<TypeSignature>,
}

/// A pointer to a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePointer {
    /// Custom modifiers of the pointee
    pub modifiers: Vec<CustomModifier>,
    /// The type pointed to
    pub base: Box<TypeSignature>,
}

/// Parameter with optional custom modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParameter {
    /// Custom modifiers of the parameter
    pub modifiers: Vec<CustomModifier>,
    /// Parameter is passed by reference
    pub by_ref: bool,
    /// The type of the parameter
    pub base: TypeSignature,
}

/// Represents a method signature (II.23.2.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMethod {
    /// Used to encode the keyword instance in the calling convention, see §II.15.3
    pub has_this: bool,
    /// Used to encode the keyword explicit in the calling convention, see §II.15.3
    pub explicit_this: bool,
    /// Used to encode the keyword vararg in the calling convention, see §II.15.3
    pub vararg: bool,
    /// Number of generic parameters of the method
    pub param_count_generic: u32,
    /// Used to indicate the number of `Param` this `Method` has
    pub param_count: u32,
    /// The return type of this `Method`
    pub return_type: SignatureParameter,
    /// The parameters of this `Method`
    pub params: Vec<SignatureParameter>,
    /// The vararg parameters
    pub varargs: Vec<SignatureParameter>,
}

impl TypeSignature {
    /// The canonical full name of this type, e.g. `System.Void` or `System.Int32[]`.
    ///
    /// Primitive types are rendered with their `System` names; `type_name` supplies the
    /// namespace qualified name of `TypeDef`, `TypeRef` and `TypeSpec` tokens.
    pub fn full_name<F>(&self, type_name: &F) -> String
    where
        F: Fn(Token) -> String,
    {
        match self {
            TypeSignature::Void => "System.Void".to_string(),
            TypeSignature::Boolean => "System.Boolean".to_string(),
            TypeSignature::Char => "System.Char".to_string(),
            TypeSignature::I1 => "System.SByte".to_string(),
            TypeSignature::U1 => "System.Byte".to_string(),
            TypeSignature::I2 => "System.Int16".to_string(),
            TypeSignature::U2 => "System.UInt16".to_string(),
            TypeSignature::I4 => "System.Int32".to_string(),
            TypeSignature::U4 => "System.UInt32".to_string(),
            TypeSignature::I8 => "System.Int64".to_string(),
            TypeSignature::U8 => "System.UInt64".to_string(),
            TypeSignature::R4 => "System.Single".to_string(),
            TypeSignature::R8 => "System.Double".to_string(),
            TypeSignature::String => "System.String".to_string(),
            TypeSignature::Object => "System.Object".to_string(),
            TypeSignature::I => "System.IntPtr".to_string(),
            TypeSignature::U => "System.UIntPtr".to_string(),
            TypeSignature::TypedByRef => "System.TypedReference".to_string(),
            TypeSignature::Internal => "<internal>".to_string(),
            TypeSignature::ValueType(token) | TypeSignature::Class(token) => type_name(*token),
            TypeSignature::Ptr(pointer) => format!(
                "{}*{}",
                pointer.base.full_name(type_name),
                render_modifiers(&pointer.modifiers, type_name)
            ),
            TypeSignature::ByRef(base) => format!("{}&", base.full_name(type_name)),
            TypeSignature::Pinned(base) => format!("{} pinned", base.full_name(type_name)),
            TypeSignature::SzArray(array) => format!(
                "{}{}[]",
                array.base.full_name(type_name),
                render_modifiers(&array.modifiers, type_name)
            ),
            TypeSignature::Array(array) => {
                let rank = array.rank.max(1) as usize;
                format!(
                    "{}[{}]",
                    array.base.full_name(type_name),
                    ",".repeat(rank - 1)
                )
            }
            TypeSignature::GenericInst(base, args) => format!(
                "{}<{}>",
                base.full_name(type_name),
                args.iter()
                    .map(|arg| arg.full_name(type_name))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeSignature::GenericParamType(index) => format!("!{index}"),
            TypeSignature::GenericParamMethod(index) => format!("!!{index}"),
            TypeSignature::FnPtr(method) => format!(
                "method {} *({})",
                method.return_type.full_name(type_name),
                method
                    .params
                    .iter()
                    .map(|param| param.full_name(type_name))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeSignature::Modified(modifier, base) => format!(
                "{}{}",
                base.full_name(type_name),
                render_modifiers(std::slice::from_ref(modifier), type_name)
            ),
        }
    }
}

impl SignatureParameter {
    /// The canonical full name of the parameter type, including by-ref and custom modifiers.
    pub fn full_name<F>(&self, type_name: &F) -> String
    where
        F: Fn(Token) -> String,
    {
        let mut name = self.base.full_name(type_name);
        if self.by_ref {
            name.push('&');
        }
        name.push_str(&render_modifiers(&self.modifiers, type_name));
        name
    }
}

fn render_modifiers<F>(modifiers: &[CustomModifier], type_name: &F) -> String
where
    F: Fn(Token) -> String,
{
    modifiers
        .iter()
        .map(|modifier| {
            format!(
                " {}({})",
                if modifier.required { "modreq" } else { "modopt" },
                type_name(modifier.modifier)
            )
        })
        .collect()
}
