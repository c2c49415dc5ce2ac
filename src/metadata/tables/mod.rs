//! Metadata tables: ids, column schema, coded indexes and the `#~` stream.
//!
//! Unlike a full metadata reader, this module keeps tables untyped: each row is a vector of
//! raw column values, and [`TableId::columns`] describes what every column means. That is
//! enough to look up names and signatures, and it lets the writer renumber and re-sort rows
//! of any table without a dedicated type per table.

mod codedindex;
mod header;
mod schema;
mod tableid;
mod tableinfo;

pub use codedindex::CodedIndexType;
pub use header::{Table, TablesHeader};
pub use schema::Column;
pub use tableid::TableId;
pub use tableinfo::{
    TableInfo, TableRowInfo, HEAP_LARGE_BLOB, HEAP_LARGE_GUID, HEAP_LARGE_STRINGS,
};

/// Number of table slots addressable by the `Valid` bit vector
pub const TABLE_SLOTS: usize = 64;

/// Column positions of the tables the reader and writer interpret.
pub mod columns {
    /// `TypeDef.Flags`
    pub const TYPEDEF_FLAGS: usize = 0;
    /// `TypeDef.TypeName`
    pub const TYPEDEF_NAME: usize = 1;
    /// `TypeDef.TypeNamespace`
    pub const TYPEDEF_NAMESPACE: usize = 2;
    /// `TypeDef.MethodList`
    pub const TYPEDEF_METHOD_LIST: usize = 5;

    /// `TypeRef.ResolutionScope`
    pub const TYPEREF_SCOPE: usize = 0;
    /// `TypeRef.TypeName`
    pub const TYPEREF_NAME: usize = 1;
    /// `TypeRef.TypeNamespace`
    pub const TYPEREF_NAMESPACE: usize = 2;

    /// `MethodDef.RVA`
    pub const METHOD_RVA: usize = 0;
    /// `MethodDef.ImplFlags`
    pub const METHOD_IMPL_FLAGS: usize = 1;
    /// `MethodDef.Flags`
    pub const METHOD_FLAGS: usize = 2;
    /// `MethodDef.Name`
    pub const METHOD_NAME: usize = 3;
    /// `MethodDef.Signature`
    pub const METHOD_SIGNATURE: usize = 4;
    /// `MethodDef.ParamList`
    pub const METHOD_PARAM_LIST: usize = 5;

    /// `Param.Sequence`
    pub const PARAM_SEQUENCE: usize = 1;
    /// `Param.Name`
    pub const PARAM_NAME: usize = 2;

    /// `NestedClass.NestedClass`
    pub const NESTED_CLASS: usize = 0;
    /// `NestedClass.EnclosingClass`
    pub const NESTED_ENCLOSING: usize = 1;

    /// `Assembly.Flags`
    pub const ASSEMBLY_FLAGS: usize = 5;
    /// `Assembly.PublicKey`
    pub const ASSEMBLY_PUBLIC_KEY: usize = 6;
    /// `Assembly.Name`
    pub const ASSEMBLY_NAME: usize = 7;

    /// `CustomDebugInformation.Kind`
    pub const CUSTOM_DEBUG_KIND: usize = 1;
    /// `CustomDebugInformation.Value`
    pub const CUSTOM_DEBUG_VALUE: usize = 2;
}
