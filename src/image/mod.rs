//! The in-memory model of one CLI image.
//!
//! An [`Image`] owns the loaded file, its decoded metadata and an arena of [`TypeRecord`]s
//! and [`MethodRecord`]s built from the `TypeDef` and `MethodDef` tables. Records refer to
//! each other by [`TypeId`] and [`MethodId`], indexes into the arenas of the image that
//! created them; a [`MethodRef`] additionally carries the identity of that image so it can
//! be checked (and, via [`Image::rebase`], re-resolved) before it is used on another one.
//!
//! The reader fills the arenas in table order, so the record of `MethodDef` row `n` is
//! `MethodId(n - 1)`. Methods added by the synthesizer are appended after the last row and
//! have no row id until the writer lays out the new method table.

mod records;

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

pub use records::{MethodId, MethodRecord, Param, TypeId, TypeRecord};

use crate::{
    file::File,
    metadata::{cor20header::Cor20Header, token::Token, Metadata},
    symbols::Symbols,
    Error, Result,
};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Name of the reserved type that holds module-scope members
pub const MODULE_TYPE_NAME: &str = "<Module>";

/// A reference to a method of one particular [`Image`].
///
/// Besides the arena index it keeps the simple names it was resolved with, which is what
/// [`Image::rebase`] looks up when the reference is used on a different image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    image: u64,
    method: MethodId,
    type_name: String,
    method_name: String,
}

impl MethodRef {
    /// The method inside its image.
    #[must_use]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Simple name of the declaring type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the method.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Whether this reference was produced by `image`.
    #[must_use]
    pub fn belongs_to(&self, image: &Image) -> bool {
        self.image == image.id
    }
}

/// A loaded CLI image with its (optional) portable PDB.
pub struct Image {
    id: u64,
    path: Option<PathBuf>,
    file: File,
    cor20: Cor20Header,
    metadata: Metadata,
    types: Vec<TypeRecord>,
    methods: Vec<MethodRecord>,
    module_type: Option<TypeId>,
    symbols: Option<Symbols>,
}

impl Image {
    pub(crate) fn new(
        path: Option<PathBuf>,
        file: File,
        cor20: Cor20Header,
        metadata: Metadata,
        types: Vec<TypeRecord>,
        methods: Vec<MethodRecord>,
    ) -> Image {
        let module_type = types
            .first()
            .filter(|ty| ty.rid == Some(1) && ty.name == MODULE_TYPE_NAME)
            .map(|_| TypeId(0));

        Image {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            path,
            file,
            cor20,
            metadata,
            types,
            methods,
            module_type,
            symbols: None,
        }
    }

    /// Path the image was read from, `None` for images loaded from memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying file.
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The CLI header as read.
    #[must_use]
    pub fn cor20(&self) -> &Cor20Header {
        &self.cor20
    }

    /// The decoded metadata, unchanged since reading.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The companion symbols, if any were found.
    #[must_use]
    pub fn symbols(&self) -> Option<&Symbols> {
        self.symbols.as_ref()
    }

    pub(crate) fn attach_symbols(&mut self, symbols: Symbols) {
        self.symbols = Some(symbols);
    }

    /// All types in `TypeDef` order.
    #[must_use]
    pub fn types(&self) -> &[TypeRecord] {
        &self.types
    }

    /// The type with id `id`.
    #[must_use]
    pub fn get_type(&self, id: TypeId) -> Option<&TypeRecord> {
        self.types.get(id.0)
    }

    /// All methods, table rows first, then methods added since reading.
    #[must_use]
    pub fn methods(&self) -> &[MethodRecord] {
        &self.methods
    }

    /// The method with id `id`.
    #[must_use]
    pub fn method(&self, id: MethodId) -> Option<&MethodRecord> {
        self.methods.get(id.0)
    }

    /// The methods of `ty`, in declaration order.
    pub fn methods_of<'a>(
        &'a self,
        ty: &'a TypeRecord,
    ) -> impl Iterator<Item = &'a MethodRecord> + 'a {
        ty.methods.iter().filter_map(|id| self.method(*id))
    }

    /// The reserved `<Module>` type, if the image has one.
    #[must_use]
    pub fn module_type(&self) -> Option<&TypeRecord> {
        self.module_type.and_then(|id| self.get_type(id))
    }

    /// First type whose simple (not namespace-qualified) name is `name`.
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<(TypeId, &TypeRecord)> {
        self.types
            .iter()
            .enumerate()
            .find(|(_, ty)| ty.name == name)
            .map(|(index, ty)| (TypeId(index), ty))
    }

    /// First method of `ty` named `name`.
    #[must_use]
    pub fn find_method(&self, ty: &TypeRecord, name: &str) -> Option<(MethodId, &MethodRecord)> {
        ty.methods
            .iter()
            .filter_map(|id| self.method(*id).map(|method| (*id, method)))
            .find(|(_, method)| method.name == name)
    }

    /// The `MethodDef` token of a method that exists in the tables.
    #[must_use]
    pub fn method_token(&self, id: MethodId) -> Option<Token> {
        self.method(id)?.token()
    }

    /// Create a reference to a method of this image.
    pub(crate) fn method_ref(&self, ty: &TypeRecord, method: MethodId) -> Option<MethodRef> {
        let record = self.method(method)?;
        Some(MethodRef {
            image: self.id,
            method,
            type_name: ty.name.clone(),
            method_name: record.name.clone(),
        })
    }

    /// Turn `target` into a reference valid for this image.
    ///
    /// References produced by this image are returned as they are. A reference produced by
    /// another image is looked up again by its type and method name.
    ///
    /// # Errors
    /// [`Error::MethodNotFound`] if this image has no such method.
    pub fn rebase(&self, target: &MethodRef) -> Result<MethodRef> {
        if target.belongs_to(self) && self.method(target.method).is_some() {
            return Ok(target.clone());
        }

        let not_found = || Error::MethodNotFound {
            type_name: target.type_name.clone(),
            method: target.method_name.clone(),
        };

        let (_, ty) = self.find_type(&target.type_name).ok_or_else(not_found)?;
        let (method, _) = self
            .find_method(ty, &target.method_name)
            .ok_or_else(not_found)?;
        self.method_ref(ty, method).ok_or_else(not_found)
    }

    /// Append a new method to `ty`.
    pub(crate) fn add_method(&mut self, ty: TypeId, method: MethodRecord) -> Result<MethodId> {
        let id = MethodId(self.methods.len());
        let Some(owner) = self.types.get_mut(ty.0) else {
            return Err(Error::NoModuleType);
        };

        owner.methods.push(id);
        self.methods.push(method);
        Ok(id)
    }

    pub(crate) fn module_type_id(&self) -> Option<TypeId> {
        self.module_type
    }
}
