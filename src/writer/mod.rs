//! Writing an [`Image`] back to disk.
//!
//! Serialization runs entirely in memory:
//!
//! 1. [`plan`] decides the new `MethodDef` order (added methods go behind the existing
//!    methods of their type) and the old to new row id map
//! 2. the metadata is rebuilt: added rows are inserted, every column that references a
//!    method is renumbered ([`remap`]), sorted tables are re-sorted
//! 3. [`layout`] appends a `.meta` section with the new bodies, the new metadata and, when
//!    signing, room for the strong name signature
//! 4. method tokens in existing IL, the entry point and the vtable fixups follow the new
//!    numbering
//! 5. the companion PDB is rebuilt ([`symbols`]) and `PdbChecksum` entries refreshed
//! 6. the image is signed and its PE checksum recomputed
//!
//! The results are then committed atomically ([`output`]).

pub(crate) mod checksum;
pub(crate) mod layout;
pub(crate) mod output;
pub(crate) mod plan;
pub(crate) mod remap;
pub(crate) mod symbols;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    image::{Image, MethodId},
    metadata::{
        cor20header::{Cor20Flags, COR20_HEADER_SIZE},
        tables::{columns, TableId},
        token::Token,
    },
    strongname::{sign_image, StrongNameKey},
    symbols::symbols_path,
    writer::{
        checksum::update_checksum,
        layout::{LayoutPlan, MetaSection},
        output::Target,
        plan::MethodPlan,
        remap::{remap_added_body, remap_columns, rewrite_code, rewrite_vtable_fixups, sort_tables},
    },
    Error::{self, OutOfBounds},
    Result,
};

/// `AssemblyFlags.PublicKey`: `Assembly.PublicKey` holds the full key, not a token
const ASSEMBLY_FLAG_PUBLIC_KEY: u32 = 0x0001;

/// Settings for [`write_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    key_path: Option<PathBuf>,
}

impl WriteOptions {
    /// Options for an unsigned write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strong name sign the output with the key pair in `path`.
    #[must_use]
    pub fn with_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// The key file, if the output is signed.
    #[must_use]
    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }
}

/// The serialized outputs of one image.
#[derive(Debug, Clone)]
pub(crate) struct Serialized {
    pub image: Vec<u8>,
    pub symbols: Option<Vec<u8>>,
}

/// Write `image` to `path`, strong name signing it with the key pair in `key_path`.
///
/// Companion symbols are written next to it (`path` with a `.pdb` extension). Either all
/// outputs are replaced or none.
///
/// # Errors
/// - [`Error::NotFound`] if `key_path` does not exist
/// - [`Error::InvalidKey`] if `key_path` is not a usable key pair
/// - [`Error::NotSupported`] for images whose layout cannot take the rewritten data
/// - [`Error::WriteError`] if an output could not be written
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
///
/// let mut image = modinit::read(Path::new("Library.dll"))?;
/// let target = modinit::resolve(&image, "ModuleInitializer", "Run")?;
/// modinit::inject(&mut image, &target)?;
/// modinit::write(&image, Path::new("Library.dll"), Some(Path::new("Library.snk")))?;
/// # Ok::<(), modinit::Error>(())
/// ```
pub fn write(image: &Image, path: &Path, key_path: Option<&Path>) -> Result<()> {
    let options = match key_path {
        Some(key) => WriteOptions::new().with_key(key),
        None => WriteOptions::new(),
    };
    write_with(image, path, &options)
}

/// [`write`] driven by [`WriteOptions`].
///
/// # Errors
/// See [`write`].
pub fn write_with(image: &Image, path: &Path, options: &WriteOptions) -> Result<()> {
    let key = options
        .key_path()
        .map(StrongNameKey::from_file)
        .transpose()?;

    let serialized = serialize(image, key.as_ref())?;

    let pdb_path = symbols_path(path);
    let mut targets = Vec::with_capacity(2);
    if let Some(pdb) = &serialized.symbols {
        targets.push(Target::new(&pdb_path, pdb));
    }
    targets.push(Target::new(path, &serialized.image));
    output::commit(&targets)?;

    info!("Wrote {} ({} bytes)", path.display(), serialized.image.len());
    if serialized.symbols.is_some() {
        info!("Wrote symbols to {}", pdb_path.display());
    }
    Ok(())
}

/// Build the output image (and PDB) in memory.
pub(crate) fn serialize(image: &Image, key: Option<&StrongNameKey>) -> Result<Serialized> {
    let file = image.file();
    let plan = MethodPlan::new(image);
    let layout = LayoutPlan::new(file)?;
    let mut section = MetaSection::new(layout.section_rva());

    let mut metadata = image.metadata().clone();
    let mut pdb = image.symbols().map(|symbols| symbols.metadata().clone());

    let mut added_rows: HashMap<MethodId, Vec<u32>> = HashMap::new();
    for (rid, id) in plan.added() {
        let Some(method) = image.method(id) else {
            return Err(malformed_error!("Added method {} is missing", id.index()));
        };
        let Some(signature) = &method.encoded_signature else {
            return Err(Error::NotSupported(format!(
                "Added method {} has no encoded signature",
                method.name
            )));
        };

        let rva = match &method.encoded_body {
            Some(encoded) => section.push_body(&remap_added_body(method, encoded, &plan.rids)?)?,
            None => 0,
        };
        debug!("{} becomes MethodDef row {} (body at 0x{:x})", method.name, rid, rva);

        added_rows.insert(
            id,
            vec![
                rva,
                method.impl_flags,
                method.flags,
                metadata.strings.intern(&method.name),
                metadata.blobs.intern(signature)?,
                0,
            ],
        );
    }

    if !plan.is_unchanged() {
        // Before the rows move: TypeDef.MethodList is rebuilt by the plan
        let patched = remap_columns(&mut metadata.tables, &plan.rids)?;
        debug!("Renumbered {} method references in the metadata", patched);
        if let Some(pdb) = pdb.as_mut() {
            symbols::renumber(pdb, &plan)?;
        }
    }
    plan.apply(&mut metadata.tables, |id| {
        added_rows
            .remove(&id)
            .ok_or_else(|| malformed_error!("No row for added method {}", id.index()))
    })?;
    sort_tables(&mut metadata.tables, pdb.as_mut().map(|pdb| &mut pdb.tables))?;

    let mut cor20 = image.cor20().clone();
    if let Some(key) = key {
        let Some(assembly) = metadata.tables.table_mut(TableId::Assembly).row_mut(1) else {
            return Err(Error::NotSupported(
                "Only assemblies can be strong name signed, the image has no Assembly row"
                    .to_string(),
            ));
        };
        assembly[columns::ASSEMBLY_PUBLIC_KEY] = metadata.blobs.intern(key.public_key())?;
        assembly[columns::ASSEMBLY_FLAGS] |= ASSEMBLY_FLAG_PUBLIC_KEY;
    } else if cor20.flags().contains(Cor20Flags::STRONG_NAME_SIGNED) {
        warn!("The image was strong name signed; without a key the output is left unsigned");
        cor20.flags &= !Cor20Flags::STRONG_NAME_SIGNED.bits();
    }

    let metadata_bytes = metadata.write()?;
    let (metadata_rva, metadata_size) = section.push_metadata(&metadata_bytes)?;
    cor20.meta_data_rva = metadata_rva;
    cor20.meta_data_size = metadata_size;

    let signature = match key {
        Some(key) => {
            let rva = section.reserve_signature(key.signature_size())?;
            cor20.strong_name_signature_rva = rva;
            cor20.strong_name_signature_size = key.signature_size() as u32;
            cor20.flags |= Cor20Flags::STRONG_NAME_SIGNED.bits();
            let start = layout.section_offset(rva);
            Some((start..start + key.signature_size(), key))
        }
        None => None,
    };

    if cor20.has_managed_entry_point() {
        cor20.entry_point_token = plan
            .rids
            .token(Token::new(cor20.entry_point_token))
            .value();
    }

    let mut data = layout.build(file, section)?;

    let offset_of = |rva: u32| layout.offset(file, rva);
    if !plan.is_unchanged() {
        rewrite_code(image, &plan.rids, &mut data, offset_of)?;
        rewrite_vtable_fixups(image.cor20(), &plan.rids, &mut data, offset_of)?;
    }

    let (clr_rva, _) = file.clr();
    let clr = layout.offset(file, clr_rva)?;
    data.get_mut(clr..clr + COR20_HEADER_SIZE)
        .ok_or(OutOfBounds)?
        .copy_from_slice(&cor20.write());

    let symbols = match pdb.as_mut() {
        Some(pdb) => {
            let (bytes, id_offset) = symbols::rebuild(pdb, &metadata.tables)?;
            symbols::update_pdb_checksums(file, &layout, &mut data, &bytes, id_offset)?;
            Some(bytes)
        }
        None => None,
    };

    if let Some((range, key)) = signature {
        sign_image(&mut data, range, key)?;
    }

    let checksum = update_checksum(&mut data, file.checksum_offset())?;
    debug!("PE checksum 0x{:08x}", checksum);

    Ok(Serialized {
        image: data,
        symbols,
    })
}
