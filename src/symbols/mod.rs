//! Companion symbol files.
//!
//! A portable PDB next to the image (`Library.dll` → `Library.pdb`) is picked up by the
//! reader and carried through the rewrite. Portable PDBs are plain ECMA-335 metadata with an
//! additional `#Pdb` stream; their debug tables (`MethodDebugInformation`, `LocalScope`,
//! `CustomDebugInformation`, ...) reference the image's `MethodDef` rows and are therefore
//! renumbered together with the image.
//!
//! Windows PDBs (MSF container) cannot be rewritten and are rejected.

pub mod debug;

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::{
    file::File,
    metadata::{tables::TableId, Metadata},
    Error::{self, MalformedSymbols},
    Result,
};

const MSF_SIGNATURE: &[u8] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";

/// A loaded portable PDB.
#[derive(Clone, Debug)]
pub struct Symbols {
    path: PathBuf,
    metadata: Metadata,
}

impl Symbols {
    /// Path the symbols were read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The decoded PDB metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The 20 byte PDB id.
    #[must_use]
    pub fn id(&self) -> [u8; 20] {
        self.metadata.pdb.as_ref().map_or([0; 20], |pdb| pdb.id)
    }
}

/// Path of the symbol file that belongs to `image`: same directory and stem, `.pdb` extension.
#[must_use]
pub fn symbols_path(image: &Path) -> PathBuf {
    image.with_extension("pdb")
}

/// Load the companion symbols of an image, if there are any.
///
/// # Errors
/// [`Error::MalformedSymbols`] if a symbol file exists but is not a portable PDB, is
/// corrupt, or does not belong to the image.
pub(crate) fn load(path: &Path, file: &File, image: &Metadata) -> Result<Option<Symbols>> {
    if !path.is_file() {
        debug!("No symbols at {}", path.display());
        return Ok(None);
    }

    let data = std::fs::read(path).map_err(|error| {
        MalformedSymbols(format!("{} could not be read - {error}", path.display()))
    })?;

    let symbols = parse(path, &data, file, image).map_err(Error::into_symbols_error)?;
    info!("Loaded symbols from {}", path.display());
    Ok(Some(symbols))
}

/// Decode and validate a portable PDB against the image it was found next to.
pub(crate) fn parse(path: &Path, data: &[u8], file: &File, image: &Metadata) -> Result<Symbols> {
    if data.starts_with(MSF_SIGNATURE) {
        return Err(MalformedSymbols(format!(
            "{} is a Windows PDB, only portable PDBs are supported",
            path.display()
        )));
    }

    let metadata = Metadata::read(data)?;
    let Some(pdb) = &metadata.pdb else {
        return Err(MalformedSymbols(format!(
            "{} has no #Pdb stream",
            path.display()
        )));
    };

    if let Some(guid) = debug::codeview_guid(file)? {
        if guid != pdb.guid() {
            return Err(MalformedSymbols(format!(
                "{} does not match the image (PDB id differs from the CodeView entry)",
                path.display()
            )));
        }
    }

    for (slot, count) in pdb.row_counts.iter().enumerate() {
        if pdb.referenced_tables & (1 << slot) == 0 {
            continue;
        }

        let Some(table) = TableId::from_u8(slot as u8) else {
            return Err(malformed_error!("#Pdb references unknown table 0x{:02x}", slot));
        };
        if image.tables.rows(table) != *count {
            return Err(MalformedSymbols(format!(
                "{} describes {} {:?} rows, the image has {}",
                path.display(),
                count,
                table,
                image.tables.rows(table)
            )));
        }
    }

    let method_debug_rows = metadata.tables.rows(TableId::MethodDebugInformation);
    let method_rows = image.tables.rows(TableId::MethodDef);
    if method_debug_rows != 0 && method_debug_rows != method_rows {
        return Err(MalformedSymbols(format!(
            "{} has {} MethodDebugInformation rows for {} methods",
            path.display(),
            method_debug_rows,
            method_rows
        )));
    }

    Ok(Symbols {
        path: path.to_path_buf(),
        metadata,
    })
}
