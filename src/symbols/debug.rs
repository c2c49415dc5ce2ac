//! The PE debug directory.
//!
//! Only two entry types matter here: the CodeView entry, whose `RSDS` record names the PDB
//! and carries the GUID the PDB id has to match, and the `PdbChecksum` entry, which holds a
//! hash of the PDB that has to be recomputed whenever the PDB is rewritten.

use crate::{
    file::{io::read_le, File, DIRECTORY_DEBUG},
    Result,
};

/// Size of one `IMAGE_DEBUG_DIRECTORY` entry
pub const DEBUG_ENTRY_SIZE: usize = 28;
/// `IMAGE_DEBUG_TYPE_CODEVIEW`
pub const DEBUG_TYPE_CODEVIEW: u32 = 2;
/// `IMAGE_DEBUG_TYPE_PDBCHECKSUM`
pub const DEBUG_TYPE_PDB_CHECKSUM: u32 = 19;

const RSDS_SIGNATURE: &[u8; 4] = b"RSDS";

/// One entry of the debug directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    /// File offset of the entry itself
    pub offset: usize,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// `Type`
    pub kind: u32,
    /// `SizeOfData`
    pub size_of_data: u32,
    /// `AddressOfRawData`
    pub address_of_raw_data: u32,
    /// `PointerToRawData`
    pub pointer_to_raw_data: u32,
}

impl DebugEntry {
    /// File offset of the `PointerToRawData` field
    #[must_use]
    pub fn pointer_field_offset(&self) -> usize {
        self.offset + 24
    }

    /// The payload of this entry.
    ///
    /// # Errors
    /// Fails if the payload lies outside the file.
    pub fn payload<'a>(&self, file: &'a File) -> Result<&'a [u8]> {
        file.data_slice(self.pointer_to_raw_data as usize, self.size_of_data as usize)
    }
}

/// All entries of the debug directory, empty if the image has none.
///
/// # Errors
/// Fails if the directory cannot be mapped or is truncated.
pub fn debug_entries(file: &File) -> Result<Vec<DebugEntry>> {
    let Some((rva, size)) = file.data_directory(DIRECTORY_DEBUG) else {
        return Ok(Vec::new());
    };

    let start = file.rva_to_offset(rva as usize)?;
    let data = file.data_slice(start, size as usize)?;

    let mut entries = Vec::with_capacity(data.len() / DEBUG_ENTRY_SIZE);
    for (index, entry) in data.chunks_exact(DEBUG_ENTRY_SIZE).enumerate() {
        entries.push(DebugEntry {
            offset: start + index * DEBUG_ENTRY_SIZE,
            major_version: read_le::<u16>(&entry[8..])?,
            minor_version: read_le::<u16>(&entry[10..])?,
            kind: read_le::<u32>(&entry[12..])?,
            size_of_data: read_le::<u32>(&entry[16..])?,
            address_of_raw_data: read_le::<u32>(&entry[20..])?,
            pointer_to_raw_data: read_le::<u32>(&entry[24..])?,
        });
    }

    Ok(entries)
}

/// The PDB GUID of the first CodeView (`RSDS`) entry.
///
/// # Errors
/// Fails if the debug directory or the CodeView record is malformed.
pub fn codeview_guid(file: &File) -> Result<Option<[u8; 16]>> {
    for entry in debug_entries(file)? {
        if entry.kind != DEBUG_TYPE_CODEVIEW {
            continue;
        }

        let payload = entry.payload(file)?;
        if payload.len() < 24 || &payload[..4] != RSDS_SIGNATURE {
            // Older NB10 records do not describe portable PDBs
            continue;
        }

        let mut guid = [0u8; 16];
        guid.copy_from_slice(&payload[4..20]);
        return Ok(Some(guid));
    }

    Ok(None)
}
