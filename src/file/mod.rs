//! PE container access for CLI images.
//!
//! [`File`] owns the raw bytes of an image (memory-mapped from disk, or an owned buffer) and
//! the handful of PE header values the patcher needs: where the headers and the section table
//! live, the alignments, the data directories and the section layout. Parsing and structural
//! validation of the PE headers is delegated to `goblin`; the values are then copied out so
//! the `File` carries no borrowed parser state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modinit::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Library.dll"))?;
//! let (clr_rva, clr_size) = file.clr();
//! let clr_offset = file.rva_to_offset(clr_rva as usize)?;
//! println!("CLI header at file offset 0x{clr_offset:x}, {clr_size} bytes");
//! for section in file.sections() {
//!     println!("{} at RVA 0x{:x}", section.name, section.virtual_address);
//! }
//! # Ok::<(), modinit::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use goblin::pe::PE;

use crate::{
    file::io::read_le,
    Error::{Empty, GoblinErr, OutOfBounds},
    Result,
};
use memory::Memory;
use physical::Physical;

/// Index of the certificate table in the data directory array
pub const DIRECTORY_SECURITY: usize = 4;
/// Index of the debug directory in the data directory array
pub const DIRECTORY_DEBUG: usize = 6;
/// Index of the CLI header in the data directory array
pub const DIRECTORY_CLR_RUNTIME_HEADER: usize = 14;

/// Size of one entry in the PE section table
pub const SECTION_HEADER_SIZE: usize = 40;

/// Source of the raw image bytes.
pub trait Backend: Send + Sync {
    /// The complete data.
    fn data(&self) -> &[u8];

    /// Length of the data.
    fn len(&self) -> usize {
        self.data().len()
    }

    /// Bounds-checked sub-slice of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range does not fit.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data().get(offset..end))
            .ok_or(OutOfBounds)
    }
}

/// A PE section header, as found in the section table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    /// Section name with trailing NULs removed
    pub name: String,
    /// Size of the section once loaded
    pub virtual_size: u32,
    /// RVA of the section once loaded
    pub virtual_address: u32,
    /// Size of the initialized data on disk
    pub size_of_raw_data: u32,
    /// File offset of the initialized data
    pub pointer_to_raw_data: u32,
    /// `IMAGE_SCN_*` flags
    pub characteristics: u32,
}

impl Section {
    /// Whether `rva` falls inside the initialized part of this section.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let extent = self.virtual_size.max(self.size_of_raw_data);
        rva >= self.virtual_address
            && u64::from(rva) < u64::from(self.virtual_address) + u64::from(extent)
    }
}

/// Header values copied out of the PE headers during load.
#[derive(Clone, Debug)]
struct Headers {
    pe_offset: usize,
    optional_header_offset: usize,
    size_of_optional_header: usize,
    is_pe32_plus: bool,
    file_alignment: u32,
    section_alignment: u32,
    size_of_headers: u32,
    directories: Vec<(u32, u32)>,
    sections: Vec<Section>,
}

/// A loaded CLI image: raw bytes plus the parsed PE layout.
pub struct File {
    data: Box<dyn Backend>,
    headers: Headers,
}

impl File {
    /// Load an image from disk by memory-mapping it.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] when the file cannot be mapped, and a parse error
    /// if the file is not a PE image with a CLI header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Load an image from an owned buffer.
    ///
    /// # Errors
    /// Returns a parse error if the data is not a PE image with a CLI header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let headers = {
            let bytes = data.data();
            let pe = PE::parse(bytes).map_err(GoblinErr)?;
            let Some(optional_header) = pe.header.optional_header else {
                return Err(malformed_error!("File does not have an OptionalHeader"));
            };
            if optional_header
                .data_directories
                .get_clr_runtime_header()
                .is_none()
            {
                return Err(malformed_error!(
                    "File does not have a CLR runtime header directory"
                ));
            }

            let pe_offset = pe.header.dos_header.pe_pointer as usize;
            let optional_header_offset = pe_offset + 24;
            let directory_start = optional_header_offset + if pe.is_64 { 112 } else { 96 };
            let directory_count = read_le::<u32>(
                bytes
                    .get(directory_start - 4..)
                    .ok_or(OutOfBounds)?,
            )?;

            let mut directories = Vec::with_capacity(16);
            for index in 0..directory_count.min(16) as usize {
                let entry = directory_start + index * 8;
                let slice = bytes.get(entry..entry + 8).ok_or(OutOfBounds)?;
                directories.push((read_le::<u32>(slice)?, read_le::<u32>(&slice[4..])?));
            }

            let sections = pe
                .sections
                .iter()
                .map(|section| Section {
                    name: String::from_utf8_lossy(&section.name)
                        .trim_end_matches('\0')
                        .to_string(),
                    virtual_size: section.virtual_size,
                    virtual_address: section.virtual_address,
                    size_of_raw_data: section.size_of_raw_data,
                    pointer_to_raw_data: section.pointer_to_raw_data,
                    characteristics: section.characteristics,
                })
                .collect();

            Headers {
                pe_offset,
                optional_header_offset,
                size_of_optional_header: pe.header.coff_header.size_of_optional_header as usize,
                is_pe32_plus: pe.is_64,
                file_alignment: optional_header.windows_fields.file_alignment,
                section_alignment: optional_header.windows_fields.section_alignment,
                size_of_headers: optional_header.windows_fields.size_of_headers,
                directories,
                sections,
            }
        };

        if headers.file_alignment == 0 || headers.section_alignment == 0 {
            return Err(malformed_error!("PE alignment values must not be zero"));
        }

        if !matches!(
            headers.directories.get(DIRECTORY_CLR_RUNTIME_HEADER),
            Some((rva, size)) if *rva != 0 && *size != 0
        ) {
            return Err(malformed_error!(
                "File does not have a CLR runtime header directory"
            ));
        }

        Ok(File {
            data: Box::new(data),
            headers,
        })
    }

    /// Length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty (never true for a loaded image).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Bounds-checked sub-slice of the raw image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range does not fit.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Whether the optional header is in PE32+ format.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.headers.is_pe32_plus
    }

    /// File offset of the `PE\0\0` signature.
    #[must_use]
    pub fn pe_signature_offset(&self) -> usize {
        self.headers.pe_offset
    }

    /// File offset of the COFF file header.
    #[must_use]
    pub fn coff_header_offset(&self) -> usize {
        self.headers.pe_offset + 4
    }

    /// File offset of the optional header.
    #[must_use]
    pub fn optional_header_offset(&self) -> usize {
        self.headers.optional_header_offset
    }

    /// File offset of the `CheckSum` field of the optional header.
    #[must_use]
    pub fn checksum_offset(&self) -> usize {
        self.headers.optional_header_offset + 64
    }

    /// File offset of the first section header.
    #[must_use]
    pub fn section_table_offset(&self) -> usize {
        self.headers.optional_header_offset + self.headers.size_of_optional_header
    }

    /// File offset of the data directory entry at `index`.
    ///
    /// # Errors
    /// Fails if the optional header declares fewer directories than `index + 1`.
    pub fn data_directory_offset(&self, index: usize) -> Result<usize> {
        if index >= self.headers.directories.len() {
            return Err(malformed_error!(
                "Data directory {} is not present in the optional header",
                index
            ));
        }

        let start = self.headers.optional_header_offset
            + if self.headers.is_pe32_plus { 112 } else { 96 };
        Ok(start + index * 8)
    }

    /// `(rva, size)` of a non-empty data directory.
    #[must_use]
    pub fn data_directory(&self, index: usize) -> Option<(u32, u32)> {
        self.headers
            .directories
            .get(index)
            .copied()
            .filter(|(rva, size)| *rva != 0 && *size != 0)
    }

    /// `(rva, size)` of the CLI header.
    #[must_use]
    pub fn clr(&self) -> (u32, u32) {
        self.data_directory(DIRECTORY_CLR_RUNTIME_HEADER)
            .unwrap_or((0, 0))
    }

    /// The section table, in file order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.headers.sections
    }

    /// The `FileAlignment` of the optional header.
    #[must_use]
    pub fn file_alignment(&self) -> u32 {
        self.headers.file_alignment
    }

    /// The `SectionAlignment` of the optional header.
    #[must_use]
    pub fn section_alignment(&self) -> u32 {
        self.headers.section_alignment
    }

    /// The `SizeOfHeaders` of the optional header.
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        self.headers.size_of_headers
    }

    /// File offset one past the last byte of section raw data.
    ///
    /// Anything beyond this offset is overlay data (typically an Authenticode certificate).
    #[must_use]
    pub fn end_of_sections(&self) -> usize {
        self.headers
            .sections
            .iter()
            .map(|section| {
                section.pointer_to_raw_data as usize + section.size_of_raw_data as usize
            })
            .max()
            .unwrap_or(self.headers.size_of_headers as usize)
    }

    /// Translate an RVA into a file offset.
    ///
    /// # Errors
    /// Fails if the RVA does not map onto initialized data.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let Ok(rva_u32) = u32::try_from(rva) else {
            return Err(malformed_error!("RVA too large to fit in u32: {}", rva));
        };

        for section in &self.headers.sections {
            if section.contains_rva(rva_u32) {
                let delta = rva_u32 - section.virtual_address;
                if delta >= section.size_of_raw_data {
                    return Err(malformed_error!(
                        "RVA 0x{:x} points into uninitialized data of section {}",
                        rva,
                        section.name
                    ));
                }
                return Ok(section.pointer_to_raw_data as usize + delta as usize);
            }
        }

        if rva_u32 < self.headers.size_of_headers {
            return Ok(rva);
        }

        Err(malformed_error!(
            "RVA could not be converted to offset - 0x{:x}",
            rva
        ))
    }

    /// Translate a file offset into an RVA.
    ///
    /// # Errors
    /// Fails if the offset lies outside every section.
    pub fn offset_to_rva(&self, offset: usize) -> Result<usize> {
        for section in &self.headers.sections {
            let start = section.pointer_to_raw_data as usize;
            let end = start + section.size_of_raw_data as usize;
            if offset >= start && offset < end {
                return Ok(offset - start + section.virtual_address as usize);
            }
        }

        Err(malformed_error!(
            "Offset could not be converted to RVA - 0x{:x}",
            offset
        ))
    }

    /// Bounds-checked slice of `len` bytes starting at `rva`.
    ///
    /// # Errors
    /// Fails if the RVA cannot be mapped or the range leaves the file.
    pub fn rva_slice(&self, rva: u32, len: usize) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva as usize)?;
        self.data_slice(offset, len)
    }

    /// Everything from `rva` to the end of the initialized data of its section.
    ///
    /// # Errors
    /// Fails if the RVA cannot be mapped.
    pub fn rva_tail(&self, rva: u32) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva as usize)?;
        let section_end = self
            .headers
            .sections
            .iter()
            .find(|section| section.contains_rva(rva))
            .map_or(self.len(), |section| {
                section.pointer_to_raw_data as usize + section.size_of_raw_data as usize
            });
        self.data_slice(offset, section_end.min(self.len()).saturating_sub(offset))
    }
}
