//! Placement of the rewritten data in the output PE.
//!
//! The original sections are kept where they are; everything that changed (new method
//! bodies, the rebuilt metadata, the strong name signature) goes into one new section,
//! `.meta`, appended after the last one. Old metadata and signature bytes stay behind as
//! unreferenced data.
//!
//! Adding a section needs one more section header. When the header area has no room left,
//! it grows by whole `FileAlignment` units and all raw data moves down by the same amount;
//! this only works while the headers stay below the first section's RVA.

use log::{debug, warn};

use crate::{
    file::{
        io::{align_up, read_le, write_le},
        File, DIRECTORY_SECURITY, SECTION_HEADER_SIZE,
    },
    symbols::debug::debug_entries,
    Error::{self, OutOfBounds},
    Result,
};

/// Name of the section holding the rewritten data
pub const META_SECTION_NAME: &str = ".meta";

/// `IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ`
pub const META_SECTION_CHARACTERISTICS: u32 = 0x4000_0040;

/// Contents of the `.meta` section, assembled front to back.
#[derive(Debug)]
pub(crate) struct MetaSection {
    rva: u32,
    data: Vec<u8>,
}

impl MetaSection {
    pub(crate) fn new(rva: u32) -> Self {
        MetaSection {
            rva,
            data: Vec::new(),
        }
    }

    fn next_rva(&mut self) -> Result<u32> {
        // Method bodies with fat headers and the metadata root need 4 byte alignment
        let offset = align_up(self.data.len(), 4);
        self.data.resize(offset, 0);

        let Ok(offset) = u32::try_from(offset) else {
            return Err(Error::NotSupported(
                "The rewritten data does not fit into a section".to_string(),
            ));
        };
        self.rva
            .checked_add(offset)
            .ok_or_else(|| Error::NotSupported("The image exceeds the 32-bit address space".to_string()))
    }

    /// Add an encoded method body, returns its RVA.
    pub(crate) fn push_body(&mut self, body: &[u8]) -> Result<u32> {
        let rva = self.next_rva()?;
        self.data.extend_from_slice(body);
        Ok(rva)
    }

    /// Add the metadata root, returns its RVA and size.
    pub(crate) fn push_metadata(&mut self, metadata: &[u8]) -> Result<(u32, u32)> {
        let rva = self.next_rva()?;
        self.data.extend_from_slice(metadata);
        Ok((rva, metadata.len() as u32))
    }

    /// Reserve a zeroed strong name signature blob, returns its RVA.
    pub(crate) fn reserve_signature(&mut self, size: usize) -> Result<u32> {
        let rva = self.next_rva()?;
        self.data.resize(self.data.len() + size, 0);
        Ok(rva)
    }

    pub(crate) fn rva(&self) -> u32 {
        self.rva
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }
}

/// Where the `.meta` section goes and how far the original data has to move.
#[derive(Debug, Clone)]
pub(crate) struct LayoutPlan {
    /// `SizeOfHeaders` of the input
    old_headers: usize,
    /// Bytes inserted after the header area
    growth: usize,
    /// Bytes of the input that are kept (headers and section data, no overlay)
    kept: usize,
    /// RVA of the new section
    section_rva: u32,
    /// File offset of the new section in the output
    section_offset: usize,
}

impl LayoutPlan {
    /// Plan the output layout of `file`.
    ///
    /// # Errors
    /// [`Error::NotSupported`] if there is no room for another section header and the
    /// header area cannot grow.
    pub(crate) fn new(file: &File) -> Result<LayoutPlan> {
        let file_alignment = file.file_alignment() as usize;
        let section_alignment = file.section_alignment() as usize;
        let old_headers = file.size_of_headers() as usize;
        let sections = file.sections();

        let slot = file.section_table_offset() + sections.len() * SECTION_HEADER_SIZE;
        let table_end = slot + SECTION_HEADER_SIZE;

        // The new header must not overwrite anything that lives behind the section table
        let in_headers = file.data_slice(slot, table_end.min(old_headers).saturating_sub(slot))?;
        if in_headers.iter().any(|byte| *byte != 0) {
            return Err(Error::NotSupported(
                "The header area holds data behind the section table".to_string(),
            ));
        }

        let growth = if table_end > old_headers {
            align_up(table_end - old_headers, file_alignment)
        } else {
            0
        };

        if growth > 0 {
            let first_section = sections
                .iter()
                .map(|section| section.virtual_address as usize)
                .min()
                .unwrap_or(usize::MAX);
            if old_headers + growth > first_section {
                return Err(Error::NotSupported(format!(
                    "No room for another section header: the headers would overlap the first section at RVA 0x{first_section:x}"
                )));
            }
            debug!("Growing the header area by 0x{:x} bytes", growth);
        }

        let kept = file.end_of_sections().max(old_headers).min(file.len());

        let image_end = sections
            .iter()
            .map(|section| {
                section.virtual_address as usize
                    + section.virtual_size.max(section.size_of_raw_data) as usize
            })
            .max()
            .unwrap_or(old_headers);
        let Ok(section_rva) = u32::try_from(align_up(image_end, section_alignment)) else {
            return Err(Error::NotSupported(
                "The image exceeds the 32-bit address space".to_string(),
            ));
        };

        let section_offset = align_up(kept + growth, file_alignment);
        debug!(
            "{} section at RVA 0x{:x}, file offset 0x{:x}",
            META_SECTION_NAME, section_rva, section_offset
        );

        Ok(LayoutPlan {
            old_headers,
            growth,
            kept,
            section_rva,
            section_offset,
        })
    }

    /// RVA of the new section.
    pub(crate) fn section_rva(&self) -> u32 {
        self.section_rva
    }

    /// Whether the header area grows.
    pub(crate) fn grows_headers(&self) -> bool {
        self.growth > 0
    }

    /// Output offset of the input byte at `offset`.
    pub(crate) fn shift(&self, offset: usize) -> usize {
        if offset >= self.old_headers {
            offset + self.growth
        } else {
            offset
        }
    }

    /// Output offset of an RVA inside the new section.
    pub(crate) fn section_offset(&self, rva: u32) -> usize {
        self.section_offset + rva.saturating_sub(self.section_rva) as usize
    }

    /// Output offset of an RVA of the input.
    ///
    /// # Errors
    /// Fails if the RVA does not map onto data of the input.
    pub(crate) fn offset(&self, file: &File, rva: u32) -> Result<usize> {
        Ok(self.shift(file.rva_to_offset(rva as usize)?))
    }

    /// Assemble the output image: the input without overlay, the header area grown as
    /// planned, and `section` appended as a new section.
    ///
    /// # Errors
    /// Fails if one of the header fields to update lies outside of the input.
    pub(crate) fn build(&self, file: &File, section: MetaSection) -> Result<Vec<u8>> {
        let input = file.data();
        let file_alignment = file.file_alignment() as usize;
        let headers = self.old_headers.min(self.kept);

        if input.len() > self.kept {
            warn!(
                "Dropping {} bytes of overlay data (e.g. an Authenticode signature)",
                input.len() - self.kept
            );
        }

        let raw_size = align_up(section.len(), file_alignment);
        let mut data = Vec::with_capacity(self.section_offset + raw_size);
        data.extend_from_slice(&input[..headers]);
        data.resize(headers + self.growth, 0);
        data.extend_from_slice(&input[headers..self.kept]);
        data.resize(self.section_offset, 0);
        data.extend_from_slice(&section.data);
        data.resize(self.section_offset + raw_size, 0);

        self.update_section_table(file, &mut data, &section, raw_size)?;
        self.update_headers(file, &mut data, &section, raw_size)?;
        self.update_debug_directory(file, &mut data)?;

        Ok(data)
    }

    fn update_section_table(
        &self,
        file: &File,
        data: &mut [u8],
        section: &MetaSection,
        raw_size: usize,
    ) -> Result<()> {
        let table = file.section_table_offset();

        if self.growth > 0 {
            for index in 0..file.sections().len() {
                let header = table + index * SECTION_HEADER_SIZE;
                // PointerToRawData, PointerToRelocations, PointerToLinenumbers
                for field in [20, 24, 28] {
                    self.shift_pointer(data, header + field)?;
                }
            }
        }

        let header = table + file.sections().len() * SECTION_HEADER_SIZE;
        let slot = data
            .get_mut(header..header + SECTION_HEADER_SIZE)
            .ok_or(OutOfBounds)?;
        slot.fill(0);
        slot[..META_SECTION_NAME.len()].copy_from_slice(META_SECTION_NAME.as_bytes());
        write_le(&mut slot[8..], section.len() as u32)?;
        write_le(&mut slot[12..], section.rva())?;
        write_le(&mut slot[16..], raw_size as u32)?;
        write_le(&mut slot[20..], self.section_offset as u32)?;
        write_le(&mut slot[36..], META_SECTION_CHARACTERISTICS)?;

        Ok(())
    }

    fn update_headers(
        &self,
        file: &File,
        data: &mut [u8],
        section: &MetaSection,
        raw_size: usize,
    ) -> Result<()> {
        let coff = file.coff_header_offset();
        let number_of_sections = read_le::<u16>(data.get(coff + 2..).ok_or(OutOfBounds)?)?;
        write_le(
            data.get_mut(coff + 2..).ok_or(OutOfBounds)?,
            number_of_sections + 1,
        )?;
        if self.growth > 0 {
            // PointerToSymbolTable
            self.shift_pointer(data, coff + 8)?;
        }

        let optional = file.optional_header_offset();
        let initialized = read_le::<u32>(data.get(optional + 8..).ok_or(OutOfBounds)?)?;
        write_le(
            data.get_mut(optional + 8..).ok_or(OutOfBounds)?,
            initialized.wrapping_add(raw_size as u32),
        )?;

        let size_of_image = align_up(
            section.rva() as usize + section.len(),
            file.section_alignment() as usize,
        );
        write_le(
            data.get_mut(optional + 56..).ok_or(OutOfBounds)?,
            size_of_image as u32,
        )?;
        write_le(
            data.get_mut(optional + 60..).ok_or(OutOfBounds)?,
            (self.old_headers + self.growth) as u32,
        )?;

        if file.data_directory(DIRECTORY_SECURITY).is_some() {
            warn!("Clearing the certificate table, the Authenticode signature no longer matches");
            let entry = file.data_directory_offset(DIRECTORY_SECURITY)?;
            data.get_mut(entry..entry + 8).ok_or(OutOfBounds)?.fill(0);
        }

        Ok(())
    }

    fn update_debug_directory(&self, file: &File, data: &mut [u8]) -> Result<()> {
        if self.growth == 0 {
            return Ok(());
        }

        for entry in debug_entries(file)? {
            self.shift_pointer(data, self.shift(entry.pointer_field_offset()))?;
        }

        Ok(())
    }

    /// Move a non-null file pointer stored at `at` by the header growth.
    fn shift_pointer(&self, data: &mut [u8], at: usize) -> Result<()> {
        let field = data.get_mut(at..at + 4).ok_or(OutOfBounds)?;
        let pointer = read_le::<u32>(field)?;
        if pointer != 0 {
            write_le(field, self.shift(pointer as usize) as u32)?;
        }
        Ok(())
    }
}
