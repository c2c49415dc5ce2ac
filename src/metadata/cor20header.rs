//! CLI (Cor20) header of a .NET image.
//!
//! The 72 byte header pointed to by the `IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR` data directory.
//! It locates the metadata, the strong name signature and the vtable fixups, and carries the
//! entry point token, all of which the writer updates.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use bitflags::bitflags;

use crate::{file::io::push_le, file::parser::Parser, Error::OutOfBounds, Result};

/// Size of the CLI header
pub const COR20_HEADER_SIZE: usize = 72;

bitflags! {
    /// `COMIMAGE_FLAGS_*` runtime flags of the CLI header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cor20Flags: u32 {
        /// The image contains only IL
        const IL_ONLY = 0x0000_0001;
        /// The image requires a 32-bit process
        const REQUIRED_32BIT = 0x0000_0002;
        /// The image has a strong name signature
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// The entry point is a native RVA rather than a token
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// Debug data is tracked
        const TRACK_DEBUG_DATA = 0x0001_0000;
        /// The image prefers a 32-bit process
        const PREFERRED_32BIT = 0x0002_0000;
    }
}

/// The CLI header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of the header, always 72
    pub cb: u32,
    /// Minimum major runtime version
    pub major_runtime_version: u16,
    /// Minor runtime version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata
    pub meta_data_size: u32,
    /// Runtime flags, see [`Cor20Flags`]
    pub flags: u32,
    /// Entry point token (or native RVA with `NATIVE_ENTRYPOINT`)
    pub entry_point_token: u32,
    /// RVA of the managed resources
    pub resource_rva: u32,
    /// Size of the managed resources
    pub resource_size: u32,
    /// RVA of the strong name signature
    pub strong_name_signature_rva: u32,
    /// Size of the strong name signature
    pub strong_name_signature_size: u32,
    /// Reserved, zero
    pub code_manager_table_rva: u32,
    /// Reserved, zero
    pub code_manager_table_size: u32,
    /// RVA of the vtable fixup array
    pub vtable_fixups_rva: u32,
    /// Size of the vtable fixup array
    pub vtable_fixups_size: u32,
    /// Reserved, zero
    pub export_address_table_jmp_rva: u32,
    /// Reserved, zero
    pub export_address_table_jmp_size: u32,
    /// Reserved for precompiled images
    pub managed_native_header_rva: u32,
    /// Reserved for precompiled images
    pub managed_native_header_size: u32,
}

impl Cor20Header {
    /// Parse the header.
    ///
    /// # Errors
    /// Fails on truncated data, a wrong `cb` or a missing metadata directory.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb as usize != COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("Metadata directory cannot be empty"));
        }

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags: parser.read_le::<u32>()?,
            entry_point_token: parser.read_le::<u32>()?,
            resource_rva: parser.read_le::<u32>()?,
            resource_size: parser.read_le::<u32>()?,
            strong_name_signature_rva: parser.read_le::<u32>()?,
            strong_name_signature_size: parser.read_le::<u32>()?,
            code_manager_table_rva: parser.read_le::<u32>()?,
            code_manager_table_size: parser.read_le::<u32>()?,
            vtable_fixups_rva: parser.read_le::<u32>()?,
            vtable_fixups_size: parser.read_le::<u32>()?,
            export_address_table_jmp_rva: parser.read_le::<u32>()?,
            export_address_table_jmp_size: parser.read_le::<u32>()?,
            managed_native_header_rva: parser.read_le::<u32>()?,
            managed_native_header_size: parser.read_le::<u32>()?,
        })
    }

    /// The runtime flags.
    #[must_use]
    pub fn flags(&self) -> Cor20Flags {
        Cor20Flags::from_bits_retain(self.flags)
    }

    /// Whether the entry point field holds a MethodDef token that follows renumbering.
    #[must_use]
    pub fn has_managed_entry_point(&self) -> bool {
        !self.flags().contains(Cor20Flags::NATIVE_ENTRYPOINT) && self.entry_point_token != 0
    }

    /// Encode the header.
    #[must_use]
    pub fn write(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(COR20_HEADER_SIZE);
        push_le(&mut buffer, self.cb);
        push_le(&mut buffer, self.major_runtime_version);
        push_le(&mut buffer, self.minor_runtime_version);
        for value in [
            self.meta_data_rva,
            self.meta_data_size,
            self.flags,
            self.entry_point_token,
            self.resource_rva,
            self.resource_size,
            self.strong_name_signature_rva,
            self.strong_name_signature_size,
            self.code_manager_table_rva,
            self.code_manager_table_size,
            self.vtable_fixups_rva,
            self.vtable_fixups_size,
            self.export_address_table_jmp_rva,
            self.export_address_table_jmp_size,
            self.managed_native_header_rva,
            self.managed_native_header_size,
        ] {
            push_le(&mut buffer, value);
        }
        buffer
    }
}
