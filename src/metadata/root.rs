//! Metadata root header and stream directory.
//!
//! The metadata root starts with the `BSJB` signature, carries a version string (`v4.0.30319`
//! for images, `PDB v1.0` for portable PDBs) and lists the streams that follow. All stream
//! offsets are relative to the start of the root.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::metadata::root::Root;
//!
//! let root = Root::read(metadata_bytes)?;
//! println!("Metadata version: {}", root.version());
//! for stream in &root.stream_headers {
//!     println!("Stream: {} (offset: {}, size: {})", stream.name, stream.offset, stream.size);
//! }
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{push_le, read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Signature at the start of every metadata root (`BSJB`)
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Root {
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Reserved, preserved as read
    pub reserved: u32,
    /// The version string as stored, including its NUL padding
    pub version_bytes: Vec<u8>,
    /// Reserved, preserved as read
    pub flags: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the root header and the stream directory.
    ///
    /// # Errors
    /// Fails if the signature does not match, or the directory or a stream leaves `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#x}",
                signature
            ));
        }

        let version_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_length.checked_add(16) else {
            return Err(OutOfBounds);
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 {
            return Err(malformed_error!("Metadata root does not list any streams"));
        }

        let mut stream_headers = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            if offset >= data.len() {
                return Err(OutOfBounds);
            }

            let header = StreamHeader::from(&data[offset..])?;
            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                _ => {
                    return Err(malformed_error!(
                        "Stream {} exceeds the metadata - {} + {}",
                        header.name,
                        header.offset,
                        header.size
                    ))
                }
            }

            offset += header.encoded_size();
            stream_headers.push(header);
        }

        Ok(Root {
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            version_bytes: data[16..version_end].to_vec(),
            flags,
            stream_headers,
        })
    }

    /// The version string without its padding.
    #[must_use]
    pub fn version(&self) -> String {
        let end = self
            .version_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(self.version_bytes.len());
        String::from_utf8_lossy(&self.version_bytes[..end]).into_owned()
    }

    /// Size of the root header including the stream directory.
    #[must_use]
    pub fn header_size(&self) -> usize {
        20 + self.version_bytes.len()
            + self
                .stream_headers
                .iter()
                .map(StreamHeader::encoded_size)
                .sum::<usize>()
    }

    /// Encode the root header and the stream directory.
    #[must_use]
    pub fn write(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.header_size());
        push_le(&mut buffer, CIL_HEADER_MAGIC);
        push_le(&mut buffer, self.major_version);
        push_le(&mut buffer, self.minor_version);
        push_le(&mut buffer, self.reserved);
        push_le(&mut buffer, self.version_bytes.len() as u32);
        buffer.extend_from_slice(&self.version_bytes);
        push_le(&mut buffer, self.flags);
        push_le(&mut buffer, self.stream_headers.len() as u16);
        for header in &self.stream_headers {
            header.write(&mut buffer);
        }
        buffer
    }
}
