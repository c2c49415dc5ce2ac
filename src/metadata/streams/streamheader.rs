//! Stream headers of the metadata root.
//!
//! Each header names one stream and locates it relative to the start of the metadata root.
//! The name is NUL-terminated and padded to a multiple of 4 bytes.
//!
//! # Reference
//! - [ECMA-335 II.24.2.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{pad_to, push_le, read_le},
    Error::OutOfBounds,
    Result,
};

/// Longest stream name the root may carry, including the terminator
const MAX_NAME_LENGTH: usize = 32;

/// A single entry of the stream directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream from the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name, e.g. `#~` or `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`.
    ///
    /// # Errors
    /// Fails if the data is truncated or the name is not terminated within 32 bytes.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let name_bytes = &data[8..data.len().min(8 + MAX_NAME_LENGTH)];
        let Some(name_length) = name_bytes.iter().position(|byte| *byte == 0) else {
            return Err(malformed_error!("Stream header name is not terminated"));
        };

        let Ok(name) = std::str::from_utf8(&name_bytes[..name_length]) else {
            return Err(malformed_error!("Stream header name is not valid UTF-8"));
        };

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name: name.to_string(),
        })
    }

    /// Bytes this header occupies in the directory.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        8 + (self.name.len() + 1).div_ceil(4) * 4
    }

    /// Append the encoded header to `buffer`.
    pub fn write(&self, buffer: &mut Vec<u8>) {
        push_le(buffer, self.offset);
        push_le(buffer, self.size);
        buffer.extend_from_slice(self.name.as_bytes());
        buffer.push(0);
        pad_to(buffer, 4);
    }
}
