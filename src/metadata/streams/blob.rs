//! Blob Heap (`#Blob`)
//!
//! Length-prefixed binary data: signatures, custom attribute values, public keys. Each entry
//! is a compressed length (II.23.2) followed by that many bytes.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::{io::push_compressed_uint, parser::Parser},
    Error::OutOfBounds,
    Result,
};

/// An owned `#Blob` heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    data: Vec<u8>,
}

impl Blob {
    /// Take ownership of the heap bytes.
    ///
    /// # Errors
    /// Fails if the heap does not start with the empty blob.
    pub fn from(data: &[u8]) -> Result<Blob> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob {
            data: data.to_vec(),
        })
    }

    /// The blob stored at `index`.
    ///
    /// # Errors
    /// Fails if the index or the encoded length leaves the heap.
    pub fn get(&self, index: usize) -> Result<&[u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(OutOfBounds);
        };

        let Some(data_end) = data_start.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if data_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[data_start..data_end])
    }

    /// Index of a blob equal to `value`, appending one if none exists.
    ///
    /// # Errors
    /// Fails if `value` is too large to be length-prefixed.
    pub fn intern(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }

        let mut position = 0;
        while position < self.data.len() {
            let mut parser = Parser::new(&self.data[position..]);
            let Ok(len) = parser.read_compressed_uint() else {
                break;
            };

            let start = position + parser.pos();
            let end = start + len as usize;
            if end > self.data.len() {
                break;
            }

            if &self.data[start..end] == value {
                return Ok(position as u32);
            }
            position = end;
        }

        let index = self.data.len() as u32;
        let Ok(len) = u32::try_from(value.len()) else {
            return Err(malformed_error!("Blob of {} bytes is too large", value.len()));
        };
        push_compressed_uint(&mut self.data, len)?;
        self.data.extend_from_slice(value);
        Ok(index)
    }

    /// Heap size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the heap is empty (never true for a parsed heap).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
