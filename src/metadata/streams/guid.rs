//! GUID Heap (`#GUID`)
//!
//! A packed array of 16 byte GUIDs, addressed by 1-based index. Index 0 means "no GUID".
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// An owned `#GUID` heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guid {
    data: Vec<u8>,
}

impl Guid {
    /// Take ownership of the heap bytes.
    ///
    /// # Errors
    /// Fails if the heap size is not a multiple of 16.
    pub fn from(data: &[u8]) -> Result<Guid> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid {
            data: data.to_vec(),
        })
    }

    /// The GUID at 1-based `index`.
    ///
    /// # Errors
    /// Fails for index 0 or an index past the end of the heap.
    pub fn get(&self, index: usize) -> Result<[u8; 16]> {
        if index < 1 || index * 16 > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(&self.data[(index - 1) * 16..index * 16]);
        Ok(buffer)
    }

    /// Number of GUIDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }

    /// The raw heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
