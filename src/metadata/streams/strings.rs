//! String Heap (`#Strings`)
//!
//! Identifier strings in UTF-8, each terminated by a NUL byte. An index may point into the
//! middle of a stored string, which compilers use to share suffixes; interning takes advantage
//! of the same rule.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// An owned `#Strings` heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Strings {
    data: Vec<u8>,
}

impl Strings {
    /// Take ownership of the heap bytes.
    ///
    /// # Errors
    /// Fails if the heap does not start with the empty string.
    pub fn from(data: &[u8]) -> Result<Strings> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings {
            data: data.to_vec(),
        })
    }

    /// The string starting at `index`.
    ///
    /// # Errors
    /// Fails if the index is out of range or the string is not valid UTF-8.
    pub fn get(&self, index: usize) -> Result<&str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }

    /// Index of `value`, appending it if the heap holds no identical string or suffix.
    pub fn intern(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }

        let mut needle = value.as_bytes().to_vec();
        needle.push(0);

        if let Some(index) = self
            .data
            .windows(needle.len())
            .position(|window| window == needle.as_slice())
        {
            return index as u32;
        }

        // Trailing zero padding may sit at the end; appending after it is harmless
        let index = self.data.len() as u32;
        self.data.extend_from_slice(&needle);
        index
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

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Strings {
        Strings::from(b"\0<Module>\0Fixture\0Init\0Go\0foo.cctor\0").unwrap()
    }

    #[test]
    fn get() {
        let strings = heap();
        assert_eq!(strings.get(0).unwrap(), "");
        assert_eq!(strings.get(1).unwrap(), "<Module>");
        assert_eq!(strings.get(18).unwrap(), "Init");
        assert_eq!(strings.get(26).unwrap(), "foo.cctor");
        assert_eq!(strings.get(28).unwrap(), "o.cctor");
        assert!(strings.get(100).is_err());
    }

    #[test]
    fn invalid() {
        assert!(Strings::from(b"").is_err());
        assert!(Strings::from(b"abc\0").is_err());

        let strings = Strings::from(b"\0abc").unwrap();
        assert!(strings.get(1).is_err());
    }

    #[test]
    fn intern_reuses_suffixes() {
        let mut strings = heap();
        let len = strings.len();

        assert_eq!(strings.intern("Init"), 18);
        assert_eq!(strings.intern(".cctor"), 29);
        assert_eq!(strings.intern(""), 0);
        assert_eq!(strings.len(), len);

        let index = strings.intern("Run");
        assert_eq!(index as usize, len);
        assert_eq!(strings.get(index as usize).unwrap(), "Run");
        assert_eq!(strings.intern("Run"), index);
    }
}
