//! Images mapped from disk.
//!
//! The mapping pins the inode that was opened. The writer replaces files by renaming a new
//! inode over the path, so an [`crate::Image`] keeps reading its original bytes even after
//! it has been written back to the same path.

use std::{fs, path::Path};

use memmap2::Mmap;

use super::Backend;
use crate::{Error::FileError, Result};

/// A read-only mapping of an image file.
#[derive(Debug)]
pub struct Physical {
    mmap: Mmap,
}

impl Physical {
    /// Map `path`.
    ///
    /// # Errors
    /// [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;

        // Files are only ever replaced by rename, never truncated in place
        let mmap = unsafe { Mmap::map(&file) }.map_err(FileError)?;

        Ok(Physical { mmap })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.mmap
    }
}
