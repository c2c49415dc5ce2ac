//! Images handed over as a byte buffer.

use super::Backend;

/// Owns the bytes of an image that was never mapped from disk.
#[derive(Debug)]
pub struct Memory(Vec<u8>);

impl Memory {
    pub fn new(data: Vec<u8>) -> Memory {
        Memory(data)
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.0
    }
}
