//! The `#Pdb` stream of a portable PDB.
//!
//! | Offset | Size | Field                      |
//! |--------|------|----------------------------|
//! | 0      | 20   | PDB id (GUID + stamp)      |
//! | 20     | 4    | EntryPoint (MethodDef token) |
//! | 24     | 8    | ReferencedTypeSystemTables |
//! | 32     | 4*n  | TypeSystemTableRows        |
//!
//! The row counts describe the image the PDB belongs to; the debug tables size their
//! `MethodDef`, `TypeDef`, ... columns from them.
//!
//! # Reference
//! - [Portable PDB v1.0, #Pdb stream](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md)

use crate::{
    file::io::{push_le, read_le_at},
    metadata::{tables::TABLE_SLOTS, token::Token},
    Error::OutOfBounds,
    Result,
};

/// A decoded `#Pdb` stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdbStream {
    /// PDB id: the GUID also found in the image's CodeView entry, followed by a stamp
    pub id: [u8; 20],
    /// Entry point of the image, or the null token
    pub entry_point: Token,
    /// Bit vector of the image tables whose row counts follow
    pub referenced_tables: u64,
    /// Row counts of the image tables, indexed by table number
    pub row_counts: [u32; TABLE_SLOTS],
}

impl PdbStream {
    /// Parse the stream.
    ///
    /// # Errors
    /// Fails if the data is shorter than the bit vector announces.
    pub fn read(data: &[u8]) -> Result<PdbStream> {
        if data.len() < 32 {
            return Err(OutOfBounds);
        }

        let mut id = [0u8; 20];
        id.copy_from_slice(&data[..20]);

        let mut offset = 20;
        let entry_point = Token::new(read_le_at::<u32>(data, &mut offset)?);
        let referenced_tables = read_le_at::<u64>(data, &mut offset)?;

        let mut row_counts = [0u32; TABLE_SLOTS];
        for (slot, count) in row_counts.iter_mut().enumerate() {
            if referenced_tables & (1 << slot) != 0 {
                *count = read_le_at::<u32>(data, &mut offset)?;
            }
        }

        Ok(PdbStream {
            id,
            entry_point,
            referenced_tables,
            row_counts,
        })
    }

    /// The GUID part of the PDB id.
    #[must_use]
    pub fn guid(&self) -> [u8; 16] {
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&self.id[..16]);
        guid
    }

    /// Encode the stream.
    #[must_use]
    pub fn write(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(32 + 4 * self.referenced_tables.count_ones() as usize);
        buffer.extend_from_slice(&self.id);
        push_le(&mut buffer, self.entry_point.value());
        push_le(&mut buffer, self.referenced_tables);
        for (slot, count) in self.row_counts.iter().enumerate() {
            if self.referenced_tables & (1 << slot) != 0 {
                push_le(&mut buffer, *count);
            }
        }
        buffer
    }
}
