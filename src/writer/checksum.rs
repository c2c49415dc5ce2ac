//! The PE image checksum (`CheckSum` field of the optional header).

use crate::{
    file::io::{read_le, write_le},
    Error::OutOfBounds,
    Result,
};

/// Offset of `CheckSum` inside the optional header
pub const CHECKSUM_FIELD: usize = 64;

/// Compute the checksum of `data`, skipping the 4 byte field at `checksum_offset`.
///
/// The file is summed as little-endian 16-bit words with the carry folded back in after
/// every addition; a trailing odd byte counts as a word of its own. The file size is added
/// to the folded sum.
#[must_use]
pub fn pe_checksum(data: &[u8], checksum_offset: usize) -> u32 {
    let mut checksum: u64 = 0;

    let mut offset = 0;
    while offset < data.len() {
        if offset >= checksum_offset && offset < checksum_offset + 4 {
            offset += 2;
            continue;
        }

        let word = match data.get(offset..offset + 2) {
            Some(pair) => u64::from(u16::from_le_bytes([pair[0], pair[1]])),
            None => u64::from(data[offset]),
        };

        checksum += word;
        if checksum > 0xFFFF {
            checksum = (checksum & 0xFFFF) + (checksum >> 16);
        }

        offset += 2;
    }

    checksum += data.len() as u64;
    while checksum > 0xFFFF {
        checksum = (checksum & 0xFFFF) + (checksum >> 16);
    }

    checksum as u32
}

/// Recompute the checksum of a complete image and store it at `checksum_offset`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the field lies outside of `data`.
pub fn update_checksum(data: &mut [u8], checksum_offset: usize) -> Result<u32> {
    if checksum_offset + 4 > data.len() {
        return Err(OutOfBounds);
    }

    let checksum = pe_checksum(data, checksum_offset);
    write_le(&mut data[checksum_offset..], checksum)?;

    debug_assert_eq!(read_le::<u32>(&data[checksum_offset..]).ok(), Some(checksum));
    Ok(checksum)
}
