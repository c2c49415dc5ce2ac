//! Representation, parsing and encoding of CIL method bodies.
//!
//! This module decodes method headers and exception handling regions from the bytes an RVA of
//! the `MethodDef` table points to, and encodes headers for newly synthesized bodies. Supports
//! both tiny and fat method headers as specified by ECMA-335.
//!
//! # Examples
//!
//! ```rust
//! use modinit::metadata::method::MethodBody;
//!
//! // call 0x06000002; ret
//! let code = [0x28, 0x02, 0x00, 0x00, 0x06, 0x2A];
//! let encoded = MethodBody::encode(&code, 8)?;
//! assert_eq!(encoded[0], (6 << 2) | 0x2);
//!
//! let body = MethodBody::from(&encoded)?;
//! assert!(!body.is_fat);
//! assert_eq!(body.code(&encoded)?, &code);
//! # Ok::<(), modinit::Error>(())
//! ```
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Method Header Format

use crate::{
    file::io::{push_le, read_le, read_le_at},
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags},
    Error::OutOfBounds,
    Result,
};

/// Largest code size a tiny header can describe
const TINY_MAX_CODE: usize = 0x3F;
/// Largest evaluation stack a tiny header implies
const TINY_MAX_STACK: u16 = 8;

/// Describes one method that has been compiled to CIL bytecode.
///
/// The `MethodBody` struct represents the parsed header of a .NET method body, including code
/// size, stack requirements, local variable signature, and exception handling regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Size of the method (length of all instructions, not counting the header) in bytes
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// Size of the data sections following the code, including alignment padding
    pub size_sections: usize,
    /// `MetaData` token for a signature describing the layout of the local variables for the method. 0 == no local variables
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// Flag, indicating the type of the method header
    pub is_fat: bool,
    /// Flag, indicating to call default constructor on all local variables
    pub is_init_local: bool,
    /// Flag, indicating if this method does have exception handlers
    pub is_exception_data: bool,
    /// A list of exception handlers this method has
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Create a `MethodBody` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is empty, out of bounds, or malformed.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_00000011_u8)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    size_sections: 0,
                    local_var_sig_token: 0,
                    max_stack: TINY_MAX_STACK as usize,
                    is_fat: false,
                    is_init_local: false,
                    is_exception_data: false,
                    exception_handlers: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;

                let size_header = (first_duo >> 12) * 4;
                if size_header < 12 {
                    return Err(malformed_error!(
                        "Fat method header is too small - {}",
                        size_header
                    ));
                }

                let size_code = read_le::<u32>(&data[4..])?;
                if data.len() < (size_code as usize + size_header as usize) {
                    return Err(OutOfBounds);
                }

                let local_var_sig_token = read_le::<u32>(&data[8..])?;
                let flags_header =
                    MethodBodyFlags::from_bits_truncate(first_duo & 0b_0000111111111111_u16);
                let max_stack = read_le::<u16>(&data[2..])? as usize;

                let is_init_local = flags_header.contains(MethodBodyFlags::INIT_LOCALS);

                // Exception Handling -> II.25.4.6
                let code_end = size_header as usize + size_code as usize;
                let mut exception_handlers = Vec::new();
                let mut sections_end = code_end;
                if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
                    let mut cursor = (code_end + 3) & !3;

                    while data.len() >= (cursor + 4) {
                        let section_flags =
                            SectionFlags::from_bits_truncate(read_le::<u8>(&data[cursor..])?);
                        if !section_flags.contains(SectionFlags::EHTABLE) {
                            return Err(malformed_error!(
                                "Unsupported method data section - {:#x}",
                                section_flags.bits()
                            ));
                        }

                        let section_start = cursor;
                        let section_size = if section_flags.contains(SectionFlags::FAT_FORMAT) {
                            (read_le::<u32>(&data[cursor..])? >> 8) as usize
                        } else {
                            read_le::<u8>(&data[cursor + 1..])? as usize
                        };
                        if section_size < 4 || data.len() < section_start + section_size {
                            return Err(OutOfBounds);
                        }

                        cursor += 4;
                        if section_flags.contains(SectionFlags::FAT_FORMAT) {
                            for _ in 0..(section_size - 4) / 24 {
                                exception_handlers.push(ExceptionHandler {
                                    // Intentionally truncating u32 to u16 for exception handler flags
                                    #[allow(clippy::cast_possible_truncation)]
                                    flags: ExceptionHandlerFlags::from_bits_truncate(
                                        read_le_at::<u32>(data, &mut cursor)? as u16,
                                    ),
                                    try_offset: read_le_at::<u32>(data, &mut cursor)?,
                                    try_length: read_le_at::<u32>(data, &mut cursor)?,
                                    handler_offset: read_le_at::<u32>(data, &mut cursor)?,
                                    handler_length: read_le_at::<u32>(data, &mut cursor)?,
                                    filter_offset: read_le_at::<u32>(data, &mut cursor)?,
                                });
                            }
                        } else {
                            for _ in 0..(section_size - 4) / 12 {
                                exception_handlers.push(ExceptionHandler {
                                    flags: ExceptionHandlerFlags::from_bits_truncate(
                                        read_le_at::<u16>(data, &mut cursor)?,
                                    ),
                                    try_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                                    try_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                                    handler_offset: u32::from(read_le_at::<u16>(
                                        data,
                                        &mut cursor,
                                    )?),
                                    handler_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                                    filter_offset: read_le_at::<u32>(data, &mut cursor)?,
                                });
                            }
                        }

                        cursor = section_start + section_size;
                        sections_end = cursor;
                        if !section_flags.contains(SectionFlags::MORE_SECTS) {
                            break;
                        }
                        cursor = (cursor + 3) & !3;
                    }
                }

                if let Some(clause) = exception_handlers
                    .iter()
                    .find(|clause| !clause.fits(size_code as usize))
                {
                    return Err(malformed_error!(
                        "Exception clause {:?} lies outside of {} bytes of code",
                        clause,
                        size_code
                    ));
                }

                Ok(MethodBody {
                    size_code: size_code as usize,
                    size_header: size_header as usize,
                    size_sections: sections_end - code_end,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local,
                    is_exception_data: !exception_handlers.is_empty(),
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Get the size of header and code
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }

    /// Get the full size of this body, including its data sections
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.size() + self.size_sections
    }

    /// The IL code of this body within `data`, the bytes it was parsed from.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the body.
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        data.get(self.size_header..self.size()).ok_or(OutOfBounds)
    }

    /// Encode a body without locals or exception handlers around `code`.
    ///
    /// A tiny header is used whenever the code and the stack depth allow it.
    ///
    /// # Errors
    /// Fails if `code` is larger than a fat header can describe.
    pub fn encode(code: &[u8], max_stack: u16) -> Result<Vec<u8>> {
        if code.len() <= TINY_MAX_CODE && max_stack <= TINY_MAX_STACK {
            let mut buffer = Vec::with_capacity(code.len() + 1);
            // Bounded by TINY_MAX_CODE
            #[allow(clippy::cast_possible_truncation)]
            buffer.push(((code.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            buffer.extend_from_slice(code);
            return Ok(buffer);
        }

        let Ok(size_code) = u32::try_from(code.len()) else {
            return Err(malformed_error!("Method body of {} bytes is too large", code.len()));
        };

        let mut buffer = Vec::with_capacity(code.len() + 12);
        push_le(&mut buffer, (3u16 << 12) | MethodBodyFlags::FAT_FORMAT.bits());
        push_le(&mut buffer, max_stack);
        push_le(&mut buffer, size_code);
        push_le(&mut buffer, 0u32);
        buffer.extend_from_slice(code);
        Ok(buffer)
    }
}
