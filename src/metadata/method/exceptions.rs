//! Clauses of the exception handling sections that follow fat method bodies (II.25.4.6).
//!
//! Existing bodies are never moved or re-encoded, so clauses are only decoded to find the end
//! of a body and to reject sections that point outside of the code.

use bitflags::bitflags;

bitflags! {
    /// Kind of a clause, from its `Flags` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// `catch`; the last field is a type token
        const EXCEPTION = 0x0000;
        /// `filter`; the last field is the offset of the filter block
        const FILTER = 0x0001;
        /// `finally`
        const FINALLY = 0x0002;
        /// `fault`
        const FAULT = 0x0004;
    }
}

/// One protected block and its handler, in small or fat encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Clause kind
    pub flags: ExceptionHandlerFlags,
    /// Start of the protected block, relative to the first instruction
    pub try_offset: u32,
    /// Length of the protected block
    pub try_length: u32,
    /// Start of the handler block
    pub handler_offset: u32,
    /// Length of the handler block
    pub handler_length: u32,
    /// Catch type token or filter offset, depending on `flags`
    pub filter_offset: u32,
}

impl ExceptionHandler {
    /// Whether both blocks lie inside `code_size` bytes of IL.
    #[must_use]
    pub fn fits(&self, code_size: usize) -> bool {
        let end = |offset: u32, length: u32| u64::from(offset) + u64::from(length);
        let code_size = code_size as u64;

        end(self.try_offset, self.try_length) <= code_size
            && end(self.handler_offset, self.handler_length) <= code_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(try_offset: u32, handler_offset: u32, handler_length: u32) -> ExceptionHandler {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset,
            try_length: 4,
            handler_offset,
            handler_length,
            filter_offset: 0,
        }
    }

    #[test]
    fn fits() {
        assert!(clause(0, 4, 2).fits(6));
        assert!(!clause(0, 4, 3).fits(6));
        assert!(!clause(4, 0, 1).fits(6));
        assert!(!clause(0, u32::MAX, u32::MAX).fits(0x1000));
    }
}
