//! Method signature parsing for .NET metadata.
//!
//! Method signatures (`MethodDefSig`, ECMA-335 II.23.2.1) encode the calling convention,
//! the return type and the parameter types of a method in a compressed binary format.
//! The resolver reads them to check a candidate initializer target: it must be static,
//! take no parameters and return `System.Void`.
//!
//! # Examples
//!
//! ```rust
//! use modinit::metadata::signatures::{parse_method_signature, TypeSignature};
//!
//! // static void ()
//! let method_sig = parse_method_signature(&[0x00, 0x00, 0x01])?;
//! assert!(!method_sig.has_this);
//! assert_eq!(method_sig.return_type.base, TypeSignature::Void);
//! # Ok::<(), modinit::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.2 - Blobs and Signatures

mod parser;
mod types;

pub use parser::*;
pub use types::*;

use crate::Result;

/// Parse a `MethodSignature` from a byte slice
///
/// ## Arguments
/// * 'data' - The input slice to parse
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_method_signature(data: &[u8]) -> Result<SignatureMethod> {
    let mut parser = SignatureParser::new(data);
    parser.parse_method_signature()
}
