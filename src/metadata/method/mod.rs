//! Method bodies and method attribute flags.
//!
//! # Key Types
//! - [`MethodBody`] - Header information of an IL method body, tiny or fat
//! - [`ExceptionHandler`] - One clause of the exception handling sections
//! - [`MethodAccessFlags`], [`MethodModifiers`] - The `MethodDef.Flags` column, split up
//! - [`MethodImplCodeType`] - The code type bits of `MethodDef.ImplFlags`
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 22.26 - MethodDef
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Common Intermediate Language physical layout

mod body;
mod exceptions;
mod types;

pub use body::MethodBody;
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::*;
