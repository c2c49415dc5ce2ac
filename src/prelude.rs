//! # modinit Prelude
//!
//! The types and functions needed for the common read, resolve, inject, write cycle.
//!
//! ```rust,no_run
//! use modinit::prelude::*;
//! use std::path::Path;
//!
//! let path = Path::new("Library.dll");
//! let mut image = read(path)?;
//! let target = resolve(&image, "ModuleInitializer", "Run")?;
//! inject(&mut image, &target)?;
//! write_with(&image, path, &WriteOptions::new().with_key("Library.snk"))?;
//! # Ok::<(), Error>(())
//! ```

// ================================================================================================
// Core Error and Result Types
// ================================================================================================

pub use crate::{Error, Result};

// ================================================================================================
// Pipeline
// ================================================================================================

pub use crate::{inject, patch, read, read_from_mem, resolve, write, write_with};

pub use crate::{PatchOptions, WriteOptions};

// ================================================================================================
// Image Model
// ================================================================================================

pub use crate::image::{Image, MethodId, MethodRecord, MethodRef, Param, TypeId, TypeRecord};

pub use crate::symbols::Symbols;

// ================================================================================================
// Format Layers
// ================================================================================================

pub use crate::{File, Parser};

pub use crate::metadata::token::Token;

pub use crate::disassembler::{decode_instruction, decode_stream, Instruction, Operand};

pub use crate::strongname::StrongNameKey;
