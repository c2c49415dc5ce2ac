// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'writer/output.rs' uses a writable mmap to fill staging files

//! # modinit
//!
//! Injects a module initializer into compiled .NET assemblies.
//!
//! A module initializer is a static constructor (`.cctor`) on the reserved `<Module>` type
//! of an assembly. The runtime runs it once, before any other code of the module is
//! executed. `modinit` takes an existing PE image, picks a `public static void` method
//! without parameters, and adds a `<Module>.cctor` whose body is a single call to it,
//! followed by `ret`. The image is then written back: method rows renumbered, tokens in
//! existing IL fixed up, the companion portable PDB rebuilt, and, given a key pair, the
//! strong name signature renewed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! let path = Path::new("Library.dll");
//! let mut image = modinit::read(path)?;
//! let target = modinit::resolve(&image, "ModuleInitializer", "Run")?;
//! modinit::inject(&mut image, &target)?;
//! modinit::write(&image, path, None)?;
//! # Ok::<(), modinit::Error>(())
//! ```
//!
//! The same in one call, this time re-signing the output:
//!
//! ```rust,no_run
//! use modinit::PatchOptions;
//!
//! let options = PatchOptions::new("ModuleInitializer", "Run", "Library.dll")
//!     .with_key_file("Library.snk");
//! modinit::patch(&options)?;
//! # Ok::<(), modinit::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`reader`] - Loads an image (and its PDB) into the [`Image`] model
//! - [`resolver`] - Finds the initializer target and checks that it qualifies
//! - [`synthesizer`] - Adds the `<Module>.cctor`
//! - [`writer`] - Serializes the model, atomically replacing image and PDB
//! - [`patcher`] - All of the above in one step
//!
//! Below these sit the format layers: [`file`] for the PE container, [`metadata`] for the
//! ECMA-335 metadata (tables, heaps, method bodies and signatures), [`disassembler`] for
//! CIL decoding, [`symbols`] for portable PDBs and [`strongname`] for key pairs and
//! signatures.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], with [`Error`] naming the failure:
//!
//! ```rust,no_run
//! use modinit::Error;
//! use std::path::Path;
//!
//! match modinit::read(Path::new("Library.dll")) {
//!     Ok(image) => println!("{} types", image.types().len()),
//!     Err(Error::NotFound(path)) => eprintln!("{} does not exist", path.display()),
//!     Err(Error::MalformedImage(message)) => eprintln!("not a .NET image: {message}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and functions.
///
/// # Example
///
/// ```rust,no_run
/// use modinit::prelude::*;
///
/// let mut image = read(std::path::Path::new("Library.dll"))?;
/// let target: MethodRef = resolve(&image, "ModuleInitializer", "Run")?;
/// inject(&mut image, &target)?;
/// # Ok::<(), Error>(())
/// ```
pub mod prelude;

pub mod disassembler;
pub mod file;
pub mod image;
pub mod metadata;
pub mod patcher;
pub mod reader;
pub mod resolver;
pub mod strongname;
pub mod symbols;
pub mod synthesizer;
pub mod writer;

/// `modinit` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `modinit` Error type
///
/// One variant per failure the patching pipeline can report.
pub use error::Error;

/// Low-level file and byte parsing utilities.
///
/// # Example
///
/// ```rust
/// use modinit::{Parser, disassembler::decode_instruction};
/// let code = [0x2A]; // ret
/// let mut parser = Parser::new(&code);
/// let instr = decode_instruction(&mut parser, 0x1000)?;
/// assert_eq!(instr.mnemonic, "ret");
/// # Ok::<(), modinit::Error>(())
/// ```
pub use file::{parser::Parser, File};

pub use image::{Image, MethodRecord, MethodRef, TypeRecord};
pub use patcher::{patch, PatchOptions};
pub use reader::{read, read_from_mem};
pub use resolver::resolve;
pub use synthesizer::inject;
pub use writer::{write, write_with, WriteOptions};
