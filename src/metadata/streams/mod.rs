//! Metadata streams.
//!
//! The metadata root is followed by named streams. This crate decodes the ones it has to
//! read or extend:
//!
//! - `#~` - the compressed tables (see [`crate::metadata::tables`])
//! - `#Strings` - identifier strings, [`Strings`]
//! - `#Blob` - signatures and other binary data, [`Blob`]
//! - `#GUID` - module and document GUIDs, [`Guid`]
//! - `#Pdb` - portable PDB header, [`PdbStream`]
//!
//! `#US` and any unknown stream are carried through unchanged.
//!
//! # Reference
//! - [ECMA-335 II.24.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod blob;
mod guid;
mod pdb;
mod streamheader;
mod strings;

pub use blob::Blob;
pub use guid::Guid;
pub use pdb::PdbStream;
pub use streamheader::StreamHeader;
pub use strings::Strings;
