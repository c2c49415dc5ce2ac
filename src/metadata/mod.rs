//! Metadata parsing and re-serialization for .NET images and portable PDBs.
//!
//! This module contains everything needed to take a metadata root apart, edit it and put it
//! back together. Unlike a read-only view, every stream the patcher may touch is decoded into
//! owned, mutable structures; streams it never interprets (`#US`, vendor streams) are carried
//! through byte for byte.
//!
//! # Key Components
//!
//! - [`cor20header`] - The CLI header locating the metadata
//! - [`root`] - The metadata root and its stream directory
//! - [`streams`] - The heaps and the `#Pdb` stream
//! - [`tables`] - The `#~` tables stream, decoded into generic rows
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`method`] - Method bodies and method flags
//! - [`signatures`] - Method signature decoding and type name rendering
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::metadata::{tables::TableId, Metadata};
//!
//! let mut metadata = Metadata::read(metadata_bytes)?;
//! let name = metadata.strings.intern(".cctor");
//! println!("{} methods", metadata.tables.rows(TableId::MethodDef));
//! let rebuilt = metadata.write()?;
//! ```

/// Implementation of the Header of CIL
pub mod cor20header;
/// Implementation of the MethodHeader of CIL and the method flags
pub mod method;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of method and type signatures
pub mod signatures;
/// Implementation of the metadata heaps and the `#Pdb` stream
pub mod streams;
/// Implementation of the .NET metadata tables
pub mod tables;
/// Commonly used metadata token type
pub mod token;

use log::debug;

use crate::{
    file::io::pad_to,
    metadata::{
        root::Root,
        streams::{Blob, Guid, PdbStream, StreamHeader, Strings},
        tables::{TablesHeader, HEAP_LARGE_BLOB, HEAP_LARGE_GUID, HEAP_LARGE_STRINGS},
    },
    Result,
};

/// Where a stream of the original directory goes on write.
#[derive(Clone, Debug)]
enum StreamSlot {
    Tables,
    Strings,
    Blob,
    Guid,
    Pdb,
    Raw { name: String, data: Vec<u8> },
}

/// A decoded metadata root with all of its streams.
#[derive(Clone, Debug)]
pub struct Metadata {
    /// Root header; its stream directory is regenerated on write
    pub root: Root,
    /// The `#Strings` heap
    pub strings: Strings,
    /// The `#Blob` heap
    pub blobs: Blob,
    /// The `#GUID` heap
    pub guids: Guid,
    /// The `#~` tables
    pub tables: TablesHeader,
    /// The `#Pdb` stream, present in portable PDBs only
    pub pdb: Option<PdbStream>,
    slots: Vec<StreamSlot>,
}

impl Metadata {
    /// Decode a metadata root and its streams.
    ///
    /// # Errors
    /// Fails on a malformed root or stream, on a missing `#~` stream and on uncompressed
    /// (`#-`) tables, which carry edit-and-continue pointer tables this crate cannot rewrite.
    pub fn read(data: &[u8]) -> Result<Metadata> {
        let root = Root::read(data)?;

        let stream_data = |header: &StreamHeader| -> &[u8] {
            // Bounds were validated by Root::read
            &data[header.offset as usize..(header.offset + header.size) as usize]
        };

        // The debug tables are sized by the row counts in #Pdb, so it goes first
        let pdb = match root.stream_headers.iter().find(|header| header.name == "#Pdb") {
            Some(header) => Some(PdbStream::read(stream_data(header))?),
            None => None,
        };

        let mut slots = Vec::with_capacity(root.stream_headers.len());
        let mut tables = None;
        let mut strings = None;
        let mut blobs = None;
        let mut guids = None;
        let mut seen_pdb = false;

        for header in &root.stream_headers {
            let bytes = stream_data(header);
            match header.name.as_str() {
                "#-" => {
                    return Err(malformed_error!(
                        "Uncompressed metadata tables (#-) are not supported"
                    ))
                }
                "#~" if tables.is_none() => {
                    tables = Some(TablesHeader::read(
                        bytes,
                        pdb.as_ref().map(|pdb| &pdb.row_counts),
                    )?);
                    slots.push(StreamSlot::Tables);
                }
                "#Strings" if strings.is_none() => {
                    strings = Some(Strings::from(bytes)?);
                    slots.push(StreamSlot::Strings);
                }
                "#Blob" if blobs.is_none() => {
                    blobs = Some(Blob::from(bytes)?);
                    slots.push(StreamSlot::Blob);
                }
                "#GUID" if guids.is_none() => {
                    guids = Some(Guid::from(bytes)?);
                    slots.push(StreamSlot::Guid);
                }
                "#Pdb" if !seen_pdb => {
                    seen_pdb = true;
                    slots.push(StreamSlot::Pdb);
                }
                _ => slots.push(StreamSlot::Raw {
                    name: header.name.clone(),
                    data: bytes.to_vec(),
                }),
            }
        }

        let Some(tables) = tables else {
            return Err(malformed_error!("Metadata has no #~ stream"));
        };

        // The writer may need to add entries to a heap the compiler left out
        let strings = match strings {
            Some(strings) => strings,
            None => {
                slots.push(StreamSlot::Strings);
                Strings::from(&[0])?
            }
        };
        let blobs = match blobs {
            Some(blobs) => blobs,
            None => {
                slots.push(StreamSlot::Blob);
                Blob::from(&[0])?
            }
        };
        let guids = match guids {
            Some(guids) => guids,
            None => Guid::from(&[])?,
        };

        Ok(Metadata {
            root,
            strings,
            blobs,
            guids,
            tables,
            pdb,
            slots,
        })
    }

    /// Whether this is the metadata of a portable PDB.
    #[must_use]
    pub fn is_pdb(&self) -> bool {
        self.pdb.is_some()
    }

    /// Encode the metadata root and every stream.
    ///
    /// Heap index widths are widened when a heap outgrew 2-byte indexes; a width that was
    /// already large stays large. Streams are written in their original order, each padded
    /// to a multiple of 4 bytes.
    ///
    /// # Errors
    /// Fails if a table value does not fit its column.
    pub fn write(&mut self) -> Result<Vec<u8>> {
        if self.strings.len() > 0xFFFF {
            self.tables.heap_sizes |= HEAP_LARGE_STRINGS;
        }
        if self.guids.count() > 0xFFFF {
            self.tables.heap_sizes |= HEAP_LARGE_GUID;
        }
        if self.blobs.len() > 0xFFFF {
            self.tables.heap_sizes |= HEAP_LARGE_BLOB;
        }

        let tables = self
            .tables
            .write(self.pdb.as_ref().map(|pdb| &pdb.row_counts))?;

        let mut streams: Vec<(String, Vec<u8>)> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let (name, mut data) = match slot {
                StreamSlot::Tables => ("#~".to_string(), tables.clone()),
                StreamSlot::Strings => ("#Strings".to_string(), self.strings.data().to_vec()),
                StreamSlot::Blob => ("#Blob".to_string(), self.blobs.data().to_vec()),
                StreamSlot::Guid => ("#GUID".to_string(), self.guids.data().to_vec()),
                StreamSlot::Pdb => match &self.pdb {
                    Some(pdb) => ("#Pdb".to_string(), pdb.write()),
                    None => continue,
                },
                StreamSlot::Raw { name, data } => (name.clone(), data.clone()),
            };
            pad_to(&mut data, 4);
            streams.push((name, data));
        }

        self.root.stream_headers = streams
            .iter()
            .map(|(name, data)| StreamHeader {
                offset: 0,
                size: data.len() as u32,
                name: name.clone(),
            })
            .collect();

        let mut offset = self.root.header_size() as u32;
        for header in &mut self.root.stream_headers {
            header.offset = offset;
            offset += header.size;
        }

        let mut buffer = self.root.write();
        for (_, data) in &streams {
            buffer.extend_from_slice(data);
        }

        debug!(
            "Metadata rebuilt: {} streams, {} bytes",
            streams.len(),
            buffer.len()
        );
        Ok(buffer)
    }
}
