//! Rewriting the companion portable PDB.
//!
//! `MethodDebugInformation` is parallel to `MethodDef` (row N describes method N), so it is
//! reordered with the method table; added methods get an empty row. The other debug tables
//! reference methods by row id and are renumbered like the image's own tables. The `#Pdb`
//! stream records the image's row counts, which are refreshed last. Async stepping
//! information keeps resume methods inside its blobs, so those blobs are re-encoded.
//!
//! The PDB id stays the same, so the image's CodeView entry keeps matching. A `PdbChecksum`
//! debug entry in the image is recomputed over the new PDB.

use log::{debug, warn};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::{
    file::{
        io::{push_compressed_uint, push_le},
        parser::Parser,
        File,
    },
    metadata::{
        tables::{columns, TableId, TablesHeader},
        Metadata,
    },
    symbols::debug::{debug_entries, DEBUG_TYPE_PDB_CHECKSUM},
    writer::{
        layout::LayoutPlan,
        plan::{MethodPlan, PlannedMethod, RidMap},
        remap::remap_columns,
    },
    Error::OutOfBounds,
    Result,
};

/// Size of the PDB id at the start of the `#Pdb` stream
const PDB_ID_SIZE: usize = 20;

/// `AsyncMethodSteppingInformation` kind {54FD2AC5-E925-401A-9C2A-F94F171072F8}, as stored
/// in the `#GUID` heap
const ASYNC_METHOD_STEPPING: [u8; 16] = [
    0xC5, 0x2A, 0xFD, 0x54, 0x25, 0xE9, 0x1A, 0x40, 0x9C, 0x2A, 0xF9, 0x4F, 0x17, 0x10, 0x72, 0xF8,
];

/// Follow the new `MethodDef` layout in the PDB tables.
///
/// # Errors
/// Fails if a row the plan refers to is missing.
pub(crate) fn renumber(metadata: &mut Metadata, plan: &MethodPlan) -> Result<()> {
    let table = metadata.tables.table_mut(TableId::MethodDebugInformation);
    if !table.is_empty() {
        let old = table.clone();
        let width = TableId::MethodDebugInformation.columns().len();

        let mut rows = Vec::with_capacity(plan.rows.len());
        for planned in &plan.rows {
            match planned {
                PlannedMethod::Existing(rid) => match old.row(*rid) {
                    Some(row) => rows.push(row.to_vec()),
                    None => {
                        return Err(malformed_error!(
                            "MethodDebugInformation row {} is missing",
                            rid
                        ))
                    }
                },
                // No document, no sequence points
                PlannedMethod::Added(_) => rows.push(vec![0; width]),
            }
        }
        *table.rows_mut() = rows;
    }

    let patched = remap_columns(&mut metadata.tables, &plan.rids)?;
    debug!("Renumbered {} method references in the PDB", patched);

    let stepping = remap_async_stepping(metadata, &plan.rids)?;
    if stepping > 0 {
        debug!("Re-encoded {} async stepping blobs", stepping);
    }

    if let Some(pdb) = metadata.pdb.as_mut() {
        pdb.entry_point = plan.rids.token(pdb.entry_point);
    }

    Ok(())
}

/// Renumber the resume methods of every `AsyncMethodSteppingInformation` entry.
///
/// Returns the number of blobs that changed.
fn remap_async_stepping(metadata: &mut Metadata, rids: &RidMap) -> Result<usize> {
    let mut rewritten = 0;

    for rid in 1..=metadata.tables.rows(TableId::CustomDebugInformation) {
        let table = metadata.tables.table(TableId::CustomDebugInformation);
        let kind = table.cell(rid, columns::CUSTOM_DEBUG_KIND)?;
        let value = table.cell(rid, columns::CUSTOM_DEBUG_VALUE)?;
        if kind == 0 || metadata.guids.get(kind as usize)? != ASYNC_METHOD_STEPPING {
            continue;
        }

        let blob = metadata.blobs.get(value as usize)?;
        if blob.is_empty() {
            continue;
        }
        let remapped = remap_stepping_blob(blob, rids)?;
        if remapped == blob {
            continue;
        }

        let index = metadata.blobs.intern(&remapped)?;
        if let Some(row) = metadata
            .tables
            .table_mut(TableId::CustomDebugInformation)
            .row_mut(rid)
        {
            row[columns::CUSTOM_DEBUG_VALUE] = index;
        }
        rewritten += 1;
    }

    Ok(rewritten)
}

/// Re-encode one stepping blob: a catch handler offset, then (yield offset, resume offset,
/// resume method) triples with the method as a compressed `MethodDef` row id.
fn remap_stepping_blob(blob: &[u8], rids: &RidMap) -> Result<Vec<u8>> {
    let mut parser = Parser::new(blob);
    let mut remapped = Vec::with_capacity(blob.len() + 4);

    push_le(&mut remapped, parser.read_le::<u32>()?);
    while parser.has_more_data() {
        push_le(&mut remapped, parser.read_le::<u32>()?);
        push_le(&mut remapped, parser.read_le::<u32>()?);
        let method = parser.read_compressed_uint()?;
        push_compressed_uint(&mut remapped, rids.get(method))?;
    }

    Ok(remapped)
}

/// Encode the PDB metadata against the final image tables.
///
/// Returns the encoded PDB and the file offset of its id.
///
/// # Errors
/// Fails if the metadata cannot be encoded.
pub(crate) fn rebuild(metadata: &mut Metadata, image: &TablesHeader) -> Result<(Vec<u8>, usize)> {
    let image_counts = image.row_counts();
    if let Some(pdb) = metadata.pdb.as_mut() {
        for (slot, count) in pdb.row_counts.iter_mut().enumerate() {
            if pdb.referenced_tables & (1 << slot) != 0 {
                *count = image_counts[slot];
            }
        }
    }

    let data = metadata.write()?;
    let Some(header) = metadata
        .root
        .stream_headers
        .iter()
        .find(|header| header.name == "#Pdb")
    else {
        return Err(malformed_error!("Rewritten symbols have no #Pdb stream"));
    };

    Ok((data, header.offset as usize))
}

/// Hash of a portable PDB as stored in a `PdbChecksum` entry: the whole file with the PDB
/// id zeroed, using the named algorithm. `None` for algorithms other than SHA-2.
pub(crate) fn pdb_checksum(algorithm: &str, pdb: &[u8], id_offset: usize) -> Result<Option<Vec<u8>>> {
    let mut data = pdb.to_vec();
    data.get_mut(id_offset..id_offset + PDB_ID_SIZE)
        .ok_or(OutOfBounds)?
        .fill(0);

    let hash = match algorithm {
        "SHA256" => Sha256::digest(&data).to_vec(),
        "SHA384" => Sha384::digest(&data).to_vec(),
        "SHA512" => Sha512::digest(&data).to_vec(),
        _ => return Ok(None),
    };

    Ok(Some(hash))
}

/// Refresh every `PdbChecksum` debug entry of the output image.
///
/// `file` is the input image, `output` the assembled output laid out by `layout`.
/// Returns the number of entries updated.
///
/// # Errors
/// Fails if a debug entry points outside of the image.
pub(crate) fn update_pdb_checksums(
    file: &File,
    layout: &LayoutPlan,
    output: &mut [u8],
    pdb: &[u8],
    id_offset: usize,
) -> Result<usize> {
    let mut updated = 0;

    for entry in debug_entries(file)?
        .into_iter()
        .filter(|entry| entry.kind == DEBUG_TYPE_PDB_CHECKSUM)
    {
        let payload = entry.payload(file)?;
        let Some(name_len) = payload.iter().position(|byte| *byte == 0) else {
            warn!("Skipping a PdbChecksum entry without algorithm name");
            continue;
        };
        let algorithm = String::from_utf8_lossy(&payload[..name_len]);

        let Some(hash) = pdb_checksum(&algorithm, pdb, id_offset)? else {
            warn!("Skipping a PdbChecksum entry using unsupported algorithm {}", algorithm);
            continue;
        };

        let stored = payload.len() - name_len - 1;
        if stored != hash.len() {
            warn!(
                "Skipping a {} PdbChecksum entry holding {} bytes instead of {}",
                algorithm,
                stored,
                hash.len()
            );
            continue;
        }

        let at = layout.shift(entry.pointer_to_raw_data as usize) + name_len + 1;
        output
            .get_mut(at..at + hash.len())
            .ok_or(OutOfBounds)?
            .copy_from_slice(&hash);
        updated += 1;
    }

    if updated > 0 {
        debug!("Updated {} PdbChecksum entries", updated);
    }
    Ok(updated)
}
