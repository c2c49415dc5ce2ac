//! Renumbering of row references after the method table changed.
//!
//! Three kinds of references follow a renumbered table:
//!
//! - table columns, simple indexes as well as coded indexes, in the image and in its PDB
//! - `MethodDef` tokens embedded in IL (`call`, `ldftn`, `newobj`, ...) and in the VTable
//!   fixup slots
//! - the order of sorted tables whose key columns changed, which may permute those tables
//!   in turn and so renumber their own rows

use std::collections::HashSet;

use log::debug;
use strum::IntoEnumIterator;

use crate::{
    file::io::{read_le, write_le},
    image::{Image, MethodRecord},
    metadata::{
        cor20header::Cor20Header,
        tables::{Column, TableId, TablesHeader},
        token::Token,
    },
    writer::plan::RidMap,
    Error::OutOfBounds,
    Result,
};

/// `COR_VTABLE_32BIT`
const VTABLE_32BIT: u16 = 0x01;
/// `COR_VTABLE_64BIT`
const VTABLE_64BIT: u16 = 0x02;

/// Renumber every column of `tables` that can reference rows of `map.table()`.
///
/// Returns the number of values that changed.
///
/// # Errors
/// Fails on a coded index with an invalid tag.
pub(crate) fn remap_columns(tables: &mut TablesHeader, map: &RidMap) -> Result<usize> {
    let target = map.table();
    let mut changed = 0;

    for table in tables.tables_mut() {
        let referencing: Vec<(usize, Column)> = table
            .id()
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| column.references(target))
            .map(|(index, column)| (index, *column))
            .collect();
        if referencing.is_empty() || table.is_empty() {
            continue;
        }

        for row in table.rows_mut() {
            for (index, column) in &referencing {
                let value = row[*index];
                let new_value = match column {
                    Column::Index(_) => map.get(value),
                    Column::Coded(coded) => {
                        if value >> coded.tag_bits() == 0 {
                            continue;
                        }

                        let (table, rid) = coded.decode(value)?;
                        if table != target {
                            continue;
                        }
                        coded.encode(table, map.get(rid))?
                    }
                    _ => continue,
                };

                if new_value != value {
                    row[*index] = new_value;
                    changed += 1;
                }
            }
        }
    }

    Ok(changed)
}

/// Image tables in the order they are re-sorted.
///
/// `GenericParam` goes first because `GenericParamConstraint` and `CustomAttribute` key on
/// its rows; `CustomAttribute` goes last because almost every other table can own one.
fn sort_order() -> Vec<TableId> {
    let mut order: Vec<TableId> = TableId::iter()
        .filter(|table| table.sort_key().is_some() && !table.is_debug())
        .collect();
    order.sort_by_key(|table| match table {
        TableId::GenericParam => 0,
        TableId::CustomAttribute => 2,
        _ => 1,
    });
    order
}

/// Stable sort of one table by its key columns.
///
/// Returns the renumbering if the order changed.
fn sort_table(tables: &mut TablesHeader, id: TableId) -> Option<RidMap> {
    let key = id.sort_key()?;
    let table = tables.table_mut(id);

    let mut order: Vec<usize> = (0..table.len()).collect();
    {
        let rows = table.rows_mut();
        order.sort_by(|a, b| {
            let left = key.iter().map(|column| rows[*a][*column]);
            let right = key.iter().map(|column| rows[*b][*column]);
            left.cmp(right)
        });
    }

    if order.iter().enumerate().all(|(new, old)| new == *old) {
        return None;
    }

    let rows = table.rows_mut();
    let mut old_rows: Vec<Option<Vec<u32>>> = rows.drain(..).map(Some).collect();
    let mut new_rids = vec![0u32; order.len()];
    for (new, old) in order.iter().enumerate() {
        new_rids[*old] = new as u32 + 1;
        if let Some(row) = old_rows[*old].take() {
            rows.push(row);
        }
    }

    Some(RidMap::new(id, new_rids))
}

/// Re-sort every table flagged as sorted, in the image and in its PDB.
///
/// A permutation of one table is applied to every column pointing into it before the next
/// table is sorted. The `Sorted` bits themselves are left as they were.
///
/// # Errors
/// Fails on a coded index with an invalid tag.
pub(crate) fn sort_tables(
    image: &mut TablesHeader,
    mut symbols: Option<&mut TablesHeader>,
) -> Result<()> {
    for id in sort_order() {
        if !image.is_sorted(id) {
            continue;
        }

        if let Some(map) = sort_table(image, id) {
            debug!("Re-sorted {:?}", id);
            remap_columns(image, &map)?;
            if let Some(symbols) = symbols.as_deref_mut() {
                remap_columns(symbols, &map)?;
            }
        }
    }

    if let Some(symbols) = symbols {
        for id in TableId::iter().filter(|table| table.is_debug() && table.sort_key().is_some()) {
            if !symbols.is_sorted(id) {
                continue;
            }

            if let Some(map) = sort_table(symbols, id) {
                debug!("Re-sorted PDB table {:?}", id);
                remap_columns(symbols, &map)?;
            }
        }
    }

    Ok(())
}

/// Rewrite the `MethodDef` tokens of an added method's encoded body.
///
/// # Errors
/// Fails if the decoded instructions do not match the encoded bytes.
pub(crate) fn remap_added_body(method: &MethodRecord, encoded: &[u8], map: &RidMap) -> Result<Vec<u8>> {
    let mut body = encoded.to_vec();
    let header = method.body.as_ref().map_or(0, |body| body.size_header);

    for instruction in &method.instructions {
        let (Some(token), Some(offset)) = (instruction.token(), instruction.token_offset()) else {
            continue;
        };
        if !token.is_method_def() {
            continue;
        }

        let at = header + offset;
        let slot = body.get_mut(at..at + 4).ok_or(OutOfBounds)?;
        write_le(slot, map.token(token).value())?;
    }

    Ok(body)
}

/// Rewrite the `MethodDef` tokens in the IL of every method that was read from the image.
///
/// `offset_of` maps an RVA of the original image onto an offset of `data`. Bodies shared by
/// several methods are patched once.
///
/// # Errors
/// Fails if a token lies outside of `data`.
pub(crate) fn rewrite_code<F>(image: &Image, map: &RidMap, data: &mut [u8], offset_of: F) -> Result<usize>
where
    F: Fn(u32) -> Result<usize>,
{
    let mut patched = HashSet::new();

    for method in image.methods().iter().filter(|method| !method.is_synthesized()) {
        for instruction in &method.instructions {
            let Some(token) = instruction.token() else {
                continue;
            };
            if !token.is_method_def() {
                continue;
            }

            let Ok(rva) = u32::try_from(instruction.rva + instruction.size - 4) else {
                return Err(malformed_error!(
                    "Token operand of {} lies beyond the 32-bit address space",
                    method.name
                ));
            };
            let offset = offset_of(rva)?;
            if !patched.insert(offset) {
                continue;
            }

            let slot = data.get_mut(offset..offset + 4).ok_or(OutOfBounds)?;
            write_le(slot, map.token(token).value())?;
        }
    }

    debug!("Rewrote {} method tokens in IL", patched.len());
    Ok(patched.len())
}

/// Rewrite the `MethodDef` tokens of the VTable fixup slots.
///
/// # Errors
/// Fails if the fixup table or one of its slot runs cannot be mapped.
pub(crate) fn rewrite_vtable_fixups<F>(
    cor20: &Cor20Header,
    map: &RidMap,
    data: &mut [u8],
    offset_of: F,
) -> Result<()>
where
    F: Fn(u32) -> Result<usize>,
{
    if cor20.vtable_fixups_rva == 0 || cor20.vtable_fixups_size == 0 {
        return Ok(());
    }

    let table = offset_of(cor20.vtable_fixups_rva)?;
    for index in 0..(cor20.vtable_fixups_size as usize / 8) {
        let entry = data.get(table + index * 8..table + index * 8 + 8).ok_or(OutOfBounds)?;
        let rva = read_le::<u32>(entry)?;
        let count = read_le::<u16>(&entry[4..])?;
        let kind = read_le::<u16>(&entry[6..])?;

        let slot_size = if kind & VTABLE_64BIT != 0 {
            8
        } else if kind & VTABLE_32BIT != 0 {
            4
        } else {
            continue;
        };

        let slots = offset_of(rva)?;
        for slot in 0..count as usize {
            let at = slots + slot * slot_size;
            let value = data.get_mut(at..at + 4).ok_or(OutOfBounds)?;
            let token = Token::new(read_le::<u32>(value)?);
            write_le(value, map.token(token).value())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::io::push_le,
        metadata::tables::{columns, CodedIndexType},
        read_from_mem,
        test::fixture::{FixtureMethod, FixtureType, ImageFixture},
    };

    fn shift_by_one(rows: u32) -> RidMap {
        RidMap::new(TableId::MethodDef, (2..=rows + 1).collect())
    }

    #[test]
    fn columns_follow_methods() {
        let image = read_from_mem(
            ImageFixture::new()
                .with_custom_attributes()
                .with_type(
                    FixtureType::new("Fixture", "Generic")
                        .method(FixtureMethod::public_static("Make").generic("T")),
                )
                .build(),
        )
        .unwrap();
        let mut tables = image.metadata().tables.clone();
        let rows = tables.rows(TableId::MethodDef);

        let changed = remap_columns(&mut tables, &shift_by_one(rows)).unwrap();
        assert!(changed > 0);

        // Method owned generic parameter: TypeOrMethodDef tag 1
        let owner = tables.table(TableId::GenericParam).cell(1, 2).unwrap();
        assert_eq!(
            CodedIndexType::TypeOrMethodDef.decode(owner).unwrap(),
            (TableId::MethodDef, rows + 1)
        );

        // Attributes on methods move, attributes on types do not
        let parents: Vec<(TableId, u32)> = tables
            .table(TableId::CustomAttribute)
            .iter()
            .map(|row| CodedIndexType::HasCustomAttribute.decode(row[0]).unwrap())
            .collect();
        assert!(parents.contains(&(TableId::MethodDef, 2)));
        assert!(!parents.contains(&(TableId::MethodDef, 1)));
        assert!(parents.contains(&(TableId::TypeDef, 2)));

        // The attribute constructor is a MemberRef and stays
        assert_eq!(tables.table(TableId::CustomAttribute).cell(1, 1).unwrap(), (1 << 3) | 3);

        // Ownership lists are not renumbered here
        assert_eq!(
            tables
                .table(TableId::TypeDef)
                .cell(2, columns::TYPEDEF_METHOD_LIST)
                .unwrap(),
            1
        );
    }

    #[test]
    fn permutation_propagates() {
        let image = read_from_mem(ImageFixture::new().with_custom_attributes().build()).unwrap();
        let mut tables = image.metadata().tables.clone();
        let rows = tables.rows(TableId::MethodDef);

        // Reverse the method order: attribute parents end up out of order
        let reversed = RidMap::new(TableId::MethodDef, (1..=rows).rev().collect());
        remap_columns(&mut tables, &reversed).unwrap();
        sort_tables(&mut tables, None).unwrap();

        let parents: Vec<u32> = tables
            .table(TableId::CustomAttribute)
            .iter()
            .map(|row| row[0])
            .collect();
        let mut sorted = parents.clone();
        sorted.sort_unstable();
        assert_eq!(parents, sorted);
    }

    #[test]
    fn generic_param_sort() {
        let image = read_from_mem(
            ImageFixture::bare()
                .with_custom_attributes()
                .with_type(
                    FixtureType::new("", "A")
                        .method(FixtureMethod::public_static("First").generic("T"))
                        .method(FixtureMethod::public_static("Second").generic("U")),
                )
                .build(),
        )
        .unwrap();
        let mut tables = image.metadata().tables.clone();

        // Swap the two methods so the generic parameters swap owners
        let swap = RidMap::new(TableId::MethodDef, vec![2, 1]);
        remap_columns(&mut tables, &swap).unwrap();
        sort_tables(&mut tables, None).unwrap();

        let generic = tables.table(TableId::GenericParam);
        let owners: Vec<u32> = generic.iter().map(|row| row[2]).collect();
        assert_eq!(owners, vec![(1 << 1) | 1, (2 << 1) | 1]);

        // The parameter formerly in row 2 ("U") is now row 1 and keeps its attribute
        let name = generic.cell(1, 3).unwrap();
        assert_eq!(image.metadata().strings.get(name as usize).unwrap(), "U");
        let generic_parents: Vec<u32> = tables
            .table(TableId::CustomAttribute)
            .iter()
            .filter_map(|row| {
                match CodedIndexType::HasCustomAttribute.decode(row[0]).unwrap() {
                    (TableId::GenericParam, rid) => Some(rid),
                    _ => None,
                }
            })
            .collect();
        assert_eq!(generic_parents, vec![1, 2]);
    }

    #[test]
    fn unsorted_flag_is_respected() {
        let image = read_from_mem(ImageFixture::new().with_custom_attributes().build()).unwrap();
        let mut tables = image.metadata().tables.clone();
        tables.sorted &= !(1 << TableId::CustomAttribute as u8);

        let rows = tables.rows(TableId::MethodDef);
        let reversed = RidMap::new(TableId::MethodDef, (1..=rows).rev().collect());
        remap_columns(&mut tables, &reversed).unwrap();
        let before = tables.table(TableId::CustomAttribute).clone();
        sort_tables(&mut tables, None).unwrap();

        assert_eq!(tables.table(TableId::CustomAttribute), &before);
    }

    #[test]
    fn code_tokens() {
        let fixture = ImageFixture::new();
        let image = read_from_mem(fixture.build()).unwrap();
        let map = shift_by_one(image.metadata().tables.rows(TableId::MethodDef));

        let mut data = image.file().data().to_vec();
        let patched = rewrite_code(&image, &map, &mut data, |rva| {
            image.file().rva_to_offset(rva as usize)
        })
        .unwrap();
        // Caller and Run both call Go
        assert_eq!(patched, 2);

        let caller = &image.methods()[fixture.method_rid("Caller").unwrap() as usize - 1];
        let offset = image
            .file()
            .rva_to_offset((caller.instructions[0].rva + 1) as usize)
            .unwrap();
        assert_eq!(read_le::<u32>(&data[offset..]).unwrap(), 0x0600_0002);
    }

    #[test]
    fn added_body_tokens() {
        let mut image = read_from_mem(ImageFixture::new().build()).unwrap();
        let target = crate::resolve(&image, "Init", "Go").unwrap();
        crate::inject(&mut image, &target).unwrap();

        let cctor = image.methods().last().unwrap();
        let map = shift_by_one(10);
        let body = remap_added_body(cctor, cctor.encoded_body.as_ref().unwrap(), &map).unwrap();
        assert_eq!(body, vec![0x1A, 0x28, 0x02, 0x00, 0x00, 0x06, 0x2A]);
    }

    #[test]
    fn vtable_fixups() {
        let mut data = Vec::new();
        // Fixup table at 0: two entries
        push_le(&mut data, 16u32);
        push_le(&mut data, 2u16);
        push_le(&mut data, VTABLE_32BIT);
        push_le(&mut data, 24u32);
        push_le(&mut data, 1u16);
        push_le(&mut data, VTABLE_64BIT);
        // 32-bit slots at 16
        push_le(&mut data, 0x0600_0001u32);
        push_le(&mut data, 0x0600_0003u32);
        // 64-bit slot at 24
        push_le(&mut data, 0x0000_0000_0600_0002u64);

        let header = Cor20Header {
            cb: 72,
            major_runtime_version: 2,
            minor_runtime_version: 5,
            meta_data_rva: 0x2000,
            meta_data_size: 0x100,
            flags: 0,
            entry_point_token: 0,
            resource_rva: 0,
            resource_size: 0,
            strong_name_signature_rva: 0,
            strong_name_signature_size: 0,
            code_manager_table_rva: 0,
            code_manager_table_size: 0,
            vtable_fixups_rva: 0x4000,
            vtable_fixups_size: 16,
            export_address_table_jmp_rva: 0,
            export_address_table_jmp_size: 0,
            managed_native_header_rva: 0,
            managed_native_header_size: 0,
        };

        let map = shift_by_one(3);
        rewrite_vtable_fixups(&header, &map, &mut data, |rva| Ok(rva as usize % 0x4000)).unwrap();

        assert_eq!(read_le::<u32>(&data[16..]).unwrap(), 0x0600_0002);
        assert_eq!(read_le::<u32>(&data[20..]).unwrap(), 0x0600_0004);
        assert_eq!(read_le::<u64>(&data[24..]).unwrap(), 0x0600_0003);
    }
}
