//! The `#~` tables stream: header, row counts and row data.
//!
//! # Layout (ECMA-335 II.24.2.6)
//!
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 4    | Reserved       |
//! | 4      | 1    | MajorVersion   |
//! | 5      | 1    | MinorVersion   |
//! | 6      | 1    | HeapSizes      |
//! | 7      | 1    | Reserved       |
//! | 8      | 8    | Valid          |
//! | 16     | 8    | Sorted         |
//! | 24     | 4*n  | Rows           |
//!
//! The row data of every present table follows, in table number order. Row widths depend
//! on the row counts (see [`TableInfo`]), so the reader decodes everything into owned
//! [`Table`]s and the writer re-encodes them with freshly computed widths.

use strum::IntoEnumIterator;

use crate::{
    file::io::{push_le, push_le_dyn, read_le_at, read_le_at_dyn},
    metadata::tables::{Column, TableId, TableInfo, TABLE_SLOTS},
    Error::OutOfBounds,
    Result,
};

/// `HeapSizes` bit announcing an extra 4 byte value after the row counts
const HEAP_EXTRA_DATA: u8 = 0x40;

/// The rows of one metadata table, one `u32` per column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    id: TableId,
    rows: Vec<Vec<u32>>,
}

impl Table {
    /// An empty table.
    #[must_use]
    pub fn new(id: TableId) -> Self {
        Table {
            id,
            rows: Vec::new(),
        }
    }

    /// The id of this table.
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row with 1-based id `rid`.
    #[must_use]
    pub fn row(&self, rid: u32) -> Option<&[u32]> {
        let index = (rid as usize).checked_sub(1)?;
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Mutable access to the row with 1-based id `rid`.
    pub fn row_mut(&mut self, rid: u32) -> Option<&mut [u32]> {
        let index = (rid as usize).checked_sub(1)?;
        self.rows.get_mut(index).map(Vec::as_mut_slice)
    }

    /// Value of `column` in row `rid`.
    ///
    /// # Errors
    /// Fails if the row or column does not exist.
    pub fn cell(&self, rid: u32, column: usize) -> Result<u32> {
        self.row(rid)
            .and_then(|row| row.get(column))
            .copied()
            .ok_or_else(|| {
                malformed_error!("{:?} has no row {} column {}", self.id, rid, column)
            })
    }

    /// Iterate over all rows in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// All rows, for in-place rewriting.
    pub fn rows_mut(&mut self) -> &mut Vec<Vec<u32>> {
        &mut self.rows
    }

    /// Insert a row so that it gets id `rid`, shifting later rows down.
    ///
    /// # Errors
    /// Fails if the row has the wrong number of columns or `rid` is out of range.
    pub fn insert(&mut self, rid: u32, row: Vec<u32>) -> Result<()> {
        if row.len() != self.id.columns().len() {
            return Err(malformed_error!(
                "{:?} rows have {} columns, got {}",
                self.id,
                self.id.columns().len(),
                row.len()
            ));
        }

        let index = rid as usize;
        if index == 0 || index > self.rows.len() + 1 {
            return Err(OutOfBounds);
        }

        self.rows.insert(index - 1, row);
        Ok(())
    }

    /// Append a row.
    ///
    /// # Errors
    /// Fails if the row has the wrong number of columns.
    pub fn push(&mut self, row: Vec<u32>) -> Result<()> {
        let rid = self.rows.len() as u32 + 1;
        self.insert(rid, row)
    }
}

/// A decoded `#~` stream.
#[derive(Clone, Debug)]
pub struct TablesHeader {
    /// First reserved field, preserved as read
    pub reserved: u32,
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// `HeapSizes` flags
    pub heap_sizes: u8,
    /// Second reserved field, preserved as read
    pub reserved_2: u8,
    /// Bit vector of the tables that are present
    pub valid: u64,
    /// Bit vector of the tables that are sorted
    pub sorted: u64,
    extra_data: Option<u32>,
    tables: Vec<Table>,
}

impl TablesHeader {
    /// Decode a tables stream.
    ///
    /// `external_rows` supplies row counts of tables that live in another metadata scope;
    /// portable PDBs index into the image's type system tables this way.
    ///
    /// # Errors
    /// Fails on truncated data or tables this crate does not know.
    pub fn read(data: &[u8], external_rows: Option<&[u32; TABLE_SLOTS]>) -> Result<TablesHeader> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let mut offset = 0;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = read_le_at::<u8>(data, &mut offset)?;
        let reserved_2 = read_le_at::<u8>(data, &mut offset)?;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let mut row_counts = [0u32; TABLE_SLOTS];
        for (slot, count) in row_counts.iter_mut().enumerate() {
            if valid & (1 << slot) == 0 {
                continue;
            }

            if TableId::from_u8(slot as u8).is_none() {
                return Err(malformed_error!("Unknown metadata table 0x{:02x}", slot));
            }
            *count = read_le_at::<u32>(data, &mut offset)?;
        }

        let extra_data = if heap_sizes & HEAP_EXTRA_DATA != 0 {
            Some(read_le_at::<u32>(data, &mut offset)?)
        } else {
            None
        };

        let info = TableInfo::new(&merge_rows(&row_counts, external_rows), heap_sizes);

        let mut tables: Vec<Table> = TableId::iter().map(Table::new).collect();
        for table in &mut tables {
            let count = row_counts[table.id as usize];
            let columns = table.id.columns();
            table.rows.reserve(count as usize);
            for _ in 0..count {
                let mut row = Vec::with_capacity(columns.len());
                for column in columns {
                    let value = match column {
                        Column::U16 => u32::from(read_le_at::<u16>(data, &mut offset)?),
                        Column::U32 => read_le_at::<u32>(data, &mut offset)?,
                        _ => read_le_at_dyn(data, &mut offset, info.is_large_column(*column))?,
                    };
                    row.push(value);
                }
                table.rows.push(row);
            }
        }

        Ok(TablesHeader {
            reserved,
            major_version,
            minor_version,
            heap_sizes,
            reserved_2,
            valid,
            sorted,
            extra_data,
            tables,
        })
    }

    /// The table with id `id`.
    #[must_use]
    pub fn table(&self, id: TableId) -> &Table {
        // Every TableId has a slot; the position matches the iteration order used in `read`
        &self.tables[Self::slot(id)]
    }

    /// Mutable access to the table with id `id`.
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[Self::slot(id)]
    }

    /// Iterate over all tables, present or not.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Mutable iteration over all tables.
    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.iter_mut()
    }

    /// Row count of `id`.
    #[must_use]
    pub fn rows(&self, id: TableId) -> u32 {
        self.table(id).len() as u32
    }

    /// Row counts of all tables, indexed by table number.
    #[must_use]
    pub fn row_counts(&self) -> [u32; TABLE_SLOTS] {
        let mut counts = [0u32; TABLE_SLOTS];
        for table in &self.tables {
            counts[table.id as usize] = table.len() as u32;
        }
        counts
    }

    /// Whether the `Sorted` bit of `id` is set.
    #[must_use]
    pub fn is_sorted(&self, id: TableId) -> bool {
        self.sorted & (1 << id as u8) != 0
    }

    /// The `Valid` bit vector the stream would be written with.
    ///
    /// Tables that were announced as present stay present, even if empty.
    #[must_use]
    pub fn present(&self) -> u64 {
        self.tables
            .iter()
            .filter(|table| !table.is_empty())
            .fold(self.valid, |mask, table| mask | (1 << table.id as u8))
    }

    /// Column widths for the current row counts.
    #[must_use]
    pub fn info(&self, external_rows: Option<&[u32; TABLE_SLOTS]>) -> TableInfo {
        TableInfo::new(
            &merge_rows(&self.row_counts(), external_rows),
            self.heap_sizes,
        )
    }

    /// Encode the stream with column widths derived from the current row counts.
    ///
    /// # Errors
    /// Fails if a value does not fit its column.
    pub fn write(&self, external_rows: Option<&[u32; TABLE_SLOTS]>) -> Result<Vec<u8>> {
        let info = self.info(external_rows);
        let present = self.present();

        let mut buffer = Vec::new();
        push_le(&mut buffer, self.reserved);
        push_le(&mut buffer, self.major_version);
        push_le(&mut buffer, self.minor_version);
        push_le(&mut buffer, self.heap_sizes);
        push_le(&mut buffer, self.reserved_2);
        push_le(&mut buffer, present);
        push_le(&mut buffer, self.sorted);

        for table in &self.tables {
            if present & (1 << table.id as u8) != 0 {
                push_le(&mut buffer, table.len() as u32);
            }
        }

        if let Some(extra) = self.extra_data {
            push_le(&mut buffer, extra);
        }

        for table in &self.tables {
            let columns = table.id.columns();
            for row in &table.rows {
                for (column, value) in columns.iter().zip(row) {
                    match column {
                        Column::U16 => {
                            let Ok(value) = u16::try_from(*value) else {
                                return Err(malformed_error!(
                                    "Value {} does not fit into a u16 column of {:?}",
                                    value,
                                    table.id
                                ));
                            };
                            push_le(&mut buffer, value);
                        }
                        Column::U32 => push_le(&mut buffer, *value),
                        _ => push_le_dyn(&mut buffer, *value, info.is_large_column(*column))?,
                    }
                }
            }
        }

        // Stream sizes are a multiple of 4
        crate::file::io::pad_to(&mut buffer, 4);
        Ok(buffer)
    }

    fn slot(id: TableId) -> usize {
        // TableId::iter() yields tables in ascending numeric order
        let number = id as usize;
        if number >= TableId::Document as usize {
            number - (TableId::Document as usize - TableId::GenericParamConstraint as usize - 1)
        } else {
            number
        }
    }
}

fn merge_rows(
    own: &[u32; TABLE_SLOTS],
    external: Option<&[u32; TABLE_SLOTS]>,
) -> [u32; TABLE_SLOTS] {
    let mut merged = *own;
    if let Some(external) = external {
        for (slot, count) in external.iter().enumerate() {
            if merged[slot] == 0 {
                merged[slot] = *count;
            }
        }
    }
    merged
}
