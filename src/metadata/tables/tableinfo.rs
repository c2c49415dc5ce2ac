//! Row counts and derived column widths of a tables stream.
//!
//! Every index column of a metadata table is either 2 or 4 bytes wide, depending on the row
//! counts of the tables it can reference and on the `HeapSizes` flags. [`TableInfo`] captures
//! those inputs and answers the width questions. It is rebuilt by the writer from the new row
//! counts, so growing a table past 65535 rows widens every column that points at it.

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{schema::Column, CodedIndexType, TableId, TABLE_SLOTS};

/// `HeapSizes` bit: `#Strings` indexes are 4 bytes
pub const HEAP_LARGE_STRINGS: u8 = 0x01;
/// `HeapSizes` bit: `#GUID` indexes are 4 bytes
pub const HEAP_LARGE_GUID: u8 = 0x02;
/// `HeapSizes` bit: `#Blob` indexes are 4 bytes
pub const HEAP_LARGE_BLOB: u8 = 0x04;

/// Row count of a single table, and the number of bits needed to address it.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits required to store any row id of this table
    pub bits: u8,
    /// Whether a simple index into this table needs 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Derive the index width for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            // 32 - leading_zeros is always <= 32
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Column widths of one tables stream.
#[derive(Clone, Debug)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

impl TableInfo {
    /// Build from per-table row counts (indexed by table number) and the `HeapSizes` byte.
    ///
    /// For a portable PDB, `row_counts` must include the type system row counts recorded in
    /// the `#Pdb` stream, since debug tables index into the image's tables.
    #[must_use]
    pub fn new(row_counts: &[u32; TABLE_SLOTS], heap_sizes: u8) -> Self {
        let mut table_info = TableInfo {
            rows: row_counts.iter().map(|rows| TableRowInfo::new(*rows)).collect(),
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_sizes & HEAP_LARGE_STRINGS != 0,
            is_large_index_guid: heap_sizes & HEAP_LARGE_GUID != 0,
            is_large_index_blob: heap_sizes & HEAP_LARGE_BLOB != 0,
        };

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Row count of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Whether a simple index into `table` needs 4 bytes.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// Whether `#Strings` indexes are 4 bytes.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Whether `#GUID` indexes are 4 bytes.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Whether `#Blob` indexes are 4 bytes.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Bits needed for a row id of `table`.
    #[must_use]
    pub fn table_index_bits(&self, table: TableId) -> u8 {
        self.rows[table as usize].bits
    }

    /// Total bits needed for a coded index of `coded_index_type`.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Whether a coded index of `coded_index_type` needs 4 bytes.
    #[must_use]
    pub fn is_large_coded(&self, coded_index_type: CodedIndexType) -> bool {
        self.coded_index_bits(coded_index_type) > 16
    }

    /// Whether `column` is stored in 4 bytes.
    #[must_use]
    pub fn is_large_column(&self, column: Column) -> bool {
        match column {
            Column::U16 => false,
            Column::U32 => true,
            Column::Str => self.is_large_index_str,
            Column::Guid => self.is_large_index_guid,
            Column::Blob => self.is_large_index_blob,
            Column::Index(table) | Column::List(table) => self.table_index_bits(table) > 16,
            Column::Coded(coded) => self.is_large_coded(coded),
        }
    }

    /// Width of `column` in bytes.
    #[must_use]
    pub fn column_size(&self, column: Column) -> usize {
        if self.is_large_column(column) {
            4
        } else {
            2
        }
    }

    /// Width of one row of `table` in bytes.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|column| self.column_size(*column))
            .sum()
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let max_bits = coded_index
                .tables()
                .iter()
                .flatten()
                .map(|table| self.table_index_bits(*table))
                .max()
                .unwrap_or(1);
            self.coded_indexes[coded_index as usize] = max_bits + coded_index.tag_bits();
        }
    }
}
