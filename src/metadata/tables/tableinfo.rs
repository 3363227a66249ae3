use strum::EnumCount;

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

/// Row counts and index widths of one `#~` stream.
///
/// Every column that references a heap or another table is 2 bytes wide unless the target is
/// large enough to need 4; this type answers those width questions for the row readers.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<u32>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

impl TableInfo {
    /// Read the row counts that follow the fixed `#~` header.
    ///
    /// `data` is the complete table stream. One `u32` row count is present for every bit set
    /// in `valid_bitvec`, including bits of tables this crate does not know.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is shorter than its row count array.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        let mut rows = vec![0u32; 64];
        let mut next_row_offset = 24;

        for (bit, rows) in rows.iter_mut().enumerate() {
            if (valid_bitvec & (1 << bit)) == 0 {
                continue;
            }

            *rows = read_le_at::<u32>(data, &mut next_row_offset)?;
        }

        if data.len() < 7 {
            return Err(OutOfBounds);
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;
        let mut table_info = TableInfo {
            rows,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bytes();

        Ok(table_info)
    }

    #[cfg(test)]
    pub(crate) fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![0u32; 64],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for (table, rows) in valid_tables {
            table_info.rows[*table as usize] = *rows;
        }

        table_info.calculate_coded_index_bytes();
        table_info
    }

    /// Split a raw coded index into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the tag does not name a table of `coded_index_type`.
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<(TableId, u32)> {
        let tables = coded_index_type.tables();
        let tag_bits = coded_index_type.tag_bits();
        let tag_mask = (1 << tag_bits) - 1;

        let tag = value & tag_mask;
        let index = value >> tag_bits;

        match tables.get(tag as usize) {
            Some(table) => Ok((*table, index)),
            None => Err(OutOfBounds),
        }
    }

    /// Number of rows in `table`
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// Returns true if indexes into `table` take 4 bytes
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize] > u32::from(u16::MAX)
    }

    /// Returns true if `#Strings` indexes take 4 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Returns true if `#GUID` indexes take 4 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Returns true if `#Blob` indexes take 4 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Width of a `#Strings` index
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Width of a `#GUID` index
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Width of a `#Blob` index
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Width of a simple index into `table`
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> u8 {
        if self.is_large(table) {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of kind `coded_index_type`
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    fn calculate_coded_index_bytes(&mut self) {
        for (index, coded_index_type) in [
            CodedIndexType::TypeDefOrRef,
            CodedIndexType::ResolutionScope,
        ]
        .iter()
        .enumerate()
        {
            let max_rows = coded_index_type
                .tables()
                .iter()
                .map(|table| self.rows[*table as usize])
                .max()
                .unwrap_or(0);

            let small_limit = 1u32 << (16 - coded_index_type.tag_bits());
            self.coded_indexes[index] = if max_rows >= small_limit { 4 } else { 2 };
        }
    }
}
