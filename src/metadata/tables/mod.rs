//! The compressed metadata table stream (`#~`, ECMA-335 II.24.2.6).
//!
//! [`TablesHeader`] parses the stream header and row counts and gives typed, random access to
//! the rows of `Module`, `TypeRef`, `TypeDef`, `Field` and `MethodDef`, which is everything the
//! method locator needs. Tables after `MethodDef` are counted but never located.
//!
//! # Example
//!
//! ```rust,ignore
//! use pinpatch::metadata::tables::{TablesHeader, TypeDefRaw};
//!
//! let tables = TablesHeader::from(table_stream)?;
//! for typedef in tables.rows::<TypeDefRaw>() {
//!     let typedef = typedef?;
//!     println!("{} -> methods from {}", typedef.token, typedef.method_list);
//! }
//! ```

mod rows;
mod tableinfo;
mod types;

pub use rows::{
    FieldPtrRaw, FieldRaw, MethodDefRaw, MethodPtrRaw, ModuleRaw, TypeDefRaw, TypeRefRaw,
};
pub use tableinfo::TableInfo;
pub use types::{CodedIndex, CodedIndexType, RowReadable, TableId};

use strum::IntoEnumIterator;

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The parsed `#~` stream header with row access.
pub struct TablesHeader<'a> {
    /// Schema major version, 2
    pub major_version: u8,
    /// Schema minor version, 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    data: &'a [u8],
    info: TableInfo,
    /// Offset of the first row of every table up to and including `MethodDef`
    offsets: [usize; TableId::MethodDef as usize + 1],
}

impl<'a> TablesHeader<'a> {
    /// Parse the table stream header and locate the leading tables.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is too short for its declared tables.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);
        let _reserved = parser.read_le::<u32>()?;
        let major_version = parser.read_le::<u8>()?;
        let minor_version = parser.read_le::<u8>()?;
        let heap_sizes = parser.read_le::<u8>()?;
        let _reserved = parser.read_le::<u8>()?;
        let valid = parser.read_le::<u64>()?;
        let sorted = parser.read_le::<u64>()?;

        let info = TableInfo::new(data, valid)?;

        let mut offset = 24 + valid.count_ones() as usize * 4;
        // Extra data, present when the heap sizes carry bit 0x40
        if heap_sizes & 0x40 != 0 {
            offset += 4;
        }

        let mut offsets = [0usize; TableId::MethodDef as usize + 1];
        let leading =
            TableId::iter().take_while(|table| *table as usize <= TableId::MethodDef as usize);
        for table in leading {
            offsets[table as usize] = offset;

            let Some(row_size) = rows::leading_row_size(table, &info) else {
                continue;
            };

            offset = (info.rows(table) as usize)
                .checked_mul(row_size as usize)
                .and_then(|size| size.checked_add(offset))
                .ok_or(OutOfBounds)?;
        }

        if offset > data.len() {
            return Err(OutOfBounds);
        }

        Ok(TablesHeader {
            major_version,
            minor_version,
            valid,
            sorted,
            data,
            info,
            offsets,
        })
    }

    /// Heap and table size information
    #[must_use]
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Number of rows in `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Read the row with the 1-based `rid` from the table of `T`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for a row id outside the table.
    pub fn row<T: RowReadable>(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count(T::TABLE_ID) {
            return Err(OutOfBounds);
        }

        let Some(start) = self.offsets.get(T::TABLE_ID as usize) else {
            return Err(OutOfBounds);
        };

        let mut offset = start + (rid as usize - 1) * T::row_size(&self.info) as usize;
        T::row_read(self.data, &mut offset, rid, &self.info)
    }

    /// All rows of the table of `T`, in order
    pub fn rows<'s, T: RowReadable + 's>(&'s self) -> impl Iterator<Item = Result<T>> + 's {
        (1..=self.row_count(T::TABLE_ID)).map(move |rid| self.row::<T>(rid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x00, // reserved
            0x02, 0x00,             // version
            0x00,                   // heap sizes
            0x01,                   // reserved
            0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // valid: Module, TypeDef, MethodDef
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // sorted
            0x01, 0x00, 0x00, 0x00, // Module rows
            0x02, 0x00, 0x00, 0x00, // TypeDef rows
            0x01, 0x00, 0x00, 0x00, // MethodDef rows
            // Module
            0x00, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
            // TypeDef 1 (<Module>)
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
            // TypeDef 2
            0x01, 0x00, 0x00, 0x00, 0x10, 0x00, 0x20, 0x00, 0x25, 0x00, 0x01, 0x00, 0x01, 0x00,
            // MethodDef 1
            0x50, 0x20, 0x00, 0x00, 0x00, 0x00, 0x86, 0x00, 0x30, 0x00, 0x01, 0x00, 0x01, 0x00,
        ];

        let tables = TablesHeader::from(&data).unwrap();
        assert_eq!(tables.major_version, 2);
        assert_eq!(tables.row_count(TableId::TypeDef), 2);
        assert_eq!(tables.row_count(TableId::Field), 0);

        let module = tables.row::<ModuleRaw>(1).unwrap();
        assert_eq!(module.name, 0x0A);
        assert_eq!(module.mvid, 1);

        let typedefs: Vec<TypeDefRaw> = tables
            .rows::<TypeDefRaw>()
            .map(|row| row.unwrap())
            .collect();
        assert_eq!(typedefs.len(), 2);
        assert_eq!(typedefs[1].type_name, 0x10);
        assert_eq!(typedefs[1].type_namespace, 0x20);
        assert_eq!(typedefs[1].extends, CodedIndex::new(TableId::TypeRef, 9));

        let method = tables.row::<MethodDefRaw>(1).unwrap();
        assert_eq!(method.rva, 0x2050);
        assert_eq!(method.name, 0x30);

        assert!(tables.row::<MethodDefRaw>(2).is_err());
        assert!(tables.row::<FieldRaw>(1).is_err());
    }

    #[test]
    fn truncated() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x01,
            0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x05, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];

        assert!(TablesHeader::from(&data).is_err());
    }
}
