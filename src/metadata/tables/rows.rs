//! Raw rows of the tables that lead up to and include `MethodDef`.
//!
//! The `#~` stream stores tables back to back in id order, so locating `MethodDef` requires the
//! row size of every table before it, even ones whose content is never inspected.

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `Module` table.
#[derive(Clone, Debug)]
pub struct ModuleRaw {
    /// 1-based row id
    pub rid: u32,
    /// Reserved, 0
    pub generation: u32,
    /// `#Strings` index of the module name
    pub name: u32,
    /// `#GUID` index of the module version id
    pub mvid: u32,
    /// `#GUID` index, reserved
    pub encid: u32,
    /// `#GUID` index, reserved
    pub encbaseid: u32,
}

impl RowReadable for ModuleRaw {
    const TABLE_ID: TableId = TableId::Module;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(
            /* generation */    2 +
            /* name */          sizes.str_bytes() +
            /* mvid */          sizes.guid_bytes() +
            /* encid */         sizes.guid_bytes() +
            /* encbaseid */     sizes.guid_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            generation: u32::from(read_le_at::<u16>(data, offset)?),
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            mvid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            encid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            encbaseid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
        })
    }
}

/// A row of the `TypeRef` table.
#[derive(Clone, Debug)]
pub struct TypeRefRaw {
    /// 1-based row id
    pub rid: u32,
    /// Where the referenced type is defined
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the type name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    const TABLE_ID: TableId = TableId::TypeRef;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(
            /* resolution_scope */  sizes.coded_index_bytes(CodedIndexType::ResolutionScope) +
            /* type_name */         sizes.str_bytes() +
            /* type_namespace */    sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::ResolutionScope,
            )?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

/// A row of the `TypeDef` table.
#[derive(Clone, Debug)]
pub struct TypeDefRaw {
    /// 1-based row id
    pub rid: u32,
    /// `0x02` token of this type
    pub token: Token,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the type name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type
    pub extends: CodedIndex,
    /// First row of this type's run in the `Field` table
    pub field_list: u32,
    /// First row of this type's run in the `MethodDef` table
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    const TABLE_ID: TableId = TableId::TypeDef;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(
            /* flags */             4 +
            /* type_name */         sizes.str_bytes() +
            /* type_namespace */    sizes.str_bytes() +
            /* extends */           sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef) +
            /* field_list */        sizes.table_index_bytes(TableId::Field) +
            /* method_list */       sizes.table_index_bytes(TableId::MethodDef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            token: Token::new(0x0200_0000 + rid),
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            extends: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
            method_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

/// A row of the `FieldPtr` indirection table.
#[derive(Clone, Debug)]
pub struct FieldPtrRaw {
    /// 1-based row id
    pub rid: u32,
    /// Row in the `Field` table
    pub field: u32,
}

impl RowReadable for FieldPtrRaw {
    const TABLE_ID: TableId = TableId::FieldPtr;

    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Field))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldPtrRaw {
            rid,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

/// A row of the `Field` table.
#[derive(Clone, Debug)]
pub struct FieldRaw {
    /// 1-based row id
    pub rid: u32,
    /// `0x04` token of this field
    pub token: Token,
    /// `FieldAttributes`
    pub flags: u32,
    /// `#Strings` index of the field name
    pub name: u32,
    /// `#Blob` index of the field signature
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE_ID: TableId = TableId::Field;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(
            /* flags */     2 +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            token: Token::new(0x0400_0000 + rid),
            flags: u32::from(read_le_at::<u16>(data, offset)?),
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// A row of the `MethodPtr` indirection table.
#[derive(Clone, Debug)]
pub struct MethodPtrRaw {
    /// 1-based row id
    pub rid: u32,
    /// Row in the `MethodDef` table
    pub method: u32,
}

impl RowReadable for MethodPtrRaw {
    const TABLE_ID: TableId = TableId::MethodPtr;

    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::MethodDef))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodPtrRaw {
            rid,
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

/// A row of the `MethodDef` table.
#[derive(Clone, Debug)]
pub struct MethodDefRaw {
    /// 1-based row id
    pub rid: u32,
    /// `0x06` token of this method
    pub token: Token,
    /// RVA of the method body, 0 for abstract, runtime or P/Invoke methods
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u32,
    /// `MethodAttributes`
    pub flags: u32,
    /// `#Strings` index of the method name
    pub name: u32,
    /// `#Blob` index of the method signature
    pub signature: u32,
    /// First row of this method's run in the `Param` table
    pub param_list: u32,
}

impl RowReadable for MethodDefRaw {
    const TABLE_ID: TableId = TableId::MethodDef;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfo) -> u32 {
        u32::from(
            /* rva */           4 +
            /* impl_flags */    2 +
            /* flags */         2 +
            /* name */          sizes.str_bytes() +
            /* signature */     sizes.blob_bytes() +
            /* param_list */    sizes.table_index_bytes(TableId::Param)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            token: Token::new(0x0600_0000 + rid),
            rva: read_le_at::<u32>(data, offset)?,
            impl_flags: u32::from(read_le_at::<u16>(data, offset)?),
            flags: u32::from(read_le_at::<u16>(data, offset)?),
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            param_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Param))?,
        })
    }
}

/// Row size of `table`, for the tables stored before and including `MethodDef`.
pub(crate) fn leading_row_size(table: TableId, sizes: &TableInfo) -> Option<u32> {
    match table {
        TableId::Module => Some(ModuleRaw::row_size(sizes)),
        TableId::TypeRef => Some(TypeRefRaw::row_size(sizes)),
        TableId::TypeDef => Some(TypeDefRaw::row_size(sizes)),
        TableId::FieldPtr => Some(FieldPtrRaw::row_size(sizes)),
        TableId::Field => Some(FieldRaw::row_size(sizes)),
        TableId::MethodPtr => Some(MethodPtrRaw::row_size(sizes)),
        TableId::MethodDef => Some(MethodDefRaw::row_size(sizes)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_short() {
        #[rustfmt::skip]
        let data = vec![
            0x01, 0x00, 0x10, 0x00, // flags
            0x42, 0x00, // type_name
            0x43, 0x00, // type_namespace
            0x00, 0x02, // extends
            0x00, 0x03, // field_list
            0x00, 0x04, // method_list
        ];

        let sizes = TableInfo::new_test(
            &[(TableId::Field, 1), (TableId::MethodDef, 1)],
            false,
            false,
            false,
        );
        assert_eq!(TypeDefRaw::row_size(&sizes), 14);

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(offset, 14);
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0200_0001);
        assert_eq!(row.flags, 0x0010_0001);
        assert_eq!(row.type_name, 0x42);
        assert_eq!(row.type_namespace, 0x43);
        assert_eq!(row.extends, CodedIndex::new(TableId::TypeDef, 0x80));
        assert_eq!(row.field_list, 0x0300);
        assert_eq!(row.method_list, 0x0400);
    }

    #[test]
    fn typedef_large() {
        #[rustfmt::skip]
        let data = vec![
            0x00, 0x00, 0x00, 0x00, // flags
            0x42, 0x00, 0x00, 0x00, // type_name
            0x43, 0x00, 0x00, 0x00, // type_namespace
            0x05, 0x00, 0x00, 0x00, // extends: TypeRef 1
            0x01, 0x00, 0x01, 0x00, // field_list
            0x02, 0x00, 0x00, 0x00, // method_list
        ];

        let sizes = TableInfo::new_test(
            &[
                (TableId::Field, 0x1_0000),
                (TableId::MethodDef, 0x1_0000),
                (TableId::TypeDef, 0x4000),
            ],
            true,
            false,
            false,
        );
        assert_eq!(TypeDefRaw::row_size(&sizes), 24);

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 2, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x0200_0002);
        assert_eq!(row.extends, CodedIndex::new(TableId::TypeRef, 1));
        assert_eq!(row.field_list, 0x0001_0001);
        assert_eq!(row.method_list, 2);
    }

    #[test]
    fn field_and_method() {
        #[rustfmt::skip]
        let data = vec![
            // Field
            0x01, 0x00, // flags
            0x10, 0x00, // name
            0x20, 0x00, // signature
            // MethodDef
            0x50, 0x20, 0x00, 0x00, // rva
            0x00, 0x00, // impl_flags
            0x86, 0x00, // flags
            0x30, 0x00, // name
            0x40, 0x00, // signature
            0x01, 0x00, // param_list
        ];

        let sizes = TableInfo::new_test(&[], false, false, false);
        let mut offset = 0;

        let field = FieldRaw::row_read(&data, &mut offset, 3, &sizes).unwrap();
        assert_eq!(field.token.value(), 0x0400_0003);
        assert_eq!(field.flags, 1);
        assert_eq!(field.name, 0x10);
        assert_eq!(field.signature, 0x20);

        let method = MethodDefRaw::row_read(&data, &mut offset, 7, &sizes).unwrap();
        assert_eq!(method.token.value(), 0x0600_0007);
        assert_eq!(method.rva, 0x2050);
        assert_eq!(method.flags, 0x86);
        assert_eq!(method.name, 0x30);
        assert_eq!(method.param_list, 1);
        assert_eq!(offset, data.len());

        assert!(MethodDefRaw::row_read(&data, &mut offset, 8, &sizes).is_err());
    }

    #[test]
    fn leading_sizes() {
        let sizes = TableInfo::new_test(&[], false, false, false);
        assert_eq!(leading_row_size(TableId::Module, &sizes), Some(10));
        assert_eq!(leading_row_size(TableId::TypeRef, &sizes), Some(6));
        assert_eq!(leading_row_size(TableId::FieldPtr, &sizes), Some(2));
        assert_eq!(leading_row_size(TableId::Field, &sizes), Some(6));
        assert_eq!(leading_row_size(TableId::MethodDef, &sizes), Some(14));
        assert_eq!(leading_row_size(TableId::Param, &sizes), None);
    }
}
