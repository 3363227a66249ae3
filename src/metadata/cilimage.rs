//! A loaded managed module: the PE image plus the location of its metadata streams.
//!
//! [`CilImage`] owns the complete file buffer. Views over the metadata (`#~`, `#Strings`,
//! `#GUID`) are created on demand and borrow from that buffer, so the image can hand out
//! read access for lookups and still rewrite method bodies in place afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use pinpatch::metadata::cilimage::CilImage;
//! use std::path::Path;
//!
//! let image = CilImage::from_file(Path::new("Assembly-CSharp.dll"))?;
//! if let Some(method) = image.find_method("", "GMC", "IsMSC")? {
//!     println!("GMC.IsMSC is {} at RVA {:#x}", method.token, method.rva);
//! }
//! # Ok::<(), pinpatch::Error>(())
//! ```

use std::path::Path;

use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        method::MethodBody,
        root::Root,
        streams::{Guid, Strings},
        tables::{FieldRaw, MethodDefRaw, ModuleRaw, TableId, TablesHeader, TypeDefRaw},
        token::Token,
    },
    Error::{NoRelocation, NotSupported},
    Result,
};

/// File offset and size of one metadata stream
#[derive(Debug, Clone, Copy)]
struct StreamRange {
    offset: usize,
    size: usize,
}

/// A managed PE module with compressed metadata.
pub struct CilImage {
    file: File,
    tables: StreamRange,
    strings: StreamRange,
    guids: Option<StreamRange>,
    runtime_version: String,
}

impl CilImage {
    /// Load a managed module from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read and any error of
    /// [`CilImage::from_mem`].
    pub fn from_file(path: &Path) -> Result<CilImage> {
        Self::from_mem(std::fs::read(path)?)
    }

    /// Load a managed module from an owned buffer.
    ///
    /// # Errors
    /// - [`crate::Error::GoblinErr`] / [`crate::Error::Malformed`] if the buffer is not a PE image
    /// - [`crate::Error::NotSupported`] for images without a CLI header, with uncompressed (`#-`)
    ///   tables, or with `FieldPtr` / `MethodPtr` indirection tables
    /// - [`crate::Error::OutOfBounds`] if a header or stream lies outside the file
    pub fn from_mem(data: Vec<u8>) -> Result<CilImage> {
        let file = File::from_mem(data)?;

        let Some((clr_rva, clr_size)) = file.clr() else {
            return Err(NotSupported);
        };

        let clr_offset = file.rva_to_offset(clr_rva)?;
        let cor20 = Cor20Header::read(file.data_slice(clr_offset, clr_size.max(72))?)?;

        let metadata_offset = file.rva_to_offset(cor20.meta_data_rva as usize)?;
        let metadata = file.data_slice(metadata_offset, cor20.meta_data_size as usize)?;
        let root = Root::read(metadata)?;

        if root.stream("#-").is_some() {
            return Err(NotSupported);
        }

        let range = |name: &str| {
            root.stream(name).map(|header| StreamRange {
                offset: metadata_offset + header.offset as usize,
                size: header.size as usize,
            })
        };

        let Some(tables) = range("#~") else {
            return Err(malformed_error!("Module has no #~ stream"));
        };
        let Some(strings) = range("#Strings") else {
            return Err(malformed_error!("Module has no #Strings stream"));
        };
        let guids = range("#GUID");

        let image = CilImage {
            file,
            tables,
            strings,
            guids,
            runtime_version: root.version,
        };

        {
            let header = image.tables()?;
            if header.row_count(TableId::FieldPtr) > 0 || header.row_count(TableId::MethodPtr) > 0 {
                return Err(NotSupported);
            }
            image.strings()?;
        }

        Ok(image)
    }

    /// The underlying PE image
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The complete module bytes, including any patches applied so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.file.data()
    }

    /// The runtime version string of the metadata root, for example `v4.0.30319`
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// The `#~` table stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream header is damaged.
    pub fn tables(&self) -> Result<TablesHeader<'_>> {
        TablesHeader::from(self.file.data_slice(self.tables.offset, self.tables.size)?)
    }

    /// The `#Strings` heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or damaged.
    pub fn strings(&self) -> Result<Strings<'_>> {
        Strings::from(self.file.data_slice(self.strings.offset, self.strings.size)?)
    }

    /// The module version id, if the module has a `#GUID` heap.
    ///
    /// # Errors
    /// Returns an error if the `Module` row or the heap is damaged.
    pub fn mvid(&self) -> Result<Option<uguid::Guid>> {
        let Some(range) = self.guids else {
            return Ok(None);
        };

        let tables = self.tables()?;
        if tables.row_count(TableId::Module) == 0 {
            return Ok(None);
        }

        let module = tables.row::<ModuleRaw>(1)?;
        let guids = Guid::from(self.file.data_slice(range.offset, range.size)?)?;
        Ok(Some(guids.get(module.mvid as usize)?))
    }

    /// Find a type by exact namespace and name. The namespace may be empty.
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` table or the string heap is damaged.
    pub fn find_type(&self, namespace: &str, name: &str) -> Result<Option<TypeDefRaw>> {
        let tables = self.tables()?;
        let strings = self.strings()?;

        for typedef in tables.rows::<TypeDefRaw>() {
            let typedef = typedef?;
            if strings.get(typedef.type_name as usize)? == name
                && strings.get(typedef.type_namespace as usize)? == namespace
            {
                return Ok(Some(typedef));
            }
        }

        Ok(None)
    }

    /// Returns true if the module defines `namespace.name`.
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` table or the string heap is damaged.
    pub fn has_type(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(self.find_type(namespace, name)?.is_some())
    }

    /// Find the first method called `method` declared by `namespace.class`.
    ///
    /// Overloads are not told apart; the first method with a matching name wins.
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` / `MethodDef` tables or the string heap are damaged.
    pub fn find_method(
        &self,
        namespace: &str,
        class: &str,
        method: &str,
    ) -> Result<Option<MethodDefRaw>> {
        let tables = self.tables()?;
        let strings = self.strings()?;

        let Some(typedef) = self.find_type(namespace, class)? else {
            return Ok(None);
        };

        let method_count = tables.row_count(TableId::MethodDef);
        let end = if typedef.rid < tables.row_count(TableId::TypeDef) {
            tables.row::<TypeDefRaw>(typedef.rid + 1)?.method_list
        } else {
            method_count + 1
        };

        let start = typedef.method_list.max(1);
        let end = end.min(method_count + 1);
        for rid in start..end {
            let candidate = tables.row::<MethodDefRaw>(rid)?;
            if strings.get(candidate.name as usize)? == method {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// Name of the field a `FieldDef` token refers to; `None` for other tables or rows that do
    /// not exist.
    ///
    /// # Errors
    /// Returns an error if the `Field` table or the string heap is damaged.
    pub fn field_name(&self, token: Token) -> Result<Option<&str>> {
        if token.table() != TableId::Field as u8 {
            return Ok(None);
        }

        let tables = self.tables()?;
        if token.row() == 0 || token.row() > tables.row_count(TableId::Field) {
            return Ok(None);
        }

        let field = tables.row::<FieldRaw>(token.row())?;
        Ok(Some(self.strings()?.get(field.name as usize)?))
    }

    /// Parse the body of `method`; `None` for methods without IL (abstract, runtime, P/Invoke).
    ///
    /// # Errors
    /// Returns an error if the RVA is not mapped or the body is damaged.
    pub fn method_body(&self, method: &MethodDefRaw) -> Result<Option<(MethodBody, &[u8])>> {
        if method.rva == 0 {
            return Ok(None);
        }

        let offset = self.file.rva_to_offset(method.rva as usize)?;
        let data = self.file.data().get(offset..).ok_or(out_of_bounds_error!())?;
        let body = MethodBody::from(data)?;
        let code = body.code(data)?;

        Ok(Some((body, code)))
    }

    /// Overwrite the body of `method` with `encoded`, a complete body including header and data
    /// sections. The remainder of the original slot is zeroed.
    ///
    /// # Errors
    /// Returns [`crate::Error::NoRelocation`] if `encoded` is larger than the original body or
    /// would place a fat header at an unaligned address, and parsing errors of the original body.
    pub fn replace_method_body(&mut self, method: &MethodDefRaw, encoded: &[u8]) -> Result<()> {
        let Some((original, _)) = self.method_body(method)? else {
            return Err(malformed_error!("Method {} has no body", method.token));
        };

        let is_fat = encoded.first().is_some_and(|first| first & 0x3 == 0x3);
        if encoded.len() > original.size_slot || (is_fat && method.rva % 4 != 0) {
            return Err(NoRelocation {
                needed: encoded.len(),
                available: original.size_slot,
            });
        }

        let offset = self.file.rva_to_offset(method.rva as usize)?;
        let slot = self
            .file
            .data_mut()
            .get_mut(offset..offset + original.size_slot)
            .ok_or(out_of_bounds_error!())?;

        slot[..encoded.len()].copy_from_slice(encoded);
        slot[encoded.len()..].fill(0);

        Ok(())
    }

    /// Consume the image and return the module bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.file.into_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{CilModuleBuilder, PeBuilder};

    fn module() -> CilImage {
        let data = CilModuleBuilder::new()
            .field("GMain", "GM")
            .field("GMain", "m_MSC")
            .method("", "TM", "Start", &[0x2A])
            .method("", "TM", "SetMSC", &[0x02, 0x2A])
            .method("", "GMC", "IsMSC", &[0x16, 0x2A])
            .build();

        CilImage::from_mem(data).unwrap()
    }

    #[test]
    fn find_methods() {
        let image = module();

        let method = image.find_method("", "TM", "SetMSC").unwrap().unwrap();
        assert_eq!(method.token, Token::new(0x0600_0002));

        let method = image.find_method("", "GMC", "IsMSC").unwrap().unwrap();
        assert_eq!(method.token, Token::new(0x0600_0003));

        assert!(image.find_method("", "GMC", "SetMSC").unwrap().is_none());
        assert!(image.find_method("", "TM", "IsMSC").unwrap().is_none());
        assert!(image.find_method("Other", "TM", "SetMSC").unwrap().is_none());
        assert!(image.find_method("", "Missing", "SetMSC").unwrap().is_none());
    }

    #[test]
    fn types_and_fields() {
        let image = module();

        assert!(image.has_type("", "GMain").unwrap());
        assert!(!image.has_type("MonoMod", "WasHere").unwrap());
        assert_eq!(image.field_name(Token::new(0x0400_0002)).unwrap(), Some("m_MSC"));
        assert_eq!(image.field_name(Token::new(0x0400_0009)).unwrap(), None);
        assert_eq!(image.field_name(Token::new(0x0A00_0001)).unwrap(), None);
        assert_eq!(image.runtime_version(), "v4.0.30319");
        assert!(image.mvid().unwrap().is_some());
    }

    #[test]
    fn body_roundtrip() {
        let mut image = module();
        let method = image.find_method("", "GMC", "IsMSC").unwrap().unwrap();

        let (body, code) = image.method_body(&method).unwrap().unwrap();
        assert_eq!(code, &[0x16, 0x2A]);
        assert_eq!(body.size_slot, 3);

        let too_large = [0x0E, 0x00, 0x00, 0x2A];
        assert!(matches!(
            image.replace_method_body(&method, &too_large),
            Err(NoRelocation { needed: 4, available: 3 })
        ));

        image.replace_method_body(&method, &[0x06, 0x2A]).unwrap();
        let (body, code) = image.method_body(&method).unwrap().unwrap();
        assert_eq!(code, &[0x2A]);

        // The slot now follows the shorter header; the trailing byte is zeroed
        assert_eq!(body.size_slot, 2);
        assert!(matches!(
            image.replace_method_body(&method, &[0x0A, 0x16, 0x2A]),
            Err(NoRelocation { needed: 3, available: 2 })
        ));
    }

    #[test]
    fn not_managed() {
        let data = PeBuilder::new(0x1_8000_0000)
            .section(".text", vec![0xC3; 0x10])
            .build();

        assert!(matches!(CilImage::from_mem(data), Err(NotSupported)));
    }
}
