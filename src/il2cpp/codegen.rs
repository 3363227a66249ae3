//! Resolution of method entry points through `Il2CppCodeGenModule` records.
//!
//! `GameAssembly.dll` carries one code-gen module per managed image:
//!
//! ```text
//! +0   const char*               moduleName
//! +8   uint32_t                  methodPointerCount
//! +16  const Il2CppMethodPointer* methodPointers
//! ```
//!
//! The record is found by locating the image name string in the file and then every 8-byte
//! aligned pointer to it. A candidate is accepted when its method pointer count matches the
//! image and its pointer array maps into the file.

use crate::{file::io::read_le, file::File, Result};

/// A validated code-gen module inside `GameAssembly.dll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeGenModule {
    /// File offset of the record
    pub offset: usize,
    /// Number of entries in the method pointer array
    pub method_pointer_count: u32,
    /// Virtual address of the method pointer array
    pub method_pointers: u64,
}

impl CodeGenModule {
    /// Locate the code-gen module of the image called `image_name` with `method_count` methods.
    ///
    /// Returns `None` if no candidate record validates.
    ///
    /// # Errors
    /// Returns an error only for address translation failures of accepted candidates.
    pub fn find(file: &File, image_name: &str, method_count: usize) -> Result<Option<Self>> {
        let mut needle = image_name.as_bytes().to_vec();
        needle.push(0);

        let data = file.data();
        let mut name_addresses = Vec::new();
        for (offset, window) in data.windows(needle.len()).enumerate() {
            if window != needle.as_slice() {
                continue;
            }

            // A match preceded by another character is the tail of a longer name
            if offset > 0 && data[offset - 1] != 0 {
                continue;
            }

            if let Ok(va) = file.offset_to_va(offset) {
                name_addresses.push(va);
            }
        }

        if name_addresses.is_empty() {
            return Ok(None);
        }

        for (index, chunk) in data.chunks_exact(8).enumerate() {
            let pointer = u64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]);
            if !name_addresses.contains(&pointer) {
                continue;
            }

            if let Some(module) = Self::validate(file, index * 8, method_count) {
                return Ok(Some(module));
            }
        }

        Ok(None)
    }

    fn validate(file: &File, offset: usize, method_count: usize) -> Option<Self> {
        let record = file.data_slice(offset, 24).ok()?;
        let method_pointer_count = read_le::<u32>(&record[8..]).ok()?;
        let method_pointers = read_le::<u64>(&record[16..]).ok()?;

        if method_pointer_count as usize != method_count || method_count == 0 {
            return None;
        }

        let array = file.va_to_offset(method_pointers).ok()?;
        file.data_slice(array, method_count * 8).ok()?;

        Some(CodeGenModule {
            offset,
            method_pointer_count,
            method_pointers,
        })
    }

    /// Entry address of the method with the 1-based image row `rid`; `None` for rows outside the
    /// array and methods without a body.
    ///
    /// # Errors
    /// Returns an error if the pointer array cannot be read.
    pub fn method_pointer(&self, file: &File, rid: u32) -> Result<Option<u64>> {
        if rid == 0 || rid > self.method_pointer_count {
            return Ok(None);
        }

        let array = file.va_to_offset(self.method_pointers)?;
        let entry = file.data_slice(array + (rid as usize - 1) * 8, 8)?;
        let pointer = read_le::<u64>(entry)?;

        Ok((pointer != 0).then_some(pointer))
    }
}
