//! Owned PE image access.
//!
//! [`File`] keeps the complete bytes of a PE image in memory together with the parts of the
//! headers that the rest of the crate needs: image base, bitness, the CLI header directory and
//! the section table. Both module representations build on it: the managed side reads its CLI
//! metadata through it, the native side uses it to translate `GameAssembly.dll` virtual
//! addresses into file offsets.
//!
//! The buffer is owned and mutable so a patch can be applied in place and the result written
//! out verbatim; all other bytes stay exactly as they were read.
//!
//! # Example
//!
//! ```rust,no_run
//! use pinpatch::file::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("GameAssembly.dll"))?;
//! let offset = file.va_to_offset(file.imagebase() + 0x1000)?;
//! println!("first code byte: {:02x}", file.data()[offset]);
//! # Ok::<(), pinpatch::Error>(())
//! ```

pub mod io;
pub mod parser;

use std::path::Path;

use goblin::pe::{section_table::SectionTable, PE};

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};

/// An in-memory PE image with its parsed section table.
pub struct File {
    data: Vec<u8>,
    image_base: u64,
    is_64bit: bool,
    clr: Option<(u32, u32)>,
    sections: Vec<SectionTable>,
}

impl File {
    /// Read and parse a PE image from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, [`crate::Error::Empty`]
    /// for an empty file and [`crate::Error::GoblinErr`] if it is not a PE image.
    pub fn from_file(file: &Path) -> Result<File> {
        let data = std::fs::read(file)?;

        Self::from_mem(data)
    }

    /// Parse a PE image from an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer and [`crate::Error::GoblinErr`] or
    /// [`crate::Error::Malformed`] if the headers do not parse.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        if data.is_empty() {
            return Err(Empty);
        }

        let (image_base, is_64bit, clr, sections) = {
            let pe = PE::parse(&data).map_err(GoblinErr)?;
            let Some(optional_header) = pe.header.optional_header else {
                return Err(malformed_error!("File does not have an OptionalHeader"));
            };

            let clr = optional_header
                .data_directories
                .get_clr_runtime_header()
                .filter(|dir| dir.virtual_address != 0 && dir.size != 0)
                .map(|dir| (dir.virtual_address, dir.size));

            (pe.image_base, pe.is_64, clr, pe.sections.clone())
        };

        Ok(File {
            data,
            image_base,
            is_64bit,
            clr,
            sections,
        })
    }

    /// Length of the image in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the image has no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The preferred load address from the optional header
    #[must_use]
    pub fn imagebase(&self) -> u64 {
        self.image_base
    }

    /// Returns true for a PE32+ image
    #[must_use]
    pub fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    /// RVA and size of the CLI header, if the image carries managed code
    #[must_use]
    pub fn clr(&self) -> Option<(usize, usize)> {
        self.clr.map(|(rva, size)| (rva as usize, size as usize))
    }

    /// The section table
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.sections.iter()
    }

    /// The complete image
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The complete image, writable. The length cannot change through this view.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Borrow `len` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range is not inside the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(out_of_bounds_error!())?;
        self.data.get(offset..end).ok_or(out_of_bounds_error!())
    }

    /// Translate a virtual address into a file offset.
    ///
    /// # Errors
    /// Returns an error if the address is below the image base or not backed by file data.
    pub fn va_to_offset(&self, va: u64) -> Result<usize> {
        let Some(rva) = va.checked_sub(self.image_base) else {
            return Err(out_of_bounds_error!());
        };

        let rva = usize::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in usize: {}", rva))?;
        self.rva_to_offset(rva)
    }

    /// Translate a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section maps the address to file data.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 = u32::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        for section in &self.sections {
            let span = if section.virtual_size == 0 {
                section.size_of_raw_data
            } else {
                section.virtual_size
            };
            let Some(section_max) = section.virtual_address.checked_add(span) else {
                return Err(malformed_error!(
                    "Section malformed, causing integer overflow - {} + {}",
                    section.virtual_address,
                    span
                ));
            };

            if section.virtual_address <= rva_u32 && rva_u32 < section_max {
                let delta = rva_u32 - section.virtual_address;
                if delta >= section.size_of_raw_data {
                    break;
                }

                return Ok(section.pointer_to_raw_data as usize + delta as usize);
            }
        }

        Err(malformed_error!(
            "RVA could not be converted to offset - {}",
            rva
        ))
    }

    /// Translate a file offset into a relative virtual address.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the offset is not inside any section's file data.
    pub fn offset_to_rva(&self, offset: usize) -> Result<usize> {
        let offset_u32 = u32::try_from(offset)
            .map_err(|_| malformed_error!("Offset too large to fit in u32: {}", offset))?;

        for section in &self.sections {
            let Some(section_max) = section
                .pointer_to_raw_data
                .checked_add(section.size_of_raw_data)
            else {
                return Err(malformed_error!(
                    "Section malformed, causing integer overflow - {} + {}",
                    section.pointer_to_raw_data,
                    section.size_of_raw_data
                ));
            };

            if section.pointer_to_raw_data <= offset_u32 && offset_u32 < section_max {
                return Ok((offset - section.pointer_to_raw_data as usize)
                    + section.virtual_address as usize);
            }
        }

        Err(malformed_error!(
            "Offset could not be converted to RVA - {}",
            offset
        ))
    }

    /// Translate a file offset into a virtual address.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the offset is not inside any section's file data or
    /// the address does not fit in 64 bits.
    pub fn offset_to_va(&self, offset: usize) -> Result<u64> {
        let rva = self.offset_to_rva(offset)?;
        self.image_base.checked_add(rva as u64).ok_or_else(|| {
            malformed_error!(
                "Virtual address overflows - base {:#x}, RVA {:#x}",
                self.image_base,
                rva
            )
        })
    }

    /// Consume the image and return its bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
