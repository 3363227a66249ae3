//! `global-metadata.dat`: the name index of an IL2CPP player.
//!
//! Only the header, the string pool, the method definitions, the type definitions (for their
//! names) and the image definitions are read. Record layouts differ between metadata versions;
//! the supported versions are 24 (with the 24.2 header), 27, 29 and 31.

use crate::{
    file::io::{read_le, read_le_at},
    Error::NotSupported,
    Result,
};

/// Magic number at the start of every `global-metadata.dat`
pub const METADATA_SANITY: u32 = 0xFAB1_1BAF;

const STRINGS_OFFSET: usize = 24;
const METHODS_OFFSET: usize = 48;
const TYPE_DEFINITIONS_OFFSET: usize = 160;
const IMAGES_OFFSET: usize = 168;

const IMAGE_DEFINITION_SIZE: usize = 40;

/// Record sizes and field positions of one metadata version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    method_size: usize,
    method_declaring_type: usize,
    method_token: usize,
    type_size: usize,
}

impl Layout {
    fn for_version(version: u32) -> Option<Layout> {
        match version {
            24 => Some(Layout {
                method_size: 32,
                method_declaring_type: 4,
                method_token: 20,
                type_size: 92,
            }),
            27 | 29 => Some(Layout {
                method_size: 32,
                method_declaring_type: 4,
                method_token: 20,
                type_size: 88,
            }),
            31 => Some(Layout {
                method_size: 36,
                method_declaring_type: 4,
                method_token: 24,
                type_size: 88,
            }),
            _ => None,
        }
    }
}

/// A method definition with its names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefinition {
    /// Index into the method definition table
    pub index: usize,
    /// Method name
    pub name: String,
    /// Index of the declaring type definition
    pub declaring_type: usize,
    /// Metadata token, `0x06xxxxxx`; the low 24 bits are the row inside its image
    pub token: u32,
}

/// An image (assembly module) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefinition {
    /// File name, for example `Assembly-CSharp.dll`
    pub name: String,
    /// First type definition owned by the image
    pub type_start: usize,
    /// Number of type definitions owned by the image
    pub type_count: usize,
}

impl ImageDefinition {
    /// Returns true if the type definition `index` belongs to this image
    #[must_use]
    pub fn contains_type(&self, index: usize) -> bool {
        index >= self.type_start && index - self.type_start < self.type_count
    }
}

/// A parsed `global-metadata.dat`.
pub struct GlobalMetadata {
    data: Vec<u8>,
    version: u32,
    layout: Layout,
    strings: (usize, usize),
    methods: (usize, usize),
    types: (usize, usize),
    images: (usize, usize),
}

impl GlobalMetadata {
    /// Parse the metadata header and validate the table ranges.
    ///
    /// # Errors
    /// - [`crate::Error::Malformed`] for a wrong magic number or tables outside the file
    /// - [`crate::Error::NotSupported`] for a metadata version without a known layout
    pub fn from_mem(data: Vec<u8>) -> Result<GlobalMetadata> {
        if data.len() < IMAGES_OFFSET + 8 {
            return Err(out_of_bounds_error!());
        }

        let sanity = read_le::<u32>(&data)?;
        if sanity != METADATA_SANITY {
            return Err(malformed_error!(
                "Invalid metadata magic - {:#010x}",
                sanity
            ));
        }

        let version = read_le::<u32>(&data[4..])?;
        let Some(layout) = Layout::for_version(version) else {
            return Err(NotSupported);
        };

        let range = |offset: usize| -> Result<(usize, usize)> {
            let mut cursor = offset;
            let start = read_le_at::<u32>(&data, &mut cursor)? as usize;
            let size = read_le_at::<u32>(&data, &mut cursor)? as usize;

            match start.checked_add(size) {
                Some(end) if end <= data.len() => Ok((start, size)),
                _ => Err(malformed_error!(
                    "Metadata table at header offset {} is outside the file",
                    offset
                )),
            }
        };

        let strings = range(STRINGS_OFFSET)?;
        let methods = range(METHODS_OFFSET)?;
        let types = range(TYPE_DEFINITIONS_OFFSET)?;
        let images = range(IMAGES_OFFSET)?;

        Ok(GlobalMetadata {
            data,
            version,
            layout,
            strings,
            methods,
            types,
            images,
        })
    }

    /// The metadata version from the header
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of method definitions
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.1 / self.layout.method_size
    }

    /// Number of type definitions
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.1 / self.layout.type_size
    }

    /// Number of image definitions
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.1 / IMAGE_DEFINITION_SIZE
    }

    /// Read a NUL-terminated identifier from the string pool.
    ///
    /// # Errors
    /// Returns an error if `index` is outside the pool, the string is unterminated or not UTF-8.
    pub fn string(&self, index: usize) -> Result<&str> {
        let (start, size) = self.strings;
        if index >= size {
            return Err(out_of_bounds_error!());
        }

        let pool = &self.data[start + index..start + size];
        let Some(len) = pool.iter().position(|&b| b == 0) else {
            return Err(malformed_error!("Unterminated metadata string at {}", index));
        };

        std::str::from_utf8(&pool[..len])
            .map_err(|_| malformed_error!("Invalid UTF-8 in metadata string at {}", index))
    }

    /// Read the method definition at `index`.
    ///
    /// # Errors
    /// Returns an error if the record or its name is damaged.
    pub fn method(&self, index: usize) -> Result<MethodDefinition> {
        let record = self.record(self.methods, self.layout.method_size, index)?;

        let name = read_le::<u32>(record)? as usize;
        let declaring_type = read_le::<i32>(&record[self.layout.method_declaring_type..])?;
        let token = read_le::<u32>(&record[self.layout.method_token..])?;

        let Ok(declaring_type) = usize::try_from(declaring_type) else {
            return Err(malformed_error!(
                "Method {} has no declaring type - {}",
                index,
                declaring_type
            ));
        };

        Ok(MethodDefinition {
            index,
            name: self.string(name)?.to_string(),
            declaring_type,
            token,
        })
    }

    /// All method definitions, in table order
    pub fn methods(&self) -> impl Iterator<Item = Result<MethodDefinition>> + '_ {
        (0..self.method_count()).map(move |index| self.method(index))
    }

    /// Name of the type definition at `index`, with nested type separators (`+`) replaced by `.`.
    ///
    /// # Errors
    /// Returns an error if the record or its name is damaged.
    pub fn type_name(&self, index: usize) -> Result<String> {
        let record = self.record(self.types, self.layout.type_size, index)?;
        let name = read_le::<u32>(record)? as usize;

        Ok(self.string(name)?.replace('+', "."))
    }

    /// Read the image definition at `index`.
    ///
    /// # Errors
    /// Returns an error if the record or its name is damaged.
    pub fn image(&self, index: usize) -> Result<ImageDefinition> {
        let record = self.record(self.images, IMAGE_DEFINITION_SIZE, index)?;

        let mut cursor = 0;
        let name = read_le_at::<u32>(record, &mut cursor)? as usize;
        let _assembly = read_le_at::<u32>(record, &mut cursor)?;
        let type_start = read_le_at::<u32>(record, &mut cursor)? as usize;
        let type_count = read_le_at::<u32>(record, &mut cursor)? as usize;

        Ok(ImageDefinition {
            name: self.string(name)?.to_string(),
            type_start,
            type_count,
        })
    }

    /// The image that owns the type definition `type_index`.
    ///
    /// # Errors
    /// Returns an error if an image record is damaged.
    pub fn image_of_type(&self, type_index: usize) -> Result<Option<ImageDefinition>> {
        for index in 0..self.image_count() {
            let image = self.image(index)?;
            if image.contains_type(type_index) {
                return Ok(Some(image));
            }
        }

        Ok(None)
    }

    /// Number of methods declared by the types of `image`.
    ///
    /// This equals the method pointer count of the image's code-gen module.
    ///
    /// # Errors
    /// Returns an error if a method record is damaged.
    pub fn image_method_count(&self, image: &ImageDefinition) -> Result<usize> {
        let mut count = 0;
        for method in self.methods() {
            if image.contains_type(method?.declaring_type) {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Find the first method called `method` declared by a type called `class`.
    ///
    /// `class` is compared after replacing `+` with `.` on both sides.
    ///
    /// # Errors
    /// Returns an error if a method or type record is damaged.
    pub fn find_method(&self, class: &str, method: &str) -> Result<Option<MethodDefinition>> {
        let class = class.replace('+', ".");

        for candidate in self.methods() {
            let candidate = candidate?;
            if candidate.name != method {
                continue;
            }

            if self.type_name(candidate.declaring_type)? == class {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn record(&self, table: (usize, usize), size: usize, index: usize) -> Result<&[u8]> {
        let (start, len) = table;
        if index >= len / size {
            return Err(out_of_bounds_error!());
        }

        let offset = start + index * size;
        Ok(&self.data[offset..offset + size])
    }
}
