//! IL2CPP players: native code in `GameAssembly.dll` indexed by `global-metadata.dat`.
//!
//! # Key Components
//!
//! - [`Il2CppImage`] - The loaded code module plus its metadata, with method lookup by name
//! - [`GlobalMetadata`] - Method, type and image definitions
//! - [`CodeGenModule`] - Per-image method pointer arrays inside `GameAssembly.dll`
//! - [`PlayerLayout`] - Where the files of a player live
//!
//! # Example
//!
//! ```rust,no_run
//! use pinpatch::il2cpp::Il2CppImage;
//! use std::path::Path;
//!
//! let image = Il2CppImage::open(Path::new("C:/Games/Example"))?;
//! if let Some(method) = image.find_method("GMC", "IsMSC")? {
//!     println!("{}.{} at {:#x}", method.class, method.name, method.entry);
//! }
//! # Ok::<(), pinpatch::Error>(())
//! ```

mod codegen;
mod layout;
mod metadata;

pub use codegen::CodeGenModule;
pub use layout::{PlayerLayout, DEFAULT_PLAYER, GAME_ASSEMBLY};
pub use metadata::{GlobalMetadata, ImageDefinition, MethodDefinition, METADATA_SANITY};

use std::path::{Path, PathBuf};

use crate::{file::File, Error::NotSupported, Result};

/// A method resolved to native code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMethod {
    /// Declaring class, nested separators normalised to `.`
    pub class: String,
    /// Method name
    pub name: String,
    /// Metadata token
    pub token: u32,
    /// Virtual address of the first instruction
    pub entry: u64,
    /// File offset of the first instruction
    pub file_offset: usize,
}

/// A loaded IL2CPP player.
pub struct Il2CppImage {
    layout: PlayerLayout,
    file: File,
    metadata: GlobalMetadata,
}

impl Il2CppImage {
    /// Load the player in `dir`.
    ///
    /// # Errors
    /// - [`crate::Error::NotSupported`] if `dir` is not a player directory, `GameAssembly.dll`
    ///   is not PE32+ or the metadata version is unknown
    /// - [`crate::Error::FileError`] if a file cannot be read
    /// - parse errors of either file
    pub fn open(dir: &Path) -> Result<Il2CppImage> {
        let Some(layout) = PlayerLayout::locate(dir) else {
            return Err(NotSupported);
        };

        let file = File::from_file(&layout.game_assembly)?;
        if !file.is_64bit() {
            return Err(NotSupported);
        }

        let metadata = GlobalMetadata::from_mem(std::fs::read(&layout.metadata)?)?;

        Ok(Il2CppImage {
            layout,
            file,
            metadata,
        })
    }

    /// Build an image from already loaded parts.
    ///
    /// # Errors
    /// Returns parse errors of either buffer and [`crate::Error::NotSupported`] for 32-bit code.
    pub fn from_parts(layout: PlayerLayout, code: Vec<u8>, metadata: Vec<u8>) -> Result<Self> {
        let file = File::from_mem(code)?;
        if !file.is_64bit() {
            return Err(NotSupported);
        }

        Ok(Il2CppImage {
            layout,
            file,
            metadata: GlobalMetadata::from_mem(metadata)?,
        })
    }

    /// The player files
    #[must_use]
    pub fn layout(&self) -> &PlayerLayout {
        &self.layout
    }

    /// Path of `GameAssembly.dll`, the file a patch rewrites
    #[must_use]
    pub fn module_path(&self) -> &PathBuf {
        &self.layout.game_assembly
    }

    /// The parsed metadata
    #[must_use]
    pub fn metadata(&self) -> &GlobalMetadata {
        &self.metadata
    }

    /// The code module
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The code module bytes, including any patches applied so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.file.data()
    }

    /// Find `class.method` and resolve its entry point.
    ///
    /// Returns `None` if no such method exists, its image has no code-gen module or it has no
    /// native body.
    ///
    /// # Errors
    /// Returns an error if the metadata or the code module is damaged.
    pub fn find_method(&self, class: &str, method: &str) -> Result<Option<NativeMethod>> {
        let Some(definition) = self.metadata.find_method(class, method)? else {
            return Ok(None);
        };

        let Some(image) = self.metadata.image_of_type(definition.declaring_type)? else {
            return Ok(None);
        };

        let method_count = self.metadata.image_method_count(&image)?;
        let Some(module) = CodeGenModule::find(&self.file, &image.name, method_count)? else {
            return Ok(None);
        };

        let Some(entry) = module.method_pointer(&self.file, definition.token & 0x00FF_FFFF)? else {
            return Ok(None);
        };

        Ok(Some(NativeMethod {
            class: self.metadata.type_name(definition.declaring_type)?,
            name: definition.name,
            token: definition.token,
            entry,
            file_offset: self.file.va_to_offset(entry)?,
        }))
    }

    /// Overwrite one byte of the code module.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` is outside the file.
    pub fn write_byte(&mut self, offset: usize, value: u8) -> Result<()> {
        let Some(byte) = self.file.data_mut().get_mut(offset) else {
            return Err(out_of_bounds_error!());
        };

        *byte = value;
        Ok(())
    }

    /// Consume the image and return the code module bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.file.into_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::Il2CppPlayerBuilder;

    #[test]
    fn resolve_method() {
        let dir = tempfile::tempdir().unwrap();
        let player = Il2CppPlayerBuilder::new()
            .method("Object", "ToString", vec![0xC3])
            .method("GMC", "Awake", vec![0x90, 0xC3])
            .method("GMC", "IsMSC", vec![0x48, 0x89, 0x5C, 0x24, 0x08, 0xC3])
            .write(dir.path());

        let image = Il2CppImage::open(dir.path()).unwrap();
        assert_eq!(image.module_path(), &dir.path().join(GAME_ASSEMBLY));

        let method = image.find_method("GMC", "IsMSC").unwrap().unwrap();
        assert_eq!(method.entry, player.entry("IsMSC"));
        assert_eq!(
            &image.data()[method.file_offset..method.file_offset + 6],
            &[0x48, 0x89, 0x5C, 0x24, 0x08, 0xC3]
        );

        assert!(image.find_method("GMC", "SetMSC").unwrap().is_none());
        assert!(image.find_method("TM", "IsMSC").unwrap().is_none());
    }

    #[test]
    fn write_byte() {
        let dir = tempfile::tempdir().unwrap();
        Il2CppPlayerBuilder::new()
            .method("GMC", "IsMSC", vec![0x84, 0xC0, 0xC3])
            .write(dir.path());

        let mut image = Il2CppImage::open(dir.path()).unwrap();
        let method = image.find_method("GMC", "IsMSC").unwrap().unwrap();
        let before = image.data().to_vec();

        image.write_byte(method.file_offset, 0x30).unwrap();
        let after = image.into_data();

        assert_eq!(before.len(), after.len());
        let changed: Vec<usize> = (0..before.len()).filter(|&i| before[i] != after[i]).collect();
        assert_eq!(changed, vec![method.file_offset]);
    }

    #[test]
    fn not_a_player() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Il2CppImage::open(dir.path()), Err(NotSupported)));
    }
}
