//! IL2CPP players: `global-metadata.dat`, `GameAssembly.dll` and the directory around them.
//!
//! Methods of one image get tokens `0x06000001..` in type order, which is also the order of
//! the image's method pointer array in the code module.

use std::path::Path;

use super::pe::{next_section_rva, PeBuilder, FIRST_SECTION_RVA};

const SANITY: u32 = 0xFAB1_1BAF;
const HEADER_SIZE: usize = 256;
const IMAGE_DEFINITION_SIZE: usize = 40;
const IMAGE_BASE: u64 = 0x1_8000_0000;
const CODEGEN_MODULE_SIZE: usize = 80;
const PLAYER_IMAGE: &str = "Assembly-CSharp.dll";

/// `(method size, token position, type size)` written for `version`
fn layout(version: u32) -> (usize, usize, usize) {
    match version {
        24 => (32, 20, 92),
        31 => (36, 24, 88),
        _ => (32, 20, 88),
    }
}

/// Builder for `global-metadata.dat`.
pub struct MetadataBuilder {
    version: u32,
    images: Vec<(String, Vec<(String, Vec<String>)>)>,
}

impl MetadataBuilder {
    /// Empty metadata of `version`; unknown versions use the version 29 layout
    pub fn new(version: u32) -> Self {
        MetadataBuilder {
            version,
            images: Vec::new(),
        }
    }

    /// Add an image with `(type name, method names)` entries
    pub fn image(mut self, name: &str, types: &[(&str, &[&str])]) -> Self {
        let types = types
            .iter()
            .map(|(name, methods)| {
                (
                    name.to_string(),
                    methods.iter().map(|method| method.to_string()).collect(),
                )
            })
            .collect();
        self.images.push((name.to_string(), types));
        self
    }

    /// Produce the file bytes
    pub fn build(self) -> Vec<u8> {
        let (method_size, token_position, type_size) = layout(self.version);

        let mut pool = vec![0u8];
        let mut intern = |value: &str| -> u32 {
            let index = pool.len() as u32;
            pool.extend_from_slice(value.as_bytes());
            pool.push(0);
            index
        };

        let mut methods = Vec::new();
        let mut types = Vec::new();
        let mut images = Vec::new();
        for (image_index, (image_name, image_types)) in self.images.iter().enumerate() {
            let mut image = vec![0u8; IMAGE_DEFINITION_SIZE];
            let type_start = types.len() / type_size;
            write_u32(&mut image, 0, intern(image_name));
            write_u32(&mut image, 4, image_index as u32);
            write_u32(&mut image, 8, type_start as u32);
            write_u32(&mut image, 12, image_types.len() as u32);
            images.extend_from_slice(&image);

            let mut rid = 0u32;
            for (type_name, type_methods) in image_types {
                let type_index = types.len() / type_size;
                let mut record = vec![0u8; type_size];
                write_u32(&mut record, 0, intern(type_name));
                write_u32(&mut record, 4, 0);
                types.extend_from_slice(&record);

                for method_name in type_methods {
                    rid += 1;
                    let mut record = vec![0u8; method_size];
                    write_u32(&mut record, 0, intern(method_name));
                    write_u32(&mut record, 4, type_index as u32);
                    write_u32(&mut record, token_position, 0x0600_0000 | rid);
                    methods.extend_from_slice(&record);
                }
            }
        }

        let mut data = vec![0u8; HEADER_SIZE];
        write_u32(&mut data, 0, SANITY);
        write_u32(&mut data, 4, self.version);

        for (header_offset, table) in [(24, &pool), (48, &methods), (160, &types), (168, &images)] {
            let start = data.len();
            write_u32(&mut data, header_offset, start as u32);
            write_u32(&mut data, header_offset + 4, table.len() as u32);
            data.extend_from_slice(table);
            data.resize(data.len().next_multiple_of(4), 0);
        }

        data
    }
}

/// Builder for `GameAssembly.dll`.
///
/// `.text` holds the method code, `.rdata` the image names, the method pointer arrays and one
/// code-gen module record per image.
pub struct GameAssemblyBuilder {
    images: Vec<(String, Vec<Vec<u8>>)>,
}

impl Default for GameAssemblyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GameAssemblyBuilder {
    /// A code module without images
    pub fn new() -> Self {
        GameAssemblyBuilder { images: Vec::new() }
    }

    /// Add an image whose methods have the given code; empty code means no method pointer
    pub fn image(mut self, name: &str, methods: &[Vec<u8>]) -> Self {
        self.images.push((name.to_string(), methods.to_vec()));
        self
    }

    /// Produce the file bytes and the entry address of every method, per image
    pub fn build(self) -> (Vec<u8>, Vec<Vec<u64>>) {
        let text_va = IMAGE_BASE + u64::from(FIRST_SECTION_RVA);

        let mut text = Vec::new();
        let mut entries = Vec::with_capacity(self.images.len());
        for (_, methods) in &self.images {
            let mut image_entries = Vec::with_capacity(methods.len());
            for code in methods {
                if code.is_empty() {
                    image_entries.push(0);
                    continue;
                }

                text.resize(text.len().next_multiple_of(16), 0xCC);
                image_entries.push(text_va + text.len() as u64);
                text.extend_from_slice(code);
            }
            entries.push(image_entries);
        }
        text.resize(text.len().next_multiple_of(16) + 16, 0xCC);

        let rdata_va = IMAGE_BASE + u64::from(next_section_rva(FIRST_SECTION_RVA, text.len()));
        let mut rdata = vec![0u8; 8];

        let mut names = Vec::with_capacity(self.images.len());
        for (name, _) in &self.images {
            names.push(rdata_va + rdata.len() as u64);
            rdata.extend_from_slice(name.as_bytes());
            rdata.push(0);
        }

        rdata.resize(rdata.len().next_multiple_of(8), 0);
        let mut arrays = Vec::with_capacity(self.images.len());
        for image_entries in &entries {
            arrays.push(rdata_va + rdata.len() as u64);
            for entry in image_entries {
                rdata.extend_from_slice(&entry.to_le_bytes());
            }
        }

        for ((name, array), (_, methods)) in names.iter().zip(&arrays).zip(&self.images) {
            let mut record = vec![0u8; CODEGEN_MODULE_SIZE];
            record[0..8].copy_from_slice(&name.to_le_bytes());
            record[8..12].copy_from_slice(&(methods.len() as u32).to_le_bytes());
            record[16..24].copy_from_slice(&array.to_le_bytes());
            rdata.extend_from_slice(&record);
        }

        let data = PeBuilder::new(IMAGE_BASE)
            .section(".text", text)
            .section(".rdata", rdata)
            .build();

        (data, entries)
    }
}

/// A built player with the entry address of every method.
pub struct Il2CppPlayer {
    /// `GameAssembly.dll`
    pub game_assembly: Vec<u8>,
    /// `global-metadata.dat`
    pub metadata: Vec<u8>,
    entries: Vec<(String, u64)>,
}

impl Il2CppPlayer {
    /// Entry address of the first method called `name`
    pub fn entry(&self, name: &str) -> u64 {
        self.entries
            .iter()
            .find(|(method, _)| method == name)
            .map(|(_, entry)| *entry)
            .unwrap_or_else(|| panic!("no method called {name}"))
    }
}

/// Builder for a player directory with `mscorlib.dll` and one game image.
pub struct Il2CppPlayerBuilder {
    version: u32,
    player: String,
    classes: Vec<(String, Vec<(String, Vec<u8>)>)>,
}

impl Default for Il2CppPlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Il2CppPlayerBuilder {
    /// A `Game.exe` player with version 29 metadata
    pub fn new() -> Self {
        Il2CppPlayerBuilder {
            version: 29,
            player: "Game".to_string(),
            classes: Vec::new(),
        }
    }

    /// Use `name` for the executable and its `_Data` directory
    pub fn player(mut self, name: &str) -> Self {
        self.player = name.to_string();
        self
    }

    /// Write metadata of `version`
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a method of the game image; classes keep the order of their first method
    pub fn method(mut self, class: &str, name: &str, code: Vec<u8>) -> Self {
        let index = match self.classes.iter().position(|(entry, _)| entry == class) {
            Some(index) => index,
            None => {
                self.classes.push((class.to_string(), Vec::new()));
                self.classes.len() - 1
            }
        };
        self.classes[index].1.push((name.to_string(), code));
        self
    }

    /// Produce the two player files
    pub fn build(&self) -> Il2CppPlayer {
        let types: Vec<(&str, Vec<&str>)> = self
            .classes
            .iter()
            .map(|(class, methods)| {
                (
                    class.as_str(),
                    methods.iter().map(|(name, _)| name.as_str()).collect(),
                )
            })
            .collect();
        let types: Vec<(&str, &[&str])> = types
            .iter()
            .map(|(class, methods)| (*class, methods.as_slice()))
            .collect();

        let metadata = MetadataBuilder::new(self.version)
            .image("mscorlib.dll", &[("Object", &["Finalize"])])
            .image(PLAYER_IMAGE, &types)
            .build();

        let code: Vec<Vec<u8>> = self
            .classes
            .iter()
            .flat_map(|(_, methods)| methods.iter().map(|(_, code)| code.clone()))
            .collect();
        let (game_assembly, entries) = GameAssemblyBuilder::new()
            .image("mscorlib.dll", &[vec![0xC3]])
            .image(PLAYER_IMAGE, &code)
            .build();

        let names = self
            .classes
            .iter()
            .flat_map(|(_, methods)| methods.iter().map(|(name, _)| name.clone()));
        let entries = names.zip(entries[1].iter().copied()).collect();

        Il2CppPlayer {
            game_assembly,
            metadata,
            entries,
        }
    }

    /// Write the player into `dir`
    pub fn write(&self, dir: &Path) -> Il2CppPlayer {
        let player = self.build();

        let metadata_dir = dir
            .join(format!("{}_Data", self.player))
            .join("il2cpp_data")
            .join("Metadata");
        std::fs::create_dir_all(&metadata_dir).unwrap();
        std::fs::write(dir.join(format!("{}.exe", self.player)), b"MZ").unwrap();
        std::fs::write(dir.join("GameAssembly.dll"), &player.game_assembly).unwrap();
        std::fs::write(metadata_dir.join("global-metadata.dat"), &player.metadata).unwrap();

        player
    }
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
