//! Managed modules with just enough metadata to locate types, fields and methods.
//!
//! The module carries `Module`, `TypeDef`, `Field` and `MethodDef` tables with 2-byte indexes,
//! a `#Strings`, `#GUID` and `#Blob` heap and method bodies placed ahead of the metadata root in
//! a single `.text` section. Row ids follow insertion order after the `<Module>` type, so a type
//! created by `field` before any `method` call keeps its place.

use std::collections::HashMap;

use super::pe::{PeBuilder, FIRST_SECTION_RVA};

const CLI_HEADER_SIZE: usize = 72;
const IMAGE_BASE: u64 = 0x1000_0000;
const MODULE_NAME: &str = "Assembly-CSharp.dll";
const RUNTIME_VERSION: &[u8; 12] = b"v4.0.30319\0\0";

const FIELD_SIGNATURE: u16 = 1;
const METHOD_SIGNATURE: u16 = 4;
/// `FIELD I4` at 1, `HASTHIS 0 VOID` at 4
const BLOB_HEAP: [u8; 8] = [0x00, 0x02, 0x06, 0x08, 0x03, 0x20, 0x00, 0x01];
const MVID: [u8; 16] = [
    0x5D, 0x3B, 0x8E, 0x21, 0x7A, 0x4C, 0x41, 0x9F, 0xB2, 0x0D, 0x6E, 0x13, 0xC4, 0x58, 0x97, 0xA1,
];

/// A tiny method body (code shorter than 64 bytes)
pub fn tiny_body(code: &[u8]) -> Vec<u8> {
    assert!(code.len() < 64, "tiny bodies hold at most 63 bytes of code");

    let mut body = vec![((code.len() as u8) << 2) | 0x02];
    body.extend_from_slice(code);
    body
}

/// A fat method body with small exception sections.
///
/// Each clause is `[flags, try_offset, try_length, handler_offset, handler_length, class_token]`.
pub fn fat_body(code: &[u8], max_stack: u16, clauses: &[[u32; 6]]) -> Vec<u8> {
    let mut flags: u16 = 0x3003 | 0x0010;
    if !clauses.is_empty() {
        flags |= 0x0008;
    }

    let mut body = Vec::with_capacity(12 + code.len());
    body.extend_from_slice(&flags.to_le_bytes());
    body.extend_from_slice(&max_stack.to_le_bytes());
    body.extend_from_slice(&(code.len() as u32).to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(code);

    if !clauses.is_empty() {
        body.resize(body.len().next_multiple_of(4), 0);
        body.push(0x01);
        body.push((4 + clauses.len() * 12) as u8);
        body.extend_from_slice(&[0, 0]);

        for [flags, try_offset, try_length, handler_offset, handler_length, class] in clauses {
            body.extend_from_slice(&(*flags as u16).to_le_bytes());
            body.extend_from_slice(&(*try_offset as u16).to_le_bytes());
            body.push(*try_length as u8);
            body.extend_from_slice(&(*handler_offset as u16).to_le_bytes());
            body.push(*handler_length as u8);
            body.extend_from_slice(&class.to_le_bytes());
        }
    }

    body
}

fn is_fat(body: &[u8]) -> bool {
    body.first().is_some_and(|header| header & 0x03 == 0x03)
}

struct TypeEntry {
    namespace: String,
    name: String,
    fields: Vec<String>,
    methods: Vec<(String, Vec<u8>)>,
}

/// Builder for a managed module.
pub struct CilModuleBuilder {
    types: Vec<TypeEntry>,
}

impl Default for CilModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CilModuleBuilder {
    /// A module holding only the `<Module>` type
    pub fn new() -> Self {
        CilModuleBuilder {
            types: vec![TypeEntry {
                namespace: String::new(),
                name: "<Module>".to_string(),
                fields: Vec::new(),
                methods: Vec::new(),
            }],
        }
    }

    fn type_entry(&mut self, namespace: &str, name: &str) -> &mut TypeEntry {
        let index = match self
            .types
            .iter()
            .position(|entry| entry.namespace == namespace && entry.name == name)
        {
            Some(index) => index,
            None => {
                self.types.push(TypeEntry {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    fields: Vec::new(),
                    methods: Vec::new(),
                });
                self.types.len() - 1
            }
        };

        &mut self.types[index]
    }

    /// Declare a type without members
    pub fn type_def(mut self, namespace: &str, name: &str) -> Self {
        self.type_entry(namespace, name);
        self
    }

    /// Add an `int32` field to the class `class` in the global namespace
    pub fn field(mut self, class: &str, name: &str) -> Self {
        self.type_entry("", class).fields.push(name.to_string());
        self
    }

    /// Add a method whose body is `code`; tiny header below 64 bytes, fat above
    pub fn method(self, namespace: &str, class: &str, name: &str, code: &[u8]) -> Self {
        let body = if code.len() < 64 {
            tiny_body(code)
        } else {
            fat_body(code, 8, &[])
        };
        self.raw_method(namespace, class, name, body)
    }

    /// Add a method with a prebuilt body including its header
    pub fn raw_method(mut self, namespace: &str, class: &str, name: &str, body: Vec<u8>) -> Self {
        self.type_entry(namespace, class)
            .methods
            .push((name.to_string(), body));
        self
    }

    /// Produce the PE image
    pub fn build(self) -> Vec<u8> {
        let mut text = vec![0u8; CLI_HEADER_SIZE];

        let mut rvas = Vec::new();
        for (_, body) in self.types.iter().flat_map(|entry| &entry.methods) {
            if is_fat(body) {
                text.resize(text.len().next_multiple_of(4), 0);
            }
            rvas.push(FIRST_SECTION_RVA + text.len() as u32);
            text.extend_from_slice(body);
        }

        text.resize(text.len().next_multiple_of(4), 0);
        let metadata_rva = FIRST_SECTION_RVA + text.len() as u32;
        let metadata = self.metadata(&rvas);
        text.extend_from_slice(&metadata);

        put(&mut text, 0, &(CLI_HEADER_SIZE as u32).to_le_bytes());
        put(&mut text, 4, &2u16.to_le_bytes());
        put(&mut text, 6, &5u16.to_le_bytes());
        put(&mut text, 8, &metadata_rva.to_le_bytes());
        put(&mut text, 12, &(metadata.len() as u32).to_le_bytes());
        put(&mut text, 16, &1u32.to_le_bytes());

        PeBuilder::new(IMAGE_BASE)
            .section(".text", text)
            .clr(FIRST_SECTION_RVA, CLI_HEADER_SIZE as u32)
            .build()
    }

    fn metadata(&self, rvas: &[u32]) -> Vec<u8> {
        let mut strings = StringHeap::default();
        let tables = self.tables(rvas, &mut strings);

        let mut strings = strings.data;
        strings.resize(strings.len().next_multiple_of(4), 0);

        let streams: [(&[u8], &[u8]); 4] = [
            (b"#~\0\0", &tables),
            (b"#Strings\0\0\0\0", &strings),
            (b"#GUID\0\0\0", &MVID),
            (b"#Blob\0\0\0", &BLOB_HEAP),
        ];

        let header_size = 32 + streams
            .iter()
            .map(|(name, _)| 8 + name.len())
            .sum::<usize>();

        let mut root = Vec::new();
        root.extend_from_slice(b"BSJB");
        root.extend_from_slice(&1u16.to_le_bytes());
        root.extend_from_slice(&1u16.to_le_bytes());
        root.extend_from_slice(&0u32.to_le_bytes());
        root.extend_from_slice(&(RUNTIME_VERSION.len() as u32).to_le_bytes());
        root.extend_from_slice(RUNTIME_VERSION);
        root.extend_from_slice(&0u16.to_le_bytes());
        root.extend_from_slice(&(streams.len() as u16).to_le_bytes());

        let mut offset = header_size;
        for (name, data) in &streams {
            root.extend_from_slice(&(offset as u32).to_le_bytes());
            root.extend_from_slice(&(data.len() as u32).to_le_bytes());
            root.extend_from_slice(name);
            offset += data.len();
        }

        for (_, data) in &streams {
            root.extend_from_slice(data);
        }

        root
    }

    fn tables(&self, rvas: &[u32], strings: &mut StringHeap) -> Vec<u8> {
        let field_count: usize = self.types.iter().map(|entry| entry.fields.len()).sum();
        let method_count: usize = self.types.iter().map(|entry| entry.methods.len()).sum();

        let mut valid: u64 = (1 << 0x00) | (1 << 0x02);
        if field_count > 0 {
            valid |= 1 << 0x04;
        }
        if method_count > 0 {
            valid |= 1 << 0x06;
        }

        let mut tables = Vec::new();
        tables.extend_from_slice(&0u32.to_le_bytes());
        tables.extend_from_slice(&[2, 0, 0, 1]);
        tables.extend_from_slice(&valid.to_le_bytes());
        tables.extend_from_slice(&0u64.to_le_bytes());

        tables.extend_from_slice(&1u32.to_le_bytes());
        tables.extend_from_slice(&(self.types.len() as u32).to_le_bytes());
        if field_count > 0 {
            tables.extend_from_slice(&(field_count as u32).to_le_bytes());
        }
        if method_count > 0 {
            tables.extend_from_slice(&(method_count as u32).to_le_bytes());
        }

        // Module
        let name = strings.add(MODULE_NAME);
        for value in [0, name, 1, 0, 0] {
            tables.extend_from_slice(&value.to_le_bytes());
        }

        // TypeDef
        let mut field_list = 1u16;
        let mut method_list = 1u16;
        for (index, entry) in self.types.iter().enumerate() {
            let flags: u32 = if index == 0 { 0 } else { 0x0010_0001 };
            tables.extend_from_slice(&flags.to_le_bytes());
            tables.extend_from_slice(&strings.add(&entry.name).to_le_bytes());
            tables.extend_from_slice(&strings.add(&entry.namespace).to_le_bytes());
            tables.extend_from_slice(&0u16.to_le_bytes());
            tables.extend_from_slice(&field_list.to_le_bytes());
            tables.extend_from_slice(&method_list.to_le_bytes());

            field_list += entry.fields.len() as u16;
            method_list += entry.methods.len() as u16;
        }

        // Field
        for name in self.types.iter().flat_map(|entry| &entry.fields) {
            tables.extend_from_slice(&0x0001u16.to_le_bytes());
            tables.extend_from_slice(&strings.add(name).to_le_bytes());
            tables.extend_from_slice(&FIELD_SIGNATURE.to_le_bytes());
        }

        // MethodDef
        let methods = self.types.iter().flat_map(|entry| &entry.methods);
        for ((name, _), rva) in methods.zip(rvas) {
            tables.extend_from_slice(&rva.to_le_bytes());
            tables.extend_from_slice(&0u16.to_le_bytes());
            tables.extend_from_slice(&0x0086u16.to_le_bytes());
            tables.extend_from_slice(&strings.add(name).to_le_bytes());
            tables.extend_from_slice(&METHOD_SIGNATURE.to_le_bytes());
            tables.extend_from_slice(&1u16.to_le_bytes());
        }

        tables.resize(tables.len().next_multiple_of(4), 0);
        tables
    }
}

/// `#Strings` heap with deduplication; the empty string is index 0
struct StringHeap {
    data: Vec<u8>,
    indexes: HashMap<String, u16>,
}

impl Default for StringHeap {
    fn default() -> Self {
        let mut indexes = HashMap::new();
        indexes.insert(String::new(), 0);
        StringHeap {
            data: vec![0],
            indexes,
        }
    }
}

impl StringHeap {
    fn add(&mut self, value: &str) -> u16 {
        if let Some(index) = self.indexes.get(value) {
            return *index;
        }

        let index = self.data.len() as u16;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.indexes.insert(value.to_string(), index);
        index
    }
}

fn put(data: &mut [u8], offset: usize, bytes: &[u8]) {
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
}
