//! Minimal PE32+ images.
//!
//! Layout: headers in the first 0x200 bytes, the first section at RVA 0x1000 and file offset
//! 0x200, every following section at the next 0x1000 boundary in memory and the next 0x200
//! boundary in the file.

/// File alignment of raw section data
pub const FILE_ALIGNMENT: u32 = 0x200;
/// Memory alignment of sections
pub const SECTION_ALIGNMENT: u32 = 0x1000;
/// Size of all headers, which is also the file offset of the first section
pub const HEADERS_SIZE: u32 = 0x200;
/// RVA of the first section
pub const FIRST_SECTION_RVA: u32 = 0x1000;

const PE_OFFSET: usize = 0x80;
const OPTIONAL_HEADER_SIZE: usize = 0xF0;
const CLR_DIRECTORY: usize = 14;

/// Round `value` up to a multiple of `alignment`
pub fn align(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// RVA of the section that follows a section at `rva` holding `len` bytes
pub fn next_section_rva(rva: u32, len: usize) -> u32 {
    align(rva + (len.max(1) as u32), SECTION_ALIGNMENT)
}

struct Section {
    name: [u8; 8],
    data: Vec<u8>,
    characteristics: u32,
}

/// Builder for a PE32+ image.
pub struct PeBuilder {
    image_base: u64,
    sections: Vec<Section>,
    clr: Option<(u32, u32)>,
}

impl PeBuilder {
    /// An image without sections loaded at `image_base`
    pub fn new(image_base: u64) -> Self {
        PeBuilder {
            image_base,
            sections: Vec::new(),
            clr: None,
        }
    }

    /// Append a section; `.text` is marked as code, everything else as read-only data
    pub fn section(mut self, name: &str, data: Vec<u8>) -> Self {
        let mut raw_name = [0u8; 8];
        for (target, source) in raw_name.iter_mut().zip(name.bytes()) {
            *target = source;
        }

        let characteristics = if name == ".text" {
            0x6000_0020
        } else {
            0x4000_0040
        };

        self.sections.push(Section {
            name: raw_name,
            data,
            characteristics,
        });
        self
    }

    /// Point the CLI header directory at `rva`
    pub fn clr(mut self, rva: u32, size: u32) -> Self {
        self.clr = Some((rva, size));
        self
    }

    /// Produce the image bytes
    pub fn build(self) -> Vec<u8> {
        assert!(self.sections.len() <= 3, "headers only have room for 3 sections");

        let mut layout = Vec::with_capacity(self.sections.len());
        let mut rva = FIRST_SECTION_RVA;
        let mut raw = HEADERS_SIZE;
        for section in &self.sections {
            let raw_size = align(section.data.len() as u32, FILE_ALIGNMENT);
            layout.push((rva, raw, raw_size));
            rva = next_section_rva(rva, section.data.len());
            raw += raw_size;
        }
        let size_of_image = rva;

        let mut image = vec![0u8; HEADERS_SIZE as usize];
        image[0..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3C, PE_OFFSET as u32);

        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let coff = PE_OFFSET + 4;
        put_u16(&mut image, coff, 0x8664);
        put_u16(&mut image, coff + 2, self.sections.len() as u16);
        put_u16(&mut image, coff + 16, OPTIONAL_HEADER_SIZE as u16);
        put_u16(&mut image, coff + 18, 0x2022);

        let optional = coff + 20;
        let code_size: u32 = self
            .sections
            .iter()
            .zip(&layout)
            .filter(|(section, _)| section.characteristics & 0x20 != 0)
            .map(|(_, (_, _, raw_size))| *raw_size)
            .sum();
        put_u16(&mut image, optional, 0x20B);
        image[optional + 2] = 14;
        put_u32(&mut image, optional + 4, code_size);
        put_u32(&mut image, optional + 20, FIRST_SECTION_RVA);
        put_u64(&mut image, optional + 24, self.image_base);
        put_u32(&mut image, optional + 32, SECTION_ALIGNMENT);
        put_u32(&mut image, optional + 36, FILE_ALIGNMENT);
        put_u16(&mut image, optional + 40, 6);
        put_u16(&mut image, optional + 48, 6);
        put_u32(&mut image, optional + 56, size_of_image);
        put_u32(&mut image, optional + 60, HEADERS_SIZE);
        put_u16(&mut image, optional + 68, 3);
        put_u16(&mut image, optional + 70, 0x8160);
        put_u64(&mut image, optional + 72, 0x10_0000);
        put_u64(&mut image, optional + 80, 0x1000);
        put_u64(&mut image, optional + 88, 0x10_0000);
        put_u64(&mut image, optional + 96, 0x1000);
        put_u32(&mut image, optional + 108, 16);

        if let Some((rva, size)) = self.clr {
            let directory = optional + 112 + CLR_DIRECTORY * 8;
            put_u32(&mut image, directory, rva);
            put_u32(&mut image, directory + 4, size);
        }

        let mut header = optional + OPTIONAL_HEADER_SIZE;
        for (section, (rva, raw, raw_size)) in self.sections.iter().zip(&layout) {
            image[header..header + 8].copy_from_slice(&section.name);
            put_u32(&mut image, header + 8, section.data.len() as u32);
            put_u32(&mut image, header + 12, *rva);
            put_u32(&mut image, header + 16, *raw_size);
            put_u32(&mut image, header + 20, *raw);
            put_u32(&mut image, header + 36, section.characteristics);
            header += 40;
        }

        for (section, (_, _, raw_size)) in self.sections.iter().zip(&layout) {
            let start = image.len();
            image.extend_from_slice(&section.data);
            image.resize(start + *raw_size as usize, 0);
        }

        image
    }
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
