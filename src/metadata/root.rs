//! The metadata root (ECMA-335 II.24.2.1): signature, version string and the stream directory.

use crate::{
    file::parser::Parser,
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Signature of the metadata root, `BSJB`
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The parsed metadata root.
pub struct Root {
    /// Always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Runtime version string, for example `v4.0.30319`
    pub version: String,
    /// Reserved, 0
    pub flags: u16,
    /// One header per metadata stream, in file order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root from the start of the metadata directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong signature or a bad stream directory and
    /// [`crate::Error::OutOfBounds`] when a stream lies outside `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);
        let signature = parser.read_le::<u32>()?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let major_version = parser.read_le::<u16>()?;
        let minor_version = parser.read_le::<u16>()?;
        let _reserved = parser.read_le::<u32>()?;

        let version_string_length = parser.read_le::<u32>()? as usize;
        let version_bytes = parser.read_bytes(version_string_length)?;
        let version = String::from_utf8_lossy(version_bytes)
            .trim_end_matches('\0')
            .to_string();

        let flags = parser.read_le::<u16>()?;
        let stream_count = parser.read_le::<u16>()?;
        if stream_count == 0 || usize::from(stream_count) * 9 > parser.remaining() {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            let header = StreamHeader::read(&mut parser)?;

            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            if stream_headers
                .iter()
                .any(|known: &StreamHeader| known.name == header.name)
            {
                return Err(malformed_error!("Duplicate stream - {}", header.name));
            }

            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            version,
            flags,
            stream_headers,
        })
    }

    /// Find a stream header by name
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x42, 0x53, 0x4A, 0x42,
            0x01, 0x00,
            0x01, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
            b'v', b'4', b'.', b'0', 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
            0x02, 0x00,
            // #~
            0x3C, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            b'#', b'~', 0x00, 0x00,
            // #Strings
            0x40, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            b'#', b'S', b't', b'r', b'i', b'n', b'g', b's', 0x00, 0x00, 0x00, 0x00,
            // stream data
            0x00, 0x00, 0x00, 0x00,
            0x00, b'a', 0x00, 0x00,
        ];

        let root = Root::read(&header_bytes).unwrap();
        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.version, "v4.0");
        assert_eq!(root.stream_headers.len(), 2);

        let strings = root.stream("#Strings").unwrap();
        assert_eq!(strings.offset, 0x40);
        assert_eq!(strings.size, 4);
        assert!(root.stream("#Blob").is_none());
    }

    #[test]
    fn crafted_invalid() {
        let mut header_bytes = [0u8; 40];
        header_bytes[..4].copy_from_slice(&[0x42, 0x53, 0x4A, 0x43]);
        assert!(Root::read(&header_bytes).is_err());

        assert!(matches!(Root::read(&[0x42, 0x53, 0x4A, 0x42]), Err(OutOfBounds)));
    }
}
