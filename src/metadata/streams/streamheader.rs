use crate::{file::parser::Parser, Result};

/// Stream names accepted in the metadata root.
const STREAM_NAMES: [&str; 7] = ["#Strings", "#US", "#Blob", "#GUID", "#~", "#-", "#Pdb"];

/// The header of a stream: location relative to the metadata root, size and name.
pub struct StreamHeader {
    /// Offset from the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name, for example `#~`
    pub name: String,
}

impl StreamHeader {
    /// Read one stream header and skip the padding after its name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown stream name and
    /// [`crate::Error::OutOfBounds`] for truncated input.
    pub fn read(parser: &mut Parser) -> Result<StreamHeader> {
        let offset = parser.read_le::<u32>()?;
        let size = parser.read_le::<u32>()?;

        let name_start = parser.pos();
        let name = parser.read_string_utf8()?;
        if !STREAM_NAMES.contains(&name.as_str()) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        let name_aligned = ((name.len() + 1) + 3) & !3;
        parser.seek(name_start + name_aligned)?;

        Ok(StreamHeader { offset, size, name })
    }
}
