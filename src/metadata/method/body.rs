//! Parsing and re-encoding of CIL method bodies.
//!
//! A body starts with a tiny (1 byte) or fat (12 byte) header, followed by the code and, for fat
//! headers, optional 4-byte aligned data sections carrying exception clauses. [`MethodBody`]
//! records the header fields, the clauses and the number of bytes the whole body occupies in the
//! file, which is the space a re-encoded body may use.
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Method Header Format

use crate::{
    file::io::{read_le, read_le_at},
    metadata::method::{
        encode_exception_handlers, ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags,
        SectionFlags,
    },
    Error::OutOfBounds,
    Result,
};

/// The parsed header and exception clauses of one method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Size of the method (length of all instructions, not counting the header) in bytes
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// Bytes from the header start to the end of the last data section
    pub size_slot: usize,
    /// `MetaData` token for a signature describing the layout of the local variables for the method. 0 == no local variables
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// Flag, indicating the type of the method header
    pub is_fat: bool,
    /// Flag, indicating to call default constructor on all local variables
    pub is_init_local: bool,
    /// A list of exception handlers this method has
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Parse a method body from `data`, which starts at the body's header.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown header kind or a damaged data section,
    /// and [`crate::Error::OutOfBounds`] if the body runs past `data`.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_0000_0011_u8)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    size_slot: size_code + 1,
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    exception_handlers: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = usize::from(first_duo >> 12) * 4;
                if size_header < 12 {
                    return Err(malformed_error!("Fat header size too small - {}", size_header));
                }

                let max_stack = usize::from(read_le::<u16>(&data[2..])?);
                let size_code = read_le::<u32>(&data[4..])? as usize;
                let local_var_sig_token = read_le::<u32>(&data[8..])?;
                let flags_header =
                    MethodBodyFlags::from_bits_truncate(first_duo & 0b_0000_1111_1111_1111_u16);

                let code_end = size_header
                    .checked_add(size_code)
                    .ok_or(OutOfBounds)?;
                if data.len() < code_end {
                    return Err(OutOfBounds);
                }

                let mut size_slot = code_end;
                let mut exception_handlers = Vec::new();
                if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
                    size_slot = read_sections(data, code_end, &mut exception_handlers)?;
                }

                Ok(MethodBody {
                    size_code,
                    size_header,
                    size_slot,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Get the size of header and code
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }

    /// The code bytes of this body inside `data`, the same slice given to [`MethodBody::from`]
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the body.
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        data.get(self.size_header..self.size())
            .ok_or(OutOfBounds)
    }

    /// Encode a body with this body's header settings around new `code` and `handlers`.
    ///
    /// A tiny body stays tiny while the code is shorter than 64 bytes and there are no clauses;
    /// everything else gets a fat header. Exception clauses follow the code, 4-byte aligned
    /// relative to the body start.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the code is larger than a fat header can describe.
    pub fn encode(&self, code: &[u8], handlers: &[ExceptionHandler]) -> Result<Vec<u8>> {
        let stays_tiny = !self.is_fat
            && code.len() < 64
            && handlers.is_empty()
            && self.max_stack <= 8
            && self.local_var_sig_token == 0;

        if stays_tiny {
            let mut body = Vec::with_capacity(code.len() + 1);
            body.push(((code.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            body.extend_from_slice(code);
            return Ok(body);
        }

        let code_size = u32::try_from(code.len())
            .map_err(|_| malformed_error!("Method body size exceeds u32 range"))?;

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if self.is_init_local {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        if !handlers.is_empty() {
            flags |= MethodBodyFlags::MORE_SECTS;
        }

        let max_stack = u16::try_from(self.max_stack).unwrap_or(u16::MAX);

        let mut body = Vec::with_capacity(12 + code.len());
        body.extend_from_slice(&(flags.bits() | (3 << 12)).to_le_bytes());
        body.extend_from_slice(&max_stack.to_le_bytes());
        body.extend_from_slice(&code_size.to_le_bytes());
        body.extend_from_slice(&self.local_var_sig_token.to_le_bytes());
        body.extend_from_slice(code);

        if !handlers.is_empty() {
            while body.len() % 4 != 0 {
                body.push(0x00);
            }

            body.extend_from_slice(&encode_exception_handlers(handlers)?);
        }

        Ok(body)
    }
}

/// Read the data sections starting after `code_end`; returns the end of the last section.
fn read_sections(
    data: &[u8],
    code_end: usize,
    exception_handlers: &mut Vec<ExceptionHandler>,
) -> Result<usize> {
    let mut cursor = (code_end + 3) & !3;

    loop {
        if data.len() < cursor + 4 {
            return Err(OutOfBounds);
        }

        let section_flags = SectionFlags::from_bits_truncate(read_le::<u8>(&data[cursor..])?);
        let is_fat = section_flags.contains(SectionFlags::FAT_FORMAT);
        let section_size = if is_fat {
            (read_le::<u32>(&data[cursor..])? >> 8) as usize
        } else {
            usize::from(read_le::<u8>(&data[cursor + 1..])?)
        };

        if section_size < 4 || data.len() < cursor + section_size {
            return Err(malformed_error!(
                "Invalid method data section size - {}",
                section_size
            ));
        }

        let section_end = cursor + section_size;

        if section_flags.contains(SectionFlags::EHTABLE) {
            let mut clause = cursor + 4;
            if is_fat {
                for _ in 0..(section_size - 4) / 24 {
                    exception_handlers.push(ExceptionHandler {
                        // The upper flag bits are reserved
                        #[allow(clippy::cast_possible_truncation)]
                        flags: ExceptionHandlerFlags::from_bits_truncate(
                            read_le_at::<u32>(data, &mut clause)? as u16,
                        ),
                        try_offset: read_le_at::<u32>(data, &mut clause)?,
                        try_length: read_le_at::<u32>(data, &mut clause)?,
                        handler_offset: read_le_at::<u32>(data, &mut clause)?,
                        handler_length: read_le_at::<u32>(data, &mut clause)?,
                        filter_offset: read_le_at::<u32>(data, &mut clause)?,
                    });
                }
            } else {
                for _ in 0..(section_size - 4) / 12 {
                    exception_handlers.push(ExceptionHandler {
                        flags: ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(
                            data,
                            &mut clause,
                        )?),
                        try_offset: u32::from(read_le_at::<u16>(data, &mut clause)?),
                        try_length: u32::from(read_le_at::<u8>(data, &mut clause)?),
                        handler_offset: u32::from(read_le_at::<u16>(data, &mut clause)?),
                        handler_length: u32::from(read_le_at::<u8>(data, &mut clause)?),
                        filter_offset: read_le_at::<u32>(data, &mut clause)?,
                    });
                }
            }
        }

        if !section_flags.contains(SectionFlags::MORE_SECTS) {
            return Ok(section_end);
        }

        cursor = (section_end + 3) & !3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny() {
        #[rustfmt::skip]
        let data = [
            0x1A,             // tiny, 6 bytes of code
            0x02, 0x7B, 0x01, 0x00, 0x00, 0x04,
            0xFF, 0xFF,       // next body
        ];

        let body = MethodBody::from(&data).unwrap();
        assert!(!body.is_fat);
        assert_eq!(body.size_code, 6);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.size(), 7);
        assert_eq!(body.size_slot, 7);
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.code(&data).unwrap(), &data[1..7]);
    }

    #[test]
    fn fat() {
        #[rustfmt::skip]
        let data = [
            0x13, 0x30,             // fat, init locals, header size 3
            0x05, 0x00,             // max stack
            0x02, 0x00, 0x00, 0x00, // code size
            0x59, 0x00, 0x00, 0x11, // local var sig
            0x00, 0x2A,
        ];

        let body = MethodBody::from(&data).unwrap();
        assert!(body.is_fat);
        assert!(body.is_init_local);
        assert_eq!(body.max_stack, 5);
        assert_eq!(body.size_code, 2);
        assert_eq!(body.size_header, 12);
        assert_eq!(body.size_slot, 14);
        assert_eq!(body.local_var_sig_token, 0x1100_0059);
        assert!(body.exception_handlers.is_empty());
    }

    #[test]
    fn fat_exceptions() {
        #[rustfmt::skip]
        let data = [
            0x1B, 0x30,             // fat, more sects, init locals
            0x01, 0x00,
            0x06, 0x00, 0x00, 0x00, // code size
            0x03, 0x00, 0x00, 0x11,
            0x00, 0xDE, 0x02, 0x00, 0xDC, 0x2A, // nop; leave.s; nop; endfinally; ret
            0x00, 0x00,             // padding
            0x01, 0x10, 0x00, 0x00, // small EH section, 16 bytes
            0x02, 0x00, 0x00, 0x00, 0x03, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
        ];

        let body = MethodBody::from(&data).unwrap();
        assert_eq!(body.size_slot, data.len());
        assert_eq!(body.exception_handlers.len(), 1);

        let handler = &body.exception_handlers[0];
        assert_eq!(handler.flags, ExceptionHandlerFlags::FINALLY);
        assert_eq!(handler.try_offset, 0);
        assert_eq!(handler.try_length, 3);
        assert_eq!(handler.handler_offset, 3);
        assert_eq!(handler.handler_length, 2);

        let encoded = body.encode(body.code(&data).unwrap(), &body.exception_handlers).unwrap();
        assert_eq!(encoded, data);
    }

    #[test]
    fn fat_section_format() {
        #[rustfmt::skip]
        let data = [
            0x0B, 0x30, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x2A, 0x00, 0x00, 0x00,
            0x41, 0x1C, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x01,
        ];

        let body = MethodBody::from(&data).unwrap();
        assert_eq!(body.size_slot, data.len());
        assert_eq!(body.exception_handlers[0].flags, ExceptionHandlerFlags::EXCEPTION);
        assert_eq!(body.exception_handlers[0].filter_offset, 0x0100_0005);
    }

    #[test]
    fn encode_tiny() {
        let data = [0x0A, 0x00, 0x2A, 0x00];
        let body = MethodBody::from(&data).unwrap();

        assert_eq!(body.encode(&[0x2A], &[]).unwrap(), vec![0x06, 0x2A]);

        let grown = body.encode(&[0x00; 64], &[]).unwrap();
        assert_eq!(grown.len(), 12 + 64);
        assert_eq!(&grown[..2], &[0x03, 0x30]);
        assert_eq!(&grown[2..4], &[0x08, 0x00]);
        assert_eq!(&grown[4..8], &[0x40, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn invalid() {
        assert!(MethodBody::from(&[]).is_err());
        assert!(MethodBody::from(&[0x00]).is_err());
        assert!(MethodBody::from(&[0x1E, 0x00]).is_err());
        assert!(MethodBody::from(&[0x03, 0x30, 0x00, 0x00]).is_err());
        #[rustfmt::skip]
        let truncated_sections = [
            0x0B, 0x30, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x2A, 0x00, 0x00, 0x00,
            0x01, 0x10,
        ];
        assert!(MethodBody::from(&truncated_sections).is_err());
    }
}
