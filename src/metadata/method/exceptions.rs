//! Exception handling clauses of CIL method bodies (ECMA-335 II.25.4.6).

use bitflags::bitflags;

use crate::{
    metadata::method::SectionFlags,
    Result,
};

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause, `filter_offset` holds the class token
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause (finally that executes only on exception)
        const FAULT = 0x0004;
    }
}

/// Exception handler defining a try region and its handler within a method.
///
/// All offsets are relative to the first byte of the method's code.
///
/// ```text
/// try {
///     // try_offset -> try_offset + try_length
/// }
/// catch (ExceptionType) {
///     // handler_offset -> handler_offset + handler_length
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Flags describing the type of exception handler (catch, filter, finally, fault).
    pub flags: ExceptionHandlerFlags,
    /// Offset in bytes of try block from start of method code.
    pub try_offset: u32,
    /// Length in bytes of the try block.
    pub try_length: u32,
    /// Location of the handler for this try block.
    pub handler_offset: u32,
    /// Size of the handler code in bytes.
    pub handler_length: u32,
    /// Filter code offset for `FILTER` clauses, class token for `EXCEPTION` clauses.
    pub filter_offset: u32,
}

impl ExceptionHandler {
    /// Returns true if this clause fits the small (12 byte) clause encoding
    #[must_use]
    pub fn fits_small(&self) -> bool {
        self.try_offset <= u32::from(u16::MAX)
            && self.handler_offset <= u32::from(u16::MAX)
            && self.try_length <= u32::from(u8::MAX)
            && self.handler_length <= u32::from(u8::MAX)
    }

    /// Code offsets at which this clause starts or ends a region
    #[must_use]
    pub fn boundaries(&self) -> Vec<u32> {
        let mut boundaries = vec![
            self.try_offset,
            self.try_offset.saturating_add(self.try_length),
            self.handler_offset,
            self.handler_offset.saturating_add(self.handler_length),
        ];

        if self.flags.contains(ExceptionHandlerFlags::FILTER) {
            boundaries.push(self.filter_offset);
        }

        boundaries
    }
}

/// Encode an exception handling data section holding `handlers`.
///
/// The small format is used when every clause and the section size fit it; otherwise the fat
/// format. The caller is responsible for 4-byte aligning the section inside the body.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `handlers` is empty or too large for a fat section.
pub fn encode_exception_handlers(handlers: &[ExceptionHandler]) -> Result<Vec<u8>> {
    if handlers.is_empty() {
        return Err(malformed_error!("Exception section without clauses"));
    }

    let small_size = handlers.len() * 12 + 4;
    let mut section = Vec::new();

    if small_size <= usize::from(u8::MAX) && handlers.iter().all(ExceptionHandler::fits_small) {
        section.push(SectionFlags::EHTABLE.bits());
        section.push(small_size as u8);
        section.extend_from_slice(&[0x00, 0x00]);

        for handler in handlers {
            section.extend_from_slice(&handler.flags.bits().to_le_bytes());
            section.extend_from_slice(&(handler.try_offset as u16).to_le_bytes());
            section.push(handler.try_length as u8);
            section.extend_from_slice(&(handler.handler_offset as u16).to_le_bytes());
            section.push(handler.handler_length as u8);
            section.extend_from_slice(&handler.filter_offset.to_le_bytes());
        }
    } else {
        let fat_size = handlers.len() * 24 + 4;
        if fat_size > 0x00FF_FFFF {
            return Err(malformed_error!(
                "Too many exception clauses - {}",
                handlers.len()
            ));
        }

        section.push((SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT).bits());
        section.extend_from_slice(&(fat_size as u32).to_le_bytes()[..3]);

        for handler in handlers {
            section.extend_from_slice(&u32::from(handler.flags.bits()).to_le_bytes());
            section.extend_from_slice(&handler.try_offset.to_le_bytes());
            section.extend_from_slice(&handler.try_length.to_le_bytes());
            section.extend_from_slice(&handler.handler_offset.to_le_bytes());
            section.extend_from_slice(&handler.handler_length.to_le_bytes());
            section.extend_from_slice(&handler.filter_offset.to_le_bytes());
        }
    }

    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(try_length: u32) -> ExceptionHandler {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset: 2,
            try_length,
            handler_offset: 0x10,
            handler_length: 4,
            filter_offset: 0,
        }
    }

    #[test]
    fn small_section() {
        let section = encode_exception_handlers(&[handler(0x0E)]).unwrap();

        #[rustfmt::skip]
        let expected = [
            0x01, 0x10, 0x00, 0x00,
            0x02, 0x00, 0x02, 0x00, 0x0E, 0x10, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(section, expected);
    }

    #[test]
    fn fat_section() {
        let section = encode_exception_handlers(&[handler(0x100)]).unwrap();

        assert_eq!(section.len(), 28);
        assert_eq!(&section[..4], &[0x41, 0x1C, 0x00, 0x00]);
        assert_eq!(&section[4..8], &[0x02, 0x00, 0x00, 0x00]);
        assert_eq!(&section[12..16], &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn empty() {
        assert!(encode_exception_handlers(&[]).is_err());
    }

    #[test]
    fn boundaries() {
        let mut clause = handler(0x0E);
        assert_eq!(clause.boundaries(), vec![2, 0x10, 0x10, 0x14]);

        clause.flags = ExceptionHandlerFlags::FILTER;
        clause.filter_offset = 0x08;
        assert_eq!(clause.boundaries(), vec![2, 0x10, 0x10, 0x14, 0x08]);
    }
}
