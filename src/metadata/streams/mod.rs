//! Metadata streams.
//!
//! Only the streams needed to resolve type, method and field names are read:
//!
//! * `#~` - the compressed table stream, see [`crate::metadata::tables`]
//! * `#Strings` - NUL-terminated UTF-8 identifiers, see [`Strings`]
//! * `#GUID` - module version ids, see [`Guid`]

mod streamheader;
pub use streamheader::StreamHeader;

mod strings;
pub use strings::Strings;

mod guid;
pub use guid::Guid;
