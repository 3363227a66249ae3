//! Metadata parsing for managed (.NET) modules.
//!
//! Only the part of ECMA-335 needed to find a method by name and rewrite its body is
//! implemented: the CLI header, the metadata root, the `#~` / `#Strings` / `#GUID` streams,
//! the `Module`, `TypeDef`, `Field` and `MethodDef` tables and CIL method bodies.
//!
//! # Key Components
//!
//! - [`cilimage::CilImage`] - A loaded module with name based lookups and body replacement
//! - [`method`] - Method body headers, exception clauses and their encoding
//! - [`tables`] - Typed access to the compressed table stream
//! - [`streams`] - Identifier and GUID heaps
//! - [`token`] - Metadata table row references
//!
//! # Examples
//!
//! ```rust,no_run
//! use pinpatch::metadata::cilimage::CilImage;
//!
//! let image = CilImage::from_file("Assembly-CSharp.dll".as_ref())?;
//! println!("Runtime: {}", image.runtime_version());
//! println!("Has TM: {}", image.has_type("", "TM")?);
//! # Ok::<(), pinpatch::Error>(())
//! ```

/// A loaded managed module
pub mod cilimage;
/// Implementation of the Header of CIL
pub mod cor20header;
/// Method body parsing and encoding
pub mod method;
/// The metadata root and its stream directory
pub mod root;
/// Metadata heaps
pub mod streams;
/// The compressed table stream
pub mod tables;
/// Metadata tokens
pub mod token;
