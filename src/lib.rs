// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # pinpatch
//!
//! Locates one guarded check inside a game module and pins it to a fixed outcome with a minimal,
//! in-place edit. Two module representations are supported:
//!
//! - **Managed** (.NET / Mono): a PE image with CLI metadata. The target method is found through
//!   the `TypeDef` / `MethodDef` tables, its CIL is decoded, a short instruction window anchored
//!   on a field read is replaced with constants that push the same number of values, and the
//!   body is re-encoded into its original slot.
//! - **Native** (Unity IL2CPP): `GameAssembly.dll` plus `global-metadata.dat`. The method is
//!   resolved through the metadata and the code-gen module's method pointers, its x86-64 code is
//!   decoded with iced-x86, and the `test` guarding the exit branch becomes `xor` by rewriting a
//!   single byte.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pinpatch::prelude::*;
//! use std::path::Path;
//!
//! let options = DetectOptions::default();
//! let Some(mut patcher) = detect(Path::new("Assembly-CSharp.dll"), &options) else {
//!     return Err(Error::NotSupported);
//! };
//!
//! if patcher.is_patched() {
//!     println!("already patched, continuing anyway");
//! }
//!
//! if patcher.apply_all() {
//!     patcher.save(Path::new("Assembly-CSharp_patched.dll"))?;
//! }
//! # Ok::<(), pinpatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`patch`] - Detection, the [`Patcher`] trait and the three concrete patches
//! - [`metadata`] - CLI metadata: tables, heaps and method bodies of managed modules
//! - [`disassembler`] - CIL decoding and re-encoding with branch relaxation
//! - [`il2cpp`] - `global-metadata.dat` and code-gen module resolution
//! - [`x86`] - x86-64 decoding on top of iced-x86
//! - [`file`] - Owned PE images and little-endian readers
//! - [`logger`] - The [`Logger`] handle every component writes through
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Parse and I/O failures are [`Error`] values; "not found" is `Option`/`bool`:
//!
//! ```rust,no_run
//! use pinpatch::{metadata::cilimage::CilImage, Error};
//! use std::path::Path;
//!
//! match CilImage::from_file(Path::new("Assembly-CSharp.dll")) {
//!     Ok(image) => println!("runtime {}", image.runtime_version()),
//!     Err(Error::NotSupported) => println!("not a supported managed module"),
//!     Err(Error::Malformed { message, .. }) => println!("malformed file: {message}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

pub mod disassembler;
pub mod file;
pub mod il2cpp;
pub mod logger;
pub mod metadata;
pub mod patch;
pub mod prelude;
pub mod x86;

/// `pinpatch` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `pinpatch` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

pub use file::{parser::Parser, File};
pub use logger::Logger;
pub use patch::{detect, DetectOptions, Patcher, ScanLimits};
