//! Synthetic input files for tests.
//!
//! Every builder produces plain bytes and only depends on the standard library, so the same
//! sources serve the unit tests and the integration tests under `tests/`.
//!
//! - [`PeBuilder`] - a PE32+ image with arbitrary sections and an optional CLI header
//! - [`CilModuleBuilder`] - a managed module with `Module`, `TypeDef`, `Field` and `MethodDef`
//!   rows and tiny or fat method bodies
//! - [`MetadataBuilder`] - a `global-metadata.dat` of a given version
//! - [`GameAssemblyBuilder`] - a `GameAssembly.dll` with code and code-gen modules
//! - [`Il2CppPlayerBuilder`] - a complete player directory
#![allow(dead_code)]

mod cil;
mod il2cpp;
mod pe;

pub use cil::{fat_body, tiny_body, CilModuleBuilder};
pub use il2cpp::{GameAssemblyBuilder, Il2CppPlayer, Il2CppPlayerBuilder, MetadataBuilder};
pub use pe::{align, next_section_rva, PeBuilder};
