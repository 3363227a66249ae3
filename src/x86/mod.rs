//! x86-64 decoding for native (IL2CPP) method bodies.
//!
//! Decoding is delegated to iced-x86. [`X86Instruction`] keeps the full iced decoding and adds
//! the [`crate::disassembler::FlowType`] classification plus the few operand queries the
//! native pattern scanner needs.
//!
//! # Example
//!
//! ```rust
//! use pinpatch::x86::decode_x86;
//!
//! let code = [0x84, 0xC0, 0xC3]; // test al, al; ret
//! let instructions = decode_x86(&code, 0x1000)?;
//! assert!(instructions[1].is_ret());
//! # Ok::<(), pinpatch::Error>(())
//! ```

mod decoder;
mod types;

pub use decoder::{decode_x86, X86Decoder};
pub use types::X86Instruction;
