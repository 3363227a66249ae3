//! # pinpatch Prelude
//!
//! Re-exports the types most callers need: detection, the patcher trait, the module loaders and
//! error handling.
//!
//! ```rust,no_run
//! use pinpatch::prelude::*;
//! use std::path::Path;
//!
//! let options = DetectOptions {
//!     logger: Logger::global(log::LevelFilter::Debug),
//!     limits: ScanLimits::default(),
//! };
//! let patcher = detect(Path::new("Assembly-CSharp.dll"), &options);
//! println!("supported: {}", patcher.is_some());
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pinpatch operations
pub use crate::Error;

/// The result type used throughout pinpatch
pub use crate::Result;

/// Logging handle passed to every component
pub use crate::logger::Logger;

// ================================================================================================
// Patch Engine
// ================================================================================================

/// Detection entry point and its settings
pub use crate::patch::{detect, DetectOptions, ScanLimits};

/// The patcher contract and its implementations
pub use crate::patch::{CilPatcher, Il2CppPatcher, Patcher};

// ================================================================================================
// Module Representations
// ================================================================================================

/// Managed modules
pub use crate::metadata::{cilimage::CilImage, token::Token};

/// IL2CPP players
pub use crate::il2cpp::{Il2CppImage, NativeMethod};

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Instruction Models
// ================================================================================================

/// CIL instructions
pub use crate::disassembler::{decode_stream, encode_instructions, FlowType, Instruction, Operand};

/// x86-64 instructions
pub use crate::x86::{decode_x86, X86Instruction};
