//! CIL method bodies: headers, exception clauses and their re-encoding.
//!
//! # Key Types
//! - [`MethodBody`]: parsed header, code extent, slot size and exception clauses
//! - [`ExceptionHandler`]: one try/handler clause
//! - [`MethodBodyFlags`], [`SectionFlags`], [`ExceptionHandlerFlags`]: raw flag sets

mod body;
mod exceptions;
mod types;

pub use body::MethodBody;
pub use exceptions::{encode_exception_handlers, ExceptionHandler, ExceptionHandlerFlags};
pub use types::{MethodBodyFlags, SectionFlags};
