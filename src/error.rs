use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only conditions that end a run are errors. A target method that does not exist, or an
/// instruction pattern that cannot be confirmed, is reported through `Option` / `bool` results
/// and the log instead.
///
/// # Error Categories
///
/// ## Container Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond buffer boundaries
/// - [`Error::NotSupported`] - A recognised format outside the supported subset
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// ## Writer Errors
/// - [`Error::SamePath`] - Output would overwrite the loaded module
/// - [`Error::NoRelocation`] - A rewritten method body no longer fits its slot
///
/// # Examples
///
/// ```rust,no_run
/// use pinpatch::{Error, metadata::cilimage::CilImage};
/// use std::path::Path;
///
/// match CilImage::from_file(Path::new("Assembly-CSharp.dll")) {
///     Ok(image) => println!("runtime {}", image.runtime_version()),
///     Err(Error::NotSupported) => eprintln!("File format is not supported"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed file: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type, or a feature it uses, is not supported.
    ///
    /// Raised for uncompressed (`#-`) metadata tables, IL2CPP metadata versions outside the
    /// supported set and 32-bit native code.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Native code could not be decoded.
    #[error("x86 decoding failed - {0}")]
    X86Error(String),

    /// The output path resolves to the file the module was loaded from.
    ///
    /// Modules are never written back over their source; nothing is written when this is
    /// returned.
    #[error("Modules cannot be saved with the same file name - {}", .0.display())]
    SamePath(PathBuf),

    /// A re-encoded method body is larger than the space it was read from.
    #[error("Method body needs {needed} bytes but only {available} are available")]
    NoRelocation {
        /// Size of the re-encoded body including header and sections
        needed: usize,
        /// Size of the original body slot
        available: usize,
    },
}
