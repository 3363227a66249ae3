//! The patch engine: format detection, pattern scanning, patch application and output.
//!
//! Three patchers are known, tried in this order by [`detect`]:
//!
//! | Name          | Module          | Method       | Edit                                   |
//! |---------------|-----------------|--------------|----------------------------------------|
//! | `CF`          | managed         | `TM.SetMSC`  | `ldarg.0; ldfld; ldfld m_MSC` to `ldc.r4 0.0; nop; nop` |
//! | `FV (CIL)`    | managed         | `GMC.IsMSC`  | `ldarg.0; ldfld m_MSC` to `ldc.i4.1; nop` |
//! | `FV (IL2CPP)` | IL2CPP player   | `GMC.IsMSC`  | `test r, r` to `xor r, r` (one byte)   |
//!
//! Every patcher implements [`Patcher`]; callers only see `Box<dyn Patcher>`.
//!
//! # Example
//!
//! ```rust,no_run
//! use pinpatch::patch::{detect, DetectOptions};
//! use std::path::Path;
//!
//! let options = DetectOptions::default();
//! let Some(mut patcher) = detect(Path::new("Assembly-CSharp.dll"), &options) else {
//!     panic!("unsupported module");
//! };
//!
//! if patcher.apply_all() {
//!     patcher.save(Path::new("Assembly-CSharp_patched.dll"))?;
//! }
//! # Ok::<(), pinpatch::Error>(())
//! ```

mod cil;
mod detect;
mod native;
mod writer;

pub use cil::{find_anchor, CilPatch, CilPatcher, CF_PATCH, FV_CIL_PATCH};
pub use detect::{detect, LOADERS};
pub use native::{find_exit_test, Il2CppPatcher, FV_IL2CPP_NAME};
pub use writer::write_module;

use std::path::{Path, PathBuf};

use crate::{logger::Logger, Result};

/// One concrete patch bound to a loaded module.
pub trait Patcher {
    /// Patch name used in log lines, for example `CF`
    fn name(&self) -> &'static str;

    /// Absolute path of the file the patch rewrites
    fn module_path(&self) -> &Path;

    /// Returns true if the module contains the method this patcher targets
    fn check_target(&self) -> bool;

    /// Re-derive whether the module already carries the patch
    fn is_patched(&self) -> bool;

    /// Apply every patch of this patcher to the in-memory module.
    ///
    /// Returns true only if all of them succeeded. Patches that succeeded stay applied when a
    /// later one fails.
    fn apply_all(&mut self) -> bool;

    /// Write the module to `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SamePath`] if `path` resolves to [`Patcher::module_path`] and
    /// [`crate::Error::FileError`] if writing fails.
    fn save(&self, path: &Path) -> Result<()>;
}

/// Bounds of the native pattern scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Bytes decoded from a method entry or a branch target
    pub decode_window: usize,
    /// Instructions decoded at a branch target while looking for `ret`
    pub probe_depth: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        ScanLimits {
            decode_window: 256,
            probe_depth: 8,
        }
    }
}

/// Settings shared by the detector and the patchers it creates.
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    /// Where detection, scan and patch messages go
    pub logger: Logger,
    /// Native scan bounds
    pub limits: ScanLimits,
}

/// Resolve `path` to an absolute path, keeping it unchanged if that fails.
pub(crate) fn absolute_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
