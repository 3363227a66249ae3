//! Output of patched modules.

use std::path::Path;

use crate::{patch::absolute_path, Error::SamePath, Result};

/// Write `data` to `target`, refusing to overwrite `source`.
///
/// Both paths are resolved to absolute paths first, so `./a.dll` and `a.dll` are the same file.
/// Nothing is written when the check fails.
///
/// # Errors
/// Returns [`crate::Error::SamePath`] if `target` resolves to `source` and
/// [`crate::Error::FileError`] if the write fails.
pub fn write_module(source: &Path, target: &Path, data: &[u8]) -> Result<()> {
    let resolved = resolve_target(target);
    if absolute_path(source) == resolved {
        return Err(SamePath(resolved));
    }

    std::fs::write(target, data)?;
    Ok(())
}

/// A target that does not exist yet cannot be canonicalized; resolve its parent instead.
fn resolve_target(target: &Path) -> std::path::PathBuf {
    if target.exists() {
        return absolute_path(target);
    }

    match (target.parent(), target.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            absolute_path(parent).join(name)
        }
        _ => absolute_path(target),
    }
}
