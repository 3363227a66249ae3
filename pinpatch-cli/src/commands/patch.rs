use std::{fs, path::Path};

use anyhow::{bail, Context};
use log::{info, warn};
use pinpatch::{detect, DetectOptions, Logger, Patcher, ScanLimits};

use crate::{app::PatchOptions, output::sibling_path};

/// Detect, back up, patch, save and swap the module at `path`.
pub fn run(path: &Path, options: &PatchOptions) -> anyhow::Result<()> {
    // The installed logger applies --verbose and RUST_LOG
    let detect_options = DetectOptions {
        logger: Logger::global(log::LevelFilter::Trace),
        limits: ScanLimits::default(),
    };

    run_with(path, options, &detect_options)
}

pub fn run_with(
    path: &Path,
    options: &PatchOptions,
    detect_options: &DetectOptions,
) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("no such file or directory - {}", path.display());
    }

    let Some(mut patcher) = detect(path, detect_options) else {
        bail!("unsupported module - {}", path.display());
    };

    let module = patcher.module_path().to_path_buf();
    info!("Module: {} ({})", module.display(), patcher.name());

    if !options.no_backup {
        backup(&module)?;
    }

    if patcher.is_patched() {
        warn!("This module has already been patched. It may not be patched correctly.");
    }

    if !patcher.apply_all() {
        bail!("failed to patch {}", module.display());
    }

    let patched = sibling_path(&module, "_patched");
    save(patcher.as_ref(), &patched)?;
    drop(patcher);

    if !options.keep_patched {
        fs::rename(&patched, &module).with_context(|| {
            format!(
                "failed to move {} over {}",
                patched.display(),
                module.display()
            )
        })?;
        info!("Replaced the original module. ({})", module.display());
    }

    info!("All completed successfully!");
    Ok(())
}

fn backup(module: &Path) -> anyhow::Result<()> {
    let backup = sibling_path(module, "_original");
    if backup.exists() {
        info!("Backup already exists. ({})", backup.display());
        return Ok(());
    }

    fs::copy(module, &backup).with_context(|| {
        format!(
            "failed to back up {} to {}",
            module.display(),
            backup.display()
        )
    })?;
    info!("Backup created. ({})", backup.display());
    Ok(())
}

fn save(patcher: &dyn Patcher, target: &Path) -> anyhow::Result<()> {
    patcher
        .save(target)
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!("Patched module saved. ({})", target.display());
    Ok(())
}
