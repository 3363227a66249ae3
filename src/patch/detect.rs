//! Format detection: the ordered list of loaders and the first-match search over it.

use std::path::Path;

use crate::patch::{
    CilPatcher, DetectOptions, Il2CppPatcher, Patcher, CF_PATCH, FV_CIL_PATCH, FV_IL2CPP_NAME,
};

/// Open `path` as one representation; `None` if it is not in that format.
pub type Loader = fn(&Path, &DetectOptions) -> Option<Box<dyn Patcher>>;

/// Every known patcher in priority order
pub const LOADERS: [(&str, Loader); 3] = [
    ("CF", load_cf),
    ("FV (CIL)", load_fv_cil),
    (FV_IL2CPP_NAME, load_fv_il2cpp),
];

fn load_cf(path: &Path, options: &DetectOptions) -> Option<Box<dyn Patcher>> {
    open_logged(path, options, || {
        CilPatcher::open(path, &CF_PATCH, options.logger.clone())
    })
}

fn load_fv_cil(path: &Path, options: &DetectOptions) -> Option<Box<dyn Patcher>> {
    open_logged(path, options, || {
        CilPatcher::open(path, &FV_CIL_PATCH, options.logger.clone())
    })
}

fn load_fv_il2cpp(path: &Path, options: &DetectOptions) -> Option<Box<dyn Patcher>> {
    open_logged(path, options, || {
        Il2CppPatcher::open(path, options.limits, options.logger.clone())
    })
}

fn open_logged<P, F>(path: &Path, options: &DetectOptions, open: F) -> Option<Box<dyn Patcher>>
where
    P: Patcher + 'static,
    F: FnOnce() -> crate::Result<P>,
{
    match open() {
        Ok(patcher) => Some(Box::new(patcher)),
        Err(error) => {
            options.logger.debug(format_args!(
                "Failed to open the module. (\"{}\") - {}",
                path.display(),
                error
            ));
            None
        }
    }
}

/// Find the first patcher that can open `path` and finds its target method there.
///
/// Each attempt is logged at debug level as `Check module: <name> = <result>`. Nothing is
/// written; a `None` result means the module is not supported.
#[must_use]
pub fn detect(path: &Path, options: &DetectOptions) -> Option<Box<dyn Patcher>> {
    for (name, loader) in LOADERS {
        let patcher = loader(path, options);
        let result = patcher
            .as_ref()
            .is_some_and(|patcher| patcher.check_target());

        options
            .logger
            .debug(format_args!("Check module: {name} = {result}"));

        if result {
            return patcher;
        }
    }

    None
}
