use std::{
    ffi::OsString,
    io::Write,
    path::{Path, PathBuf},
};

/// Targets printed in the usage header.
const TARGETS: [&str; 2] = [
    "Assembly-CSharp.dll  (CF, FV)",
    "<player directory>   (FV, IL2CPP)",
];

/// Print the tool name, version and supported targets.
pub fn print_header() {
    println!("pinpatch {}", env!("CARGO_PKG_VERSION"));
    println!("Supported targets:");
    for target in TARGETS {
        println!("  {target}");
    }
    println!();
}

/// Install `env_logger` on stderr as `YYYY-MM-DD HH:MM:SS.mmm [LEVEL] message`.
///
/// `--verbose` enables debug lines; `RUST_LOG` overrides both.
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_module("pinpatch", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            let timestamp = buf.timestamp_millis().to_string();
            let timestamp = timestamp.trim_end_matches('Z').replacen('T', " ", 1);
            writeln!(buf, "{timestamp} [{}] {}", record.level(), record.args())
        })
        .init();
}

/// `<stem><suffix><ext>` beside `path`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::new();
    if let Some(stem) = path.file_stem() {
        name.push(stem);
    }
    name.push(suffix);
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }

    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_names() {
        assert_eq!(
            sibling_path(Path::new("/game/Assembly-CSharp.dll"), "_original"),
            PathBuf::from("/game/Assembly-CSharp_original.dll")
        );
        assert_eq!(
            sibling_path(Path::new("GameAssembly.dll"), "_patched"),
            PathBuf::from("GameAssembly_patched.dll")
        );
        assert_eq!(
            sibling_path(Path::new("/game/module"), "_patched"),
            PathBuf::from("/game/module_patched")
        );
    }
}
