use std::path::PathBuf;

use clap::Parser;

/// pinpatch - pin a guarded check in a .NET or IL2CPP game module
#[derive(Debug, Parser)]
#[command(name = "pinpatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to a managed module (Assembly-CSharp.dll) or an IL2CPP player directory.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    #[command(flatten)]
    pub options: PatchOptions,
}

/// Options of the patch run.
#[derive(Debug, Parser)]
pub struct PatchOptions {
    /// Enable verbose (debug-level) logging output, including the detector trace.
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not copy the module to <name>_original before patching.
    #[arg(long)]
    pub no_backup: bool,

    /// Keep the patched module as <name>_patched instead of moving it over the original.
    #[arg(long)]
    pub keep_patched: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_flags() {
        let cli = Cli::parse_from(["pinpatch", "-v", "--keep-patched", "Game"]);
        assert_eq!(cli.path, PathBuf::from("Game"));
        assert!(cli.options.verbose);
        assert!(cli.options.keep_patched);
        assert!(!cli.options.no_backup);
    }
}
