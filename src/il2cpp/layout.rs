//! File layout of an IL2CPP player directory.
//!
//! ```text
//! <dir>/<Name>.exe
//! <dir>/GameAssembly.dll
//! <dir>/<Name>_Data/il2cpp_data/Metadata/global-metadata.dat
//! ```

use std::path::{Path, PathBuf};

/// Name of the native code module
pub const GAME_ASSEMBLY: &str = "GameAssembly.dll";

/// Player name tried before any other executable
pub const DEFAULT_PLAYER: &str = "Game";

/// The files of one IL2CPP player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLayout {
    /// The player executable
    pub player: PathBuf,
    /// `GameAssembly.dll`
    pub game_assembly: PathBuf,
    /// The `<Name>_Data` directory
    pub data_dir: PathBuf,
    /// `global-metadata.dat`
    pub metadata: PathBuf,
}

impl PlayerLayout {
    /// Locate the player files in `dir`.
    ///
    /// `Game.exe` is tried first, then every other `*.exe` in name order with a matching
    /// `_Data` directory. Returns `None` if `dir` is not a directory or no complete layout is
    /// found.
    #[must_use]
    pub fn locate(dir: &Path) -> Option<PlayerLayout> {
        if !dir.is_dir() {
            return None;
        }

        if let Some(layout) = Self::for_player(dir, DEFAULT_PLAYER) {
            return Some(layout);
        }

        let mut players: Vec<String> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|extension| extension.eq_ignore_ascii_case("exe"))
            })
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(String::from))
            .collect();
        players.sort();

        players
            .iter()
            .filter(|name| dir.join(format!("{name}_Data")).is_dir())
            .find_map(|name| Self::for_player(dir, name))
    }

    fn for_player(dir: &Path, name: &str) -> Option<PlayerLayout> {
        let player = dir.join(format!("{name}.exe"));
        let game_assembly = dir.join(GAME_ASSEMBLY);
        let data_dir = dir.join(format!("{name}_Data"));
        let metadata = data_dir
            .join("il2cpp_data")
            .join("Metadata")
            .join("global-metadata.dat");

        (player.is_file() && game_assembly.is_file() && metadata.is_file()).then_some(PlayerLayout {
            player,
            game_assembly,
            data_dir,
            metadata,
        })
    }
}
