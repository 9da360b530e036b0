//! XDG-compliant path management

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directories from XDG
    dirs: ProjectDirs,
    home: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Create a new Paths instance
    pub fn new() -> Self {
        let dirs = ProjectDirs::from("", "", "factorio-mm")
            .expect("Failed to determine project directories");
        let home = BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { dirs, home }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/factorio-mm/
    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    /// Main config file: ~/.config/factorio-mm/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/factorio-mm/
    pub fn data_dir(&self) -> PathBuf {
        self.dirs.data_dir().to_path_buf()
    }

    /// Saved custom mod lists: ~/.local/share/factorio-mm/modlists.json
    pub fn modlists_file(&self) -> PathBuf {
        self.data_dir().join("modlists.json")
    }

    /// Log file: ~/.local/share/factorio-mm/factorio-mm.log
    pub fn log_file(&self) -> PathBuf {
        self.data_dir().join("factorio-mm.log")
    }

    // ========== Game Paths ==========

    /// Default Factorio write directory on Linux: ~/.factorio/
    pub fn default_factorio_user_dir(&self) -> PathBuf {
        self.home.join(".factorio")
    }

    // ========== Cache Paths ==========

    /// Cache directory: ~/.cache/factorio-mm/
    pub fn cache_dir(&self) -> PathBuf {
        self.dirs.cache_dir().to_path_buf()
    }

    // ========== Utility Methods ==========

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}
