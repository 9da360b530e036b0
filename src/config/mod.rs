//! Configuration management for factorio-mm
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/factorio-mm/config.toml
//! - Data: ~/.local/share/factorio-mm/
//! - Cache: ~/.cache/factorio-mm/

mod paths;

pub use paths::Paths;

use crate::deps::GameEnvironment;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Factorio installation directory (contains `data/`)
    pub factorio_dir: Option<String>,

    /// Factorio write directory (contains `mods/` and `player-data.json`)
    pub user_data_dir: Option<String>,

    /// Override for the mods directory
    pub mods_dir_override: Option<String>,

    /// Force Space Age ownership instead of detecting it from the install
    pub owns_space_age: Option<bool>,

    /// Ask before version switches and other destructive actions
    pub confirm_destructive: bool,

    /// Mod portal settings
    pub portal: PortalConfig,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            factorio_dir: None,
            user_data_dir: None,
            mods_dir_override: None,
            owns_space_age: None,
            confirm_destructive: true,
            portal: PortalConfig::default(),
            paths: Paths::new(),
        }
    }
}

/// Mod portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal root, e.g. https://mods.factorio.com
    pub base_url: String,

    /// factorio.com username used for downloads
    pub username: Option<String>,

    /// Service token used for downloads
    pub token: Option<String>,

    /// Game version releases are matched against
    pub game_version: String,

    /// Lifetime of cached API responses
    pub cache_ttl_secs: u64,

    /// Fixed pause between paginated requests
    pub page_delay_ms: u64,

    /// Results per page when listing mods
    pub page_size: u32,

    /// HTTP request timeout
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mods.factorio.com".to_string(),
            username: None,
            token: None,
            game_version: "2.0".to_string(),
            cache_ttl_secs: 300,
            page_delay_ms: 500,
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Username/token pair accepted by the portal's download endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    /// Build credentials only when both halves are non-empty
    pub fn from_parts(username: Option<&str>, token: Option<&str>) -> Option<Self> {
        let username = username.map(str::trim).filter(|s| !s.is_empty())?;
        let token = token.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            username: username.to_string(),
            token: token.to_string(),
        })
    }

    /// Read `service-username`/`service-token` from Factorio's player-data.json
    pub fn from_player_data(path: &Path) -> Option<Self> {
        #[derive(Deserialize)]
        struct PlayerData {
            #[serde(rename = "service-username")]
            username: Option<String>,
            #[serde(rename = "service-token")]
            token: Option<String>,
        }

        let content = std::fs::read_to_string(path).ok()?;
        let data: PlayerData = match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
                return None;
            }
        };
        Self::from_parts(data.username.as_deref(), data.token.as_deref())
    }
}

/// Game facts derived from configuration and the install directory
#[derive(Debug, Clone)]
pub struct FactorioEnvironment {
    owns_space_age: Option<bool>,
    install_dir: Option<PathBuf>,
}

impl FactorioEnvironment {
    pub fn new(owns_space_age: Option<bool>, install_dir: Option<PathBuf>) -> Self {
        Self {
            owns_space_age,
            install_dir,
        }
    }
}

impl GameEnvironment for FactorioEnvironment {
    fn has_space_age(&self) -> bool {
        if let Some(owned) = self.owns_space_age {
            return owned;
        }
        self.install_dir
            .as_ref()
            .map(|dir| dir.join("data").join("space-age").is_dir())
            .unwrap_or(false)
    }
}

impl Config {
    /// Resolve the Factorio write directory (override or ~/.factorio)
    pub fn user_data_dir(&self) -> PathBuf {
        self.user_data_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.default_factorio_user_dir())
    }

    /// Resolve the mods directory (override or <user data>/mods)
    pub fn mods_dir(&self) -> PathBuf {
        self.mods_dir_override
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.user_data_dir().join("mods"))
    }

    /// Portal credentials from config, falling back to player-data.json
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.portal.username.as_deref(), self.portal.token.as_deref())
            .or_else(|| Credentials::from_player_data(&self.user_data_dir().join("player-data.json")))
    }

    pub fn environment(&self) -> FactorioEnvironment {
        FactorioEnvironment::new(
            self.owns_space_age,
            self.factorio_dir.as_deref().map(PathBuf::from),
        )
    }

    /// Ensure required directories exist, including overrides.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths
            .ensure_dirs()
            .context("Failed to create default application directories")?;
        std::fs::create_dir_all(self.mods_dir()).context("Failed to create mods directory")?;
        Ok(())
    }

    /// Load configuration from disk or create default
    pub async fn load() -> Result<Self> {
        let paths = Paths::new();
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            // Create default config
            let config = Config::default();
            config.save().await?;
            config
        };

        config.paths = paths;
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        let config_path = self.paths.config_file();

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }
}
