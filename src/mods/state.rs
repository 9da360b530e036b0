//! Factorio's `mod-list.json`: which mods are enabled and which version is pinned

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persists the enabled flag and selected version of a mod
#[async_trait]
pub trait ModStateStore: Send + Sync {
    /// Record `enabled` and the selected `version` (None = newest) for `name`.
    ///
    /// Calling this twice with the same arguments leaves the same state.
    async fn save_mod_state(&self, name: &str, enabled: bool, version: Option<&str>) -> Result<()>;
}

/// Contents of `mod-list.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModListFile {
    #[serde(default)]
    pub mods: Vec<ModListFileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModListFileEntry {
    pub name: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModListFile {
    /// Load from disk; a missing file is an empty list
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize mod list")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn get(&self, name: &str) -> Option<&ModListFileEntry> {
        self.mods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Insert or update an entry, keeping the name's existing spelling
    pub fn set(&mut self, name: &str, enabled: bool, version: Option<&str>) {
        let version = version.map(str::to_string);
        match self.mods.iter_mut().find(|m| m.name.eq_ignore_ascii_case(name)) {
            Some(entry) => {
                entry.enabled = enabled;
                entry.version = version;
            }
            None => self.mods.push(ModListFileEntry {
                name: name.to_string(),
                enabled,
                version,
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.mods.len();
        self.mods.retain(|m| !m.name.eq_ignore_ascii_case(name));
        self.mods.len() != before
    }
}
