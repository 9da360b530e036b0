//! User-defined mod lists: named presets of enabled state and version per mod
//!
//! All lists live in a single JSON file (an array of lists). Every mutation
//! through [`ModListManager`] is written back immediately.

pub mod apply;

pub use apply::{
    apply_plan, plan_apply, ApplyPlan, ApplyReport, ConfirmPrompt, Confirmer, EntryOutcome,
    EntryPlan, VersionChange,
};

use crate::error::ModError;
use crate::mods::InstalledMod;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Desired state of one mod within a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModListEntry {
    pub name: String,
    pub enabled: bool,
    /// Target version; empty or missing means "whatever is installed"
    #[serde(default)]
    pub version: Option<String>,
}

impl ModListEntry {
    pub fn new(name: impl Into<String>, enabled: bool, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            enabled,
            version,
        }
    }

    /// Target version with blanks treated as "no preference"
    pub fn target_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// A named preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomModList {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entries: Vec<ModListEntry>,
}

impl CustomModList {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            entries: Vec::new(),
        }
    }

    /// Build a list from the current installed state
    pub fn from_installed(name: impl Into<String>, mods: &[InstalledMod]) -> Self {
        let mut list = Self::new(name, "");
        list.entries = mods
            .iter()
            .map(|m| ModListEntry::new(&m.name, m.enabled, m.active_version().map(str::to_string)))
            .collect();
        list
    }

    pub fn entry(&self, name: &str) -> Option<&ModListEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Insert or replace the entry for `entry.name`, keeping its position
    pub fn upsert(&mut self, entry: ModListEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.name.eq_ignore_ascii_case(name.trim()));
        self.entries.len() != before
    }

    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }
}

/// Load all lists from `path`; a missing file yields no lists
pub async fn load_lists(path: &Path) -> Result<Vec<CustomModList>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read mod lists file")?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content)
        .map_err(|e| ModError::InvalidFormat(format!("{}: {}", path.display(), e)).into())
}

/// Save all lists to `path`
pub async fn save_lists(path: &Path, lists: &[CustomModList]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create mod lists directory")?;
    }
    let content = serde_json::to_string_pretty(lists).context("Failed to serialize mod lists")?;
    tokio::fs::write(path, content)
        .await
        .context("Failed to write mod lists file")
}

/// CRUD over the saved mod lists
pub struct ModListManager {
    path: PathBuf,
    lists: Mutex<Vec<CustomModList>>,
}

impl ModListManager {
    /// Load saved lists from `path`
    pub async fn load(path: PathBuf) -> Result<Self> {
        let lists = load_lists(&path).await?;
        tracing::debug!("Loaded {} mod lists from {}", lists.len(), path.display());
        Ok(Self {
            path,
            lists: Mutex::new(lists),
        })
    }

    pub async fn list(&self) -> Vec<CustomModList> {
        self.lists.lock().await.clone()
    }

    pub async fn get(&self, name: &str) -> Result<CustomModList> {
        self.lists
            .lock()
            .await
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Mod list '{}' not found", name))
    }

    pub async fn create(&self, name: &str, description: &str) -> Result<CustomModList> {
        self.insert(CustomModList::new(name.trim(), description)).await
    }

    /// Save the current installed state as a new list
    pub async fn capture(&self, name: &str, mods: &[InstalledMod]) -> Result<CustomModList> {
        self.insert(CustomModList::from_installed(name.trim(), mods))
            .await
    }

    async fn insert(&self, list: CustomModList) -> Result<CustomModList> {
        if list.name.is_empty() {
            bail!(ModError::InvalidInput("mod list name cannot be empty".into()));
        }

        let mut lists = self.lists.lock().await;
        if lists.iter().any(|l| l.name.eq_ignore_ascii_case(&list.name)) {
            bail!("Mod list '{}' already exists", list.name);
        }

        lists.push(list.clone());
        save_lists(&self.path, &lists).await?;
        tracing::info!("Created mod list '{}' ({} entries)", list.name, list.entries.len());
        Ok(list)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut lists = self.lists.lock().await;
        let before = lists.len();
        lists.retain(|l| !l.name.eq_ignore_ascii_case(name.trim()));
        if lists.len() == before {
            bail!("Mod list '{}' not found", name);
        }
        save_lists(&self.path, &lists).await?;
        tracing::info!("Deleted mod list '{}'", name);
        Ok(())
    }

    pub async fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            bail!(ModError::InvalidInput("mod list name cannot be empty".into()));
        }

        let mut lists = self.lists.lock().await;
        if lists.iter().any(|l| {
            l.name.eq_ignore_ascii_case(new_name) && !l.name.eq_ignore_ascii_case(name.trim())
        }) {
            bail!("Mod list '{}' already exists", new_name);
        }
        let list = lists
            .iter_mut()
            .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| anyhow::anyhow!("Mod list '{}' not found", name))?;
        list.name = new_name.to_string();
        save_lists(&self.path, &lists).await
    }

    pub async fn set_description(&self, name: &str, description: &str) -> Result<()> {
        self.update(name, |list| list.description = description.to_string())
            .await
    }

    pub async fn upsert_entry(&self, name: &str, entry: ModListEntry) -> Result<()> {
        self.update(name, |list| list.upsert(entry)).await
    }

    pub async fn remove_entry(&self, name: &str, mod_name: &str) -> Result<bool> {
        let mut removed = false;
        self.update(name, |list| removed = list.remove(mod_name))
            .await?;
        Ok(removed)
    }

    async fn update(&self, name: &str, change: impl FnOnce(&mut CustomModList)) -> Result<()> {
        let mut lists = self.lists.lock().await;
        let list = lists
            .iter_mut()
            .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| anyhow::anyhow!("Mod list '{}' not found", name))?;
        change(list);
        save_lists(&self.path, &lists).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CustomModList {
        let mut list = CustomModList::new("Megabase", "late game");
        list.upsert(ModListEntry::new("flib", true, Some("0.15.0".into())));
        list.upsert(ModListEntry::new("rate-calculator", false, None));
        list.upsert(ModListEntry::new("even-distribution", true, Some("2.0.1".into())));
        list
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["name"], "Megabase");
        assert_eq!(json["description"], "late game");
        assert_eq!(json["entries"][0]["name"], "flib");
        assert_eq!(json["entries"][0]["enabled"], true);
        assert_eq!(json["entries"][0]["version"], "0.15.0");
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut list = sample();
        list.upsert(ModListEntry::new("FLIB", false, None));
        assert_eq!(list.entries.len(), 3);
        assert!(!list.entry("flib").unwrap().enabled);
        assert_eq!(list.enabled_count(), 1);

        assert!(list.remove("Rate-Calculator"));
        assert!(!list.remove("rate-calculator"));
    }

    #[test]
    fn test_blank_target_version() {
        let entry = ModListEntry::new("flib", true, Some("  ".into()));
        assert_eq!(entry.target_version(), None);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modlists.json");

        let mut other = CustomModList::new("Vanilla+", "");
        other.upsert(ModListEntry::new("even-distribution", false, None));
        let lists = vec![sample(), other];

        save_lists(&path, &lists).await.unwrap();
        let reloaded = load_lists(&path).await.unwrap();
        assert_eq!(reloaded, lists);
    }

    #[tokio::test]
    async fn test_manager_saves_every_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modlists.json");

        let manager = ModListManager::load(path.clone()).await.unwrap();
        manager.create("Speedrun", "any%").await.unwrap();
        manager
            .upsert_entry("speedrun", ModListEntry::new("flib", true, None))
            .await
            .unwrap();
        assert!(manager.create("SPEEDRUN", "").await.is_err());
        assert!(manager.create("   ", "").await.is_err());

        let reopened = ModListManager::load(path.clone()).await.unwrap();
        let list = reopened.get("Speedrun").await.unwrap();
        assert_eq!(list.description, "any%");
        assert_eq!(list.entries.len(), 1);

        reopened.rename("speedrun", "Speedrun 2").await.unwrap();
        reopened.set_description("Speedrun 2", "glitchless").await.unwrap();
        assert!(reopened.remove_entry("Speedrun 2", "flib").await.unwrap());
        reopened.delete("Speedrun 2").await.unwrap();
        assert!(reopened.get("Speedrun 2").await.is_err());

        let final_state = load_lists(&path).await.unwrap();
        assert!(final_state.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_invalid_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modlists.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_lists(&path).await.unwrap_err();
        assert!(matches!(ModError::find(&err), Some(ModError::InvalidFormat(_))));
    }
}
