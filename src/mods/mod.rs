//! Mod management - scanning the mods directory, installing archives,
//! switching versions and persisting enabled state

mod archive;
mod info;
mod state;

pub use archive::*;
pub use info::*;
pub use state::*;

use crate::deps::{compare_versions, versions_equal, InstalledSnapshot};
use crate::error::ModError;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use walkdir::WalkDir;

/// One physical copy of a mod in the mods directory
#[derive(Debug, Clone)]
pub struct InstalledVersion {
    pub version: String,
    pub path: PathBuf,
    pub source: ModSource,
    pub info: ModInfo,
}

/// Represents an installed mod
///
/// # Versions
///
/// Several versions of the same mod may sit side by side in the mods
/// directory. Factorio loads the version pinned in `mod-list.json`, or the
/// newest one when nothing is pinned:
/// - **active version**: the one that will be loaded
/// - **selected version**: the explicit pin, if any
#[derive(Debug, Clone)]
pub struct InstalledMod {
    pub name: String,
    pub title: String,
    pub author: String,
    pub enabled: bool,

    /// Installed copies, oldest first
    pub versions: Vec<InstalledVersion>,

    /// Version pinned in mod-list.json
    pub pinned_version: Option<String>,
}

impl InstalledMod {
    pub fn newest(&self) -> Option<&InstalledVersion> {
        self.versions.last()
    }

    pub fn version(&self, version: &str) -> Option<&InstalledVersion> {
        self.versions
            .iter()
            .find(|v| versions_equal(&v.version, version))
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.version(version).is_some()
    }

    /// The copy Factorio will load: the pinned version if present, else the newest
    pub fn active(&self) -> Option<&InstalledVersion> {
        self.pinned_version
            .as_deref()
            .and_then(|pin| self.version(pin))
            .or_else(|| self.newest())
    }

    pub fn active_version(&self) -> Option<&str> {
        self.active().map(|v| v.version.as_str())
    }

    pub fn selected_version(&self) -> Option<&str> {
        self.pinned_version.as_deref()
    }

    pub fn is_active_version(&self, version: &str) -> bool {
        self.active_version()
            .map(|active| versions_equal(active, version))
            .unwrap_or(false)
    }

    pub fn installed_versions(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.version.as_str()).collect()
    }

    /// Dependency strings of the active copy
    pub fn dependencies(&self) -> &[String] {
        self.active()
            .map(|v| v.info.dependencies.as_slice())
            .unwrap_or(&[])
    }
}

/// Build a validator snapshot from scanned mods
pub fn snapshot(mods: &[InstalledMod]) -> InstalledSnapshot {
    let mut snapshot = InstalledSnapshot::new();
    for m in mods {
        snapshot.insert(&m.name, m.enabled, m.active_version().map(str::to_string));
    }
    snapshot
}

/// Result of a version deletion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(PathBuf),
    /// The version is the one Factorio loads; nothing was removed
    RejectedActive,
    NotInstalled,
}

/// Mod manager handles the mods directory and mod-list.json
pub struct ModManager {
    mods_dir: PathBuf,
    /// Serialises read-modify-write cycles on mod-list.json
    state_lock: Mutex<()>,
}

impl ModManager {
    /// Create a new ModManager
    pub fn new(mods_dir: PathBuf) -> Self {
        Self {
            mods_dir,
            state_lock: Mutex::new(()),
        }
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    pub fn mod_list_path(&self) -> PathBuf {
        self.mods_dir.join("mod-list.json")
    }

    /// Scan the mods directory and merge in enabled/pinned state
    pub async fn scan(&self) -> Result<Vec<InstalledMod>> {
        if !self.mods_dir.exists() {
            bail!(ModError::FileNotFound(self.mods_dir.clone()));
        }

        tracing::debug!("Scanning mods directory: {}", self.mods_dir.display());

        let mod_list = ModListFile::load(&self.mod_list_path()).await?;
        let mut grouped: BTreeMap<String, Vec<InstalledVersion>> = BTreeMap::new();

        for entry in WalkDir::new(&self.mods_dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let Some(source) = ModSource::from_path(path) else {
                continue;
            };

            match read_mod_info(path) {
                Ok(info) => {
                    if source == ModSource::Zip && !archive_name_matches(path, &info) {
                        tracing::warn!(
                            "{} does not match its info.json ({} {})",
                            path.display(),
                            info.name,
                            info.version
                        );
                    }
                    grouped
                        .entry(info.name.to_lowercase())
                        .or_default()
                        .push(InstalledVersion {
                            version: info.version.clone(),
                            path: path.to_path_buf(),
                            source,
                            info,
                        });
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {:#}", path.display(), e);
                }
            }
        }

        let mods = grouped
            .into_values()
            .filter_map(|mut versions| {
                versions.sort_by(|a, b| compare_versions(&a.version, &b.version));
                let newest = versions.last()?.info.clone();
                let state = mod_list.get(&newest.name);

                Some(InstalledMod {
                    name: newest.name.clone(),
                    title: newest.display_title().to_string(),
                    author: newest.author.clone(),
                    // Factorio enables mods it has not seen before
                    enabled: state.map(|s| s.enabled).unwrap_or(true),
                    pinned_version: state.and_then(|s| s.version.clone()),
                    versions,
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!("Found {} installed mods", mods.len());
        Ok(mods)
    }

    /// Get a specific mod
    pub async fn get_mod(&self, name: &str) -> Result<InstalledMod> {
        self.scan()
            .await?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| anyhow::anyhow!("Mod '{}' not found", name))
    }

    /// Enable or disable a mod, keeping its selected version
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let m = self.get_mod(name).await?;
        if m.enabled == enabled {
            return Ok(());
        }
        self.save_mod_state(&m.name, enabled, m.selected_version())
            .await
    }

    /// Pin an installed version so Factorio loads it
    pub async fn select_version(&self, name: &str, version: &str) -> Result<()> {
        let m = self.get_mod(name).await?;
        let installed = m.version(version).ok_or_else(|| {
            ModError::InvalidInput(format!("{} {} is not installed", m.name, version))
        })?;
        self.save_mod_state(&m.name, m.enabled, Some(&installed.version))
            .await
    }

    /// Copy a mod archive into the mods directory
    pub async fn install_archive(&self, archive: &Path) -> Result<InstalledVersion> {
        if !archive.exists() {
            bail!(ModError::FileNotFound(archive.to_path_buf()));
        }

        let info = read_mod_info(archive)?;
        if ModSource::from_path(archive) != Some(ModSource::Zip) {
            bail!(ModError::InvalidModFormat(format!(
                "{} is not a zip archive",
                archive.display()
            )));
        }

        let dest = self
            .mods_dir
            .join(archive_file_name(&info.name, &info.version));
        if dest.exists() {
            bail!("{} {} is already installed", info.name, info.version);
        }

        tokio::fs::create_dir_all(&self.mods_dir)
            .await
            .context("Failed to create mods directory")?;
        tokio::fs::copy(archive, &dest)
            .await
            .with_context(|| format!("Failed to copy {} into mods directory", archive.display()))?;

        self.register(&info.name).await?;

        tracing::info!("Installed {} {}", info.name, info.version);
        Ok(InstalledVersion {
            version: info.version.clone(),
            path: dest,
            source: ModSource::Zip,
            info,
        })
    }

    /// Make sure a newly added mod has a mod-list.json entry
    pub async fn register(&self, name: &str) -> Result<()> {
        let _guard = self.state_lock.lock().await;
        let path = self.mod_list_path();
        let mut file = ModListFile::load(&path).await?;
        if file.get(name).is_none() {
            file.set(name, true, None);
            file.save(&path).await?;
        }
        Ok(())
    }

    /// Delete one installed version. The active version is never removed.
    pub async fn delete_version(&self, name: &str, version: &str) -> Result<DeleteOutcome> {
        let m = self.get_mod(name).await?;
        let Some(target) = m.version(version) else {
            return Ok(DeleteOutcome::NotInstalled);
        };

        if m.is_active_version(&target.version) {
            tracing::warn!(
                "Refusing to delete {} {}: it is the active version",
                m.name,
                target.version
            );
            return Ok(DeleteOutcome::RejectedActive);
        }

        remove_path(&target.path, target.source).await?;
        tracing::info!("Deleted {} {} ({})", m.name, target.version, target.path.display());
        Ok(DeleteOutcome::Deleted(target.path.clone()))
    }

    /// Remove every installed version and forget the mod's state
    pub async fn remove_mod(&self, name: &str) -> Result<()> {
        let m = self.get_mod(name).await?;
        for v in &m.versions {
            remove_path(&v.path, v.source).await?;
        }

        let _guard = self.state_lock.lock().await;
        let path = self.mod_list_path();
        let mut file = ModListFile::load(&path).await?;
        if file.remove(&m.name) {
            file.save(&path).await?;
        }

        tracing::info!("Removed {} ({} versions)", m.name, m.versions.len());
        Ok(())
    }
}

#[async_trait]
impl ModStateStore for ModManager {
    async fn save_mod_state(&self, name: &str, enabled: bool, version: Option<&str>) -> Result<()> {
        let _guard = self.state_lock.lock().await;
        let path = self.mod_list_path();
        let mut file = ModListFile::load(&path).await?;
        file.set(name, enabled, version);
        file.save(&path).await?;
        tracing::debug!(
            "Saved state for {}: enabled={} version={}",
            name,
            enabled,
            version.unwrap_or("newest")
        );
        Ok(())
    }
}

async fn remove_path(path: &Path, source: ModSource) -> Result<()> {
    let result = match source {
        ModSource::Zip => tokio::fs::remove_file(path).await,
        ModSource::Directory => tokio::fs::remove_dir_all(path).await,
    };
    result.map_err(|e| ModError::from_io(&e, path).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager_with_mods() -> (tempfile::TempDir, ModManager) {
        let dir = tempfile::tempdir().unwrap();
        write_mod_zip(dir.path(), "flib", "0.14.0", &["base >= 2.0"]);
        write_mod_zip(dir.path(), "flib", "0.15.0", &["base >= 2.0"]);
        write_mod_zip(dir.path(), "rate-calculator", "3.3.0", &["flib >= 0.14.0"]);
        let manager = ModManager::new(dir.path().to_path_buf());
        (dir, manager)
    }

    #[tokio::test]
    async fn test_scan_groups_versions() {
        let (_dir, manager) = manager_with_mods().await;
        let mods = manager.scan().await.unwrap();

        assert_eq!(mods.len(), 2);
        let flib = mods.iter().find(|m| m.name == "flib").unwrap();
        assert_eq!(flib.installed_versions(), vec!["0.14.0", "0.15.0"]);
        assert_eq!(flib.active_version(), Some("0.15.0"));
        assert!(flib.enabled);
        assert!(flib.selected_version().is_none());
    }

    #[tokio::test]
    async fn test_scan_skips_unreadable_archives() {
        let (dir, manager) = manager_with_mods().await;
        std::fs::write(dir.path().join("broken_1.0.0.zip"), b"nope").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let mods = manager.scan().await.unwrap();
        assert_eq!(mods.len(), 2);
    }

    #[tokio::test]
    async fn test_scan_uses_info_json_for_renamed_archives() {
        let (dir, manager) = manager_with_mods().await;
        std::fs::rename(
            dir.path().join("rate-calculator_3.3.0.zip"),
            dir.path().join("rate-calculator (1).zip"),
        )
        .unwrap();

        let rc = manager.get_mod("rate-calculator").await.unwrap();
        assert_eq!(rc.installed_versions(), vec!["3.3.0"]);
    }

    #[tokio::test]
    async fn test_select_version_pins_active() {
        let (_dir, manager) = manager_with_mods().await;
        manager.select_version("FLIB", "0.14.0").await.unwrap();

        let flib = manager.get_mod("flib").await.unwrap();
        assert_eq!(flib.selected_version(), Some("0.14.0"));
        assert_eq!(flib.active_version(), Some("0.14.0"));

        assert!(manager.select_version("flib", "9.9.9").await.is_err());
    }

    #[tokio::test]
    async fn test_set_enabled_keeps_pin() {
        let (_dir, manager) = manager_with_mods().await;
        manager.select_version("flib", "0.14.0").await.unwrap();
        manager.set_enabled("flib", false).await.unwrap();

        let flib = manager.get_mod("flib").await.unwrap();
        assert!(!flib.enabled);
        assert_eq!(flib.selected_version(), Some("0.14.0"));
    }

    #[tokio::test]
    async fn test_delete_active_version_rejected() {
        let (dir, manager) = manager_with_mods().await;

        let outcome = manager.delete_version("flib", "0.15.0").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::RejectedActive);
        assert!(dir.path().join("flib_0.15.0.zip").exists());

        let outcome = manager.delete_version("flib", "0.14.0").await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert!(!dir.path().join("flib_0.14.0.zip").exists());

        let outcome = manager.delete_version("flib", "0.14.0").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotInstalled);
    }

    #[tokio::test]
    async fn test_install_archive_and_reject_duplicate() {
        let (_dir, manager) = manager_with_mods().await;
        let source = tempfile::tempdir().unwrap();
        let archive = write_mod_zip(source.path(), "even-distribution", "2.0.1", &[]);

        let installed = manager.install_archive(&archive).await.unwrap();
        assert_eq!(installed.version, "2.0.1");
        assert!(installed.path.exists());

        let m = manager.get_mod("even-distribution").await.unwrap();
        assert!(m.enabled);

        assert!(manager.install_archive(&archive).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_mod() {
        let (dir, manager) = manager_with_mods().await;
        manager.save_mod_state("flib", false, None).await.unwrap();
        manager.remove_mod("flib").await.unwrap();

        assert!(manager.get_mod("flib").await.is_err());
        assert!(!dir.path().join("flib_0.14.0.zip").exists());
        let file = ModListFile::load(&manager.mod_list_path()).await.unwrap();
        assert!(file.get("flib").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_state() {
        let (_dir, manager) = manager_with_mods().await;
        manager.set_enabled("rate-calculator", false).await.unwrap();

        let mods = manager.scan().await.unwrap();
        let snap = snapshot(&mods);
        assert!(snap.contains("FLIB"));
        assert!(!snap.is_enabled("rate-calculator"));
        assert_eq!(snap.get("flib").unwrap().version.as_deref(), Some("0.15.0"));
    }
}
