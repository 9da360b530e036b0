//! Version history of a single mod: every portal release with its local
//! install state, and the install/delete toggle that moves between them.
//!
//! A release is either downloaded (when missing) or deleted (when present);
//! there is no separate reinstall. Failures leave the release as it was.

use crate::config::Credentials;
use crate::deps::{compare_versions, versions_equal};
use crate::error::ModError;
use crate::mods::{DeleteOutcome, InstalledMod, ModManager};
use crate::portal::{PortalClient, PortalMod, Release};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Install state of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    NotInstalled,
    Downloading,
    Installed,
    Deleting,
}

/// One row of the version history
#[derive(Debug, Clone)]
pub struct ReleaseEntry {
    pub release: Release,
    pub is_installed: bool,
    pub is_installing: bool,
}

impl ReleaseEntry {
    pub fn state(&self) -> ReleaseState {
        match (self.is_installed, self.is_installing) {
            (false, false) => ReleaseState::NotInstalled,
            (false, true) => ReleaseState::Downloading,
            (true, false) => ReleaseState::Installed,
            (true, true) => ReleaseState::Deleting,
        }
    }
}

/// Releases of one mod, newest first
#[derive(Debug, Clone)]
pub struct VersionHistory {
    pub mod_name: String,
    pub releases: Vec<ReleaseEntry>,
    /// Versions on disk, including ones the portal no longer lists
    pub installed_versions: Vec<String>,
}

impl VersionHistory {
    pub fn load(portal_mod: &PortalMod, installed: Option<&InstalledMod>) -> Self {
        let mut releases: Vec<ReleaseEntry> = portal_mod
            .releases
            .iter()
            .map(|release| ReleaseEntry {
                is_installed: installed
                    .map(|m| m.has_version(&release.version))
                    .unwrap_or(false),
                is_installing: false,
                release: release.clone(),
            })
            .collect();
        releases.sort_by(|a, b| compare_versions(&b.release.version, &a.release.version));

        Self {
            mod_name: installed
                .map(|m| m.name.clone())
                .unwrap_or_else(|| portal_mod.name.clone()),
            releases,
            installed_versions: installed
                .map(|m| m.installed_versions().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }

    pub fn entry(&self, version: &str) -> Option<&ReleaseEntry> {
        self.releases
            .iter()
            .find(|e| versions_equal(&e.release.version, version))
    }

    fn position(&self, version: &str) -> Option<usize> {
        self.releases
            .iter()
            .position(|e| versions_equal(&e.release.version, version))
    }

    fn mark_installed(&mut self, index: usize, installed: bool) {
        let entry = &mut self.releases[index];
        entry.is_installed = installed;
        let version = entry.release.version.clone();
        self.installed_versions
            .retain(|v| !versions_equal(v, &version));
        if installed {
            self.installed_versions.push(version);
            self.installed_versions.sort_by(|a, b| compare_versions(a, b));
        }
    }
}

/// Fetches release archives
#[async_trait]
pub trait ReleaseDownloader: Send + Sync {
    async fn download(
        &self,
        mod_name: &str,
        release: &Release,
        credentials: &Credentials,
        dest_dir: &Path,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

#[async_trait]
impl ReleaseDownloader for PortalClient {
    async fn download(
        &self,
        mod_name: &str,
        release: &Release,
        credentials: &Credentials,
        dest_dir: &Path,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.download_release(mod_name, release, credentials, dest_dir, progress, cancel)
            .await
    }
}

/// Receives download percentages
pub trait ProgressSink: Send + Sync {
    fn set_progress(&self, mod_name: &str, version: &str, percent: u8);
}

impl ProgressSink for () {
    fn set_progress(&self, _mod_name: &str, _version: &str, _percent: u8) {}
}

/// Percentage for a progress callback; None while the size is unknown
pub fn percent(downloaded: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|t| *t > 0)?;
    Some(((downloaded.min(total) * 100) / total) as u8)
}

/// Result of [`HistoryController::toggle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Installed(PathBuf),
    Deleted,
    /// Preconditions not met (no URL, no credentials); nothing attempted
    Aborted(String),
    /// The release is the active version and stays on disk
    RejectedActive,
    /// Another operation on this release is still running
    Busy,
    Failed(String),
}

/// Drives install/delete of individual releases
pub struct HistoryController {
    mods: Arc<ModManager>,
    downloader: Arc<dyn ReleaseDownloader>,
    credentials: Option<Credentials>,
    /// Outstanding download per mod (lowercased name)
    in_flight: Mutex<HashMap<String, (u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl HistoryController {
    pub fn new(
        mods: Arc<ModManager>,
        downloader: Arc<dyn ReleaseDownloader>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            mods,
            downloader,
            credentials,
            in_flight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new operation for `mod_name`, cancelling the previous one
    fn begin(&self, mod_name: &str) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, previous)) =
            in_flight.insert(mod_name.to_lowercase(), (id, token.clone()))
        {
            tracing::debug!("Cancelling previous operation for {}", mod_name);
            previous.cancel();
        }
        (id, token)
    }

    fn finish(&self, mod_name: &str, id: u64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let key = mod_name.to_lowercase();
        if in_flight.get(&key).map(|(current, _)| *current == id).unwrap_or(false) {
            in_flight.remove(&key);
        }
    }

    /// Cancel the outstanding operation for a mod, if any
    pub fn cancel(&self, mod_name: &str) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.get(&mod_name.to_lowercase()) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Download the release when missing, delete it when installed
    pub async fn toggle(
        &self,
        history: &mut VersionHistory,
        version: &str,
        sink: &dyn ProgressSink,
    ) -> ToggleOutcome {
        let Some(index) = history.position(version) else {
            return ToggleOutcome::Failed(format!(
                "{} {} is not in the version history",
                history.mod_name, version
            ));
        };
        if history.releases[index].is_installing {
            return ToggleOutcome::Busy;
        }

        history.releases[index].is_installing = true;
        let outcome = if history.releases[index].is_installed {
            self.delete(history, index).await
        } else {
            self.install(history, index, sink).await
        };

        history.releases[index].is_installing = false;
        outcome
    }

    async fn install(
        &self,
        history: &mut VersionHistory,
        index: usize,
        sink: &dyn ProgressSink,
    ) -> ToggleOutcome {
        let mod_name = history.mod_name.clone();
        let release = history.releases[index].release.clone();

        if !release.has_download_url() {
            tracing::warn!("{} {} has no download URL", mod_name, release.version);
            return ToggleOutcome::Aborted("release has no download URL".to_string());
        }
        let Some(credentials) = self.credentials.as_ref() else {
            tracing::warn!(
                "Cannot download {} {}: {}",
                mod_name,
                release.version,
                ModError::MissingCredentials
            );
            return ToggleOutcome::Aborted(ModError::MissingCredentials.to_string());
        };

        let (id, cancel) = self.begin(&mod_name);

        let report = |downloaded: u64, total: Option<u64>| {
            if let Some(p) = percent(downloaded, total) {
                sink.set_progress(&mod_name, &release.version, p);
            }
        };

        let result = self
            .downloader
            .download(
                &mod_name,
                &release,
                credentials,
                self.mods.mods_dir(),
                &report,
                &cancel,
            )
            .await;
        self.finish(&mod_name, id);

        match result {
            Ok(path) => {
                if let Err(e) = self.mods.register(&mod_name).await {
                    tracing::warn!("Failed to register {} in mod-list.json: {:#}", mod_name, e);
                }
                history.mark_installed(index, true);
                ToggleOutcome::Installed(path)
            }
            Err(e) => {
                tracing::error!("Failed to download {} {}: {:#}", mod_name, release.version, e);
                ToggleOutcome::Failed(crate::error::status_message(&e))
            }
        }
    }

    async fn delete(&self, history: &mut VersionHistory, index: usize) -> ToggleOutcome {
        let mod_name = history.mod_name.clone();
        let version = history.releases[index].release.version.clone();

        match self.mods.delete_version(&mod_name, &version).await {
            Ok(DeleteOutcome::Deleted(_)) | Ok(DeleteOutcome::NotInstalled) => {
                history.mark_installed(index, false);
                ToggleOutcome::Deleted
            }
            Ok(DeleteOutcome::RejectedActive) => ToggleOutcome::RejectedActive,
            Err(e) => {
                tracing::error!("Failed to delete {} {}: {:#}", mod_name, version, e);
                ToggleOutcome::Failed(crate::error::status_message(&e))
            }
        }
    }
}
