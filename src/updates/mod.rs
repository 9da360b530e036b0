//! Update check across installed mods

use crate::deps::{compare_versions, is_game_dependency};
use crate::error::{status_message, ModError};
use crate::mods::InstalledMod;
use crate::portal::{PortalClient, Release};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Looks up the newest release of a mod for the configured game version
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    async fn latest_release(&self, name: &str) -> Result<Option<Release>>;
}

#[async_trait]
impl ReleaseLookup for PortalClient {
    async fn latest_release(&self, name: &str) -> Result<Option<Release>> {
        PortalClient::latest_release(self, name).await
    }
}

/// Information about a mod update
#[derive(Debug, Clone)]
pub struct ModUpdateInfo {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    pub released_at: DateTime<Utc>,
    pub has_update: bool,
}

/// A mod whose lookup failed
#[derive(Debug, Clone)]
pub struct UpdateFailure {
    pub name: String,
    pub message: String,
    /// Network trouble or a server-side error; worth checking again later
    pub retryable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub checked: Vec<ModUpdateInfo>,
    pub failures: Vec<UpdateFailure>,
    pub cancelled: bool,
}

impl UpdateReport {
    pub fn available(&self) -> impl Iterator<Item = &ModUpdateInfo> {
        self.checked.iter().filter(|u| u.has_update)
    }

    pub fn retryable(&self) -> impl Iterator<Item = &UpdateFailure> {
        self.failures.iter().filter(|f| f.retryable)
    }
}

pub struct UpdateChecker {
    lookup: Arc<dyn ReleaseLookup>,
}

impl UpdateChecker {
    pub fn new(lookup: Arc<dyn ReleaseLookup>) -> Self {
        Self { lookup }
    }

    /// Check every mod in turn. A failing mod is recorded and skipped;
    /// cancellation stops the sweep and keeps what was already checked.
    pub async fn check(&self, mods: &[InstalledMod], cancel: &CancellationToken) -> UpdateReport {
        let mut report = UpdateReport::default();

        for (i, m) in mods.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Update check cancelled after {} of {} mods", i, mods.len());
                report.cancelled = true;
                break;
            }
            if is_game_dependency(&m.name) {
                continue;
            }
            let Some(current) = m.active_version() else {
                continue;
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Update check cancelled while checking {}", m.name);
                    report.cancelled = true;
                    break;
                }
                result = self.lookup.latest_release(&m.name) => result,
            };

            match result {
                Ok(Some(release)) => {
                    let has_update =
                        compare_versions(&release.version, current) == Ordering::Greater;
                    if has_update {
                        tracing::info!("Update available: {} {} -> {}", m.name, current, release.version);
                    }
                    report.checked.push(ModUpdateInfo {
                        name: m.name.clone(),
                        current_version: current.to_string(),
                        latest_version: release.version,
                        released_at: release.released_at,
                        has_update,
                    });
                }
                Ok(None) => {
                    tracing::debug!("No release of {} for this game version", m.name);
                }
                Err(e) => {
                    tracing::warn!("Update check failed for {}: {:#}", m.name, e);
                    report.failures.push(UpdateFailure {
                        name: m.name.clone(),
                        message: status_message(&e),
                        retryable: ModError::find(&e).map(ModError::is_transient).unwrap_or(false),
                    });
                }
            }
        }

        report
    }
}
