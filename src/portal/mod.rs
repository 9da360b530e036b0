//! Factorio mod portal client
//!
//! Read-only API calls (`/api/mods`, `/api/mods/{name}/full`) plus
//! authenticated release downloads. Mod details are cached with a TTL.

mod cache;
mod models;

pub use cache::ApiCache;
pub use models::*;

use crate::config::{Credentials, PortalConfig};
use crate::error::ModError;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::StatusCode;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

/// HTTP client for the mod portal
pub struct PortalClient {
    client: reqwest::Client,
    base_url: Url,
    game_version: String,
    page_size: u32,
    page_delay: Duration,
    cache: ApiCache<PortalMod>,
}

impl PortalClient {
    /// Create a new portal client
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ModError::InvalidInput(format!("portal base URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("factorio-mm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            game_version: config.game_version.clone(),
            page_size: config.page_size.max(1),
            page_delay: Duration::from_millis(config.page_delay_ms),
            cache: ApiCache::new(Duration::from_secs(config.cache_ttl_secs)),
        })
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    fn full_mod_url(&self, name: &str) -> Url {
        let mut url = self.endpoint(&format!("/api/mods/{}/full", name));
        url.query_pairs_mut()
            .append_pair("version", &self.game_version);
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ModError::Network(e.to_string()))?;

        check_status(&url, response.status())?;

        let body = response
            .text()
            .await
            .map_err(|e| ModError::Network(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| ModError::InvalidFormat(format!("{}: {}", url.path(), e)).into())
    }

    /// Full mod details including every release; cached for the configured TTL
    pub async fn full_mod(&self, name: &str) -> Result<PortalMod> {
        let key = name.trim().to_lowercase();
        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!("Cache hit for {}", name);
            return Ok(cached);
        }

        let m: PortalMod = self
            .get_json(self.full_mod_url(name.trim()))
            .await
            .with_context(|| format!("Failed to fetch mod '{}' from the portal", name))?;
        self.cache.insert(key, m.clone());
        Ok(m)
    }

    /// Most recently updated mods, following `pagination.links.next`.
    ///
    /// Waits the configured delay between pages.
    pub async fn recent_mods(&self, max_pages: usize) -> Result<Vec<ModSummary>> {
        let mut url = self.endpoint("/api/mods");
        url.query_pairs_mut()
            .append_pair("page_size", &self.page_size.to_string())
            .append_pair("sort", "updated_at")
            .append_pair("sort_order", "desc")
            .append_pair("version", &self.game_version);

        let mut results = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= max_pages {
                break;
            }
            if pages > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let page: ModListPage = self.get_json(url).await?;
            pages += 1;
            tracing::debug!(
                "Fetched page {} with {} mods",
                page.pagination.as_ref().map(|p| p.page).unwrap_or(pages as u32),
                page.results.len()
            );
            results.extend(page.results);

            next = page
                .pagination
                .and_then(|p| p.links.next)
                .and_then(|link| self.base_url.join(&link).ok());
        }

        Ok(results)
    }

    /// Newest release of `name` for the configured game version
    pub async fn latest_release(&self, name: &str) -> Result<Option<Release>> {
        let m = self.full_mod(name).await?;
        Ok(m.latest_release(&self.game_version).cloned())
    }

    /// Authenticated download URL for a release
    pub fn download_url(&self, release: &Release, credentials: &Credentials) -> Result<Url> {
        if !release.has_download_url() {
            anyhow::bail!(ModError::InvalidInput(format!(
                "release {} has no download URL",
                release.version
            )));
        }
        let mut url = self
            .base_url
            .join(release.download_url.trim())
            .map_err(|e| ModError::InvalidInput(format!("download URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("username", &credentials.username)
            .append_pair("token", &credentials.token);
        Ok(url)
    }

    /// Download a release archive into `dest_dir`.
    ///
    /// Data is streamed to a `.part` file which is renamed once the SHA-1
    /// matches. Progress is reported as `(downloaded, total)`; total is None
    /// when the server sends no length.
    pub async fn download_release(
        &self,
        mod_name: &str,
        release: &Release,
        credentials: &Credentials,
        dest_dir: &Path,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let url = self.download_url(release, credentials)?;
        let dest = dest_dir.join(release.archive_name(mod_name));
        let part = dest_dir.join(format!("{}.part", release.archive_name(mod_name)));

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| ModError::from_io(&e, dest_dir))?;

        tracing::info!("Downloading {} {}", mod_name, release.version);

        if let Err(e) = self
            .stream_to_file(url, &part, &release.sha1, progress, cancel)
            .await
        {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }

        tokio::fs::rename(&part, &dest)
            .await
            .with_context(|| format!("Failed to move download into {}", dest.display()))?;

        tracing::info!("Downloaded {} {} to {}", mod_name, release.version, dest.display());
        Ok(dest)
    }

    async fn stream_to_file(
        &self,
        url: Url,
        part: &Path,
        expected_sha1: &str,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            anyhow::bail!(ModError::Cancelled);
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ModError::Network(e.to_string()))?;

        // Token must not end up in logs or errors
        let mut public_url = url.clone();
        public_url.set_query(None);
        check_status(&public_url, response.status())?;

        // The portal answers bad credentials with its HTML login page
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);
        if is_html {
            anyhow::bail!(ModError::InvalidCredentials);
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| ModError::from_io(&e, part))?;
        let mut hasher = Sha1::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => anyhow::bail!(ModError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk.map_err(|e| ModError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .context("Error writing to file")?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }

        file.flush().await?;
        drop(file);

        if let Some(total) = total {
            if downloaded != total {
                anyhow::bail!(ModError::DownloadFailed(format!(
                    "received {} of {} bytes",
                    downloaded, total
                )));
            }
        }

        let expected = expected_sha1.trim();
        if !expected.is_empty() {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                anyhow::bail!(ModError::Corrupted(format!(
                    "SHA-1 mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
        }

        Ok(())
    }
}

fn check_status(url: &Url, status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        anyhow::bail!(ModError::InvalidCredentials);
    }
    Err(ModError::ApiRequestFailed {
        url: url.path().to_string(),
        status: status.as_u16(),
    }
    .into())
}
