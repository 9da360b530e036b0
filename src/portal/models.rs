//! Mod portal API response types

use crate::deps::{compare_versions, versions_equal};
use crate::mods::archive_file_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /api/mods/{name}/full`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalMod {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub downloads_count: u64,
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl PortalMod {
    /// Newest release built for `game_version` (e.g. "2.0")
    pub fn latest_release(&self, game_version: &str) -> Option<&Release> {
        self.releases
            .iter()
            .filter(|r| r.supports(game_version))
            .max_by(|a, b| compare_versions(&a.version, &b.version))
    }
}

/// One downloadable version of a mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub released_at: DateTime<Utc>,
    /// Path relative to the portal, e.g. `/download/flib/5f1a...`
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub info_json: ReleaseInfo,
}

impl Release {
    pub fn supports(&self, game_version: &str) -> bool {
        versions_equal(&self.info_json.factorio_version, game_version)
    }

    pub fn has_download_url(&self) -> bool {
        !self.download_url.trim().is_empty()
    }

    /// Archive file name, falling back to the Factorio naming scheme
    pub fn archive_name(&self, mod_name: &str) -> String {
        if self.file_name.trim().is_empty() {
            archive_file_name(mod_name, &self.version)
        } else {
            self.file_name.clone()
        }
    }
}

/// `info_json` subset the portal echoes back for each release
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseInfo {
    #[serde(default)]
    pub factorio_version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Entry in the paginated `GET /api/mods` listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModSummary {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub downloads_count: u64,
    #[serde(default)]
    pub latest_release: Option<Release>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModListPage {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub results: Vec<ModSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub links: PaginationLinks,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PaginationLinks {
    #[serde(default)]
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_MOD: &str = r#"{
        "name": "flib",
        "title": "Factorio Library",
        "owner": "raiguard",
        "summary": "A set of high-quality, commonly-used utilities.",
        "downloads_count": 1234567,
        "releases": [
            {
                "download_url": "/download/flib/aaa",
                "file_name": "flib_0.12.9.zip",
                "info_json": {"factorio_version": "1.1", "dependencies": ["base >= 1.1.0"]},
                "released_at": "2023-04-01T12:00:00.000000Z",
                "version": "0.12.9",
                "sha1": "0123456789abcdef0123456789abcdef01234567"
            },
            {
                "download_url": "/download/flib/bbb",
                "file_name": "flib_0.15.0.zip",
                "info_json": {"factorio_version": "2.0", "dependencies": ["base >= 2.0.0"]},
                "released_at": "2024-10-21T09:30:00.000000Z",
                "version": "0.15.0",
                "sha1": "89abcdef0123456789abcdef0123456789abcdef"
            },
            {
                "download_url": "/download/flib/ccc",
                "file_name": "flib_0.14.2.zip",
                "info_json": {"factorio_version": "2.0", "dependencies": ["base >= 2.0.0"]},
                "released_at": "2024-09-01T09:30:00.000000Z",
                "version": "0.14.2",
                "sha1": ""
            }
        ]
    }"#;

    #[test]
    fn test_parse_full_mod() {
        let m: PortalMod = serde_json::from_str(FULL_MOD).unwrap();
        assert_eq!(m.releases.len(), 3);
        assert_eq!(m.releases[0].info_json.dependencies, vec!["base >= 1.1.0"]);
        assert_eq!(m.releases[2].download_url, "/download/flib/ccc");
    }

    #[test]
    fn test_latest_release_for_game_version() {
        let m: PortalMod = serde_json::from_str(FULL_MOD).unwrap();
        assert_eq!(m.latest_release("2.0").unwrap().version, "0.15.0");
        assert_eq!(m.latest_release("1.1").unwrap().version, "0.12.9");
        assert!(m.latest_release("0.18").is_none());
    }

    #[test]
    fn test_archive_name_fallback() {
        let mut m: PortalMod = serde_json::from_str(FULL_MOD).unwrap();
        let release = &mut m.releases[1];
        assert_eq!(release.archive_name("flib"), "flib_0.15.0.zip");
        release.file_name.clear();
        assert_eq!(release.archive_name("flib"), "flib_0.15.0.zip");
    }

    #[test]
    fn test_parse_listing_page() {
        let page: ModListPage = serde_json::from_str(
            r#"{
                "pagination": {
                    "count": 2, "page": 1, "page_count": 2, "page_size": 1,
                    "links": {"first": null, "prev": null, "next": "https://mods.factorio.com/api/mods?page=2", "last": null}
                },
                "results": [{"name": "flib", "title": "Factorio Library", "owner": "raiguard"}]
            }"#,
        )
        .unwrap();

        let pagination = page.pagination.unwrap();
        assert_eq!(pagination.page, 1);
        assert!(pagination.links.next.is_some());
        assert_eq!(page.results[0].name, "flib");
        assert!(page.results[0].latest_release.is_none());
    }
}
