//! Mod archive handling (zip files and unpacked mod folders)

use super::ModInfo;
use crate::deps::{parse_version, versions_equal};
use crate::error::ModError;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// How a mod version is stored in the mods directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModSource {
    /// `<name>_<version>.zip`
    Zip,
    /// Unpacked folder containing `info.json`
    Directory,
}

impl ModSource {
    /// Detect the source kind of a mods-directory entry
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return path.join("info.json").is_file().then_some(ModSource::Directory);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        (ext == "zip").then_some(ModSource::Zip)
    }
}

/// File name Factorio expects for a mod archive
pub fn archive_file_name(name: &str, version: &str) -> String {
    format!("{}_{}.zip", name, version)
}

/// Split `<name>_<version>` (file stem or folder name) into its parts
pub fn parse_archive_name(stem: &str) -> Option<(String, String)> {
    let (name, version) = stem.rsplit_once('_')?;
    if name.is_empty() || parse_version(version).is_none() {
        return None;
    }
    Some((name.to_string(), version.to_string()))
}

/// Whether a zip's `<name>_<version>` file name agrees with its `info.json`.
///
/// Factorio loads by `info.json`, but a mismatched name usually means a
/// renamed or hand-copied archive.
pub fn archive_name_matches(path: &Path, info: &ModInfo) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    match parse_archive_name(stem) {
        Some((name, version)) => {
            info.is_same_mod(&name) && versions_equal(&version, &info.version)
        }
        None => false,
    }
}

/// Read `info.json` from a zip archive or unpacked folder
pub fn read_mod_info(path: &Path) -> Result<ModInfo> {
    match ModSource::from_path(path) {
        Some(ModSource::Zip) => read_info_from_zip(path),
        Some(ModSource::Directory) => {
            let info_path = path.join("info.json");
            let content = std::fs::read_to_string(&info_path)
                .map_err(|e| ModError::from_io(&e, &info_path))?;
            ModInfo::from_json(&content)
                .with_context(|| format!("Failed to parse {}", info_path.display()))
        }
        None => Err(ModError::InvalidModFormat(format!(
            "{} is neither a zip archive nor a mod folder",
            path.display()
        ))
        .into()),
    }
}

/// Read `info.json` from a zip archive.
///
/// Factorio archives normally wrap everything in a single top-level folder,
/// so the shallowest `info.json` within two levels is used.
pub fn read_info_from_zip(path: &Path) -> Result<ModInfo> {
    let file = std::fs::File::open(path).map_err(|e| ModError::from_io(&e, path))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ModError::Corrupted(format!("{}: {}", path.display(), e)))?;

    let entry_name = zip
        .file_names()
        .map(|name| (sanitize_path(name), name.to_string()))
        .filter(|(clean, _)| {
            let depth = clean.split('/').count();
            depth <= 2 && clean.rsplit('/').next() == Some("info.json")
        })
        .min_by_key(|(clean, _)| clean.split('/').count())
        .map(|(_, raw)| raw)
        .ok_or_else(|| {
            ModError::InvalidModFormat(format!("{} does not contain info.json", path.display()))
        })?;

    let mut entry = zip
        .by_name(&entry_name)
        .map_err(|e| ModError::Corrupted(format!("{}: {}", path.display(), e)))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ModError::Corrupted(format!("{}: {}", path.display(), e)))?;

    ModInfo::from_json(&content).with_context(|| format!("Failed to parse info.json in {}", path.display()))
}

/// Sanitize path to prevent directory traversal
fn sanitize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
/// Write a minimal mod archive with `info.json` under a top-level folder
pub(crate) fn write_mod_zip(
    dir: &Path,
    name: &str,
    version: &str,
    deps: &[&str],
) -> std::path::PathBuf {
    use std::io::Write;

    let path = dir.join(archive_file_name(name, version));
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let info = serde_json::json!({
        "name": name,
        "version": version,
        "title": format!("{} title", name),
        "author": "tester",
        "factorio_version": "2.0",
        "dependencies": deps,
    });

    zip.start_file(format!("{}_{}/info.json", name, version), options)
        .unwrap();
    zip.write_all(info.to_string().as_bytes()).unwrap();
    zip.start_file(format!("{}_{}/control.lua", name, version), options)
        .unwrap();
    zip.write_all(b"-- empty").unwrap();
    zip.finish().unwrap();
    path
}
