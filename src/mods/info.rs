//! `info.json` metadata carried by every mod

use crate::deps::parse_version;
use crate::error::ModError;
use serde::{Deserialize, Serialize};

/// Mod metadata as declared in `info.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub factorio_version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ModInfo {
    /// Mod identity is the name, compared case-insensitively
    pub fn is_same_mod(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    /// Parse and sanity-check an `info.json` document
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let info: ModInfo = serde_json::from_str(content.trim_start_matches('\u{feff}'))
            .map_err(|e| ModError::InvalidFormat(format!("info.json: {}", e)))?;
        if info.name.trim().is_empty() {
            return Err(ModError::InvalidModFormat("info.json has an empty name".into()).into());
        }
        if parse_version(&info.version).is_none() {
            return Err(ModError::InvalidModFormat(format!(
                "info.json has an invalid version '{}'",
                info.version
            ))
            .into());
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_json() {
        let info = ModInfo::from_json(
            r#"{
                "name": "flib",
                "version": "0.15.0",
                "title": "Factorio Library",
                "author": "raiguard",
                "factorio_version": "2.0",
                "dependencies": ["base >= 2.0.0"]
            }"#,
        )
        .unwrap();

        assert_eq!(info.name, "flib");
        assert_eq!(info.display_title(), "Factorio Library");
        assert_eq!(info.dependencies, vec!["base >= 2.0.0"]);
        assert!(info.is_same_mod("FLIB"));
    }

    #[test]
    fn test_missing_optional_fields() {
        let info = ModInfo::from_json(r#"{"name": "tiny", "version": "1.0.0"}"#).unwrap();
        assert!(info.dependencies.is_empty());
        assert_eq!(info.display_title(), "tiny");
    }

    #[test]
    fn test_rejects_bad_metadata() {
        assert!(ModInfo::from_json(r#"{"name": "", "version": "1.0.0"}"#).is_err());
        assert!(ModInfo::from_json(r#"{"name": "x", "version": "one"}"#).is_err());
        assert!(ModInfo::from_json("not json").is_err());
    }
}
