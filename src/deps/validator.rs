//! Dependency validation against the installed mod set

use super::{is_dlc_dependency, is_game_dependency, parse_dependency, DependencyKind};
use std::collections::HashMap;

/// Message reported once when expansion content is required but not owned
pub const SPACE_AGE_DLC: &str = "Space Age DLC";

/// Source of facts about the game installation
pub trait GameEnvironment: Send + Sync {
    /// Whether the Space Age expansion is available
    fn has_space_age(&self) -> bool;
}

impl GameEnvironment for bool {
    fn has_space_age(&self) -> bool {
        *self
    }
}

/// One installed mod as seen by the validator
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub name: String,
    pub enabled: bool,
    pub version: Option<String>,
}

/// Case-insensitive view of installed mods at a point in time
#[derive(Debug, Clone, Default)]
pub struct InstalledSnapshot {
    mods: HashMap<String, SnapshotEntry>,
}

impl InstalledSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, enabled: bool, version: Option<String>) {
        let name = name.into();
        self.mods.insert(
            name.to_lowercase(),
            SnapshotEntry {
                name,
                enabled,
                version,
            },
        );
    }

    pub fn with(mut self, name: &str, enabled: bool) -> Self {
        self.insert(name, enabled, None);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.mods.get(&name.trim().to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).map(|e| e.enabled).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

/// Outcome of validating one mod's dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub missing_mandatory: Vec<String>,
    pub disabled_dependencies: Vec<String>,
    pub incompatible_mods: Vec<String>,
    pub missing_built_ins: Vec<String>,
    pub is_valid: bool,
}

impl ValidationResult {
    /// Human-readable lines describing each problem
    pub fn problems(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.missing_mandatory.is_empty() {
            lines.push(format!("Missing: {}", self.missing_mandatory.join(", ")));
        }
        if !self.disabled_dependencies.is_empty() {
            lines.push(format!("Disabled: {}", self.disabled_dependencies.join(", ")));
        }
        if !self.incompatible_mods.is_empty() {
            lines.push(format!("Incompatible: {}", self.incompatible_mods.join(", ")));
        }
        if !self.missing_built_ins.is_empty() {
            lines.push(format!("Requires: {}", self.missing_built_ins.join(", ")));
        }
        lines
    }
}

/// Installed dependency whose version does not meet the declared constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    pub name: String,
    pub required: String,
    pub installed: String,
}

/// Classifies a mod's dependencies against an [`InstalledSnapshot`]
pub struct DependencyValidator<'a> {
    env: &'a dyn GameEnvironment,
}

impl<'a> DependencyValidator<'a> {
    pub fn new(env: &'a dyn GameEnvironment) -> Self {
        Self { env }
    }

    /// Names of dependencies that are neither optional, conflicting, nor provided by the game
    pub fn mandatory_dependencies(&self, dependencies: &[String]) -> Vec<String> {
        dependencies
            .iter()
            .map(|raw| parse_dependency(raw))
            .filter(|dep| dep.kind.is_mandatory())
            .filter(|dep| !dep.name.is_empty() && !is_game_dependency(&dep.name))
            .map(|dep| dep.name)
            .collect()
    }

    pub fn missing_mandatory(
        &self,
        dependencies: &[String],
        installed: &InstalledSnapshot,
    ) -> Vec<String> {
        self.mandatory_dependencies(dependencies)
            .into_iter()
            .filter(|name| !installed.contains(name))
            .collect()
    }

    /// Conflicting dependencies that are present in the installed set
    pub fn incompatible_mods(
        &self,
        dependencies: &[String],
        installed: &InstalledSnapshot,
    ) -> Vec<String> {
        dependencies
            .iter()
            .map(|raw| parse_dependency(raw))
            .filter(|dep| dep.kind == DependencyKind::Conflict && !dep.name.is_empty())
            .filter(|dep| installed.contains(&dep.name))
            .map(|dep| dep.name)
            .collect()
    }

    /// Mandatory dependencies that are installed but switched off
    pub fn disabled_dependencies(
        &self,
        dependencies: &[String],
        installed: &InstalledSnapshot,
    ) -> Vec<String> {
        self.mandatory_dependencies(dependencies)
            .into_iter()
            .filter(|name| installed.contains(name) && !installed.is_enabled(name))
            .collect()
    }

    /// Reports the expansion once if any mandatory dependency needs it and it is not owned
    pub fn missing_built_ins(&self, dependencies: &[String]) -> Vec<String> {
        let needs_dlc = dependencies
            .iter()
            .map(|raw| parse_dependency(raw))
            .any(|dep| dep.kind.is_mandatory() && is_dlc_dependency(&dep.name));

        if needs_dlc && !self.env.has_space_age() {
            vec![SPACE_AGE_DLC.to_string()]
        } else {
            Vec::new()
        }
    }

    pub fn validate(&self, dependencies: &[String], installed: &InstalledSnapshot) -> ValidationResult {
        let missing_mandatory = self.missing_mandatory(dependencies, installed);
        let disabled_dependencies = self.disabled_dependencies(dependencies, installed);
        let incompatible_mods = self.incompatible_mods(dependencies, installed);
        let missing_built_ins = self.missing_built_ins(dependencies);

        let is_valid = missing_mandatory.is_empty()
            && disabled_dependencies.is_empty()
            && incompatible_mods.is_empty()
            && missing_built_ins.is_empty();

        ValidationResult {
            missing_mandatory,
            disabled_dependencies,
            incompatible_mods,
            missing_built_ins,
            is_valid,
        }
    }

    /// Installed mandatory dependencies whose version violates the declared constraint.
    ///
    /// Advisory only; this does not feed into [`ValidationResult::is_valid`].
    pub fn version_mismatches(
        &self,
        dependencies: &[String],
        installed: &InstalledSnapshot,
    ) -> Vec<VersionMismatch> {
        dependencies
            .iter()
            .map(|raw| parse_dependency(raw))
            .filter(|dep| dep.kind.is_mandatory() && !is_game_dependency(&dep.name))
            .filter_map(|dep| {
                let constraint = dep.constraint.as_ref()?;
                let entry = installed.get(&dep.name)?;
                let have = entry.version.as_deref()?;
                if constraint.matches(have) {
                    None
                } else {
                    Some(VersionMismatch {
                        name: entry.name.clone(),
                        required: constraint.to_string(),
                        installed: have.to_string(),
                    })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mandatory_excludes_game_optional_and_conflicts() {
        let validator = DependencyValidator::new(&true);
        let list = deps(&[
            "base >= 2.0",
            "space-age",
            "quality",
            "elevated-rails",
            "? optional-mod",
            "(?) hidden-mod",
            "! bad-mod",
            "flib >= 0.15.0",
            "~ stdlib",
        ]);
        assert_eq!(validator.mandatory_dependencies(&list), vec!["flib", "stdlib"]);
    }

    #[test]
    fn test_missing_is_case_insensitive() {
        let validator = DependencyValidator::new(&true);
        let installed = InstalledSnapshot::new().with("FLib", true);
        let list = deps(&["flib", "other-mod"]);
        assert_eq!(validator.missing_mandatory(&list, &installed), vec!["other-mod"]);
    }

    #[test]
    fn test_incompatible_only_when_installed() {
        let validator = DependencyValidator::new(&true);
        let installed = InstalledSnapshot::new().with("bad-mod", false);
        let list = deps(&["! bad-mod", "(!) absent-mod"]);
        assert_eq!(validator.incompatible_mods(&list, &installed), vec!["bad-mod"]);
    }

    #[test]
    fn test_disabled_dependencies() {
        let validator = DependencyValidator::new(&true);
        let installed = InstalledSnapshot::new()
            .with("flib", false)
            .with("stdlib", true);
        let list = deps(&["flib", "stdlib", "? off-optional"]);
        assert_eq!(validator.disabled_dependencies(&list, &installed), vec!["flib"]);
    }

    #[test]
    fn test_missing_built_ins_deduplicated() {
        let validator = DependencyValidator::new(&false);
        let list = deps(&["base", "space-age", "quality", "elevated-rails"]);
        assert_eq!(validator.missing_built_ins(&list), vec![SPACE_AGE_DLC.to_string()]);

        let owned = DependencyValidator::new(&true);
        assert!(owned.missing_built_ins(&list).is_empty());

        assert!(validator.missing_built_ins(&deps(&["base"])).is_empty());
        assert!(validator.missing_built_ins(&deps(&["? space-age"])).is_empty());
    }

    #[test]
    fn test_validate_aggregates() {
        let validator = DependencyValidator::new(&true);
        let installed = InstalledSnapshot::new().with("flib", true);

        let ok = validator.validate(&deps(&["base", "flib"]), &installed);
        assert!(ok.is_valid);
        assert!(ok.problems().is_empty());

        let bad = validator.validate(&deps(&["base", "flib", "missing-mod"]), &installed);
        assert!(!bad.is_valid);
        assert_eq!(bad.missing_mandatory, vec!["missing-mod"]);
        assert_eq!(bad.problems(), vec!["Missing: missing-mod".to_string()]);
    }

    #[test]
    fn test_version_mismatches_are_advisory() {
        let validator = DependencyValidator::new(&true);
        let mut installed = InstalledSnapshot::new();
        installed.insert("flib", true, Some("0.12.0".to_string()));

        let list = deps(&["flib >= 0.15.0"]);
        let mismatches = validator.version_mismatches(&list, &installed);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].required, ">= 0.15.0");
        assert!(validator.validate(&list, &installed).is_valid);
    }
}
