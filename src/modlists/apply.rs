//! Applying a mod list to the installed mods
//!
//! Planning is pure: [`plan_apply`] diffs a list against the installed set.
//! [`apply_plan`] then walks the plan in list order, asks for confirmation
//! before every version switch, and commits each entry through a
//! [`ModStateStore`]. One entry failing never stops the others.

use super::CustomModList;
use crate::deps::versions_equal;
use crate::mods::{InstalledMod, ModStateStore};

/// Yes/no question shown before a risky change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub confirm_text: String,
    pub cancel_text: String,
}

/// Asks the user to confirm a prompt; blocks until answered
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Confirmer that answers every prompt the same way (`--yes`, tests)
impl Confirmer for bool {
    fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        *self
    }
}

/// What happens to an entry's version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
    /// No target, or the target is already active/selected
    Keep,
    /// Switch to another installed version; needs confirmation
    Switch { from: Option<String>, to: String },
    /// Target version is not on disk
    Unavailable { requested: String },
}

/// Planned change for one installed mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPlan {
    /// Installed spelling of the mod name
    pub name: String,
    pub enabled_before: bool,
    pub enabled_after: bool,
    /// Pin currently stored in mod-list.json
    pub current_selection: Option<String>,
    pub version_change: VersionChange,
}

impl EntryPlan {
    pub fn needs_confirmation(&self) -> bool {
        matches!(self.version_change, VersionChange::Switch { .. })
    }

    /// Nothing would change on disk
    pub fn is_unchanged(&self) -> bool {
        self.enabled_before == self.enabled_after
            && !matches!(self.version_change, VersionChange::Switch { .. })
    }
}

/// Diff between a mod list and the installed mods
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub list_name: String,
    /// Installed entries, in list order
    pub entries: Vec<EntryPlan>,
    /// Names in the list that are not installed
    pub missing: Vec<String>,
}

impl ApplyPlan {
    pub fn confirmations_needed(&self) -> usize {
        self.entries.iter().filter(|e| e.needs_confirmation()).count()
    }

    pub fn changes(&self) -> impl Iterator<Item = &EntryPlan> {
        self.entries.iter().filter(|e| !e.is_unchanged())
    }
}

/// Result of applying one list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Applied { name: String, version_switched: bool },
    /// Enabled state applied; the user kept the current version
    VersionDeclined { name: String },
    /// Enabled state applied; the requested version is not installed
    VersionUnavailable { name: String, requested: String },
    Failed { name: String, error: String },
    NotInstalled { name: String },
}

impl EntryOutcome {
    pub fn name(&self) -> &str {
        match self {
            EntryOutcome::Applied { name, .. }
            | EntryOutcome::VersionDeclined { name }
            | EntryOutcome::VersionUnavailable { name, .. }
            | EntryOutcome::Failed { name, .. }
            | EntryOutcome::NotInstalled { name } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub outcomes: Vec<EntryOutcome>,
    pub prompts_shown: usize,
}

impl ApplyReport {
    pub fn failed(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EntryOutcome::Failed { .. }))
    }

    pub fn summary(&self) -> String {
        let mut applied = 0;
        let mut declined = 0;
        let mut unavailable = 0;
        let mut failed = 0;
        let mut missing = 0;
        for outcome in &self.outcomes {
            match outcome {
                EntryOutcome::Applied { .. } => applied += 1,
                EntryOutcome::VersionDeclined { .. } => declined += 1,
                EntryOutcome::VersionUnavailable { .. } => unavailable += 1,
                EntryOutcome::Failed { .. } => failed += 1,
                EntryOutcome::NotInstalled { .. } => missing += 1,
            }
        }
        format!(
            "{} applied, {} kept current version, {} version unavailable, {} failed, {} not installed",
            applied, declined, unavailable, failed, missing
        )
    }
}

/// Compute what applying `list` would change
pub fn plan_apply(list: &CustomModList, installed: &[InstalledMod]) -> ApplyPlan {
    let mut plan = ApplyPlan {
        list_name: list.name.clone(),
        ..Default::default()
    };

    for entry in &list.entries {
        let Some(m) = installed
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(entry.name.trim()))
        else {
            plan.missing.push(entry.name.clone());
            continue;
        };

        let version_change = match entry.target_version() {
            None => VersionChange::Keep,
            Some(target) => {
                let is_selected = m
                    .selected_version()
                    .map(|selected| versions_equal(selected, target))
                    .unwrap_or(false);

                if m.is_active_version(target) || is_selected {
                    VersionChange::Keep
                } else if let Some(available) = m.version(target) {
                    VersionChange::Switch {
                        from: m.active_version().map(str::to_string),
                        to: available.version.clone(),
                    }
                } else {
                    VersionChange::Unavailable {
                        requested: target.to_string(),
                    }
                }
            }
        };

        plan.entries.push(EntryPlan {
            name: m.name.clone(),
            enabled_before: m.enabled,
            enabled_after: entry.enabled,
            current_selection: m.selected_version().map(str::to_string),
            version_change,
        });
    }

    plan
}

fn switch_prompt(name: &str, from: Option<&str>, to: &str) -> ConfirmPrompt {
    ConfirmPrompt {
        title: "Switch mod version".to_string(),
        message: format!(
            "{} is currently at version {}. Switch to {}?",
            name,
            from.unwrap_or("(none)"),
            to
        ),
        confirm_text: format!("Use {}", to),
        cancel_text: "Keep current".to_string(),
    }
}

/// Commit a plan entry by entry, in order
pub async fn apply_plan(
    plan: &ApplyPlan,
    confirmer: &dyn Confirmer,
    store: &dyn ModStateStore,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    tracing::info!(
        "Applying mod list '{}' ({} installed entries, {} not installed)",
        plan.list_name,
        plan.entries.len(),
        plan.missing.len()
    );

    for entry in &plan.entries {
        let (version, pending) = match &entry.version_change {
            VersionChange::Keep => (entry.current_selection.clone(), None),
            VersionChange::Unavailable { requested } => {
                tracing::warn!(
                    "{} {} is not installed; applying enabled state only",
                    entry.name,
                    requested
                );
                (
                    entry.current_selection.clone(),
                    Some(EntryOutcome::VersionUnavailable {
                        name: entry.name.clone(),
                        requested: requested.clone(),
                    }),
                )
            }
            VersionChange::Switch { from, to } => {
                report.prompts_shown += 1;
                let prompt = switch_prompt(&entry.name, from.as_deref(), to);
                if confirmer.confirm(&prompt) {
                    (Some(to.clone()), None)
                } else {
                    tracing::info!("Kept current version of {}", entry.name);
                    (
                        entry.current_selection.clone(),
                        Some(EntryOutcome::VersionDeclined {
                            name: entry.name.clone(),
                        }),
                    )
                }
            }
        };

        let outcome = match store
            .save_mod_state(&entry.name, entry.enabled_after, version.as_deref())
            .await
        {
            Ok(()) => pending.unwrap_or_else(|| EntryOutcome::Applied {
                name: entry.name.clone(),
                version_switched: entry.needs_confirmation(),
            }),
            Err(e) => {
                tracing::error!("Failed to apply {}: {:#}", entry.name, e);
                EntryOutcome::Failed {
                    name: entry.name.clone(),
                    error: format!("{:#}", e),
                }
            }
        };
        report.outcomes.push(outcome);
    }

    for name in &plan.missing {
        tracing::info!("Skipping {}: not installed", name);
        report.outcomes.push(EntryOutcome::NotInstalled { name: name.clone() });
    }

    tracing::info!("Applied mod list '{}': {}", plan.list_name, report.summary());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modlists::ModListEntry;
    use crate::mods::{InstalledVersion, ModInfo, ModSource};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn installed(name: &str, enabled: bool, versions: &[&str], pin: Option<&str>) -> InstalledMod {
        InstalledMod {
            name: name.to_string(),
            title: name.to_string(),
            author: "tester".to_string(),
            enabled,
            versions: versions
                .iter()
                .map(|v| InstalledVersion {
                    version: v.to_string(),
                    path: PathBuf::from(format!("/mods/{}_{}.zip", name, v)),
                    source: ModSource::Zip,
                    info: ModInfo {
                        name: name.to_string(),
                        version: v.to_string(),
                        title: String::new(),
                        author: String::new(),
                        description: None,
                        homepage: None,
                        factorio_version: Some("2.0".to_string()),
                        dependencies: Vec::new(),
                    },
                })
                .collect(),
            pinned_version: pin.map(str::to_string),
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(String, bool, Option<String>)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl ModStateStore for RecordingStore {
        async fn save_mod_state(
            &self,
            name: &str,
            enabled: bool,
            version: Option<&str>,
        ) -> anyhow::Result<()> {
            if self.fail_for.as_deref() == Some(name) {
                anyhow::bail!("disk full");
            }
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), enabled, version.map(str::to_string)));
            Ok(())
        }
    }

    struct CountingConfirmer {
        answer: bool,
        asked: AtomicUsize,
    }

    impl CountingConfirmer {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: AtomicUsize::new(0),
            }
        }
    }

    impl Confirmer for CountingConfirmer {
        fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn list(entries: Vec<ModListEntry>) -> CustomModList {
        CustomModList {
            name: "test".to_string(),
            description: String::new(),
            entries,
        }
    }

    #[test]
    fn test_plan_classifies_entries() {
        let mods = vec![
            installed("flib", true, &["0.14.0", "0.15.0"], None),
            installed("rate-calculator", true, &["3.3.0"], None),
        ];
        let plan = plan_apply(
            &list(vec![
                ModListEntry::new("FLIB", true, Some("0.14.0".into())),
                ModListEntry::new("rate-calculator", false, Some("9.0.0".into())),
                ModListEntry::new("absent-mod", true, None),
            ]),
            &mods,
        );

        assert_eq!(plan.missing, vec!["absent-mod"]);
        assert_eq!(plan.entries[0].name, "flib");
        assert_eq!(
            plan.entries[0].version_change,
            VersionChange::Switch {
                from: Some("0.15.0".into()),
                to: "0.14.0".into()
            }
        );
        assert_eq!(
            plan.entries[1].version_change,
            VersionChange::Unavailable {
                requested: "9.0.0".into()
            }
        );
        assert_eq!(plan.confirmations_needed(), 1);
        assert_eq!(plan.changes().count(), 2);
    }

    #[test]
    fn test_selected_version_needs_no_switch() {
        let mods = vec![installed("flib", true, &["0.14.0", "0.15.0"], Some("0.14.0"))];
        let plan = plan_apply(
            &list(vec![ModListEntry::new("flib", true, Some("0.14.0".into()))]),
            &mods,
        );
        assert_eq!(plan.entries[0].version_change, VersionChange::Keep);
        assert!(plan.entries[0].is_unchanged());
    }

    #[tokio::test]
    async fn test_active_version_never_prompts() {
        let mods = vec![installed("flib", false, &["0.14.0", "0.15.0"], None)];
        let plan = plan_apply(
            &list(vec![ModListEntry::new("flib", true, Some("0.15.0".into()))]),
            &mods,
        );

        let confirmer = CountingConfirmer::new(false);
        let store = RecordingStore::default();
        let report = apply_plan(&plan, &confirmer, &store).await;

        assert_eq!(confirmer.asked.load(Ordering::SeqCst), 0);
        assert_eq!(report.prompts_shown, 0);
        assert_eq!(
            store.calls.lock().unwrap().as_slice(),
            &[("flib".to_string(), true, None)]
        );
    }

    #[tokio::test]
    async fn test_one_prompt_per_switch_and_decline_keeps_version() {
        let mods = vec![
            installed("flib", true, &["0.14.0", "0.15.0"], None),
            installed("stdlib", true, &["1.0.0", "2.0.0"], Some("2.0.0")),
            installed("even-distribution", true, &["2.0.1"], None),
        ];
        let plan = plan_apply(
            &list(vec![
                ModListEntry::new("flib", true, Some("0.14.0".into())),
                ModListEntry::new("stdlib", false, Some("1.0.0".into())),
                ModListEntry::new("even-distribution", false, None),
            ]),
            &mods,
        );

        let confirmer = CountingConfirmer::new(false);
        let store = RecordingStore::default();
        let report = apply_plan(&plan, &confirmer, &store).await;

        assert_eq!(confirmer.asked.load(Ordering::SeqCst), 2);
        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("flib".to_string(), true, None),
                ("stdlib".to_string(), false, Some("2.0.0".to_string())),
                ("even-distribution".to_string(), false, None),
            ]
        );
        assert!(matches!(report.outcomes[0], EntryOutcome::VersionDeclined { .. }));
        assert!(matches!(report.outcomes[2], EntryOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn test_confirmed_switch_saves_target() {
        let mods = vec![installed("flib", true, &["0.14.0", "0.15.0"], None)];
        let plan = plan_apply(
            &list(vec![ModListEntry::new("flib", true, Some("0.14.0".into()))]),
            &mods,
        );

        let store = RecordingStore::default();
        let report = apply_plan(&plan, &true, &store).await;

        assert_eq!(
            store.calls.lock().unwrap()[0],
            ("flib".to_string(), true, Some("0.14.0".to_string()))
        );
        assert_eq!(
            report.outcomes[0],
            EntryOutcome::Applied {
                name: "flib".into(),
                version_switched: true
            }
        );
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let mods = vec![
            installed("flib", true, &["0.15.0"], None),
            installed("stdlib", true, &["2.0.0"], None),
        ];
        let plan = plan_apply(
            &list(vec![
                ModListEntry::new("flib", false, None),
                ModListEntry::new("stdlib", false, None),
                ModListEntry::new("absent", true, None),
            ]),
            &mods,
        );

        let store = RecordingStore {
            fail_for: Some("flib".to_string()),
            ..Default::default()
        };
        let report = apply_plan(&plan, &true, &store).await;

        assert_eq!(report.failed().count(), 1);
        assert_eq!(store.calls.lock().unwrap().len(), 1);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.outcomes[2].name(), "absent");
        assert!(report.summary().contains("1 failed"));
    }
}
