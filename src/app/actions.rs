//! CLI command action handlers

use super::{App, DownloadBar, ModCheck};
use crate::deps::parse_dependency;
use crate::history::{HistoryController, ReleaseState, ToggleOutcome, VersionHistory};
use crate::modlists::{apply_plan, plan_apply, EntryOutcome, ModListEntry, VersionChange};
use crate::mods::ModStateStore;
use crate::updates::UpdateChecker;
use anyhow::{bail, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

fn print_check(check: &ModCheck) {
    if check.result.is_valid && check.mismatches.is_empty() {
        println!("  {}: OK", check.name);
        return;
    }
    println!("  {}:", check.name);
    for problem in check.result.problems() {
        println!("    {}", problem);
    }
    for m in &check.mismatches {
        println!(
            "    Version: {} requires {}, installed {}",
            m.name, m.required, m.installed
        );
    }
}

/// Cancel `token` when the user presses Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping");
            token.cancel();
        }
    });
}

impl App {
    // ========== Mod Commands ==========

    pub async fn cmd_mod_list(&self) -> Result<()> {
        let mods = self.mods.scan().await?;

        if mods.is_empty() {
            println!("No mods installed in {}.", self.mods.mods_dir().display());
            return Ok(());
        }

        println!("Installed Mods ({}):", mods.len());
        println!("{:-<60}", "");
        for (i, m) in mods.iter().enumerate() {
            let status = if m.enabled { "[x]" } else { "[ ]" };
            let pin = if m.selected_version().is_some() { " (pinned)" } else { "" };
            let others = if m.versions.len() > 1 {
                format!(" +{} other versions", m.versions.len() - 1)
            } else {
                String::new()
            };
            println!(
                "{:>3}. {} {} v{}{}{}",
                i + 1,
                status,
                m.name,
                m.active_version().unwrap_or("?"),
                pin,
                others
            );
        }
        Ok(())
    }

    pub async fn cmd_mod_info(&self, name: &str) -> Result<()> {
        let all = self.mods.scan().await?;
        let Some(m) = all.iter().find(|m| m.name.eq_ignore_ascii_case(name.trim())) else {
            bail!("Mod '{}' not found. Run 'factorio-mm mod list' to see installed mods.", name);
        };

        println!("Mod Information");
        println!("{:-<40}", "");
        println!("Name:      {}", m.name);
        println!("Title:     {}", m.title);
        println!("Author:    {}", m.author);
        println!("Enabled:   {}", if m.enabled { "yes" } else { "no" });
        println!("Active:    {}", m.active_version().unwrap_or("?"));
        if let Some(pin) = m.selected_version() {
            println!("Selected:  {}", pin);
        }
        println!("Installed: {}", m.installed_versions().join(", "));
        if let Some(info) = m.active().map(|v| &v.info) {
            if let Some(factorio) = &info.factorio_version {
                println!("Factorio:  {}", factorio);
            }
            if let Some(homepage) = &info.homepage {
                println!("Homepage:  {}", homepage);
            }
        }

        if !m.dependencies().is_empty() {
            println!("\nDependencies:");
            for raw in m.dependencies() {
                let dep = parse_dependency(raw);
                let constraint = dep
                    .constraint
                    .as_ref()
                    .map(|c| format!(" {}", c))
                    .unwrap_or_default();
                println!("  {:?}: {}{}", dep.kind, dep.name, constraint);
            }
        }

        println!("\nDependency check:");
        for check in self.check_mods(std::slice::from_ref(m), &all).await {
            print_check(&check);
        }
        Ok(())
    }

    pub async fn cmd_mod_enable(&self, name: &str) -> Result<()> {
        self.mods.set_enabled(name, true).await?;
        println!("Enabled: {}", name);

        let all = self.mods.scan().await?;
        if let Some(m) = all.iter().find(|m| m.name.eq_ignore_ascii_case(name.trim())) {
            for check in self.check_mods(std::slice::from_ref(m), &all).await {
                if !check.result.is_valid {
                    println!("Warning: dependency problems");
                    print_check(&check);
                }
            }
        }
        Ok(())
    }

    pub async fn cmd_mod_disable(&self, name: &str) -> Result<()> {
        self.mods.set_enabled(name, false).await?;
        println!("Disabled: {}", name);
        Ok(())
    }

    /// Validate one mod, or every enabled mod
    pub async fn cmd_mod_check(&self, name: Option<&str>) -> Result<()> {
        let all = self.mods.scan().await?;
        let targets: Vec<_> = match name {
            Some(name) => all
                .iter()
                .filter(|m| m.name.eq_ignore_ascii_case(name.trim()))
                .cloned()
                .collect(),
            None => all.iter().filter(|m| m.enabled).cloned().collect(),
        };
        if targets.is_empty() {
            match name {
                Some(name) => bail!("Mod '{}' not found.", name),
                None => {
                    println!("No enabled mods.");
                    return Ok(());
                }
            }
        }

        let checks = self.check_mods(&targets, &all).await;
        let failing = checks.iter().filter(|c| !c.result.is_valid).count();

        println!("Dependency check ({} mods):", checks.len());
        for check in &checks {
            print_check(check);
        }
        if failing > 0 {
            println!("\n{} mod(s) have unmet dependencies.", failing);
        }
        Ok(())
    }

    pub async fn cmd_mod_install(&self, path: &str) -> Result<()> {
        println!("Installing mod from: {}", path);
        let installed = self.mods.install_archive(Path::new(path)).await?;
        println!(
            "Installed {} v{} to {}",
            installed.info.name,
            installed.version,
            installed.path.display()
        );
        Ok(())
    }

    pub async fn cmd_mod_remove(&self, name: &str) -> Result<()> {
        let m = self.mods.get_mod(name).await?;
        let message = format!(
            "Remove {} and all {} installed version(s)?",
            m.name,
            m.versions.len()
        );
        if !self.confirm_destructive("Remove mod", &message).await {
            println!("Cancelled.");
            return Ok(());
        }
        self.mods.remove_mod(&m.name).await?;
        println!("Removed: {}", m.name);
        Ok(())
    }

    pub async fn cmd_mod_select_version(&self, name: &str, version: &str) -> Result<()> {
        self.mods.select_version(name, version).await?;
        println!("{} will load version {}", name, version);
        Ok(())
    }

    /// Show portal releases with local install state
    pub async fn cmd_mod_versions(&self, name: &str) -> Result<()> {
        let portal = self.portal()?;
        let installed = self.mods.get_mod(name).await.ok();
        let portal_mod = portal.full_mod(name).await?;
        let history = VersionHistory::load(&portal_mod, installed.as_ref());

        println!("Versions of {}:", history.mod_name);
        println!("{:-<60}", "");
        for entry in &history.releases {
            let state = match entry.state() {
                ReleaseState::Installed => "installed",
                _ => "",
            };
            let active = installed
                .as_ref()
                .map(|m| m.is_active_version(&entry.release.version))
                .unwrap_or(false);
            println!(
                "  {:<10} {}  factorio {:<5} {}{}",
                entry.release.version,
                entry.release.released_at.format("%Y-%m-%d"),
                entry.release.info_json.factorio_version,
                state,
                if active { " (active)" } else { "" }
            );
        }
        Ok(())
    }

    /// Download a release when missing, delete it when installed
    pub async fn cmd_mod_toggle_version(&self, name: &str, version: &str) -> Result<()> {
        let portal = self.portal()?;
        let installed = self.mods.get_mod(name).await.ok();
        let portal_mod = portal.full_mod(name).await?;
        let mut history = VersionHistory::load(&portal_mod, installed.as_ref());

        let Some(entry) = history.entry(version) else {
            bail!("{} has no release {} on the mod portal", history.mod_name, version);
        };
        if entry.is_installed {
            let message = format!("Delete {} {} from the mods directory?", history.mod_name, version);
            if !self.confirm_destructive("Delete version", &message).await {
                println!("Cancelled.");
                return Ok(());
            }
        }

        let controller = HistoryController::new(self.mods.clone(), portal, self.credentials().await);
        let mod_name = history.mod_name.clone();
        let bar = DownloadBar::new(&format!("{} {}", mod_name, version));

        let outcome = {
            let toggle = controller.toggle(&mut history, version, &bar);
            tokio::pin!(toggle);
            loop {
                tokio::select! {
                    outcome = &mut toggle => break outcome,
                    Ok(()) = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted, cancelling {} {}", mod_name, version);
                        controller.cancel(&mod_name);
                    }
                }
            }
        };
        bar.finish();

        match outcome {
            ToggleOutcome::Installed(path) => println!("Installed {}", path.display()),
            ToggleOutcome::Deleted => println!("Deleted {} {}", history.mod_name, version),
            ToggleOutcome::RejectedActive => println!(
                "{} {} is the active version and was not deleted. Select another version first.",
                history.mod_name, version
            ),
            ToggleOutcome::Aborted(reason) => println!("Skipped: {}", reason),
            ToggleOutcome::Busy => println!("Another operation on this release is running."),
            ToggleOutcome::Failed(message) => bail!(message),
        }
        Ok(())
    }

    // ========== Mod List Commands ==========

    pub async fn cmd_modlist_list(&self) -> Result<()> {
        let lists = self.modlists.list().await;
        if lists.is_empty() {
            println!("No mod lists. Create one with 'factorio-mm modlist capture <name>'.");
            return Ok(());
        }

        println!("Mod Lists:");
        println!("{:-<60}", "");
        for list in &lists {
            println!(
                "  {} ({} mods, {} enabled){}",
                list.name,
                list.entries.len(),
                list.enabled_count(),
                if list.description.is_empty() {
                    String::new()
                } else {
                    format!(" - {}", list.description)
                }
            );
        }
        Ok(())
    }

    pub async fn cmd_modlist_show(&self, name: &str) -> Result<()> {
        let list = self.modlists.get(name).await?;
        println!("{}", list.name);
        if !list.description.is_empty() {
            println!("{}", list.description);
        }
        println!("{:-<60}", "");
        for (i, entry) in list.entries.iter().enumerate() {
            let status = if entry.enabled { "[x]" } else { "[ ]" };
            println!(
                "{:>3}. {} {} {}",
                i + 1,
                status,
                entry.name,
                entry.target_version().unwrap_or("(any version)")
            );
        }
        Ok(())
    }

    pub async fn cmd_modlist_create(&self, name: &str, description: &str) -> Result<()> {
        let list = self.modlists.create(name, description).await?;
        println!("Created mod list '{}'", list.name);
        Ok(())
    }

    /// Save the current installed state as a list
    pub async fn cmd_modlist_capture(&self, name: &str) -> Result<()> {
        let mods = self.mods.scan().await?;
        let list = self.modlists.capture(name, &mods).await?;
        println!(
            "Saved mod list '{}' with {} mods ({} enabled)",
            list.name,
            list.entries.len(),
            list.enabled_count()
        );
        Ok(())
    }

    pub async fn cmd_modlist_delete(&self, name: &str) -> Result<()> {
        let list = self.modlists.get(name).await?;
        let message = format!("Delete mod list '{}'?", list.name);
        if !self.confirm_destructive("Delete mod list", &message).await {
            println!("Cancelled.");
            return Ok(());
        }
        self.modlists.delete(&list.name).await?;
        println!("Deleted mod list '{}'", list.name);
        Ok(())
    }

    pub async fn cmd_modlist_rename(&self, name: &str, new_name: &str) -> Result<()> {
        self.modlists.rename(name, new_name).await?;
        println!("Renamed '{}' to '{}'", name, new_name.trim());
        Ok(())
    }

    pub async fn cmd_modlist_describe(&self, name: &str, description: &str) -> Result<()> {
        self.modlists.set_description(name, description).await?;
        println!("Updated description of '{}'", name);
        Ok(())
    }

    pub async fn cmd_modlist_set(
        &self,
        name: &str,
        mod_name: &str,
        enabled: bool,
        version: Option<&str>,
    ) -> Result<()> {
        let entry = ModListEntry::new(mod_name.trim(), enabled, version.map(str::to_string));
        self.modlists.upsert_entry(name, entry).await?;
        println!(
            "{}: {} {} {}",
            name,
            if enabled { "enable" } else { "disable" },
            mod_name,
            version.unwrap_or("(any version)")
        );
        Ok(())
    }

    pub async fn cmd_modlist_unset(&self, name: &str, mod_name: &str) -> Result<()> {
        if self.modlists.remove_entry(name, mod_name).await? {
            println!("Removed {} from '{}'", mod_name, name);
        } else {
            println!("'{}' has no entry for {}", name, mod_name);
        }
        Ok(())
    }

    /// Apply a saved list to the installed mods
    pub async fn cmd_modlist_apply(&self, name: &str, dry_run: bool) -> Result<()> {
        let list = self.modlists.get(name).await?;
        let mods = self.mods.scan().await?;
        let plan = plan_apply(&list, &mods);

        println!("Applying mod list '{}':", list.name);
        println!("{:-<60}", "");
        for entry in &plan.entries {
            let enabled = match (entry.enabled_before, entry.enabled_after) {
                (false, true) => "enable",
                (true, false) => "disable",
                (_, true) => "keep enabled",
                (_, false) => "keep disabled",
            };
            let version = match &entry.version_change {
                VersionChange::Keep => String::new(),
                VersionChange::Switch { from, to } => {
                    format!(", switch {} -> {}", from.as_deref().unwrap_or("?"), to)
                }
                VersionChange::Unavailable { requested } => {
                    format!(", version {} not installed", requested)
                }
            };
            println!("  {}: {}{}", entry.name, enabled, version);
        }
        for missing in &plan.missing {
            println!("  {}: not installed, skipped", missing);
        }

        if dry_run {
            println!("\nDry run: {} change(s), nothing written.", plan.changes().count());
            return Ok(());
        }

        let confirmer = self.confirmer().await;
        let store: &dyn ModStateStore = self.mods.as_ref();
        let report = apply_plan(&plan, &confirmer, store).await;

        for outcome in report.failed() {
            if let EntryOutcome::Failed { name, error } = outcome {
                println!("  Failed: {}: {}", name, error);
            }
        }
        println!("\n{}", report.summary());
        Ok(())
    }

    // ========== Update Commands ==========

    pub async fn cmd_updates_check(&self) -> Result<()> {
        let portal = self.portal()?;
        let mods = self.mods.scan().await?;
        if mods.is_empty() {
            println!("No mods installed.");
            return Ok(());
        }

        println!("Checking {} mods for updates...", mods.len());
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());

        let report = UpdateChecker::new(portal).check(&mods, &cancel).await;

        let available: Vec<_> = report.available().collect();
        if available.is_empty() {
            println!("All checked mods are up to date.");
        } else {
            println!("Updates available:");
            for update in &available {
                println!(
                    "  {} {} -> {} (released {})",
                    update.name,
                    update.current_version,
                    update.latest_version,
                    update.released_at.format("%Y-%m-%d")
                );
            }
        }
        for failure in &report.failures {
            println!("  Could not check {}: {}", failure.name, failure.message);
        }
        let retryable = report.retryable().count();
        if retryable > 0 {
            println!("{} failure(s) look temporary; try again later.", retryable);
        }
        if report.cancelled {
            println!("Check cancelled; {} of {} mods checked.", report.checked.len(), mods.len());
        }
        Ok(())
    }

    // ========== Portal Commands ==========

    pub async fn cmd_portal_recent(&self, pages: usize) -> Result<()> {
        let portal = self.portal()?;
        let mods = portal.recent_mods(pages.max(1)).await?;

        println!("Recently updated mods for Factorio {}:", portal.game_version());
        println!("{:-<60}", "");
        for m in &mods {
            let latest = m
                .latest_release
                .as_ref()
                .map(|r| format!("v{} ({})", r.version, r.released_at.format("%Y-%m-%d")))
                .unwrap_or_default();
            println!("  {} - {} {}", m.name, m.title, latest);
        }
        Ok(())
    }

    // ========== Config Commands ==========

    pub async fn cmd_config_show(&self) -> Result<()> {
        let config = self.config.read().await;
        println!("Configuration");
        println!("{:-<40}", "");
        println!("Config file:   {}", config.paths.config_file().display());
        println!("Mods dir:      {}", config.mods_dir().display());
        println!("User data dir: {}", config.user_data_dir().display());
        println!("Mod lists:     {}", config.paths.modlists_file().display());
        println!("Log file:      {}", config.paths.log_file().display());
        println!("Portal:        {}", config.portal.base_url);
        println!("Game version:  {}", config.portal.game_version);
        println!(
            "Credentials:   {}",
            if config.credentials().is_some() { "configured" } else { "missing" }
        );
        println!(
            "Space Age:     {}",
            match config.owns_space_age {
                Some(true) => "owned (configured)",
                Some(false) => "not owned (configured)",
                None => "auto-detect",
            }
        );
        Ok(())
    }
}
