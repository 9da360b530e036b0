//! Application state and orchestration

mod actions;
mod prompt;

pub use prompt::{CliConfirmer, DownloadBar};

use crate::config::{Config, Credentials, FactorioEnvironment};
use crate::deps::{DependencyValidator, ValidationResult, VersionMismatch};
use crate::modlists::ModListManager;
use crate::mods::{snapshot, InstalledMod, ModManager};
use crate::portal::PortalClient;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Arc<RwLock<Config>>,

    /// Installed mods and mod-list.json
    pub mods: Arc<ModManager>,

    /// Saved custom mod lists
    pub modlists: Arc<ModListManager>,

    /// Mod portal client (None if the configured URL is unusable)
    pub portal: Option<Arc<PortalClient>>,

    /// Answer every confirmation with yes
    assume_yes: bool,
}

/// Dependency check of one installed mod
#[derive(Debug, Clone)]
pub struct ModCheck {
    pub name: String,
    pub result: ValidationResult,
    pub mismatches: Vec<VersionMismatch>,
}

impl App {
    /// Create a new App instance
    pub async fn new(config: Config) -> Result<Self> {
        config.ensure_dirs().context("Failed to create directories")?;

        let mods = Arc::new(ModManager::new(config.mods_dir()));

        let modlists = ModListManager::load(config.paths.modlists_file())
            .await
            .context("Failed to load saved mod lists")?;

        let portal = PortalClient::new(&config.portal)
            .map(Arc::new)
            .map_err(|e| {
                tracing::warn!("Failed to initialize mod portal client: {:#}", e);
                e
            })
            .ok();

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            mods,
            modlists: Arc::new(modlists),
            portal,
            assume_yes: false,
        })
    }

    pub fn set_assume_yes(&mut self, assume_yes: bool) {
        self.assume_yes = assume_yes;
    }

    /// Confirmer for this invocation; skips prompts with `--yes` or when
    /// `confirm_destructive` is off
    pub async fn confirmer(&self) -> CliConfirmer {
        let confirm = self.config.read().await.confirm_destructive;
        CliConfirmer::new(self.assume_yes || !confirm)
    }

    pub async fn confirm_destructive(&self, title: &str, message: &str) -> bool {
        self.confirmer().await.ask(title, message)
    }

    pub fn portal(&self) -> Result<Arc<PortalClient>> {
        self.portal
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Mod portal client is not available; check portal.base_url"))
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.config.read().await.credentials()
    }

    pub async fn environment(&self) -> FactorioEnvironment {
        self.config.read().await.environment()
    }

    /// Validate each mod in `targets` against the full installed set
    pub async fn check_mods(&self, targets: &[InstalledMod], all: &[InstalledMod]) -> Vec<ModCheck> {
        let env = self.environment().await;
        let validator = DependencyValidator::new(&env);
        let installed = snapshot(all);

        targets
            .iter()
            .map(|m| ModCheck {
                name: m.name.clone(),
                result: validator.validate(m.dependencies(), &installed),
                mismatches: validator.version_mismatches(m.dependencies(), &installed),
            })
            .collect()
    }
}
