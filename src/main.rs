use anyhow::Result;
use clap::{Parser, Subcommand};
use factorio_mm::{App, Config};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "factorio-mm")]
#[command(author, version, about = "A CLI mod manager for Factorio on Linux")]
struct Cli {
    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mods directory override for this invocation
    #[arg(long, global = true)]
    mods_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage installed mods
    Mod {
        #[command(subcommand)]
        action: ModCommands,
    },

    /// Save, edit and apply custom mod lists
    Modlist {
        #[command(subcommand)]
        action: ModlistCommands,
    },

    /// Check installed mods for updates
    Updates {
        #[command(subcommand)]
        action: UpdateCommands,
    },

    /// Mod portal queries
    Portal {
        #[command(subcommand)]
        action: PortalCommands,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ModCommands {
    /// List installed mods
    List,
    /// Show mod details and dependency status
    Info { name: String },
    /// Enable a mod
    Enable { name: String },
    /// Disable a mod
    Disable { name: String },
    /// Check dependencies of one mod, or of every enabled mod
    Check { name: Option<String> },
    /// Install a mod from a zip archive
    Install { path: String },
    /// Remove a mod and all its versions
    Remove { name: String },
    /// Pin the version Factorio loads
    SelectVersion { name: String, version: String },
    /// List portal releases and which are installed
    Versions { name: String },
    /// Download a release if missing, delete it if installed
    ToggleVersion { name: String, version: String },
}

#[derive(Subcommand)]
enum ModlistCommands {
    /// List saved mod lists
    List,
    /// Show the entries of a list
    Show { name: String },
    /// Create an empty list
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Save the current installed state as a new list
    Capture { name: String },
    /// Delete a list
    Delete { name: String },
    /// Rename a list
    Rename { name: String, new_name: String },
    /// Change a list's description
    Describe { name: String, description: String },
    /// Add or update a mod entry in a list
    Set {
        name: String,
        mod_name: String,
        /// Store the mod as disabled
        #[arg(long)]
        disabled: bool,
        /// Target version
        #[arg(long)]
        version: Option<String>,
    },
    /// Remove a mod entry from a list
    Unset { name: String, mod_name: String },
    /// Apply a list to the installed mods
    Apply {
        name: String,
        /// Show the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum UpdateCommands {
    /// Query the portal for newer releases of installed mods
    Check,
}

#[derive(Subcommand)]
enum PortalCommands {
    /// Most recently updated mods
    Recent {
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

/// Subscriber writing to stderr, and to `file` when it could be opened
fn log_subscriber(
    env_filter: EnvFilter,
    file: Option<std::fs::File>,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Arc::new(file))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
}

fn setup_logging(verbosity: u8, log_file: &Path) {
    let filter = match verbosity {
        0 => "factorio_mm=info",
        1 => "factorio_mm=debug",
        _ => "factorio_mm=trace",
    };

    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir).ok();
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file);

    match file {
        Ok(file) => log_subscriber(env_filter, Some(file)).init(),
        Err(e) => {
            log_subscriber(env_filter, None).init();
            tracing::warn!("Cannot open log file {}: {}", log_file.display(), e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().await?;
    setup_logging(cli.verbose, &config.paths.log_file());

    if let Some(mods_dir) = cli.mods_dir.as_deref() {
        let trimmed = mods_dir.trim();
        if trimmed.is_empty() {
            anyhow::bail!("--mods-dir cannot be empty");
        }
        config.mods_dir_override = Some(trimmed.to_string());
    }

    let mut app = App::new(config).await?;
    app.set_assume_yes(cli.yes);

    match cli.command {
        Commands::Mod { action } => match action {
            ModCommands::List => app.cmd_mod_list().await?,
            ModCommands::Info { name } => app.cmd_mod_info(&name).await?,
            ModCommands::Enable { name } => app.cmd_mod_enable(&name).await?,
            ModCommands::Disable { name } => app.cmd_mod_disable(&name).await?,
            ModCommands::Check { name } => app.cmd_mod_check(name.as_deref()).await?,
            ModCommands::Install { path } => app.cmd_mod_install(&path).await?,
            ModCommands::Remove { name } => app.cmd_mod_remove(&name).await?,
            ModCommands::SelectVersion { name, version } => {
                app.cmd_mod_select_version(&name, &version).await?
            }
            ModCommands::Versions { name } => app.cmd_mod_versions(&name).await?,
            ModCommands::ToggleVersion { name, version } => {
                app.cmd_mod_toggle_version(&name, &version).await?
            }
        },
        Commands::Modlist { action } => match action {
            ModlistCommands::List => app.cmd_modlist_list().await?,
            ModlistCommands::Show { name } => app.cmd_modlist_show(&name).await?,
            ModlistCommands::Create { name, description } => {
                app.cmd_modlist_create(&name, &description).await?
            }
            ModlistCommands::Capture { name } => app.cmd_modlist_capture(&name).await?,
            ModlistCommands::Delete { name } => app.cmd_modlist_delete(&name).await?,
            ModlistCommands::Rename { name, new_name } => {
                app.cmd_modlist_rename(&name, &new_name).await?
            }
            ModlistCommands::Describe { name, description } => {
                app.cmd_modlist_describe(&name, &description).await?
            }
            ModlistCommands::Set {
                name,
                mod_name,
                disabled,
                version,
            } => {
                app.cmd_modlist_set(&name, &mod_name, !disabled, version.as_deref())
                    .await?
            }
            ModlistCommands::Unset { name, mod_name } => {
                app.cmd_modlist_unset(&name, &mod_name).await?
            }
            ModlistCommands::Apply { name, dry_run } => {
                app.cmd_modlist_apply(&name, dry_run).await?
            }
        },
        Commands::Updates { action } => match action {
            UpdateCommands::Check => app.cmd_updates_check().await?,
        },
        Commands::Portal { action } => match action {
            PortalCommands::Recent { pages } => app.cmd_portal_recent(pages).await?,
        },
        Commands::Config { action } => match action {
            ConfigCommands::Show => app.cmd_config_show().await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_subscriber_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factorio-mm.log");
        let file = std::fs::File::create(&path).unwrap();

        let subscriber = log_subscriber(EnvFilter::new("info"), Some(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("scan finished");
        });

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("scan finished"));
        assert!(!written.contains('\x1b'));
    }

    #[test]
    fn test_log_subscriber_without_file() {
        let subscriber = log_subscriber(EnvFilter::new("debug"), None);
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("stderr only");
        });
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "factorio-mm",
            "modlist",
            "apply",
            "base",
            "--dry-run",
            "-y",
            "-vv",
        ])
        .unwrap();
        assert!(cli.yes);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Modlist { action: ModlistCommands::Apply { dry_run: true, .. } }
        ));
    }
}
