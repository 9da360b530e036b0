//! factorio-mm - A CLI mod manager for Factorio on Linux
//!
//! This crate provides:
//! - Dependency string parsing and validation against the installed mods
//! - Multiple installed versions per mod with explicit version selection
//! - Saved custom mod lists applied with confirmation before version switches
//! - Mod portal access for update checks and release downloads

pub mod app;
pub mod config;
pub mod deps;
pub mod error;
pub mod history;
pub mod modlists;
pub mod mods;
pub mod portal;
pub mod updates;

pub use app::App;
pub use config::Config;
pub use error::ModError;
