//! Terminal confirmation prompts and download progress

use crate::history::ProgressSink;
use crate::modlists::{ConfirmPrompt, Confirmer};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use tokio::runtime::RuntimeFlavor;

/// Asks yes/no questions on stdin
pub struct CliConfirmer {
    assume_yes: bool,
}

impl CliConfirmer {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Ask a plain question with the default labels
    pub fn ask(&self, title: &str, message: &str) -> bool {
        self.confirm(&ConfirmPrompt {
            title: title.to_string(),
            message: message.to_string(),
            confirm_text: "Yes".to_string(),
            cancel_text: "No".to_string(),
        })
    }
}

impl Confirmer for CliConfirmer {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        println!("{}", prompt.title);
        println!("  {}", prompt.message);

        if self.assume_yes {
            println!("  -> {}", prompt.confirm_text);
            return true;
        }

        print!("  [y] {} / [N] {}: ", prompt.confirm_text, prompt.cancel_text);
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let answer = run_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        });
        match answer {
            Ok(line) => is_yes(&line),
            Err(e) => {
                tracing::warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}

/// Run blocking terminal I/O. Confirmations are asked from inside async
/// workflows, so on a multi-threaded runtime the worker is handed off first.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Percentage progress bar for a single download
pub struct DownloadBar {
    bar: ProgressBar,
}

impl DownloadBar {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(label.to_string());
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for DownloadBar {
    fn set_progress(&self, _mod_name: &str, _version: &str, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_run_blocking_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| "y".to_string()), "y");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_on_worker_thread() {
        let answer = tokio::spawn(async { run_blocking(|| is_yes("yes\n")) })
            .await
            .unwrap();
        assert!(answer);
    }

    #[test]
    fn test_assume_yes_confirms() {
        assert!(CliConfirmer::new(true).ask("Delete", "Really?"));
    }
}
