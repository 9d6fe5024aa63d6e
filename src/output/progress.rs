//! User-facing progress lines, separate from tracing logs.

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Prints progress on stdout when verbose; spinners on stderr otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    verbose: bool,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Stage announcement, verbose only
    pub fn step(&self, msg: &str) {
        if self.verbose {
            println!("{}", style(msg).cyan());
        }
    }

    /// Recoverable problem, verbose only
    pub fn warn(&self, msg: &str) {
        if self.verbose {
            println!("{}", style(msg).yellow());
        }
    }

    /// Secondary information, always printed
    pub fn note(&self, msg: &str) {
        println!("{}", style(msg).dim());
    }

    pub fn success(&self, label: &str, msg: &str) {
        println!("{} {}", style(label).green(), msg);
    }

    pub fn error(&self, label: &str, msg: &str) {
        println!("{} {}", style(label).red().bold(), msg);
    }

    /// Spinner for a long-running stage; hidden when verbose or not on a terminal
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.verbose || !Term::stderr().is_term() {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(msg.to_string());
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    }
}
