//! Spinner, colored output, and summary formatting.
//!
//! This module provides visual feedback while the updater runs and prints
//! the final outcome.

use crate::config::Config;
use crate::constants::PROGRESS_TICK_MS;
use crate::updater::{UpdateCallbacks, UpdateOutcome, UpdateResult, UpdateStep, Warning};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// No-op callbacks for when progress tracking is not needed.
/// This is the null object pattern for UpdateCallbacks - use it when
/// you don't need any output or progress tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpCallbacks;

impl UpdateCallbacks for NoOpCallbacks {
    fn on_step(&self, _step: &UpdateStep) {}
    fn on_complete(&self, _result: &UpdateResult) {}
}

/// Prints a repository header in verbose mode.
pub fn print_repo_header(config: &Config, repo_name: &str) {
    if !config.is_verbose() {
        return;
    }
    eprintln!("{}", format!("[{}]", repo_name).white().bold());
}

/// Prints a step progress message in verbose mode.
pub fn print_step(config: &Config, step: &UpdateStep) {
    if !config.is_verbose() || matches!(step, UpdateStep::Started | UpdateStep::Completed) {
        return;
    }
    eprintln!("  {}...", step.to_string().dimmed());
}

/// Spinner with step-by-step status messages.
/// Uses `Option` to avoid allocation when progress is hidden (quiet/verbose modes).
pub struct RunProgress {
    spinner: Option<ProgressBar>,
}

impl RunProgress {
    pub fn update(&self, step: &UpdateStep) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format_step_message(step));
        }
    }

    pub fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

/// Callbacks for a command-line run.
/// Combines spinner updates with verbose output handling.
pub struct RunCallbacks {
    progress: RunProgress,
    config: Config,
}

impl RunCallbacks {
    pub fn new(progress: RunProgress, config: Config) -> Self {
        Self { progress, config }
    }
}

impl UpdateCallbacks for RunCallbacks {
    fn on_update_start(&self, repo_name: &str) {
        print_repo_header(&self.config, repo_name);
    }

    fn on_step(&self, step: &UpdateStep) {
        self.progress.update(step);
        print_step(&self.config, step);
    }

    fn on_complete(&self, _result: &UpdateResult) {
        self.progress.finish();
    }
}

/// Creates the spinner for a run.
/// Returns a hidden tracker in quiet or verbose mode to avoid allocation.
#[must_use]
pub fn create_run_progress(config: &Config) -> RunProgress {
    let spinner = if config.is_quiet() || config.is_verbose() {
        None
    } else {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
        Some(spinner)
    };

    RunProgress { spinner }
}

pub fn print_working_dir(path: &Path, config: &Config) {
    if config.is_quiet() {
        return;
    }
    println!(
        "{} {}",
        "Working in:".cyan(),
        path.display().to_string().white().bold()
    )
}

pub fn print_summary(result: &UpdateResult, config: &Config) {
    if config.is_quiet() {
        print_quiet_summary(result);
    } else {
        print_normal_summary(result);
    }
}

fn print_quiet_summary(result: &UpdateResult) {
    match &result.outcome {
        UpdateOutcome::UpToDate { commit, .. } => {
            println!("up to date at {}", commit.short());
        }
        UpdateOutcome::Updated(success) => {
            println!(
                "updated {} -> {} ({})",
                success.from.short(),
                success.to.short(),
                success.target
            );
        }
        UpdateOutcome::Failed(failure) => {
            eprintln!("error: {} failed: {}", failure.step, failure.error);
        }
    }

    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
}

fn print_normal_summary(result: &UpdateResult) {
    match &result.outcome {
        UpdateOutcome::UpToDate { target, commit } => {
            println!(
                "{} Already up to date with {} at {}",
                "✓".green(),
                target.to_string().white().bold(),
                commit.short().cyan()
            );
        }
        UpdateOutcome::Updated(success) => {
            let stash_msg = match stash_note(success.had_stash, &result.warnings) {
                Some(note) => format!(" ({})", note).yellow(),
                None => "".normal(),
            };
            println!(
                "{} Updated to {} {} -> {}{}",
                "✓".green(),
                success.target.to_string().white().bold(),
                success.from.short().dimmed(),
                success.to.short().cyan(),
                stash_msg,
            );
            if success.restarted {
                println!("  {}", "processes restarted".dimmed());
            }
        }
        UpdateOutcome::Failed(failure) => {
            println!(
                "{} {}",
                "✗".red(),
                format!("{} failed: {}", failure.step, failure.error).red()
            );
        }
    }

    print_warnings(&result.warnings);
    println!("{}", format!("Finished in {}", format_duration(result.duration)).dimmed());
}

/// Describes what happened to stashed local changes, if any were stashed.
fn stash_note(had_stash: bool, warnings: &[Warning]) -> Option<&'static str> {
    if !had_stash {
        return None;
    }
    let restore_failed = warnings.iter().any(|warning| {
        matches!(
            warning,
            Warning::StashConflict { .. } | Warning::StashRestoreFailed { .. }
        )
    });
    if restore_failed {
        Some("local changes left in stash")
    } else {
        Some("local changes restored")
    }
}

fn print_warnings(warnings: &[Warning]) {
    if warnings.is_empty() {
        return;
    }
    println!(
        "{}",
        format!("Warnings ({}):", warnings.len()).yellow().bold()
    );
    for warning in warnings {
        println!("  {} {}", "!".yellow().bold(), warning);
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f32())
}

fn format_step_message(step: &UpdateStep) -> &'static str {
    match step {
        UpdateStep::Started => "Starting update...",
        UpdateStep::Fetching => "Fetching from remote...",
        UpdateStep::ResolvingTarget => "Resolving update target...",
        UpdateStep::CheckingForUpdate => "Checking for updates...",
        UpdateStep::Stashing => "Stashing local changes...",
        UpdateStep::CheckingOut => "Checking out target...",
        UpdateStep::RestoringChanges => "Restoring local changes...",
        UpdateStep::RefreshingDependencies => "Installing dependencies...",
        UpdateStep::Restarting => "Restarting processes...",
        UpdateStep::Completed => "Completed",
    }
}
