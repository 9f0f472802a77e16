//! Command-line arguments.

use crate::config::{Config, Verbosity};
use crate::updater::UpdateRequest;
use clap::Parser;
use std::path::PathBuf;

/// Bring a working copy up to date with its latest tag or a tracked branch,
/// keeping local edits, then reinstall dependencies and restart processes.
#[derive(Debug, Parser)]
#[command(name = "updater", version)]
pub struct Cli {
    /// Branch to track instead of the latest tag (e.g. main or master)
    pub branch: Option<String>,

    /// Do not restart supervised processes after updating
    #[arg(long)]
    pub no_restart: bool,

    /// Working copy to update (defaults to the current directory)
    #[arg(short = 'C', long = "repo", value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Only print the outcome
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print every step and external command
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self) -> Config {
        let verbosity = if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Config { verbosity }
    }

    pub fn request(&self) -> UpdateRequest {
        UpdateRequest {
            branch: self.branch.clone(),
            skip_restart: self.no_restart,
        }
    }
}
