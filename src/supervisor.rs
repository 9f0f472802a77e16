//! Process supervisor integration.

use crate::constants::SUPERVISOR_PROGRAM;
use crate::process;
use anyhow::Context;
use std::path::PathBuf;

/// What the updater needs from the process supervisor.
pub trait Supervisor {
    /// Whether the supervisor can be reached at all.
    fn is_available(&self) -> bool;

    /// Restarts every managed process.
    fn restart_all(&self) -> anyhow::Result<()>;
}

/// [`Supervisor`] backed by the pm2 CLI.
#[derive(Debug, Clone)]
pub struct Pm2 {
    program: String,
    workdir: PathBuf,
}

impl Pm2 {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self::with_program(SUPERVISOR_PROGRAM, workdir)
    }

    pub fn with_program(program: &str, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            workdir: workdir.into(),
        }
    }
}

impl Supervisor for Pm2 {
    fn is_available(&self) -> bool {
        process::is_installed(&self.program)
    }

    fn restart_all(&self) -> anyhow::Result<()> {
        process::run(&self.program, &self.workdir, &["restart", "all"])
            .with_context(|| format!("Failed to restart processes with {}", self.program))?;
        Ok(())
    }
}
