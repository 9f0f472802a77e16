//! Dependency refresh through pip.
//!
//! The repository's declared dependencies are reinstalled into its isolated
//! environment when one exists at a conventional path, otherwise into the
//! ambient interpreter.

use crate::constants::{ENV_DIRS, FALLBACK_PYTHON, PROJECT_MANIFESTS, REQUIREMENTS_FILE};
use crate::process;
use std::fmt;
use std::path::{Path, PathBuf};

/// What the updater needs from the package manager.
pub trait PackageInstaller {
    /// Installs every declared manifest. Failure is fatal to the run.
    fn install(&self) -> anyhow::Result<InstallOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The repository declares no dependency manifest.
    NothingDeclared,
}

/// Where packages get installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PythonEnv {
    /// An environment directory inside the repository, holding its own pip.
    Isolated(PathBuf),
    Ambient,
}

impl PythonEnv {
    /// Program and leading arguments that invoke pip for this environment.
    pub fn pip_invocation(&self) -> (PathBuf, Vec<&'static str>) {
        match self {
            PythonEnv::Isolated(dir) => (pip_executable(dir), Vec::new()),
            PythonEnv::Ambient => (PathBuf::from(FALLBACK_PYTHON), vec!["-m", "pip"]),
        }
    }
}

impl fmt::Display for PythonEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PythonEnv::Isolated(dir) => write!(f, "{}", dir.display()),
            PythonEnv::Ambient => write!(f, "ambient {}", FALLBACK_PYTHON),
        }
    }
}

#[cfg(windows)]
fn pip_executable(env_dir: &Path) -> PathBuf {
    env_dir.join("Scripts").join("pip.exe")
}

#[cfg(not(windows))]
fn pip_executable(env_dir: &Path) -> PathBuf {
    env_dir.join("bin").join("pip")
}

/// First conventional environment directory that contains a pip executable.
pub fn find_environment(repo: &Path) -> PythonEnv {
    ENV_DIRS
        .iter()
        .map(|name| repo.join(name))
        .find(|dir| pip_executable(dir).is_file())
        .map(PythonEnv::Isolated)
        .unwrap_or(PythonEnv::Ambient)
}

/// pip argument lists for the manifests present in `repo`, in install order.
pub fn install_commands(repo: &Path) -> Vec<Vec<&'static str>> {
    let mut commands = Vec::new();
    if repo.join(REQUIREMENTS_FILE).is_file() {
        commands.push(vec!["install", "-r", REQUIREMENTS_FILE]);
    }
    if PROJECT_MANIFESTS
        .iter()
        .any(|manifest| repo.join(manifest).is_file())
    {
        commands.push(vec!["install", "-e", "."]);
    }
    commands
}

/// [`PackageInstaller`] that shells out to pip.
#[derive(Debug, Clone)]
pub struct Pip {
    repo: PathBuf,
}

impl Pip {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }
}

impl PackageInstaller for Pip {
    fn install(&self) -> anyhow::Result<InstallOutcome> {
        let commands = install_commands(&self.repo);
        if commands.is_empty() {
            return Ok(InstallOutcome::NothingDeclared);
        }

        let env = find_environment(&self.repo);
        tracing::info!("installing dependencies into {}", env);
        let (program, prefix) = env.pip_invocation();
        let program = program.to_string_lossy().into_owned();

        for command in commands {
            let args: Vec<&str> = prefix.iter().chain(command.iter()).copied().collect();
            process::run(&program, &self.repo, &args)?;
        }
        Ok(InstallOutcome::Installed)
    }
}
