//! Application-wide constants.
//!
//! Centralized names and defaults to avoid magic strings throughout the codebase.

/// Remote the working copy is synchronized against.
pub const DEFAULT_REMOTE: &str = "origin";

/// Conventional main-line branch names. Either is accepted as an explicit
/// branch argument, and each stands in for the other when the remote lacks it.
pub const MASTER_BRANCH: &str = "master";
pub const MAIN_BRANCH: &str = "main";

/// Prefix of the stash message used to snapshot local edits.
pub const STASH_PREFIX: &str = "updater-autostash";

/// Timestamp format appended to the stash prefix.
pub const STASH_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// Directories probed, in order, for an isolated Python environment.
pub const ENV_DIRS: [&str; 3] = [".venv", "venv", "env"];

/// Dependency manifest installed with `pip install -r`.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Project manifests that make the repository itself installable.
pub const PROJECT_MANIFESTS: [&str; 2] = ["pyproject.toml", "setup.py"];

/// Interpreter used when no isolated environment is found.
pub const FALLBACK_PYTHON: &str = "python3";

/// Process supervisor binary.
pub const SUPERVISOR_PROGRAM: &str = "pm2";

/// Progress spinner tick interval in milliseconds.
pub const PROGRESS_TICK_MS: u64 = 80;

/// Default name used when a repository name cannot be determined from its path.
pub const DEFAULT_REPO_NAME: &str = "repository";
