//! Update flow: target resolution, the step state machine, result types.
//!
//! A run moves through `Fetching → ResolvingTarget → CheckingForUpdate →
//! Stashing → CheckingOut → RestoringChanges → RefreshingDependencies →
//! Restarting`, stopping early when the working copy already sits on the
//! target commit. Fatal errors carry the step they happened in; recoverable
//! problems are collected as [`Warning`]s.

use crate::constants::{
    DEFAULT_REPO_NAME, MAIN_BRANCH, MASTER_BRANCH, STASH_PREFIX, STASH_TIMESTAMP_FORMAT,
};
use crate::deps::{InstallOutcome, PackageInstaller};
use crate::git::VersionControl;
use crate::supervisor::Supervisor;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// The branch or tag the working copy should be advanced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Branch(String),
    Tag(String),
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::Branch(name) | Target::Tag(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Branch(name) => write!(f, "branch '{}'", name),
            Target::Tag(name) => write!(f, "tag '{}'", name),
        }
    }
}

/// Opaque commit identifier, only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names the stash holding the local edits taken at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashHandle {
    name: String,
}

impl StashHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn timestamped(now: DateTime<Local>) -> Self {
        Self::new(format!(
            "{}-{}",
            STASH_PREFIX,
            now.format(STASH_TIMESTAMP_FORMAT)
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Recoverable problems. Logged and reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    BranchAliasFallback { requested: String, used: String },
    StashConflict { stash: String, detail: String },
    StashRestoreFailed { stash: String, detail: String },
    NoDependencyManifest,
    SupervisorUnavailable,
    RestartFailed { detail: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::BranchAliasFallback { requested, used } => write!(
                f,
                "remote has no branch '{}', using '{}' instead",
                requested, used
            ),
            Warning::StashConflict { stash, .. } => write!(
                f,
                "local changes conflict with the new checkout; resolve manually (stash '{}' kept)",
                stash
            ),
            Warning::StashRestoreFailed { stash, detail } => {
                write!(f, "could not restore stash '{}': {}", stash, detail)
            }
            Warning::NoDependencyManifest => write!(f, "no dependency manifest found"),
            Warning::SupervisorUnavailable => {
                write!(f, "process supervisor not available, skipping restart")
            }
            Warning::RestartFailed { detail } => write!(f, "restart failed: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStep {
    Started,
    Fetching,
    ResolvingTarget,
    CheckingForUpdate,
    Stashing,
    CheckingOut,
    RestoringChanges,
    RefreshingDependencies,
    Restarting,
    Completed,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateStep::Started => "start",
            UpdateStep::Fetching => "fetch",
            UpdateStep::ResolvingTarget => "resolve target",
            UpdateStep::CheckingForUpdate => "check for update",
            UpdateStep::Stashing => "stash local changes",
            UpdateStep::CheckingOut => "checkout",
            UpdateStep::RestoringChanges => "restore local changes",
            UpdateStep::RefreshingDependencies => "refresh dependencies",
            UpdateStep::Restarting => "restart processes",
            UpdateStep::Completed => "done",
        };
        f.write_str(label)
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Branch to track instead of the latest tag.
    pub branch: Option<String>,
    pub skip_restart: bool,
}

/// External collaborators the flow drives.
pub struct Collaborators<'a> {
    pub vcs: &'a dyn VersionControl,
    pub installer: &'a dyn PackageInstaller,
    pub supervisor: &'a dyn Supervisor,
}

#[derive(Debug)]
pub struct UpdateResult {
    pub path: PathBuf,
    pub outcome: UpdateOutcome,
    pub warnings: Vec<Warning>,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct UpdateSuccess {
    pub target: Target,
    pub from: CommitRef,
    pub to: CommitRef,
    pub had_stash: bool,
    pub restarted: bool,
}

#[derive(Debug)]
pub struct UpdateFailure {
    pub error: String,
    pub step: UpdateStep,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    /// Nothing to do; the working copy was not touched.
    UpToDate { target: Target, commit: CommitRef },
    Updated(UpdateSuccess),
    Failed(UpdateFailure),
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, UpdateOutcome::Failed(_))
    }
}

/// Observer for progress reporting.
pub trait UpdateCallbacks {
    fn on_update_start(&self, _repo_name: &str) {}
    fn on_step(&self, step: &UpdateStep);
    fn on_warning(&self, _warning: &Warning) {}
    fn on_complete(&self, result: &UpdateResult);
}

/// Result of the restart stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Skipped,
    Restarted,
    NotRestarted(Warning),
}

#[derive(Debug)]
struct UpdateError {
    source: anyhow::Error,
    step: UpdateStep,
}

fn at_step<T>(step: UpdateStep, result: anyhow::Result<T>) -> Result<T, UpdateError> {
    result.map_err(|e| UpdateError { source: e, step })
}

/// State threaded through one run.
#[derive(Debug, Default)]
struct RunContext {
    stash: Option<StashHandle>,
    warnings: Vec<Warning>,
}

impl RunContext {
    fn warn<C: UpdateCallbacks + ?Sized>(&mut self, warning: Warning, callbacks: &C) {
        tracing::warn!("{}", warning);
        callbacks.on_warning(&warning);
        self.warnings.push(warning);
    }
}

/// The other conventional main-line name, for main-line aliases.
pub fn mainline_alternate(branch: &str) -> Option<&'static str> {
    match branch {
        MAIN_BRANCH => Some(MASTER_BRANCH),
        MASTER_BRANCH => Some(MAIN_BRANCH),
        _ => None,
    }
}

/// Picks the target: the explicit branch, else the newest tag, else the
/// remote's default branch.
pub fn resolve_target<V: VersionControl + ?Sized>(
    vcs: &V,
    branch_arg: Option<&str>,
) -> anyhow::Result<(Target, Option<Warning>)> {
    if let Some(branch) = branch_arg {
        return resolve_branch(vcs, branch);
    }

    if let Some(tag) = vcs.latest_tag()? {
        return Ok((Target::Tag(tag), None));
    }

    let branch = vcs.remote_default_branch()?;
    tracing::debug!("no tags found, tracking default branch {}", branch);
    Ok((Target::Branch(branch), None))
}

fn resolve_branch<V: VersionControl + ?Sized>(
    vcs: &V,
    branch: &str,
) -> anyhow::Result<(Target, Option<Warning>)> {
    if let Some(alternate) = mainline_alternate(branch) {
        if !vcs.remote_branch_exists(branch)? && vcs.remote_branch_exists(alternate)? {
            let warning = Warning::BranchAliasFallback {
                requested: branch.to_string(),
                used: alternate.to_string(),
            };
            return Ok((Target::Branch(alternate.to_string()), Some(warning)));
        }
    }
    Ok((Target::Branch(branch.to_string()), None))
}

#[must_use]
pub fn needs_update(current: &CommitRef, target: &CommitRef) -> bool {
    current != target
}

/// Stashes tracked edits under a fresh timestamped name, if there are any.
pub fn snapshot_local_changes<V: VersionControl + ?Sized>(
    vcs: &V,
) -> anyhow::Result<Option<StashHandle>> {
    if !vcs.has_local_changes()? {
        return Ok(None);
    }

    let handle = StashHandle::timestamped(Local::now());
    if vcs.stash(handle.name())? {
        tracing::info!("stashed local changes as {}", handle.name());
        Ok(Some(handle))
    } else {
        Ok(None)
    }
}

/// Moves the working tree to `target` and checks that HEAD landed on
/// `expected`. A local branch ahead of its remote fast-forwards to nothing
/// and fails here.
pub fn apply_target<V: VersionControl + ?Sized>(
    vcs: &V,
    target: &Target,
    expected: &CommitRef,
) -> anyhow::Result<()> {
    vcs.checkout(target)?;
    let head = vcs.current_commit()?;
    if head != *expected {
        anyhow::bail!(
            "local {} has commits not on the remote (HEAD at {}, remote at {})",
            target,
            head.short(),
            expected.short()
        );
    }
    Ok(())
}

/// Reapplies the stash. Never fails; problems come back as a warning.
pub fn restore_local_changes<V: VersionControl + ?Sized>(
    vcs: &V,
    handle: Option<&StashHandle>,
) -> Option<Warning> {
    let handle = handle?;
    let err = vcs.unstash(handle.name()).err()?;

    let stash = handle.name().to_string();
    let detail = format!("{:#}", err);
    if detail.contains("CONFLICT") {
        Some(Warning::StashConflict { stash, detail })
    } else {
        Some(Warning::StashRestoreFailed { stash, detail })
    }
}

pub fn refresh_dependencies<I: PackageInstaller + ?Sized>(
    installer: &I,
) -> anyhow::Result<Option<Warning>> {
    match installer.install()? {
        InstallOutcome::Installed => Ok(None),
        InstallOutcome::NothingDeclared => Ok(Some(Warning::NoDependencyManifest)),
    }
}

/// Restarts managed processes unless skipped. The supervisor is not
/// consulted at all when `skip` is set.
pub fn restart_dependents<S: Supervisor + ?Sized>(supervisor: &S, skip: bool) -> RestartOutcome {
    if skip {
        return RestartOutcome::Skipped;
    }
    if !supervisor.is_available() {
        return RestartOutcome::NotRestarted(Warning::SupervisorUnavailable);
    }
    match supervisor.restart_all() {
        Ok(()) => RestartOutcome::Restarted,
        Err(err) => RestartOutcome::NotRestarted(Warning::RestartFailed {
            detail: format!("{:#}", err),
        }),
    }
}

pub fn repo_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_REPO_NAME)
}

/// Runs the whole update against the working copy at `path`.
pub fn update<C>(
    path: &Path,
    request: &UpdateRequest,
    collaborators: &Collaborators<'_>,
    callbacks: &C,
) -> UpdateResult
where
    C: UpdateCallbacks + ?Sized,
{
    let start = Instant::now();
    callbacks.on_update_start(repo_name(path));

    let mut ctx = RunContext::default();
    let outcome = match do_update(request, collaborators, callbacks, &mut ctx) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::debug!("{} failed: {:#}", err.step, err.source);
            UpdateOutcome::Failed(UpdateFailure {
                error: format!("{:#}", err.source),
                step: err.step,
            })
        }
    };

    let result = UpdateResult {
        path: path.to_path_buf(),
        outcome,
        warnings: ctx.warnings,
        duration: start.elapsed(),
    };
    callbacks.on_complete(&result);
    result
}

fn do_update<C>(
    request: &UpdateRequest,
    collaborators: &Collaborators<'_>,
    callbacks: &C,
    ctx: &mut RunContext,
) -> Result<UpdateOutcome, UpdateError>
where
    C: UpdateCallbacks + ?Sized,
{
    let vcs = collaborators.vcs;
    callbacks.on_step(&UpdateStep::Started);

    callbacks.on_step(&UpdateStep::Fetching);
    at_step(UpdateStep::Fetching, vcs.fetch())?;

    callbacks.on_step(&UpdateStep::ResolvingTarget);
    let (target, alias_warning) = at_step(
        UpdateStep::ResolvingTarget,
        resolve_target(vcs, request.branch.as_deref()),
    )?;
    if let Some(warning) = alias_warning {
        ctx.warn(warning, callbacks);
    }
    let target_commit = at_step(UpdateStep::ResolvingTarget, vcs.resolve(&target))?;

    callbacks.on_step(&UpdateStep::CheckingForUpdate);
    let current = at_step(UpdateStep::CheckingForUpdate, vcs.current_commit())?;
    if !needs_update(&current, &target_commit) {
        tracing::info!("already up to date with {} at {}", target, current.short());
        callbacks.on_step(&UpdateStep::Completed);
        return Ok(UpdateOutcome::UpToDate {
            target,
            commit: current,
        });
    }
    tracing::info!(
        "updating {} -> {} ({})",
        current.short(),
        target_commit.short(),
        target
    );

    callbacks.on_step(&UpdateStep::Stashing);
    ctx.stash = at_step(UpdateStep::Stashing, snapshot_local_changes(vcs))?;
    let had_stash = ctx.stash.is_some();

    callbacks.on_step(&UpdateStep::CheckingOut);
    let checkout = apply_target(vcs, &target, &target_commit);

    // Restore runs even when the checkout failed.
    if let Some(handle) = ctx.stash.take() {
        callbacks.on_step(&UpdateStep::RestoringChanges);
        if let Some(warning) = restore_local_changes(vcs, Some(&handle)) {
            ctx.warn(warning, callbacks);
        }
    }
    at_step(UpdateStep::CheckingOut, checkout)?;

    callbacks.on_step(&UpdateStep::RefreshingDependencies);
    if let Some(warning) = at_step(
        UpdateStep::RefreshingDependencies,
        refresh_dependencies(collaborators.installer),
    )? {
        ctx.warn(warning, callbacks);
    }

    if !request.skip_restart {
        callbacks.on_step(&UpdateStep::Restarting);
    }
    let restarted = match restart_dependents(collaborators.supervisor, request.skip_restart) {
        RestartOutcome::Restarted => true,
        RestartOutcome::Skipped => {
            tracing::debug!("restart skipped");
            false
        }
        RestartOutcome::NotRestarted(warning) => {
            ctx.warn(warning, callbacks);
            false
        }
    };

    callbacks.on_step(&UpdateStep::Completed);
    Ok(UpdateOutcome::Updated(UpdateSuccess {
        target,
        from: current,
        to: target_commit,
        had_stash,
        restarted,
    }))
}
