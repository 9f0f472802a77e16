//! Test infrastructure for repo-updater integration tests.
#![allow(dead_code)]

use anyhow::Result;
use repo_updater::deps::{InstallOutcome, PackageInstaller};
use repo_updater::git::{VersionControl, run_git};
use repo_updater::supervisor::Supervisor;
use repo_updater::updater::{CommitRef, Target, UpdateCallbacks, UpdateResult, UpdateStep};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Initializes a repository with one commit on `branch`.
pub fn init_repo(path: &Path, branch: &str) -> Result<()> {
    run_git(path, &["init", "-b", branch])?;
    run_git(path, &["config", "user.email", "test@example.com"])?;
    run_git(path, &["config", "user.name", "Test User"])?;
    std::fs::write(path.join("README.md"), "# Test Repo\n")?;
    run_git(path, &["add", "README.md"])?;
    run_git(path, &["commit", "-m", "Initial commit"])?;
    Ok(())
}

/// A bare remote plus a publisher clone used to push upstream changes.
pub struct TestRemote {
    _temp_dir: TempDir,
    bare: PathBuf,
    publisher: PathBuf,
    branch: String,
}

impl TestRemote {
    pub fn new(branch: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let bare = temp_dir.path().join("remote.git");
        let publisher = temp_dir.path().join("publisher");
        std::fs::create_dir_all(&bare)?;
        std::fs::create_dir_all(&publisher)?;

        run_git(&bare, &["init", "--bare", "-b", branch])?;
        init_repo(&publisher, branch)?;
        run_git(&publisher, &["remote", "add", "origin", path_str(&bare)])?;
        run_git(&publisher, &["push", "-u", "origin", branch])?;

        Ok(Self {
            _temp_dir: temp_dir,
            bare,
            publisher,
            branch: branch.to_string(),
        })
    }

    /// Commits `content` to `file` upstream and returns the new commit id.
    pub fn commit(&self, file: &str, content: &str) -> Result<String> {
        std::fs::write(self.publisher.join(file), content)?;
        run_git(&self.publisher, &["add", file])?;
        run_git(&self.publisher, &["commit", "-m", &format!("Update {}", file)])?;
        run_git(&self.publisher, &["push", "origin", &self.branch])?;
        run_git(&self.publisher, &["rev-parse", "HEAD"])
    }

    /// Tags the upstream head and returns the tagged commit id.
    pub fn tag(&self, name: &str) -> Result<String> {
        run_git(&self.publisher, &["tag", name])?;
        run_git(&self.publisher, &["push", "origin", name])?;
        run_git(&self.publisher, &["rev-parse", "HEAD"])
    }

    pub fn push_branch(&self, name: &str) -> Result<String> {
        run_git(&self.publisher, &["branch", name])?;
        run_git(&self.publisher, &["push", "origin", name])?;
        run_git(&self.publisher, &["rev-parse", name])
    }

    /// Deletes a tag on the remote.
    pub fn delete_tag(&self, name: &str) -> Result<()> {
        let refspec = format!(":refs/tags/{}", name);
        run_git(&self.publisher, &["push", "origin", &refspec])?;
        run_git(&self.publisher, &["tag", "-d", name])?;
        Ok(())
    }

    /// Clones the remote into a fresh working copy.
    pub fn clone_local(&self) -> Result<TestRepo> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("local");
        run_git(
            temp_dir.path(),
            &["clone", path_str(&self.bare), path_str(&path)],
        )?;
        run_git(&path, &["config", "user.email", "test@example.com"])?;
        run_git(&path, &["config", "user.name", "Test User"])?;

        Ok(TestRepo {
            _temp_dir: temp_dir,
            path,
        })
    }
}

/// A temporary working copy. Automatically cleaned up when dropped.
pub struct TestRepo {
    _temp_dir: TempDir,
    path: PathBuf,
}

impl TestRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn head(&self) -> Result<String> {
        run_git(&self.path, &["rev-parse", "HEAD"])
    }

    pub fn make_dirty(&self) -> Result<()> {
        std::fs::write(self.path.join("README.md"), "# Modified\n")?;
        Ok(())
    }

    pub fn make_untracked(&self) -> Result<()> {
        std::fs::write(self.path.join("untracked.txt"), "untracked content\n")?;
        Ok(())
    }

    pub fn has_stash(&self) -> Result<bool> {
        let output = run_git(&self.path, &["stash", "list"])?;
        Ok(!output.is_empty())
    }

    pub fn read(&self, name: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.path.join(name))?)
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.path.join(name).exists()
    }

    /// Commits `content` to `file` locally without pushing.
    pub fn commit_local(&self, file: &str, content: &str) -> Result<String> {
        std::fs::write(self.path.join(file), content)?;
        run_git(&self.path, &["add", file])?;
        run_git(&self.path, &["commit", "-m", &format!("Local {}", file)])?;
        self.head()
    }

    pub fn remove_remote(&self) -> Result<()> {
        run_git(&self.path, &["remote", "remove", "origin"])?;
        Ok(())
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are valid UTF-8")
}

/// Installer that records calls instead of running pip.
#[derive(Default)]
pub struct FakeInstaller {
    pub calls: Cell<usize>,
    pub fail: bool,
    pub nothing_declared: bool,
}

impl FakeInstaller {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl PackageInstaller for FakeInstaller {
    fn install(&self) -> anyhow::Result<InstallOutcome> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            anyhow::bail!("pip install -r requirements.txt failed: resolver error");
        }
        if self.nothing_declared {
            return Ok(InstallOutcome::NothingDeclared);
        }
        Ok(InstallOutcome::Installed)
    }
}

/// Supervisor that counts every interaction.
pub struct CountingSupervisor {
    pub available: bool,
    pub fail: bool,
    pub availability_checks: Cell<usize>,
    pub restarts: Cell<usize>,
}

impl CountingSupervisor {
    pub fn available() -> Self {
        Self {
            available: true,
            fail: false,
            availability_checks: Cell::new(0),
            restarts: Cell::new(0),
        }
    }

    pub fn absent() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::available()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.availability_checks.get() + self.restarts.get()
    }
}

impl Supervisor for CountingSupervisor {
    fn is_available(&self) -> bool {
        self.availability_checks
            .set(self.availability_checks.get() + 1);
        self.available
    }

    fn restart_all(&self) -> anyhow::Result<()> {
        self.restarts.set(self.restarts.get() + 1);
        if self.fail {
            anyhow::bail!("pm2 restart all failed");
        }
        Ok(())
    }
}

/// In-memory version control recording every call by name.
#[derive(Default)]
pub struct FakeVcs {
    pub calls: RefCell<Vec<String>>,
    pub fetch_error: Option<String>,
    /// Newest first.
    pub tags: Vec<String>,
    pub tag_commits: HashMap<String, String>,
    pub default_branch: String,
    pub remote_branches: HashMap<String, String>,
    pub current: RefCell<String>,
    pub dirty: Cell<bool>,
    pub stashes: RefCell<Vec<String>>,
    pub checkout_error: Option<String>,
    /// Checkout succeeds but HEAD stays put, like a local branch ahead of its remote.
    pub checkout_keeps_head: bool,
    pub unstash_error: Option<String>,
}

impl FakeVcs {
    /// A clean working copy at `current` on a remote whose default is master.
    pub fn at(current: &str) -> Self {
        Self {
            default_branch: "master".to_string(),
            current: RefCell::new(current.to_string()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: &str, commit: &str) -> Self {
        self.tags.insert(0, tag.to_string());
        self.tag_commits.insert(tag.to_string(), commit.to_string());
        self
    }

    pub fn with_branch(mut self, branch: &str, commit: &str) -> Self {
        self.remote_branches
            .insert(branch.to_string(), commit.to_string());
        self
    }

    pub fn dirty(self) -> Self {
        self.dirty.set(true);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|call| call == name || call.starts_with(&format!("{}:", name)))
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    fn commit_of(&self, target: &Target) -> Option<String> {
        match target {
            Target::Branch(name) => self.remote_branches.get(name).cloned(),
            Target::Tag(name) => self.tag_commits.get(name).cloned(),
        }
    }
}

impl VersionControl for FakeVcs {
    fn fetch(&self) -> anyhow::Result<()> {
        self.record("fetch");
        match &self.fetch_error {
            Some(err) => anyhow::bail!("{}", err),
            None => Ok(()),
        }
    }

    fn latest_tag(&self) -> anyhow::Result<Option<String>> {
        self.record("latest_tag");
        Ok(self.tags.first().cloned())
    }

    fn remote_default_branch(&self) -> anyhow::Result<String> {
        self.record("remote_default_branch");
        Ok(self.default_branch.clone())
    }

    fn remote_branch_exists(&self, branch: &str) -> anyhow::Result<bool> {
        self.record(format!("remote_branch_exists:{}", branch));
        Ok(self.remote_branches.contains_key(branch))
    }

    fn current_commit(&self) -> anyhow::Result<CommitRef> {
        self.record("current_commit");
        Ok(CommitRef::new(self.current.borrow().clone()))
    }

    fn resolve(&self, target: &Target) -> anyhow::Result<CommitRef> {
        self.record(format!("resolve:{}", target.name()));
        self.commit_of(target)
            .map(CommitRef::new)
            .ok_or_else(|| anyhow::anyhow!("unknown {}", target))
    }

    fn has_local_changes(&self) -> anyhow::Result<bool> {
        self.record("has_local_changes");
        Ok(self.dirty.get())
    }

    fn stash(&self, name: &str) -> anyhow::Result<bool> {
        self.record("stash");
        if !self.dirty.get() {
            return Ok(false);
        }
        self.stashes.borrow_mut().push(name.to_string());
        self.dirty.set(false);
        Ok(true)
    }

    fn unstash(&self, name: &str) -> anyhow::Result<()> {
        self.record("unstash");
        if let Some(err) = &self.unstash_error {
            anyhow::bail!("{}", err);
        }
        let mut stashes = self.stashes.borrow_mut();
        let index = stashes
            .iter()
            .position(|stash| stash == name)
            .ok_or_else(|| anyhow::anyhow!("Stash '{}' not found", name))?;
        stashes.remove(index);
        self.dirty.set(true);
        Ok(())
    }

    fn checkout(&self, target: &Target) -> anyhow::Result<()> {
        self.record(format!("checkout:{}", target.name()));
        if let Some(err) = &self.checkout_error {
            anyhow::bail!("{}", err);
        }
        let commit = self
            .commit_of(target)
            .ok_or_else(|| anyhow::anyhow!("unknown {}", target))?;
        if !self.checkout_keeps_head {
            *self.current.borrow_mut() = commit;
        }
        Ok(())
    }
}

/// Callbacks that remember every step.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub steps: RefCell<Vec<UpdateStep>>,
    pub completions: Cell<usize>,
}

impl UpdateCallbacks for RecordingCallbacks {
    fn on_step(&self, step: &UpdateStep) {
        self.steps.borrow_mut().push(step.clone());
    }

    fn on_complete(&self, _result: &UpdateResult) {
        self.completions.set(self.completions.get() + 1);
    }
}
