//! Git command wrappers.
//!
//! This module provides a thin wrapper around git CLI commands,
//! handling command execution and error formatting, and the `GitCli`
//! implementation of the [`VersionControl`] contract used by the updater.

use crate::constants::DEFAULT_REMOTE;
use crate::process;
use crate::updater::{CommitRef, Target};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What the updater needs from version control.
pub trait VersionControl {
    /// Fetches branches and tags from the remote.
    fn fetch(&self) -> anyhow::Result<()>;

    /// Newest tag by descending version order, if any tag exists.
    fn latest_tag(&self) -> anyhow::Result<Option<String>>;

    /// The branch the remote designates as its primary branch.
    fn remote_default_branch(&self) -> anyhow::Result<String>;

    fn remote_branch_exists(&self, branch: &str) -> anyhow::Result<bool>;

    /// Commit currently checked out.
    fn current_commit(&self) -> anyhow::Result<CommitRef>;

    /// Commit the target points at after the last fetch.
    fn resolve(&self, target: &Target) -> anyhow::Result<CommitRef>;

    /// True when tracked files or the index differ from the last commit.
    fn has_local_changes(&self) -> anyhow::Result<bool>;

    /// Stashes local changes under `name`. Returns false if nothing was saved.
    fn stash(&self, name: &str) -> anyhow::Result<bool>;

    /// Pops the stash entry saved under `name`.
    fn unstash(&self, name: &str) -> anyhow::Result<()>;

    /// Moves the working tree to the target.
    fn checkout(&self, target: &Target) -> anyhow::Result<()>;
}

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    remote: String,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self::with_remote(repo, DEFAULT_REMOTE)
    }

    pub fn with_remote(repo: impl Into<PathBuf>, remote: &str) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.repo
    }
}

impl VersionControl for GitCli {
    fn fetch(&self) -> anyhow::Result<()> {
        fetch(&self.repo, &self.remote)
    }

    fn latest_tag(&self) -> anyhow::Result<Option<String>> {
        latest_tag(&self.repo)
    }

    fn remote_default_branch(&self) -> anyhow::Result<String> {
        remote_default_branch(&self.repo, &self.remote)
    }

    fn remote_branch_exists(&self, branch: &str) -> anyhow::Result<bool> {
        remote_branch_exists(&self.repo, &self.remote, branch)
    }

    fn current_commit(&self) -> anyhow::Result<CommitRef> {
        get_current_commit(&self.repo).map(CommitRef::new)
    }

    fn resolve(&self, target: &Target) -> anyhow::Result<CommitRef> {
        let refname = match target {
            Target::Branch(branch) => {
                validate_ref_name(branch)?;
                format!("refs/remotes/{}/{}", self.remote, branch)
            }
            Target::Tag(tag) => {
                validate_ref_name(tag)?;
                format!("refs/tags/{}", tag)
            }
        };
        resolve_commit(&self.repo, &refname)
            .with_context(|| format!("Failed to resolve {} on {}", target, self.remote))
            .map(CommitRef::new)
    }

    fn has_local_changes(&self) -> anyhow::Result<bool> {
        has_uncommitted_changes(&self.repo)
    }

    fn stash(&self, name: &str) -> anyhow::Result<bool> {
        stash_push(&self.repo, name)
    }

    fn unstash(&self, name: &str) -> anyhow::Result<()> {
        match find_stash(&self.repo, name)? {
            Some(stash_ref) => stash_pop(&self.repo, &stash_ref),
            None => anyhow::bail!("Stash '{}' not found", name),
        }
    }

    fn checkout(&self, target: &Target) -> anyhow::Result<()> {
        match target {
            Target::Branch(branch) => checkout_branch(&self.repo, &self.remote, branch),
            Target::Tag(tag) => checkout_tag(&self.repo, tag),
        }
    }
}

/// Runs git in `repo` with a non-interactive, untranslated environment.
pub fn run_git(repo: &Path, args: &[&str]) -> anyhow::Result<String> {
    let mut command = Command::new("git");
    command
        .current_dir(repo)
        .env("LC_ALL", "C")
        .env("GIT_TERMINAL_PROMPT", "0")
        .args(args);
    process::execute(&mut command, "git", args)
}

/// Rejects names git would misread as options, revision syntax, or garbage.
pub fn validate_ref_name(name: &str) -> anyhow::Result<()> {
    const FORBIDDEN: &[char] = &['~', '^', ':', '?', '*', '[', '\\', ';'];

    if name.is_empty()
        || name.starts_with('-')
        || name.contains("..")
        || name.contains("@{")
        || name == "@"
        || name.ends_with('/')
        || name.ends_with(".lock")
        || name.chars().any(|c| c.is_whitespace() || c.is_control())
        || name.contains(FORBIDDEN)
    {
        anyhow::bail!("Invalid ref name: {:?}", name);
    }
    Ok(())
}

/// Fetches branches and tags. Tags deleted on the remote are removed locally
/// so a retracted release is never picked as the target.
pub fn fetch(repo: &Path, remote: &str) -> anyhow::Result<()> {
    validate_ref_name(remote)?;
    run_git(
        repo,
        &["fetch", "--tags", "--prune", "--prune-tags", "--force", remote],
    )
    .with_context(|| format!("Failed to fetch from remote '{}'", remote))?;
    Ok(())
}

pub fn latest_tag(repo: &Path) -> anyhow::Result<Option<String>> {
    let output = run_git(repo, &["tag", "--list", "--sort=-version:refname"])
        .context("Failed to list tags")?;
    Ok(output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string))
}

/// Asks the remote for its HEAD, falling back to the locally recorded
/// `refs/remotes/<remote>/HEAD` when the remote does not advertise one.
pub fn remote_default_branch(repo: &Path, remote: &str) -> anyhow::Result<String> {
    validate_ref_name(remote)?;
    let output = run_git(repo, &["ls-remote", "--symref", remote, "HEAD"])
        .with_context(|| format!("Failed to query remote '{}'", remote))?;

    if let Some(branch) = parse_symref_head(&output) {
        return Ok(branch);
    }

    let local_head = format!("refs/remotes/{}/HEAD", remote);
    let short = run_git(repo, &["symbolic-ref", "--short", &local_head]).with_context(|| {
        format!("Could not determine the default branch of remote '{}'", remote)
    })?;
    let prefix = format!("{}/", remote);
    Ok(short.strip_prefix(&prefix).unwrap_or(short.as_str()).to_string())
}

/// Extracts the branch from `ls-remote --symref` output such as
/// `ref: refs/heads/main\tHEAD`.
pub fn parse_symref_head(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (target, name) = line.strip_prefix("ref:")?.trim().split_once('\t')?;
        if name.trim() != "HEAD" {
            return None;
        }
        target
            .trim()
            .strip_prefix("refs/heads/")
            .map(str::to_string)
    })
}

pub fn remote_branch_exists(repo: &Path, remote: &str, branch: &str) -> anyhow::Result<bool> {
    validate_ref_name(branch)?;
    let refname = format!("refs/remotes/{}/{}", remote, branch);
    ref_exists(repo, &refname)
}

pub fn local_branch_exists(repo: &Path, branch: &str) -> anyhow::Result<bool> {
    validate_ref_name(branch)?;
    ref_exists(repo, &format!("refs/heads/{}", branch))
}

fn ref_exists(repo: &Path, refname: &str) -> anyhow::Result<bool> {
    let output = run_git(repo, &["for-each-ref", "--format=%(refname)", refname])
        .with_context(|| format!("Failed to look up {}", refname))?;
    Ok(output.lines().any(|line| line.trim() == refname))
}

pub fn get_current_commit(repo: &Path) -> anyhow::Result<String> {
    run_git(repo, &["rev-parse", "HEAD"]).context("Failed to get current commit")
}

pub fn get_current_branch(repo: &Path) -> anyhow::Result<String> {
    run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).context("Failed to get current branch")
}

pub fn resolve_commit(repo: &Path, refname: &str) -> anyhow::Result<String> {
    let revision = format!("{}^{{commit}}", refname);
    run_git(repo, &["rev-parse", "--verify", "--quiet", &revision])
        .with_context(|| format!("Failed to resolve '{}'", refname))
}

/// Untracked files are ignored; only tracked edits and the index count.
pub fn has_uncommitted_changes(repo: &Path) -> anyhow::Result<bool> {
    run_git(repo, &["status", "--porcelain", "--untracked-files=no"])
        .map(|output| !output.is_empty())
        .context("Failed to check for uncommitted changes")
}

pub fn stash_push(repo: &Path, message: &str) -> anyhow::Result<bool> {
    let output =
        run_git(repo, &["stash", "push", "-m", message]).context("Failed to stash changes")?;
    Ok(!output.contains("No local changes to save"))
}

/// Finds the `stash@{n}` entry whose subject ends with `message`.
pub fn find_stash(repo: &Path, message: &str) -> anyhow::Result<Option<String>> {
    let output =
        run_git(repo, &["stash", "list", "--format=%gd|%s"]).context("Failed to list stashes")?;
    Ok(output.lines().find_map(|line| {
        let (stash_ref, subject) = line.split_once('|')?;
        subject
            .trim()
            .ends_with(message)
            .then(|| stash_ref.trim().to_string())
    }))
}

pub fn stash_pop(repo: &Path, stash_ref: &str) -> anyhow::Result<()> {
    run_git(repo, &["stash", "pop", stash_ref])
        .with_context(|| format!("Failed to pop stash {}", stash_ref))?;
    Ok(())
}

/// Switches to `branch`, creating a tracking branch if needed, then
/// fast-forwards it to the remote's tip.
pub fn checkout_branch(repo: &Path, remote: &str, branch: &str) -> anyhow::Result<()> {
    validate_ref_name(branch)?;
    let upstream = format!("{}/{}", remote, branch);

    if local_branch_exists(repo, branch)? {
        run_git(repo, &["checkout", "--quiet", branch])
            .with_context(|| format!("Failed to checkout branch '{}'", branch))?;
    } else {
        run_git(
            repo,
            &["checkout", "--quiet", "-b", branch, "--track", &upstream],
        )
        .with_context(|| format!("Failed to checkout branch '{}'", branch))?;
    }

    run_git(repo, &["merge", "--ff-only", "--quiet", &upstream])
        .with_context(|| format!("Failed to fast-forward '{}' to {}", branch, upstream))?;
    Ok(())
}

pub fn checkout_tag(repo: &Path, tag: &str) -> anyhow::Result<()> {
    validate_ref_name(tag)?;
    let refname = format!("refs/tags/{}", tag);
    run_git(repo, &["checkout", "--quiet", "--detach", &refname])
        .with_context(|| format!("Failed to checkout tag '{}'", tag))?;
    Ok(())
}
