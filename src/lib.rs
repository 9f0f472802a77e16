//! Repository self-updater library.
//!
//! This crate brings a working copy in line with its upstream by:
//! - Fetching branches and tags from the remote
//! - Choosing a target (explicit branch, latest tag, or default branch)
//! - Stashing uncommitted edits only when an update is needed
//! - Checking out the target and restoring the stash
//! - Reinstalling dependencies and restarting supervised processes

pub mod cli;
pub mod config;
pub mod constants;
pub mod deps;
pub mod git;
pub mod output;
pub mod process;
pub mod supervisor;
pub mod updater;
