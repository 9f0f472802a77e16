use anyhow::Context;
use clap::Parser;
use repo_updater::cli::Cli;
use repo_updater::deps::Pip;
use repo_updater::git::GitCli;
use repo_updater::output;
use repo_updater::supervisor::Pm2;
use repo_updater::updater::{self, Collaborators};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.config();
    config.init_logging();

    let repo = match &cli.repo {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let repo = repo
        .canonicalize()
        .with_context(|| format!("Working copy not found: {}", repo.display()))?;
    output::print_working_dir(&repo, &config);

    let vcs = GitCli::new(&repo);
    let installer = Pip::new(&repo);
    let supervisor = Pm2::new(&repo);
    let collaborators = Collaborators {
        vcs: &vcs,
        installer: &installer,
        supervisor: &supervisor,
    };

    let callbacks = output::RunCallbacks::new(output::create_run_progress(&config), config);
    let result = updater::update(&repo, &cli.request(), &collaborators, &callbacks);
    output::print_summary(&result, &config);

    if result.outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
