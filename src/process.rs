//! Blocking external command execution.
//!
//! Every collaborator (git, pip, pm2) is driven through these helpers so that
//! spawn failures and non-zero exits are reported the same way.

use anyhow::Context;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

/// Runs `program args..` in `dir` and returns its trimmed stdout.
pub fn run(program: &str, dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let mut command = Command::new(program);
    command.current_dir(dir).args(args);
    execute(&mut command, program, args)
}

/// Executes a prepared command, failing with its output on a non-zero exit.
pub fn execute(command: &mut Command, program: &str, args: &[&str]) -> anyhow::Result<String> {
    tracing::debug!("running {} {}", program, args.join(" "));

    let output = command
        .output()
        .with_context(|| format!("Failed to spawn {} command", program))?;

    if output.status.success() {
        let result = String::from_utf8_lossy(&output.stdout);
        Ok(result.as_ref().trim().to_string())
    } else {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            failure_detail(stdout.trim(), stderr.trim())
        )
    }
}

/// Returns true when `program` can be spawned at all.
pub fn is_installed(program: &str) -> bool {
    match Command::new(program).arg("--version").output() {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            tracing::debug!("probing {} failed: {}", program, err);
            false
        }
    }
}

fn failure_detail(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => "no output".to_string(),
        (true, false) => stderr.to_string(),
        (false, true) => stdout.to_string(),
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}
