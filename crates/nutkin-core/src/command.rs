//! Subprocess execution.
//!
//! Every external tool nutkin touches (git, python, npm, docker, ...) is
//! driven through [`run`] and friends: spawn, wait for completion, capture
//! both streams, and hand back trimmed stdout. Calls are blocking and are
//! never retried.

use std::collections::HashMap;
use std::process::Command;

use camino::Utf8Path;
use thiserror::Error;
use tracing::debug;

/// Errors from subprocess execution.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program could not be spawned at all (missing binary, permissions).
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The program ran but exited with a non-zero status.
    #[error("{program} failed ({status}): {stderr}")]
    CommandFailed {
        /// The program that was invoked.
        program: String,
        /// The exit status.
        status: std::process::ExitStatus,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

/// Result alias for subprocess execution.
pub type CommandResult<T> = Result<T, CommandError>;

/// Run a command in the current directory and return its trimmed stdout.
pub fn run(argv: &[&str]) -> CommandResult<String> {
    run_with_env(argv, None, None)
}

/// Run a command in `cwd` and return its trimmed stdout.
pub fn run_in(argv: &[&str], cwd: &Utf8Path) -> CommandResult<String> {
    run_with_env(argv, Some(cwd), None)
}

/// Run a command with an optional working directory and extra environment.
///
/// Extra environment variables are layered on top of the inherited
/// environment, they do not replace it.
pub fn run_with_env(
    argv: &[&str],
    cwd: Option<&Utf8Path>,
    env: Option<&HashMap<String, String>>,
) -> CommandResult<String> {
    let (program, args) = argv.split_first().expect("argv must not be empty");

    debug!(command = %argv.join(" "), cwd = ?cwd, "running command");

    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd.as_std_path());
    }
    if let Some(env) = env {
        command.envs(env);
    }

    let output = command.output().map_err(|source| CommandError::Spawn {
        program: (*program).to_string(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(CommandError::CommandFailed {
            program: (*program).to_string(),
            status: output.status,
            stderr,
        });
    }

    debug!(bytes = stdout.len(), "command output captured");
    Ok(stdout)
}

/// Check whether a binary is available on `PATH`.
pub fn has_binary(name: &str) -> bool {
    which::which(name).is_ok()
}
