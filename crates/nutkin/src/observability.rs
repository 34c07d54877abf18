//! Observability setup: structured logging.
//!
//! **Important**: This module never writes to stdout, which is reserved for
//! command output (`next-version` prints a bare version string that scripts
//! and CI steps consume). All logging goes to files or stderr.

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "NUTKIN_LOG_PATH";
const ENV_LOG_DIR: &str = "NUTKIN_LOG_DIR";
const DEFAULT_LOG_DIR_UNIX: &str = "/var/log";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Guard that must be held for the lifetime of the application to ensure
/// buffered log lines are flushed on exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize observability (JSONL logging).
///
/// Returns a guard that must be held for the application lifetime. When no
/// writable log location exists, logging falls back to stderr with a warning
/// rather than failing the command.
pub fn init_observability(
    config_log_dir: Option<PathBuf>,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let service = env!("CARGO_PKG_NAME");
    let (log_writer, log_guard) = match resolve_log_target(service, config_log_dir.as_deref()) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            // Fall back to stderr, NOT stdout: stdout belongs to the command
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let log_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_writer(log_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::debug!("observability initialized");

    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[derive(Clone, Debug)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

/// Pick where the JSONL log lands.
///
/// Priority: `NUTKIN_LOG_PATH` > `NUTKIN_LOG_DIR` > the config `log_dir` >
/// the first writable of `/var/log` (unix), the XDG data dir, and the
/// current directory.
fn resolve_log_target(service: &str, config_dir: Option<&Path>) -> Result<LogTarget, String> {
    if let Some(path) = std::env::var_os(ENV_LOG_PATH).map(PathBuf::from) {
        return log_target_from_path(path);
    }

    let file_name = format!("{service}{LOG_FILE_SUFFIX}");

    if let Some(dir) = std::env::var_os(ENV_LOG_DIR).map(PathBuf::from) {
        ensure_writable(&dir, &file_name)?;
        return Ok(LogTarget { dir, file_name });
    }

    if let Some(dir) = config_dir.map(Path::to_path_buf) {
        ensure_writable(&dir, &file_name)?;
        return Ok(LogTarget { dir, file_name });
    }

    let mut candidates = Vec::new();
    if cfg!(unix) {
        candidates.push(PathBuf::from(DEFAULT_LOG_DIR_UNIX));
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", service) {
        candidates.push(proj_dirs.data_local_dir().join("logs"));
    }
    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir);
    }

    for dir in candidates {
        if ensure_writable(&dir, &file_name).is_ok() {
            return Ok(LogTarget { dir, file_name });
        }
    }

    Err("No writable log directory found".to_string())
}

fn log_target_from_path(path: PathBuf) -> Result<LogTarget, String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("{ENV_LOG_PATH} must include a file name"))
        .and_then(|name| {
            name.to_str()
                .map(|value| value.to_string())
                .ok_or_else(|| format!("{ENV_LOG_PATH} must be valid UTF-8"))
        })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_writable(dir, &file_name)?;

    Ok(LogTarget {
        dir: dir.to_path_buf(),
        file_name,
    })
}

fn ensure_writable(dir: &Path, file_name: &str) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create log directory {}: {e}", dir.display()))?;

    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))?;

    Ok(())
}
