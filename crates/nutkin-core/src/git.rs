//! Git queries for version resolution.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! repository configuration instead of reimplementing the object model.
//! Everything here is a read: nutkin never mutates the repository.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::command::{self, CommandError};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// The underlying `git` invocation failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A single commit as seen by the version resolver.
///
/// Produced read-only by [`CommitWalk`]; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full commit hash.
    pub hash: String,
    /// Raw commit message, possibly multi-line.
    pub message: String,
    /// Tags pointing exactly at this commit.
    pub tags: Vec<String>,
}

/// Get the current branch name.
///
/// Returns `None` in a detached HEAD state.
#[instrument]
pub fn current_branch(repo: &Utf8Path) -> GitResult<Option<String>> {
    let branch = git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// List every tag in the repository.
#[instrument]
pub fn tags(repo: &Utf8Path) -> GitResult<Vec<String>> {
    let output = git(repo, &["tag"])?;
    let tags: Vec<String> = output.lines().map(str::to_string).collect();
    debug!(count = tags.len(), "listed tags");
    Ok(tags)
}

/// Lazy reverse-chronological walk of the commit history starting at HEAD.
///
/// Each step issues a fresh `git rev-list --skip=N` query, so the walk never
/// materializes the whole history. Construction re-derives from current
/// repository state; consume it single-threaded, front to back, and stop
/// iterating as soon as you have what you need — histories are unbounded.
#[derive(Debug)]
pub struct CommitWalk {
    repo: Utf8PathBuf,
    head: Option<String>,
    next: Option<String>,
    skip: usize,
}

impl CommitWalk {
    /// Start a walk at the repository's current HEAD.
    ///
    /// An empty repository (no commits yet) yields an empty walk rather
    /// than an error.
    #[instrument]
    pub fn new(repo: &Utf8Path) -> GitResult<Self> {
        let head = git(
            repo,
            &[
                "rev-list",
                "HEAD",
                "--format=%H",
                "--no-commit-header",
                "--max-count=1",
            ],
        )
        .map(|out| if out.is_empty() { None } else { Some(out) })
        // `git rev-list HEAD` fails outright before the first commit
        .or_else(|err| match err {
            GitError::Command(CommandError::CommandFailed { .. }) => Ok(None),
            other => Err(other),
        })?;

        debug!(head = ?head, "starting commit walk");
        Ok(Self {
            repo: repo.to_path_buf(),
            head: head.clone(),
            next: head,
            skip: 0,
        })
    }

    fn load(&mut self, hash: String) -> GitResult<Commit> {
        self.skip += 1;

        let tags = git(&self.repo, &["tag", "--points-at", &hash])?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let message = git(
            &self.repo,
            &[
                "rev-list",
                &hash,
                "--format=%B",
                "--no-commit-header",
                "--max-count=1",
            ],
        )?;

        // Advance: the commit `skip` steps behind HEAD, if any
        let head = self.head.as_deref().expect("walk with no head never loads");
        let skip_arg = format!("--skip={}", self.skip);
        let earlier = git(&self.repo, &["rev-list", head, "--max-count=1", &skip_arg])?;
        self.next = earlier.split_whitespace().next().map(str::to_string);

        Ok(Commit {
            hash,
            message,
            tags,
        })
    }
}

impl Iterator for CommitWalk {
    type Item = GitResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.load(hash) {
            Ok(commit) => Some(Ok(commit)),
            Err(err) => {
                // Abort the walk; a failed process call is fatal to resolution
                self.head = None;
                Some(Err(err))
            }
        }
    }
}

/// Run a git subcommand in `repo` and return its trimmed stdout.
fn git(repo: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("git");
    argv.extend_from_slice(args);

    match command::run_in(&argv, repo) {
        Ok(out) => Ok(out),
        Err(CommandError::CommandFailed { stderr, .. })
            if stderr.contains("not a git repository") =>
        {
            Err(GitError::NotARepo)
        }
        Err(err) => Err(err.into()),
    }
}
