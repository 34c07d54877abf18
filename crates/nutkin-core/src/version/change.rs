//! Classifying how far a version should move.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Version;

/// The size of a version change, totally ordered by severity.
///
/// Doubles as "size of requested bump" (from commit messages) and "size of
/// observed drift" (from comparing versions).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VersionChange {
    /// No change.
    None,
    /// Patch-level change (x.y.Z).
    Patch,
    /// Minor-level change (x.Y.0).
    Minor,
    /// Major-level change (X.0.0).
    Major,
}

impl fmt::Display for VersionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// Conventional-commit prefixes and the change they imply.
const COMMIT_PREFIXES: &[(&str, VersionChange)] = &[
    ("build:", VersionChange::Patch),
    ("chore:", VersionChange::Patch),
    ("ci:", VersionChange::Patch),
    ("docs:", VersionChange::Patch),
    ("feat:", VersionChange::Minor),
    ("fix:", VersionChange::Patch),
    ("perf:", VersionChange::Patch),
    ("style:", VersionChange::Patch),
    ("refactor:", VersionChange::Minor),
    ("test:", VersionChange::Patch),
];

/// Marker line that forces a major change regardless of the subject prefix.
const BREAKING_MARKER: &str = "BREAKING CHANGE:";

impl VersionChange {
    /// The coarsest component that differs between two versions.
    ///
    /// Checked major, then minor, then patch; `None` when the release
    /// triples are identical. Prerelease and metadata are not consulted.
    pub fn diff(a: &Version, b: &Version) -> Self {
        if a.major != b.major {
            Self::Major
        } else if a.minor != b.minor {
            Self::Minor
        } else if a.patch != b.patch {
            Self::Patch
        } else {
            Self::None
        }
    }

    /// Classify a commit message.
    ///
    /// Only the first line is checked for a conventional-commit prefix.
    /// Any later line starting with `BREAKING CHANGE:` forces [`Self::Major`],
    /// whether or not the first line matched.
    pub fn from_commit_message(message: &str) -> Self {
        let mut lines = message.trim().lines();

        let change = lines
            .next()
            .and_then(|header| {
                COMMIT_PREFIXES
                    .iter()
                    .find(|(prefix, _)| header.starts_with(prefix))
            })
            .map_or(Self::None, |(_, change)| *change);

        if lines.any(|line| line.starts_with(BREAKING_MARKER)) {
            return Self::Major;
        }
        change
    }
}
