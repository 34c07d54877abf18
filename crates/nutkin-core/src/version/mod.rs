//! Version resolution.
//!
//! This module owns the version value type and everything that decides what
//! the next release of a repository should be called: the change classifier
//! ([`change`]), the branch rules ([`rules`]), and the resolver itself
//! ([`resolve`]).

pub mod change;
pub mod resolve;
pub mod rules;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::GitError;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Version text that does not match `MAJOR.MINOR.PATCH[-TAG.COUNT][+METADATA]`.
    #[error("malformed version: {0:?}")]
    MalformedVersion(String),

    /// The current branch matches no version rule.
    #[error("no version rule matches branch {0:?}")]
    NoMatchingRule(String),

    /// A branch pattern in the rule list is not a valid regular expression.
    #[error("invalid branch pattern: {0}")]
    InvalidPattern(#[from] Box<regex::Error>),

    /// The repository is in a state versions cannot be resolved from.
    #[error("{0}")]
    Unresolvable(String),

    /// A git operation failed.
    #[error("git error: {0}")]
    Git(#[from] GitError),

    /// The installed-version file could not be read.
    #[error("failed to read version file {path}: {source}")]
    VersionFile {
        /// Path that was read.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// A prerelease marker: a tag plus a counter, as in `rc.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prerelease {
    /// The prerelease tag (e.g. `rc`, `alpha`).
    pub tag: String,
    /// The prerelease counter, always >= 1.
    pub counter: u64,
}

/// An immutable structured version identifier.
///
/// `major.minor.patch`, an optional [`Prerelease`], and optional build
/// metadata. Precedence ignores build metadata entirely; a release sorts
/// *after* every prerelease of the same release triple, and prereleases of
/// the same triple compare by `(tag, counter)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Prerelease tag and counter, if any.
    pub prerelease: Option<Prerelease>,
    /// Build metadata; never participates in precedence.
    pub build_metadata: Option<String>,
}

/// Output encodings of a [`Version`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionFlavor {
    /// Plain `M.m.p[-tag.count][+metadata]`.
    #[default]
    Semver,
    /// Semver form prefixed with `v`, for git tags.
    GitTag,
    /// Semver form with `+` replaced by `-`; container tags forbid `+`.
    ContainerTag,
    /// `M.m.p[-tag][.metadata][.count]`, for package registries.
    PackageManager,
}

impl fmt::Display for VersionFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semver => write!(f, "semver"),
            Self::GitTag => write!(f, "git-tag"),
            Self::ContainerTag => write!(f, "container-tag"),
            Self::PackageManager => write!(f, "package-manager"),
        }
    }
}

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)(?:-(?P<tag>[0-9A-Za-z-]+)\.(?P<counter>\d+))?(?:\+(?P<metadata>[0-9A-Za-z.-]+))?$",
    )
    .expect("version pattern compiles")
});

impl Version {
    /// A bare `major.minor.patch` version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build_metadata: None,
        }
    }

    /// Parse `MAJOR.MINOR.PATCH[-TAG.COUNT][+METADATA]`.
    ///
    /// A prerelease suffix must carry both a tag and a counter, and the
    /// counter must be positive; anything else is [`VersionError::MalformedVersion`].
    pub fn parse(text: &str) -> VersionResult<Self> {
        let malformed = || VersionError::MalformedVersion(text.to_string());
        let captures = VERSION_RE.captures(text).ok_or_else(|| malformed())?;

        let component = |name: &str| -> VersionResult<u64> {
            captures[name].parse().map_err(|_| malformed())
        };

        let prerelease = match captures.name("tag") {
            Some(tag) => {
                let counter = component("counter")?;
                if counter == 0 {
                    return Err(malformed());
                }
                Some(Prerelease {
                    tag: tag.as_str().to_string(),
                    counter,
                })
            }
            None => None,
        };

        Ok(Self {
            major: component("major")?,
            minor: component("minor")?,
            patch: component("patch")?,
            prerelease,
            build_metadata: captures.name("metadata").map(|m| m.as_str().to_string()),
        })
    }

    /// Render in the requested [`VersionFlavor`].
    pub fn render(&self, flavor: VersionFlavor) -> String {
        match flavor {
            VersionFlavor::Semver => self.semver(),
            VersionFlavor::GitTag => format!("v{}", self.semver()),
            VersionFlavor::ContainerTag => self.semver().replace('+', "-"),
            VersionFlavor::PackageManager => {
                let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
                if let Some(ref pre) = self.prerelease {
                    out.push_str(&format!("-{}", pre.tag));
                }
                if let Some(ref metadata) = self.build_metadata {
                    out.push_str(&format!(".{metadata}"));
                }
                if let Some(ref pre) = self.prerelease {
                    out.push_str(&format!(".{}", pre.counter));
                }
                out
            }
        }
    }

    fn semver(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if let Some(ref pre) = self.prerelease {
            out.push_str(&format!("-{}.{}", pre.tag, pre.counter));
        }
        if let Some(ref metadata) = self.build_metadata {
            out.push_str(&format!("+{metadata}"));
        }
        out
    }

    /// Whether this version carries a prerelease marker.
    pub const fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The bare release triple, prerelease and metadata stripped.
    pub const fn base(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    /// Attach build metadata, replacing any existing metadata.
    pub fn with_build_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.build_metadata = Some(metadata.into());
        self
    }

    /// Precedence comparison: the order the resolver reasons in.
    ///
    /// Ignores build metadata, so versions differing only in metadata
    /// compare equal here even though they are not identical. [`Ord`]
    /// breaks that tie on the metadata itself to stay consistent with
    /// [`Eq`].
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // A release outranks every prerelease of itself
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.tag.cmp(&b.tag).then_with(|| a.counter.cmp(&b.counter)),
            })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.build_metadata.cmp(&other.build_metadata))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.semver())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The installed tool's own version, parsed and re-rendered.
///
/// Reads the one-line version file the bootstrap step persists. The file is
/// a trusted literal: it is never recomputed, only re-rendered through
/// [`Version`] so that the output is canonical.
pub fn current_version(version_file: &Utf8Path) -> VersionResult<String> {
    let text =
        std::fs::read_to_string(version_file).map_err(|source| VersionError::VersionFile {
            path: version_file.to_string(),
            source,
        })?;
    let version = Version::parse(text.trim())?;
    Ok(version.render(VersionFlavor::Semver))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn parse_bare() {
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_prerelease() {
        let parsed = v("1.2.3-rc.4");
        assert_eq!(
            parsed.prerelease,
            Some(Prerelease {
                tag: "rc".into(),
                counter: 4
            })
        );
    }

    #[test]
    fn parse_metadata() {
        assert_eq!(v("1.2.3+feature.x").build_metadata.as_deref(), Some("feature.x"));
    }

    #[test]
    fn parse_full() {
        let parsed = v("0.9.17-alpha.2+feature.x.y");
        assert_eq!((parsed.major, parsed.minor, parsed.patch), (0, 9, 17));
        assert_eq!(parsed.prerelease.as_ref().unwrap().tag, "alpha");
        assert_eq!(parsed.prerelease.as_ref().unwrap().counter, 2);
        assert_eq!(parsed.build_metadata.as_deref(), Some("feature.x.y"));
    }

    #[test]
    fn reject_malformed() {
        for text in [
            "",
            "1",
            "1.2",
            "1.2.3.4",
            "a.b.c",
            "1.2.3-rc",     // prerelease without counter
            "1.2.3-rc.",    // empty counter
            "1.2.3-.1",     // empty tag
            "1.2.3-rc.0",   // counter must be positive
            "v1.2.3",       // tag prefixes are the caller's concern
            "1.2.3-rc.1.2", // tag must be a single segment
            " 1.2.3",
        ] {
            assert!(
                matches!(
                    Version::parse(text),
                    Err(VersionError::MalformedVersion(_))
                ),
                "{text:?} should be malformed"
            );
        }
    }

    #[test]
    fn semver_round_trip() {
        for text in [
            "0.0.0",
            "1.2.3",
            "1.2.3-rc.1",
            "1.2.3+meta",
            "10.20.30-alpha.7+feature.a.b",
        ] {
            assert_eq!(v(text).render(VersionFlavor::Semver), text);
            assert_eq!(v(&v(text).render(VersionFlavor::Semver)), v(text));
        }
    }

    #[test]
    fn git_tag_flavor() {
        assert_eq!(v("1.2.3-rc.1").render(VersionFlavor::GitTag), "v1.2.3-rc.1");
    }

    #[test]
    fn container_tag_flavor_replaces_plus() {
        assert_eq!(
            v("1.2.3-alpha.1+feature.x").render(VersionFlavor::ContainerTag),
            "1.2.3-alpha.1-feature.x"
        );
        assert_eq!(v("1.2.3").render(VersionFlavor::ContainerTag), "1.2.3");
    }

    #[test]
    fn package_manager_flavor() {
        assert_eq!(v("1.2.3").render(VersionFlavor::PackageManager), "1.2.3");
        assert_eq!(
            v("1.2.3-rc.2").render(VersionFlavor::PackageManager),
            "1.2.3-rc.2"
        );
        assert_eq!(
            v("1.2.3-alpha.2+feature.x").render(VersionFlavor::PackageManager),
            "1.2.3-alpha.feature.x.2"
        );
        assert_eq!(
            v("1.2.3+feature.x").render(VersionFlavor::PackageManager),
            "1.2.3.feature.x"
        );
    }

    #[test]
    fn release_outranks_its_prereleases() {
        assert!(v("1.2.3") > v("1.2.3-rc.1"));
        assert!(v("1.2.3-rc.1") > v("1.2.2"));
    }

    #[test]
    fn prerelease_counters_order() {
        assert!(v("1.0.0-alpha.2") > v("1.0.0-alpha.1"));
        assert!(v("1.0.0-rc.1") > v("1.0.0-alpha.9"));
    }

    #[test]
    fn metadata_is_precedence_blind() {
        assert_eq!(
            v("1.0.0+a").cmp_precedence(&v("1.0.0+b")),
            std::cmp::Ordering::Equal
        );
        assert_ne!(v("1.0.0+a"), v("1.0.0+b"));
    }

    #[test]
    fn release_triples_order_lexicographically() {
        assert!(v("2.0.0") > v("1.9.9"));
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("1.0.10") > v("1.0.9"));
    }

    #[test]
    fn base_strips_everything() {
        assert_eq!(v("1.2.3-rc.1+meta").base(), Version::new(1, 2, 3));
    }

    #[test]
    fn current_version_reads_and_rerenders() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("version.txt");
        std::fs::write(&file, "1.2.3-rc.1\n").unwrap();
        let file = camino::Utf8PathBuf::from_path_buf(file).unwrap();
        assert_eq!(current_version(&file).unwrap(), "1.2.3-rc.1");
    }

    #[test]
    fn current_version_missing_file_errors() {
        let file = camino::Utf8Path::new("/nonexistent/version.txt");
        assert!(matches!(
            current_version(file),
            Err(VersionError::VersionFile { .. })
        ));
    }
}
