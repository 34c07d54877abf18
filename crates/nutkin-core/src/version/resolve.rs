//! The version resolver.
//!
//! Composes the value type, the change classifier, the commit walk, and the
//! branch rules into the bump decision: given the repository's tags and the
//! commit history from HEAD, what is the next version on this branch?

use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use tracing::{debug, info, instrument};

use super::change::VersionChange;
use super::rules::{RuleSet, VersionRule};
use super::{Version, VersionError, VersionFlavor, VersionResult};
use crate::git::{self, CommitWalk};

/// Resolve the next version of the repository at `repo` and render it.
///
/// The decision procedure:
/// 1. The largest `v`-prefixed tag is the *repo version* (0.0.0 if none).
/// 2. Walking back from HEAD, the nearest commit tagged with a
///    non-prerelease version is the *ancestor release* (0.0.0 if none);
///    the messages traversed on the way accumulate the largest requested
///    *change*.
/// 3. No change means no bump: the ancestor release is returned as is.
/// 4. Otherwise the branch's rule decides how the change, and the *drift*
///    already present between repo version and ancestor release, combine.
#[instrument(skip(rules))]
pub fn resolve_next_version(
    repo: &Utf8Path,
    rules: &RuleSet,
    flavor: VersionFlavor,
) -> VersionResult<String> {
    let branch = git::current_branch(repo)?
        .ok_or_else(|| VersionError::Unresolvable("detached HEAD has no branch rule".into()))?;
    debug!(%branch, "resolving next version");

    let rule = rules
        .matching(&branch)
        .ok_or_else(|| VersionError::NoMatchingRule(branch.clone()))?;

    let repo_version = latest_tagged_version(repo)?;
    debug!(%repo_version, "repo version");

    let (ancestor_release, change) = ancestral_data(repo)?;
    debug!(%ancestor_release, %change, "ancestral data");

    let version = decide(rule, &branch, &repo_version, &ancestor_release, change);
    info!(%version, "resolved next version");

    Ok(version.render(flavor))
}

/// Parse the `v`-prefixed tags of a list into versions.
///
/// Tags without the `v` prefix and tags that do not parse are silently
/// skipped; repositories carry plenty of unrelated tags.
pub fn parse_versions<S: AsRef<str>>(tags: &[S]) -> Vec<Version> {
    tags.iter()
        .filter_map(|tag| tag.as_ref().strip_prefix('v'))
        .filter_map(|text| Version::parse(text).ok())
        .collect()
}

/// The largest version any tag in the repository names, or `0.0.0`.
fn latest_tagged_version(repo: &Utf8Path) -> VersionResult<Version> {
    let tags = git::tags(repo)?;
    Ok(parse_versions(&tags)
        .into_iter()
        .max()
        .unwrap_or_else(|| Version::new(0, 0, 0)))
}

/// Walk history from HEAD for the nearest non-prerelease tagged release and
/// the largest change requested by the messages traversed before it.
///
/// The walk stops at the first commit carrying a non-prerelease version tag;
/// that commit's own message does not contribute to the change. An exhausted
/// history yields `0.0.0`.
fn ancestral_data(repo: &Utf8Path) -> VersionResult<(Version, VersionChange)> {
    let mut change = VersionChange::None;
    for commit in CommitWalk::new(repo)? {
        let commit = commit?;

        let mut tagged = parse_versions(&commit.tags);
        tagged.sort();
        if let Some(release) = tagged.iter().find(|v| !v.is_prerelease()) {
            return Ok((release.clone(), change));
        }

        change = change.max(VersionChange::from_commit_message(&commit.message));
    }
    Ok((Version::new(0, 0, 0), change))
}

/// Apply the branch rule to the gathered data. Pure; no repository access.
fn decide(
    rule: &VersionRule,
    branch: &str,
    repo_version: &Version,
    ancestor_release: &Version,
    change: VersionChange,
) -> Version {
    if change == VersionChange::None {
        // Nothing happened since the last release; nothing to compute,
        // no metadata either
        return ancestor_release.clone();
    }

    // How much of the change the latest tag already reflects
    let drift = VersionChange::diff(repo_version, ancestor_release);

    let version = if let Some(ref tag) = rule.prerelease_tag {
        let base = if drift < change {
            bump(repo_version, change)
        } else {
            repo_version.clone()
        };
        bump_prerelease(&base, tag)
    } else if !repo_version.is_prerelease() {
        bump(repo_version, change)
    } else if drift < change {
        bump(repo_version, change)
    } else {
        // The prerelease already carries the whole change: promote it
        repo_version.base()
    };

    if rule.build_metadata {
        version.with_build_metadata(branch_metadata(branch))
    } else {
        version
    }
}

/// Bump exactly one component, zeroing the finer ones.
///
/// Always strips prerelease and build metadata.
///
/// # Panics
///
/// `change` must not be [`VersionChange::None`]; the resolver short-circuits
/// before a no-op bump can be requested.
pub fn bump(version: &Version, change: VersionChange) -> Version {
    match change {
        VersionChange::Major => Version::new(version.major + 1, 0, 0),
        VersionChange::Minor => Version::new(version.major, version.minor + 1, 0),
        VersionChange::Patch => Version::new(version.major, version.minor, version.patch + 1),
        VersionChange::None => unreachable!("a none change never reaches bump"),
    }
}

/// Step the prerelease counter under `tag`.
///
/// If the version already carries a prerelease with the same tag its counter
/// increments; otherwise the counter restarts at 1 under the new tag. Build
/// metadata is stripped.
pub fn bump_prerelease(version: &Version, tag: &str) -> Version {
    let counter = match version.prerelease {
        Some(ref pre) if pre.tag == tag => pre.counter + 1,
        _ => 1,
    };
    Version {
        prerelease: Some(super::Prerelease {
            tag: tag.to_string(),
            counter,
        }),
        build_metadata: None,
        ..version.base()
    }
}

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^0-9A-Za-z]+").expect("metadata pattern compiles"));

/// Turn a branch name into build metadata: non-alphanumeric runs collapse
/// to single dots.
fn branch_metadata(branch: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(branch, ".")
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::run_in;
    use crate::config::RuleConfig;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn rule(prerelease_tag: Option<&str>, build_metadata: bool) -> VersionRule {
        VersionRule::new(".*", prerelease_tag.map(str::to_string), build_metadata).unwrap()
    }

    // ──────────────────────────────────────────────
    // Pure decision logic
    // ──────────────────────────────────────────────

    #[test]
    fn no_change_returns_ancestor_untouched() {
        let out = decide(
            &rule(Some("alpha"), true),
            "feature/x",
            &v("1.2.0"),
            &v("1.0.0"),
            VersionChange::None,
        );
        // Short circuit: no bump, no prerelease, no metadata
        assert_eq!(out, v("1.0.0"));
    }

    #[test]
    fn stable_bump_from_release() {
        let out = decide(
            &rule(None, false),
            "main",
            &v("1.0.0"),
            &v("1.0.0"),
            VersionChange::Minor,
        );
        assert_eq!(out, v("1.1.0"));
    }

    #[test]
    fn stable_promotes_prerelease_when_drift_covers_change() {
        // The rc already advanced past the ancestor by the full change size
        let out = decide(
            &rule(None, false),
            "main",
            &v("1.1.0-rc.3"),
            &v("1.0.0"),
            VersionChange::Minor,
        );
        assert_eq!(out, v("1.1.0"));
    }

    #[test]
    fn stable_bumps_prerelease_when_change_exceeds_drift() {
        let out = decide(
            &rule(None, false),
            "main",
            &v("1.0.1-rc.1"),
            &v("1.0.0"),
            VersionChange::Major,
        );
        assert_eq!(out, v("2.0.0"));
    }

    #[test]
    fn prerelease_increments_matching_tag() {
        // drift (patch) is not smaller than change (patch): keep the base,
        // step the counter
        let out = decide(
            &rule(Some("rc"), false),
            "dev",
            &v("1.0.1-rc.1"),
            &v("1.0.0"),
            VersionChange::Patch,
        );
        assert_eq!(out, v("1.0.1-rc.2"));
    }

    #[test]
    fn prerelease_bumps_then_restarts_counter() {
        let out = decide(
            &rule(Some("rc"), false),
            "dev",
            &v("1.0.1-rc.4"),
            &v("1.0.0"),
            VersionChange::Minor,
        );
        // minor change outranks the patch drift: bump clears the old
        // prerelease, counter restarts
        assert_eq!(out, v("1.1.0-rc.1"));
    }

    #[test]
    fn prerelease_tag_switch_restarts_counter() {
        let out = decide(
            &rule(Some("alpha"), false),
            "feature/x",
            &v("1.0.1-rc.2"),
            &v("1.0.0"),
            VersionChange::Patch,
        );
        assert_eq!(out, v("1.0.1-alpha.1"));
    }

    #[test]
    fn metadata_is_appended_from_branch() {
        let out = decide(
            &rule(Some("alpha"), true),
            "feature/x-y",
            &v("1.0.0"),
            &v("1.0.0"),
            VersionChange::Patch,
        );
        assert_eq!(out.render(VersionFlavor::Semver), "1.0.1-alpha.1+feature.x.y");
    }

    #[test]
    fn bump_zeroes_finer_components() {
        assert_eq!(bump(&v("1.2.3"), VersionChange::Major), v("2.0.0"));
        assert_eq!(bump(&v("1.2.3"), VersionChange::Minor), v("1.3.0"));
        assert_eq!(bump(&v("1.2.3"), VersionChange::Patch), v("1.2.4"));
    }

    #[test]
    fn bump_strips_prerelease_and_metadata() {
        assert_eq!(
            bump(&v("1.2.3-rc.9+meta"), VersionChange::Patch),
            v("1.2.4")
        );
    }

    #[test]
    fn bump_prerelease_increments_and_restarts() {
        assert_eq!(bump_prerelease(&v("1.0.0-rc.1"), "rc"), v("1.0.0-rc.2"));
        assert_eq!(bump_prerelease(&v("1.0.0-rc.1"), "alpha"), v("1.0.0-alpha.1"));
        assert_eq!(bump_prerelease(&v("1.0.0"), "rc"), v("1.0.0-rc.1"));
        assert_eq!(bump_prerelease(&v("1.0.0+meta"), "rc"), v("1.0.0-rc.1"));
    }

    #[test]
    fn branch_metadata_collapses_runs() {
        assert_eq!(branch_metadata("feature/x-y"), "feature.x.y");
        assert_eq!(branch_metadata("fix//weird--name"), "fix.weird.name");
        assert_eq!(branch_metadata("release/2024"), "release.2024");
    }

    #[test]
    fn parse_versions_filters_junk() {
        let tags = ["v1.0.0", "1.0.0", "not-a-version", "v2.0.0-rc.1", "vfoo"];
        let versions = parse_versions(&tags);
        assert_eq!(versions, vec![v("1.0.0"), v("2.0.0-rc.1")]);
    }

    // ──────────────────────────────────────────────
    // End to end against fixture repositories
    // ──────────────────────────────────────────────

    /// Build a throwaway repository, or return `None` when git is missing.
    fn fixture_repo(branch: &str) -> Option<(TempDir, Utf8PathBuf)> {
        let tmp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        if run_in(&["git", "init", "-q", "-b", branch], &path).is_err() {
            return None;
        }
        run_in(&["git", "config", "user.email", "test@example.com"], &path).unwrap();
        run_in(&["git", "config", "user.name", "Test"], &path).unwrap();
        Some((tmp, path))
    }

    fn commit(repo: &Utf8Path, message: &str) {
        run_in(
            &["git", "commit", "-q", "--allow-empty", "-m", message],
            repo,
        )
        .unwrap();
    }

    fn tag(repo: &Utf8Path, name: &str) {
        run_in(&["git", "tag", name], repo).unwrap();
    }

    #[test]
    fn no_change_short_circuit_end_to_end() {
        let Some((_tmp, repo)) = fixture_repo("main") else {
            return;
        };
        commit(&repo, "feat: base");
        tag(&repo, "v1.0.0");
        commit(&repo, "wip"); // classifies as none

        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "1.0.0");
    }

    #[test]
    fn stable_bump_end_to_end() {
        let Some((_tmp, repo)) = fixture_repo("main") else {
            return;
        };
        commit(&repo, "feat: base");
        tag(&repo, "v1.0.0");
        commit(&repo, "feat: add x");

        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "1.1.0");
    }

    #[test]
    fn rc_track_increments_end_to_end() {
        let Some((_tmp, repo)) = fixture_repo("dev") else {
            return;
        };
        commit(&repo, "feat: base");
        tag(&repo, "v1.0.0");
        commit(&repo, "fix: tweak");
        tag(&repo, "v1.0.1-rc.1");
        commit(&repo, "fix: more");

        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "1.0.1-rc.2");
    }

    #[test]
    fn alpha_track_appends_branch_metadata() {
        let Some((_tmp, repo)) = fixture_repo("feature/x-y") else {
            return;
        };
        commit(&repo, "feat: base");
        tag(&repo, "v1.0.0");
        commit(&repo, "fix: adjust");

        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "1.0.1-alpha.1+feature.x.y");
    }

    #[test]
    fn unparseable_tags_are_ignored_end_to_end() {
        let Some((_tmp, repo)) = fixture_repo("main") else {
            return;
        };
        commit(&repo, "chore: init");
        tag(&repo, "not-a-version");
        tag(&repo, "1.0.0"); // missing the v prefix
        commit(&repo, "fix: y");

        // Neither tag parses, so everything defaults to 0.0.0
        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "0.0.1");
    }

    #[test]
    fn breaking_change_bumps_major_end_to_end() {
        let Some((_tmp, repo)) = fixture_repo("main") else {
            return;
        };
        commit(&repo, "feat: base");
        tag(&repo, "v1.2.3");
        run_in(
            &[
                "git",
                "commit",
                "-q",
                "--allow-empty",
                "-m",
                "chore: z\n\nBREAKING CHANGE: oops",
            ],
            &repo,
        )
        .unwrap();

        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "2.0.0");
    }

    #[test]
    fn empty_history_defaults_to_zero() {
        let Some((_tmp, repo)) = fixture_repo("main") else {
            return;
        };
        commit(&repo, "feat: first ever");

        let rules = RuleSet::default_policy();
        let next = resolve_next_version(&repo, &rules, VersionFlavor::Semver).unwrap();
        assert_eq!(next, "0.1.0");
    }

    #[test]
    fn no_matching_rule_is_fatal() {
        let Some((_tmp, repo)) = fixture_repo("feature/z") else {
            return;
        };
        commit(&repo, "feat: x");

        let rules = RuleSet::from_config(&[RuleConfig {
            branch: "main".into(),
            prerelease_tag: None,
            build_metadata: false,
        }])
        .unwrap();
        let result = resolve_next_version(&repo, &rules, VersionFlavor::Semver);
        assert!(matches!(result, Err(VersionError::NoMatchingRule(_))));
    }

    #[test]
    fn flavors_render_end_to_end() {
        let Some((_tmp, repo)) = fixture_repo("feature/x") else {
            return;
        };
        commit(&repo, "feat: base");
        tag(&repo, "v1.0.0");
        commit(&repo, "fix: adjust");

        let rules = RuleSet::default_policy();
        let git_tag = resolve_next_version(&repo, &rules, VersionFlavor::GitTag).unwrap();
        assert_eq!(git_tag, "v1.0.1-alpha.1+feature.x");
        let container =
            resolve_next_version(&repo, &rules, VersionFlavor::ContainerTag).unwrap();
        assert_eq!(container, "1.0.1-alpha.1-feature.x");
        let package =
            resolve_next_version(&repo, &rules, VersionFlavor::PackageManager).unwrap();
        assert_eq!(package, "1.0.1-alpha.feature.x.1");
    }
}
