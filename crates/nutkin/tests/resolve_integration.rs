//! Version resolution integration tests.
//!
//! These tests build real fixture repositories in tempdirs and drive the
//! compiled binary end to end. They skip silently when git is unavailable,
//! mirroring how the unit suites guard their git-dependent tests.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

fn git(repo: &Path, args: &[&str]) -> bool {
    StdCommand::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Build a throwaway repository, or return `None` when git is missing.
fn fixture_repo(branch: &str) -> Option<TempDir> {
    let tmp = TempDir::new().unwrap();
    if !git(tmp.path(), &["init", "-q", "-b", branch]) {
        return None;
    }
    assert!(git(
        tmp.path(),
        &["config", "user.email", "test@example.com"]
    ));
    assert!(git(tmp.path(), &["config", "user.name", "Test"]));
    Some(tmp)
}

fn commit(repo: &Path, message: &str) {
    assert!(git(
        repo,
        &["commit", "-q", "--allow-empty", "-m", message]
    ));
}

fn tag(repo: &Path, name: &str) {
    assert!(git(repo, &["tag", name]));
}

#[test]
fn resolves_stable_bump_on_main() {
    let Some(repo) = fixture_repo("main") else {
        return;
    };
    commit(repo.path(), "feat: base");
    tag(repo.path(), "v1.0.0");
    commit(repo.path(), "feat: add x");

    cmd()
        .args(["-C", repo.path().to_str().unwrap(), "next-version"])
        .assert()
        .success()
        .stdout(predicate::eq("1.1.0\n"));
}

#[test]
fn resolves_no_change_to_ancestor() {
    let Some(repo) = fixture_repo("main") else {
        return;
    };
    commit(repo.path(), "feat: base");
    tag(repo.path(), "v1.0.0");
    commit(repo.path(), "plain message");

    cmd()
        .args(["-C", repo.path().to_str().unwrap(), "next-version"])
        .assert()
        .success()
        .stdout(predicate::eq("1.0.0\n"));
}

#[test]
fn resolves_git_tag_flavor() {
    let Some(repo) = fixture_repo("main") else {
        return;
    };
    commit(repo.path(), "feat: base");
    tag(repo.path(), "v1.0.0");
    commit(repo.path(), "fix: y");

    cmd()
        .args([
            "-C",
            repo.path().to_str().unwrap(),
            "next-version",
            "--flavor",
            "git-tag",
        ])
        .assert()
        .success()
        .stdout(predicate::eq("v1.0.1\n"));
}

#[test]
fn resolves_alpha_with_metadata_on_feature_branch() {
    let Some(repo) = fixture_repo("feature/x-y") else {
        return;
    };
    commit(repo.path(), "feat: base");
    tag(repo.path(), "v1.0.0");
    commit(repo.path(), "fix: adjust");

    cmd()
        .args(["-C", repo.path().to_str().unwrap(), "next-version"])
        .assert()
        .success()
        .stdout(predicate::eq("1.0.1-alpha.1+feature.x.y\n"));
}

#[test]
fn json_output_carries_version_and_flavor() {
    let Some(repo) = fixture_repo("main") else {
        return;
    };
    commit(repo.path(), "feat: base");
    tag(repo.path(), "v2.0.0");
    commit(repo.path(), "fix: y");

    let output = cmd()
        .args([
            "-C",
            repo.path().to_str().unwrap(),
            "next-version",
            "--json",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["version"], "2.0.1");
    assert_eq!(json["flavor"], "semver");
}

#[test]
fn custom_rules_from_config_apply() {
    let Some(repo) = fixture_repo("release/7") else {
        return;
    };
    std::fs::write(
        repo.path().join(".nutkin.toml"),
        r#"
[[rules]]
branch = "release/.*"
prerelease_tag = "rc"
"#,
    )
    .unwrap();
    commit(repo.path(), "feat: base");
    tag(repo.path(), "v1.0.0");
    commit(repo.path(), "fix: tighten");

    cmd()
        .args(["-C", repo.path().to_str().unwrap(), "next-version"])
        .assert()
        .success()
        .stdout(predicate::eq("1.0.1-rc.1\n"));
}

#[test]
fn branch_without_rule_fails() {
    let Some(repo) = fixture_repo("feature/q") else {
        return;
    };
    std::fs::write(
        repo.path().join(".nutkin.toml"),
        r#"
[[rules]]
branch = "main"
"#,
    )
    .unwrap();
    commit(repo.path(), "feat: x");

    cmd()
        .args(["-C", repo.path().to_str().unwrap(), "next-version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no version rule matches"));
}

#[test]
fn outside_a_repository_fails() {
    let tmp = TempDir::new().unwrap();
    // Guard: only meaningful when git itself is present
    if which_git().is_none() {
        return;
    }

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "next-version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("version resolution failed"));
}

fn which_git() -> Option<()> {
    StdCommand::new("git")
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|_| ())
}
