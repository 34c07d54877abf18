//! The publish pipeline.
//!
//! Drives package-registry and container-registry publication for the
//! project in the working directory, including the GitHub-Actions entry
//! point that CI uses. Everything external (build tools, twine, docker)
//! runs through the command runner; nutkin itself only rewrites the
//! project manifest and stitches the steps together.

use std::io::Write;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{info, instrument};

use crate::command::{self, CommandError};
use crate::config::PublishConfig;
use crate::format::{self, FormatError};
use crate::prefix::{Prefix, PrefixError};
use crate::version::resolve::resolve_next_version;
use crate::version::rules::RuleSet;
use crate::version::{Version, VersionError, VersionFlavor};

/// Errors from publish operations.
#[derive(Error, Debug)]
pub enum PublishError {
    /// An external tool failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Version resolution failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The pre-publish format check failed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A build tool could not be provided by the prefix.
    #[error(transparent)]
    Prefix(#[from] PrefixError),

    /// No recognized project manifest in the working directory.
    #[error("no pyproject.toml or package.json found in {0}")]
    UnknownProjectType(String),

    /// The project manifest exists but cannot be read or lacks the
    /// expected fields.
    #[error("bad project manifest {path}: {message}")]
    Manifest {
        /// Manifest path.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// A required environment variable is unset.
    #[error("{0} is not set")]
    MissingEnv(&'static str),

    /// The package build left no uploadable artifacts behind.
    #[error("unable to find built artifacts matching {0}")]
    MissingArtifacts(String),

    /// Container publishing needs `publish.image_repository` configured.
    #[error("publish.image_repository is not configured")]
    MissingImageRepository,

    /// Filesystem access failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being touched.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// What kind of artifact a publish run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PublishFlavor {
    /// Build and upload a package to its registry.
    Package,
    /// Build and push a container image.
    Container,
}

impl std::fmt::Display for PublishFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// A recognized project kind, detected from its manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    /// Python project (`pyproject.toml`).
    Python,
    /// Node project (`package.json`).
    Node,
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Node => write!(f, "node"),
        }
    }
}

impl ProjectType {
    const fn manifest(self) -> &'static str {
        match self {
            Self::Python => "pyproject.toml",
            Self::Node => "package.json",
        }
    }
}

/// Detect the project type from marker files in `dir`.
pub fn detect_project_type(dir: &Utf8Path) -> PublishResult<ProjectType> {
    if dir.join("pyproject.toml").is_file() {
        Ok(ProjectType::Python)
    } else if dir.join("package.json").is_file() {
        Ok(ProjectType::Node)
    } else {
        Err(PublishError::UnknownProjectType(dir.to_string()))
    }
}

/// Read the project name from its manifest.
pub fn project_name(dir: &Utf8Path, project_type: ProjectType) -> PublishResult<String> {
    let path = dir.join(project_type.manifest());
    let text = std::fs::read_to_string(&path).map_err(|source| PublishError::Io {
        path: path.to_string(),
        source,
    })?;

    let name = match project_type {
        ProjectType::Python => {
            let manifest: toml::Value =
                toml::from_str(&text).map_err(|e| PublishError::Manifest {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            manifest
                .get("project")
                .and_then(|project| project.get("name"))
                .and_then(toml::Value::as_str)
                .map(str::to_string)
        }
        ProjectType::Node => {
            let manifest: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| PublishError::Manifest {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            manifest
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        }
    };

    name.ok_or_else(|| PublishError::Manifest {
        path: path.to_string(),
        message: "missing project name".to_string(),
    })
}

/// Rewrite the version field in the project manifest.
pub fn set_project_version(
    dir: &Utf8Path,
    project_type: ProjectType,
    version: &str,
) -> PublishResult<()> {
    let path = dir.join(project_type.manifest());
    let text = std::fs::read_to_string(&path).map_err(|source| PublishError::Io {
        path: path.to_string(),
        source,
    })?;

    let updated = match project_type {
        ProjectType::Python => {
            let mut manifest: toml::Value =
                toml::from_str(&text).map_err(|e| PublishError::Manifest {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            let project = manifest
                .get_mut("project")
                .and_then(toml::Value::as_table_mut)
                .ok_or_else(|| PublishError::Manifest {
                    path: path.to_string(),
                    message: "missing [project] table".to_string(),
                })?;
            project.insert(
                "version".to_string(),
                toml::Value::String(version.to_string()),
            );
            toml::to_string(&manifest).map_err(|e| PublishError::Manifest {
                path: path.to_string(),
                message: e.to_string(),
            })?
        }
        ProjectType::Node => {
            let mut manifest: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| PublishError::Manifest {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            manifest["version"] = serde_json::Value::String(version.to_string());
            let rendered =
                serde_json::to_string_pretty(&manifest).map_err(|e| PublishError::Manifest {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            format!("{rendered}\n")
        }
    };

    std::fs::write(&path, updated).map_err(|source| PublishError::Io {
        path: path.to_string(),
        source,
    })
}

/// Run the publish flow a GitHub Actions workflow expects.
///
/// Resolves the next version, records `version=` and `tag=` in
/// `$GITHUB_OUTPUT`, writes the version into the project manifest,
/// re-checks formatting, then builds and uploads the requested artifact.
/// Any failure aborts the whole flow; nothing is retried.
#[instrument(skip(prefix, rules, publish, token))]
pub fn publish_github_action(
    prefix: &Prefix,
    repo: &Utf8Path,
    rules: &RuleSet,
    publish: &PublishConfig,
    flavor: PublishFlavor,
    token: &str,
) -> PublishResult<()> {
    let project_type = detect_project_type(repo)?;
    let name = project_name(repo, project_type)?;
    info!(%project_type, %name, "publishing");

    let version = resolve_next_version(repo, rules, VersionFlavor::Semver)?;
    let tag = resolve_next_version(repo, rules, VersionFlavor::GitTag)?;
    info!(%version, %tag, "resolved release version");

    let output_path =
        std::env::var("GITHUB_OUTPUT").map_err(|_| PublishError::MissingEnv("GITHUB_OUTPUT"))?;
    let mut github_output = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&output_path)
        .map_err(|source| PublishError::Io {
            path: output_path.clone(),
            source,
        })?;
    writeln!(github_output, "version={version}").map_err(|source| PublishError::Io {
        path: output_path.clone(),
        source,
    })?;
    writeln!(github_output, "tag={tag}").map_err(|source| PublishError::Io {
        path: output_path.clone(),
        source,
    })?;

    let manifest_version = resolve_next_version(repo, rules, VersionFlavor::PackageManager)?;
    set_project_version(repo, project_type, &manifest_version)?;

    info!("checking formatting");
    format::format_files(prefix, &[repo.to_path_buf()], true)?;

    match flavor {
        PublishFlavor::Package => publish_package(prefix, repo, &name, &manifest_version, token),
        PublishFlavor::Container => {
            publish_container(repo, publish, &name, &version, token)
        }
    }
}

/// Build the package and upload the wheel/sdist pair with twine.
fn publish_package(
    prefix: &Prefix,
    repo: &Utf8Path,
    name: &str,
    version: &str,
    token: &str,
) -> PublishResult<()> {
    info!("building package");
    let build = prefix.tool("build")?;
    let refs: Vec<&str> = build.iter().map(String::as_str).collect();
    command::run_in(&refs, repo)?;

    // Registry filenames use the normalized package name
    let package = name.to_lowercase().replace('-', "_");
    let stem = format!("{package}-{version}");

    let dist = repo.join("dist");
    let mut artifacts = Vec::new();
    let entries = dist.read_dir_utf8().map_err(|source| PublishError::Io {
        path: dist.to_string(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| PublishError::Io {
            path: dist.to_string(),
            source,
        })?;
        let file_name = entry.file_name().to_string();
        let is_wheel = file_name.starts_with(&format!("{stem}-")) && file_name.ends_with(".whl");
        let is_sdist = file_name == format!("{stem}.tar.gz");
        if is_wheel || is_sdist {
            artifacts.push(entry.path().to_string());
        }
    }
    if artifacts.is_empty() {
        return Err(PublishError::MissingArtifacts(stem));
    }

    info!(count = artifacts.len(), "uploading with twine");
    let mut argv = prefix.tool("twine")?;
    argv.extend([
        "--no-color".to_string(),
        "upload".to_string(),
        "--disable-progress-bar".to_string(),
        "--username=__token__".to_string(),
        format!("--password={token}"),
    ]);
    argv.extend(artifacts);
    let refs: Vec<&str> = argv.iter().map(String::as_str).collect();
    command::run_in(&refs, repo)?;
    Ok(())
}

/// Build and push the container image, tagging `latest` for final releases.
fn publish_container(
    repo: &Utf8Path,
    publish: &PublishConfig,
    name: &str,
    version: &str,
    token: &str,
) -> PublishResult<()> {
    let repository = publish
        .image_repository
        .as_deref()
        .ok_or(PublishError::MissingImageRepository)?;
    let image = format!("{repository}/{name}");

    // latest only tracks final releases
    let parsed = Version::parse(version)?;
    let publish_latest = !parsed.is_prerelease();
    let image_version = parsed.render(VersionFlavor::ContainerTag);
    info!(%image, %image_version, publish_latest, "building container image");

    let owner = repository.rsplit('/').next().unwrap_or(repository);
    command::run(&[
        "docker",
        "login",
        &format!("--username={owner}"),
        &format!("--password={token}"),
    ])?;

    let version_tag = format!("--tag={image}:{image_version}");
    let latest_tag = format!("--tag={image}:latest");
    let mut argv = vec![
        "docker",
        "buildx",
        "build",
        "--platform=linux/arm64,linux/amd64",
        "--progress=plain",
        "--push",
        &version_tag,
    ];
    if publish_latest {
        argv.push(&latest_tag);
    }
    argv.push(".");
    command::run_in(&argv, repo)?;
    Ok(())
}
