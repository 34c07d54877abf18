//! The tool prefix: a directory holding per-language tool installations.
//!
//! Formatters and publish steps do not assume anything about the host
//! machine beyond the language runtimes themselves. Each language owns a
//! subdirectory of the prefix (a python virtualenv, a private npm package
//! dir) and installs its tools there on first use. The registry is explicit
//! and populated once at construction.
//!
//! The prefix also persists `version.txt`, the one-line file recording the
//! installed tool's own version.

use std::collections::HashMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::command::{self, CommandError};

/// Errors from prefix operations.
#[derive(Error, Debug)]
pub enum PrefixError {
    /// An install command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Filesystem access inside the prefix failed.
    #[error("prefix I/O error at {path}: {source}")]
    Io {
        /// The path being touched.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A language runtime is missing from the host.
    #[error("{runtime} not found on PATH (required to install {language} tools)")]
    MissingRuntime {
        /// The missing binary.
        runtime: &'static str,
        /// The language needing it.
        language: &'static str,
    },

    /// No language registered under this name.
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    /// No tool registered under this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A tool install ran but left no usable binary behind.
    #[error("tool install failed: {0}")]
    InstallFailed(String),
}

/// Result alias for prefix operations.
pub type PrefixResult<T> = Result<T, PrefixError>;

/// A tool installable into a language's prefix directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// The name the rest of nutkin refers to the tool by.
    pub name: &'static str,
    /// The owning language.
    pub language: &'static str,
    /// Package name in the language's package manager.
    pub package: &'static str,
    /// Binary the package installs; `None` means invoke as a module.
    pub binary: Option<&'static str>,
}

/// Every tool nutkin knows how to install.
pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "black",
        language: "python",
        package: "black",
        binary: Some("black"),
    },
    ToolSpec {
        name: "isort",
        language: "python",
        package: "isort",
        binary: Some("isort"),
    },
    ToolSpec {
        name: "build",
        language: "python",
        package: "build",
        binary: None,
    },
    ToolSpec {
        name: "twine",
        language: "python",
        package: "twine",
        binary: Some("twine"),
    },
    ToolSpec {
        name: "prettier",
        language: "node",
        package: "prettier",
        binary: Some("prettier"),
    },
];

/// A language that can host tools inside the prefix.
///
/// `root` is the language's own subdirectory of the prefix.
pub trait Language {
    /// The registry key (e.g. `"python"`).
    fn name(&self) -> &'static str;

    /// Prepare `root` so tools can be installed into it.
    ///
    /// Idempotent; called before every tool resolution.
    fn install(&self, root: &Utf8Path) -> PrefixResult<()>;

    /// Install `tool` if needed and return the argv that invokes it.
    fn tool_argv(&self, root: &Utf8Path, tool: &ToolSpec) -> PrefixResult<Vec<String>>;
}

/// Python: a virtualenv, tools installed with pip.
struct Python;

impl Language for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn install(&self, root: &Utf8Path) -> PrefixResult<()> {
        let python_bin = root.join("bin/python");
        if python_bin.exists() {
            return Ok(());
        }
        if which::which("python").is_err() {
            return Err(PrefixError::MissingRuntime {
                runtime: "python",
                language: "python",
            });
        }
        info!(%root, "creating python virtual environment");
        command::run(&["python", "-m", "venv", root.as_str()])?;
        Ok(())
    }

    fn tool_argv(&self, root: &Utf8Path, tool: &ToolSpec) -> PrefixResult<Vec<String>> {
        let python_bin = root.join("bin/python");

        if !site_package_installed(root, tool.package)? {
            info!(package = tool.package, "installing pip package");
            command::run(&[
                python_bin.as_str(),
                "-m",
                "pip",
                "install",
                tool.package,
            ])?;
        }

        match tool.binary {
            Some(binary) => {
                let bin = root.join("bin").join(binary);
                if !bin.exists() {
                    return Err(PrefixError::InstallFailed(tool.name.to_string()));
                }
                Ok(vec![bin.to_string()])
            }
            None => Ok(vec![
                python_bin.to_string(),
                "-m".to_string(),
                tool.package.to_string(),
            ]),
        }
    }
}

/// Whether `package` is present in any of the venv's site-packages dirs.
fn site_package_installed(root: &Utf8Path, package: &str) -> PrefixResult<bool> {
    let lib = root.join("lib");
    let entries = match lib.read_dir_utf8() {
        Ok(entries) => entries,
        Err(_) => return Ok(false),
    };
    for entry in entries {
        let entry = entry.map_err(|source| PrefixError::Io {
            path: lib.to_string(),
            source,
        })?;
        if entry.path().join("site-packages").join(package).exists() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Node: a private npm package, tools installed into `node_modules`.
struct Node;

impl Language for Node {
    fn name(&self) -> &'static str {
        "node"
    }

    fn install(&self, root: &Utf8Path) -> PrefixResult<()> {
        if !root.exists() {
            debug!(%root, "creating npm package directory");
            std::fs::create_dir_all(root).map_err(|source| PrefixError::Io {
                path: root.to_string(),
                source,
            })?;
        }
        let package_json = root.join("package.json");
        if !package_json.exists() {
            debug!(%package_json, "creating package.json");
            let contents = serde_json::json!({ "private": true });
            std::fs::write(&package_json, contents.to_string()).map_err(|source| {
                PrefixError::Io {
                    path: package_json.to_string(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn tool_argv(&self, root: &Utf8Path, tool: &ToolSpec) -> PrefixResult<Vec<String>> {
        let binary = tool
            .binary
            .ok_or_else(|| PrefixError::InstallFailed(tool.name.to_string()))?;
        let bin = root.join("node_modules/.bin").join(binary);

        if !bin.exists() {
            if which::which("npm").is_err() {
                return Err(PrefixError::MissingRuntime {
                    runtime: "npm",
                    language: "node",
                });
            }
            info!(package = tool.package, "installing npm package");
            command::run_in(&["npm", "install", tool.package], root)?;
        }
        if !bin.exists() {
            return Err(PrefixError::InstallFailed(tool.name.to_string()));
        }
        Ok(vec![bin.to_string()])
    }
}

/// Name of the persisted installed-version file.
const VERSION_FILE: &str = "version.txt";

/// A prefix directory plus its language registry.
pub struct Prefix {
    root: Utf8PathBuf,
    languages: HashMap<&'static str, Box<dyn Language>>,
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prefix").field("root", &self.root).finish()
    }
}

impl Prefix {
    /// Create a prefix rooted at `root`. The registry is populated here,
    /// once; nothing is touched on disk until a language is used.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        let mut languages: HashMap<&'static str, Box<dyn Language>> = HashMap::new();
        languages.insert("python", Box::new(Python));
        languages.insert("node", Box::new(Node));
        Self {
            root: root.into(),
            languages,
        }
    }

    /// The prefix root directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Look up a language and make sure its directory is installed.
    pub fn language(&self, name: &str) -> PrefixResult<&dyn Language> {
        let language = self
            .languages
            .get(name)
            .ok_or_else(|| PrefixError::UnknownLanguage(name.to_string()))?
            .as_ref();
        self.ensure_root()?;
        language.install(&self.language_root(language))?;
        Ok(language)
    }

    /// Resolve a tool to the argv that invokes it, installing on demand.
    pub fn tool(&self, name: &str) -> PrefixResult<Vec<String>> {
        let spec = TOOLS
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| PrefixError::UnknownTool(name.to_string()))?;
        let language = self.language(spec.language)?;
        language.tool_argv(&self.language_root(language), spec)
    }

    /// Install every registered language and persist the tool version.
    pub fn bootstrap(&self, version: &str) -> PrefixResult<()> {
        self.ensure_root()?;
        // Deterministic order for log output
        let mut names: Vec<&&str> = self.languages.keys().collect();
        names.sort();
        for name in names {
            let language = &self.languages[*name];
            language.install(&self.language_root(language.as_ref()))?;
        }
        self.write_version_file(version)?;
        info!(root = %self.root, "prefix bootstrapped");
        Ok(())
    }

    /// Path of the persisted installed-version file.
    pub fn version_file(&self) -> Utf8PathBuf {
        self.root.join(VERSION_FILE)
    }

    /// Persist the installed tool version (one line).
    pub fn write_version_file(&self, version: &str) -> PrefixResult<()> {
        self.ensure_root()?;
        let path = self.version_file();
        std::fs::write(&path, format!("{version}\n")).map_err(|source| PrefixError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn language_root(&self, language: &dyn Language) -> Utf8PathBuf {
        self.root.join(language.name())
    }

    fn ensure_root(&self) -> PrefixResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|source| PrefixError::Io {
            path: self.root.to_string(),
            source,
        })
    }
}
