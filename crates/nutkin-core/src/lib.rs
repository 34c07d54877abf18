//! Core library for nutkin.
//!
//! This crate provides the foundational types and functionality used by the
//! `nutkin` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`command`] - Subprocess execution
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//! - [`format`] - Formatter dispatch over the tool prefix
//! - [`git`] - Git queries and the commit walker
//! - [`languages`] - The embedded language-extension table
//! - [`prefix`] - Per-language tool installations
//! - [`publish`] - Package and container publication
//! - [`version`] - Version resolution
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use nutkin_core::version::VersionFlavor;
//! use nutkin_core::version::resolve::resolve_next_version;
//! use nutkin_core::version::rules::RuleSet;
//!
//! let rules = RuleSet::default_policy();
//! let next = resolve_next_version(Utf8Path::new("."), &rules, VersionFlavor::GitTag)
//!     .expect("failed to resolve next version");
//! println!("{next}");
//! ```
#![deny(unsafe_code)]

pub mod command;

pub mod config;

pub mod error;

pub mod format;

pub mod git;

pub mod languages;

pub mod prefix;

pub mod publish;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use version::{Version, VersionFlavor};
