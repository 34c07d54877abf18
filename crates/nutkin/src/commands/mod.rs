//! Command implementations

pub mod bootstrap;

pub mod doctor;

pub mod format;

pub mod next_version;

pub mod publish;

pub mod tool_version;

use anyhow::Context;
use nutkin_core::config::Config;
use nutkin_core::prefix::Prefix;
use nutkin_core::version::rules::RuleSet;

/// Build the rule set from config, or fall back to the built-in policy.
///
/// Shared across commands that resolve versions (next-version, publish).
pub fn rule_set(config: &Config) -> anyhow::Result<RuleSet> {
    match config.rules {
        Some(ref rules) => RuleSet::from_config(rules).context("invalid rules configuration"),
        None => Ok(RuleSet::default_policy()),
    }
}

/// Build the tool prefix from config or the platform default location.
pub fn prefix(config: &Config) -> anyhow::Result<Prefix> {
    let root = config
        .prefix_root()
        .context("could not determine a prefix directory (set `prefix` in config)")?;
    Ok(Prefix::new(root))
}
