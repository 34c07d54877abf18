//! Next-version command — thin CLI layer over the core resolver.

use anyhow::Context;
use clap::Args;
use tracing::{debug, instrument};

use nutkin_core::version::VersionFlavor;
use nutkin_core::version::resolve::resolve_next_version;

/// Arguments for the `next-version` subcommand.
#[derive(Args, Debug, Default)]
pub struct NextVersionArgs {
    /// Output encoding of the resolved version
    #[arg(long, value_enum, default_value_t)]
    pub flavor: VersionFlavor,
}

/// Resolve and print the next version of the repository at `cwd`.
///
/// The bare version string goes to stdout so scripts and CI steps can
/// capture it directly.
#[instrument(name = "cmd_next_version", skip_all, fields(flavor = %args.flavor))]
pub fn cmd_next_version(
    args: NextVersionArgs,
    global_json: bool,
    config: &nutkin_core::config::Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing next-version command");

    let rules = super::rule_set(config)?;
    let version =
        resolve_next_version(cwd, &rules, args.flavor).context("version resolution failed")?;

    if global_json {
        let out = serde_json::json!({
            "version": version,
            "flavor": args.flavor.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{version}");
    }

    Ok(())
}
