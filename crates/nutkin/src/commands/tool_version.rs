//! Tool-version command — print the installed nutkin version.

use anyhow::Context;
use clap::Args;
use tracing::{debug, instrument};

use nutkin_core::version::current_version;

/// Arguments for the `tool-version` subcommand.
#[derive(Args, Debug, Default)]
pub struct ToolVersionArgs {
    // No subcommand-specific arguments; uses global --json flag
}

/// Print the version recorded in the prefix's version file.
///
/// The file is written by `nutkin bootstrap`; it is read and re-rendered,
/// never recomputed.
#[instrument(name = "cmd_tool_version", skip_all)]
pub fn cmd_tool_version(
    _args: ToolVersionArgs,
    global_json: bool,
    config: &nutkin_core::config::Config,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing tool-version command");

    let prefix = super::prefix(config)?;
    let version = current_version(&prefix.version_file())
        .context("could not read the installed version (run `nutkin bootstrap` first)")?;

    if global_json {
        let out = serde_json::json!({ "version": version });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{version}");
    }

    Ok(())
}
