//! Publish command — the GitHub Actions publish entry point.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use nutkin_core::publish::{PublishFlavor, publish_github_action};

/// Arguments for the `publish` subcommand.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// What kind of artifact to publish
    #[arg(value_enum)]
    pub flavor: PublishFlavor,

    /// Registry token (package index token or container registry password)
    #[arg(long, value_name = "TOKEN")]
    pub token: String,
}

/// Execute the publish command.
///
/// Meant to run inside a GitHub Actions job: `GITHUB_OUTPUT` must be set,
/// and the working directory must be the project being released.
#[instrument(name = "cmd_publish", skip_all, fields(flavor = %args.flavor))]
pub fn cmd_publish(
    args: PublishArgs,
    global_json: bool,
    config: &nutkin_core::config::Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing publish command");

    let prefix = super::prefix(config)?;
    let rules = super::rule_set(config)?;
    let publish_config = config.publish.clone().unwrap_or_default();

    publish_github_action(&prefix, cwd, &rules, &publish_config, args.flavor, &args.token)
        .context("publish failed")?;

    if global_json {
        let out = serde_json::json!({ "flavor": args.flavor.to_string(), "published": true });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("  {} Published ({})", "✓".green(), args.flavor);
    }

    Ok(())
}
