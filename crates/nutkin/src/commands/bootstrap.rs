//! Bootstrap command — install the tool prefix.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

/// Arguments for the `bootstrap` subcommand.
#[derive(Args, Debug, Default)]
pub struct BootstrapArgs {
    // No subcommand-specific arguments; uses global --prefix/--json flags
}

/// Create the prefix, install every language, and persist the tool version.
#[instrument(name = "cmd_bootstrap", skip_all)]
pub fn cmd_bootstrap(
    _args: BootstrapArgs,
    global_json: bool,
    config: &nutkin_core::config::Config,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing bootstrap command");

    let prefix = super::prefix(config)?;

    let spinner = if global_json {
        None
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("valid template"),
        );
        spinner.set_message(format!("Bootstrapping {}...", prefix.root()));
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(spinner)
    };

    let result = prefix
        .bootstrap(env!("CARGO_PKG_VERSION"))
        .context("bootstrap failed");
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    result?;

    if global_json {
        let out = serde_json::json!({
            "prefix": prefix.root(),
            "version": env!("CARGO_PKG_VERSION"),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "  {} Prefix installed at {}",
            "✓".green(),
            prefix.root().cyan()
        );
        println!(
            "  {} Recorded version {}",
            "✓".green(),
            env!("CARGO_PKG_VERSION").green().bold()
        );
    }

    Ok(())
}
