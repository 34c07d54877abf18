//! Format command — dispatch files to the registered formatters.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use nutkin_core::format::format_files;

/// Arguments for the `format` subcommand.
#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Only check, do not overwrite files
    #[arg(long)]
    pub check: bool,

    /// Files and directories to format
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<Utf8PathBuf>,
}

/// Execute the format command.
#[instrument(name = "cmd_format", skip_all, fields(files = args.files.len(), check = args.check))]
pub fn cmd_format(
    args: FormatArgs,
    global_json: bool,
    config: &nutkin_core::config::Config,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing format command");

    let prefix = super::prefix(config)?;
    format_files(&prefix, &args.files, args.check).context(if args.check {
        "format check failed"
    } else {
        "formatting failed"
    })?;

    if global_json {
        let out = serde_json::json!({
            "checked": args.check,
            "files": args.files,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if args.check {
        println!("  {} Formatting is clean", "✓".green());
    } else {
        println!("  {} Formatted", "✓".green());
    }

    Ok(())
}
