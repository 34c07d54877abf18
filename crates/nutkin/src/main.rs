//! nutkin CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use nutkin::{Cli, Commands, commands};
use nutkin_core::config::ConfigLoader;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let mut config = loader.load().context("failed to load configuration")?;

    // CLI --prefix beats config and the platform default
    if let Some(ref prefix) = cli.prefix {
        let prefix = camino::Utf8PathBuf::try_from(prefix.clone()).map_err(|e| {
            anyhow::anyhow!(
                "prefix path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        config.prefix = Some(prefix);
    }

    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(
        config.log_dir.as_ref().map(|dir| dir.as_std_path().to_path_buf()),
        env_filter,
    )
    .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    // Execute command
    let result = match cli.command {
        Commands::NextVersion(args) => {
            commands::next_version::cmd_next_version(args, cli.json, &config, &cwd)
        }
        Commands::ToolVersion(args) => {
            commands::tool_version::cmd_tool_version(args, cli.json, &config)
        }
        Commands::Format(args) => commands::format::cmd_format(args, cli.json, &config),
        Commands::Bootstrap(args) => commands::bootstrap::cmd_bootstrap(args, cli.json, &config),
        Commands::Publish(args) => commands::publish::cmd_publish(args, cli.json, &config, &cwd),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, cli.json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
