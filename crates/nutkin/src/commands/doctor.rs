//! Doctor command — diagnose configuration and environment.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use nutkin_core::command::has_binary;
use nutkin_core::config;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    config: ConfigStatus,
    prefix: PrefixStatus,
    tools: Vec<ToolStatus>,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to loaded config file, if any
    file: Option<String>,
    /// Whether a config file was found
    found: bool,
}

#[derive(Serialize)]
struct PrefixStatus {
    root: Option<String>,
    bootstrapped: bool,
    installed_version: Option<String>,
}

#[derive(Serialize)]
struct ToolStatus {
    name: &'static str,
    available: bool,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Current working directory
    cwd: Option<String>,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

/// Host binaries nutkin shells out to.
const HOST_TOOLS: &[&str] = &["git", "python", "npm", "docker"];

impl DoctorReport {
    fn gather(config: &nutkin_core::config::Config, cwd: &camino::Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);

        let prefix_root = config.prefix_root();
        let prefix = prefix_root
            .as_ref()
            .map(|root| nutkin_core::prefix::Prefix::new(root.clone()));
        let installed_version = prefix
            .as_ref()
            .and_then(|p| nutkin_core::version::current_version(&p.version_file()).ok());

        Self {
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            prefix: PrefixStatus {
                root: prefix_root.as_ref().map(ToString::to_string),
                bootstrapped: installed_version.is_some(),
                installed_version,
            },
            tools: HOST_TOOLS
                .iter()
                .map(|name| ToolStatus {
                    name,
                    available: has_binary(name),
                })
                .collect(),
            environment: EnvironmentInfo {
                cwd: Some(cwd.to_string()),
                env_vars: vec![
                    EnvVar {
                        name: "XDG_CONFIG_HOME",
                        value: std::env::var("XDG_CONFIG_HOME").ok(),
                        description: "Override config directory",
                    },
                    EnvVar {
                        name: "XDG_DATA_HOME",
                        value: std::env::var("XDG_DATA_HOME").ok(),
                        description: "Override data directory (prefix default)",
                    },
                    EnvVar {
                        name: "RUST_LOG",
                        value: std::env::var("RUST_LOG").ok(),
                        description: "Log filter directive",
                    },
                    EnvVar {
                        name: "GITHUB_OUTPUT",
                        value: std::env::var("GITHUB_OUTPUT").ok(),
                        description: "Step output file (publish command)",
                    },
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &nutkin_core::config::Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(config, cwd);
    spinner.finish_and_clear();
    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        // Config status
        println!("{}", "Configuration".bold().underline());
        if report.config.found {
            println!(
                "  {} Config file: {}",
                "✓".green(),
                report.config.file.as_deref().unwrap_or("").cyan()
            );
        } else {
            println!("  {} No config file found", "○".yellow());
            offer_config_creation()?;
        }
        println!();

        // Prefix status
        println!("{}", "Prefix".bold().underline());
        match report.prefix.root {
            Some(ref root) => println!("  {}: {}", "Root".dimmed(), root.cyan()),
            None => println!("  {} No prefix directory available", "○".yellow()),
        }
        if report.prefix.bootstrapped {
            println!(
                "  {} Bootstrapped (version {})",
                "✓".green(),
                report
                    .prefix
                    .installed_version
                    .as_deref()
                    .unwrap_or("")
                    .green()
            );
        } else {
            println!(
                "  {} Not bootstrapped — run {}",
                "○".yellow(),
                "nutkin bootstrap".cyan()
            );
        }
        println!();

        // Host tools
        println!("{}", "Host tools".bold().underline());
        for tool in &report.tools {
            if tool.available {
                println!("  {} {}", "✓".green(), tool.name);
            } else {
                println!("  {} {} {}", "○".yellow(), tool.name, "(not found)".dimmed());
            }
        }
        println!();

        // Environment
        println!("{}", "Environment".bold().underline());
        println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());

        let set_vars: Vec<_> = report
            .environment
            .env_vars
            .iter()
            .filter(|v| v.value.is_some())
            .collect();

        if set_vars.is_empty() {
            println!("  {} No overrides set", "○".dimmed());
        } else {
            for var in set_vars {
                println!(
                    "  {}: {}",
                    var.name.dimmed(),
                    var.value.as_deref().unwrap_or("").cyan()
                );
            }
        }
    }

    Ok(())
}

/// Offer to create a default config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };

    let config_path = config_dir.join("config.yaml");

    // Don't prompt if running non-interactively
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    match create {
        Ok(true) => {
            // Ensure directory exists
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            // Write default config as YAML
            let default_config = nutkin_core::config::Config::default();
            let yaml = serde_saphyr::to_string(&default_config)?;
            std::fs::write(&config_path, yaml)?;

            println!("  {} Created {}", "✓".green(), config_path.cyan());
        }
        Ok(false) => {
            // User declined
        }
        Err(_) => {
            // Prompt interrupted (Ctrl+C, etc.)
        }
    }

    Ok(())
}
