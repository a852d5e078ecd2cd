//! NetBox DNS installer - Main entry point
//!
//! Parses flags, loads configuration, runs preflight checks and then the
//! selected installation sequences. The exit code is non-zero when any
//! sequence fails or a precondition is violated.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use strum::IntoEnumIterator;
use tracing::{debug, error, info};

use nbdns::cli::{Cli, Commands};
use nbdns::command_runner::SystemRunner;
use nbdns::config::InstallerConfig;
use nbdns::installers::{self, RunPlan};
use nbdns::sanity;
use nbdns::types::InstallModule;

/// Initialize tracing: `info` by default, `debug` with `--verbose`.
/// `RUST_LOG` overrides both.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<InstallerConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            InstallerConfig::load_from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => {
            debug!("No --config given, using built-in defaults");
            Ok(InstallerConfig::default())
        }
    }
}

fn validate_file(file: &Path) -> Result<()> {
    let config = InstallerConfig::load_from_file(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    let every_module: Vec<InstallModule> = InstallModule::iter().collect();
    config
        .validate(&every_module)
        .with_context(|| format!("{} is not valid", file.display()))?;
    println!("✓ Configuration file is valid: {}", file.display());
    Ok(())
}

fn install(cli: &Cli) -> Result<bool> {
    let plan: RunPlan = cli.plan()?;
    let config = load_config(cli.config.as_deref())?;
    config
        .validate(&plan.modules)
        .context("configuration is incomplete for the selected modules")?;

    if cli.dry_run || cli.skip_preflight {
        debug!("Preflight checks skipped");
    } else {
        sanity::verify_environment(&plan.required_binaries())
            .into_result()
            .context("preflight checks failed")?;
    }

    info!("{}", "=".repeat(60));
    info!("NetBox DNS Installer");
    if cli.dry_run {
        info!("Dry-run mode: no changes will be made");
    }
    info!("{}", "=".repeat(60));

    let runner = if cli.dry_run {
        SystemRunner::dry_run()
    } else {
        SystemRunner::new()
    };
    let summary = installers::run_plan(&plan, &config, &runner);

    info!("{}", "=".repeat(60));
    for line in summary.to_string().lines() {
        info!("{}", line);
    }
    info!("{}", "=".repeat(60));

    Ok(summary.is_success())
}

fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Some(Commands::PrintConfig) => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(true)
        }
        Some(Commands::Validate { file }) => {
            validate_file(file)?;
            Ok(true)
        }
        None => install(cli),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("Installation finished with failures");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
