//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Command-line client for the emergency intake flow."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ems_common::{init_tracing, AppConfig};
use tracing::{info, warn};

mod console;
mod dashboard;
mod intake;

#[derive(Debug, Parser)]
#[command(author, version, about = "Emergency intake client", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Override backend.base_url")]
    base_url: Option<String>,

    #[arg(long, help = "Print results as JSON instead of text")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Restore the server-held session and print it")]
    Status,
    #[command(about = "Submit an emergency and list nearby hospitals")]
    Submit(intake::SubmitArgs),
    #[command(about = "Submit an emergency and reserve a bed")]
    Reserve(intake::ReserveArgs),
    #[command(about = "Discard the current session")]
    Clear,
    #[command(about = "List cases awaiting doctor action")]
    Cases,
    #[command(about = "Accept a reserved case and trigger dispatch")]
    Accept {
        #[arg(value_name = "CASE_ID")]
        case_id: u64,
    },
    #[command(about = "Mark an en-route case as completed")]
    Complete {
        #[arg(value_name = "CASE_ID")]
        case_id: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, source) = load_config(cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
        config.backend.validate()?;
    }
    init_tracing("emsctl", &config.logging)?;
    match &source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => warn!("no configuration file found; using built-in defaults"),
    }
    info!(backend = %config.backend.base_url, "emsctl starting");

    let output = console::Output { json: cli.json };
    match cli.command {
        Commands::Status => intake::status(&config, output).await,
        Commands::Submit(args) => intake::submit(&config, output, args).await,
        Commands::Reserve(args) => intake::reserve(&config, output, args).await,
        Commands::Clear => intake::clear(&config).await,
        Commands::Cases => dashboard::cases(&config, output).await,
        Commands::Accept { case_id } => dashboard::accept(&config, output, case_id).await,
        Commands::Complete { case_id } => dashboard::complete(&config, output, case_id).await,
    }
}

/// An explicit `--config` must load and wins over `EMS_INTAKE_CONFIG`.
/// Otherwise the default locations are tried and built-in defaults apply
/// when none exists.
fn load_config(explicit: Option<PathBuf>) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = contents.parse::<AppConfig>()?;
        return Ok((config, Some(path)));
    }
    let candidates = [
        PathBuf::from("configs/intake.toml"),
        PathBuf::from("configs/example.toml"),
    ];
    let overridden = std::env::var_os(AppConfig::ENV_CONFIG_PATH).is_some();
    if !overridden && !candidates.iter().any(|path| path.exists()) {
        return Ok((AppConfig::default(), None));
    }
    let loaded = AppConfig::load_with_source(&candidates)?;
    Ok((loaded.config, Some(loaded.source)))
}
