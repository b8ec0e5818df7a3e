use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use statlink_config::{ConfigLoader, StatlinkConfig};
use statlink_execution::{ClientSettings, WorkerLaunch};
use tracing::{debug, info};

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands, ConfigCommands};
use commands::console::{run_console, ConsoleConfig};
use logging::FilterSource;

/// Load configuration, falling back to defaults and environment variables
fn load_config(config_path: Option<&PathBuf>) -> Result<StatlinkConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Fold command line overrides into the loaded configuration
fn apply_cli_overrides(cli: &Cli, config: &mut StatlinkConfig) -> Result<()> {
    if let Some(dir) = &cli.install_dir {
        config.worker.install_dir = Some(dir.clone());
    }
    if let Some(executable) = &cli.executable {
        config.worker.executable = executable.clone();
    }
    if let Some(seconds) = cli.request_timeout {
        config.timeouts.request = Duration::from_secs(seconds);
    }
    if !cli.worker_args.is_empty() {
        config.worker.args = cli.worker_args.clone();
    }

    config
        .validate_all()
        .context("Invalid configuration after applying command line options")
}

fn history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".statlink_history"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config commands work on their own file and need no worker
    if let Some(Commands::Config { config_cmd }) = &cli.command {
        logging::init_tracing(
            &FilterSource::resolve(cli.log_level.as_deref(), &Default::default(), false, None),
            &Default::default(),
        )?;
        return match config_cmd {
            ConfigCommands::Validate { config_file } => {
                commands::config::handle_config_validate(config_file)
            }
            ConfigCommands::Generate { output, force } => {
                commands::config::handle_config_generate(output, *force)
            }
        };
    }

    let mut config = load_config(cli.config.as_ref())?;
    apply_cli_overrides(&cli, &mut config)?;

    let config_explicit =
        cli.config.is_some() || std::env::var_os("STATLINK_LOG_LEVEL").is_some();
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = FilterSource::resolve(
        cli.log_level.as_deref(),
        &config.logging,
        config_explicit,
        rust_log.as_deref(),
    );
    logging::init_tracing(&filter, &config.logging)?;
    debug!("Log filter taken from {:?}", filter);

    let launch = WorkerLaunch::from_config(&config.worker);
    let settings = ClientSettings::from(&config.timeouts);
    info!("Using worker {}", launch.display_name());

    match &cli.command {
        Some(Commands::Send { text }) => {
            commands::worker::handle_send(&launch, settings, text).await
        }
        Some(Commands::Probe) => commands::worker::handle_probe(&launch, settings).await,
        Some(Commands::Console) | None => {
            run_console(ConsoleConfig {
                launch,
                settings,
                history_file: history_file(),
            })
            .await
        }
        Some(Commands::Config { .. }) => Ok(()),
    }
}
