//! Interactive console
//!
//! Reads commands from the terminal and forwards them to the worker,
//! replacing the worker whenever it stops answering.

use std::path::PathBuf;

use anyhow::Result;
use statlink_execution::{ClientSettings, WorkerLaunch};

pub mod formatter;
pub mod repl;
pub mod session;

use repl::StatConsole;

/// Console command configuration
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub launch: WorkerLaunch,
    pub settings: ClientSettings,
    pub history_file: Option<PathBuf>,
}

/// Main entry point for the console command
pub async fn run_console(config: ConsoleConfig) -> Result<()> {
    let mut console = StatConsole::new(config)?;
    console.run().await
}
