//! One-shot worker commands

use anyhow::{bail, Context, Result};
use statlink_execution::{ClientSettings, StatClient, WorkerLaunch};
use tracing::info;

use super::console::formatter::OutputFormatter;

/// Start the worker, send `text`, report the status and shut down
pub async fn handle_send(launch: &WorkerLaunch, settings: ClientSettings, text: &str) -> Result<()> {
    let formatter = OutputFormatter::new();
    let mut client = StatClient::new(settings);

    client
        .start(launch)
        .await
        .with_context(|| format!("Failed to start worker {}", launch.display_name()))?;

    let result = client.send_command(text).await;
    client.close().await;

    let outcome = result.context("Command failed")?;
    formatter.display_outcome(&outcome);
    if !outcome.is_success() {
        bail!("Worker reported status {}", outcome.status);
    }
    Ok(())
}

/// Start the worker and check it answers the liveness probe
pub async fn handle_probe(launch: &WorkerLaunch, settings: ClientSettings) -> Result<()> {
    let formatter = OutputFormatter::new();
    let mut client = StatClient::new(settings);

    client
        .start(launch)
        .await
        .with_context(|| format!("Failed to start worker {}", launch.display_name()))?;

    let alive = client.is_alive().await;
    let pid = client.pid();
    let stderr = client.take_stderr();
    client.close().await;

    if alive {
        info!("Worker {:?} answered the liveness probe", pid);
        formatter.print_success("Worker is alive");
        Ok(())
    } else {
        formatter.print_error("Worker did not answer the liveness probe");
        if !stderr.trim().is_empty() {
            eprintln!("{}", stderr.trim_end());
        }
        bail!("Liveness probe failed")
    }
}
