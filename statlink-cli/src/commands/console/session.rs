//! Worker handling behind the console prompt

use anyhow::{Context, Result};
use colored::*;
use statlink_execution::{ClientSettings, StatClient, WorkerLaunch};
use tracing::{debug, info, warn};

use super::formatter::OutputFormatter;

/// What to do with one line of input
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput<'a> {
    Empty,
    Exit,
    Help,
    Status,
    Restart,
    Command(&'a str),
}

impl<'a> ConsoleInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => ConsoleInput::Empty,
            "exit" | "quit" => ConsoleInput::Exit,
            "help" | "?" => ConsoleInput::Help,
            ".status" => ConsoleInput::Status,
            ".restart" => ConsoleInput::Restart,
            command => ConsoleInput::Command(command),
        }
    }
}

/// Whether the read loop keeps going after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Exit,
}

/// One worker at a time, replaced whenever it stops answering
pub struct ConsoleSession {
    launch: WorkerLaunch,
    client: StatClient,
    formatter: OutputFormatter,
}

impl ConsoleSession {
    pub fn new(launch: WorkerLaunch, settings: ClientSettings) -> Self {
        Self {
            launch,
            client: StatClient::new(settings),
            formatter: OutputFormatter::new(),
        }
    }

    pub fn launch(&self) -> &WorkerLaunch {
        &self.launch
    }

    pub fn client(&self) -> &StatClient {
        &self.client
    }

    /// Start the first worker; failing here ends the console
    pub async fn start(&mut self) -> Result<()> {
        self.client
            .start(&self.launch)
            .await
            .with_context(|| format!("Failed to start worker {}", self.launch.display_name()))?;
        info!("Console attached to worker {:?}", self.client.pid());
        Ok(())
    }

    /// Act on one line read from the user
    pub async fn handle_line(&mut self, line: &str) -> LineOutcome {
        match ConsoleInput::parse(line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Exit => return LineOutcome::Exit,
            ConsoleInput::Help => show_help(),
            ConsoleInput::Status => self.show_status(),
            ConsoleInput::Restart => {
                self.restart("restart requested").await;
            }
            ConsoleInput::Command(command) => {
                // The worker may have died while we waited for input
                if self.ensure_alive().await {
                    self.execute(command).await;
                } else {
                    self.formatter
                        .print_warning(&format!("No worker available, {:?} was not sent", command));
                }
            }
        }
        LineOutcome::Continue
    }

    /// Probe the worker and replace it if it does not answer.
    ///
    /// Returns whether a live worker is attached afterwards.
    pub async fn ensure_alive(&mut self) -> bool {
        if self.client.is_alive().await {
            return true;
        }
        self.formatter
            .print_warning("Worker is not responding, starting a new one");
        self.restart("liveness probe failed").await
    }

    /// Replace the worker. A failure is reported and leaves the client closed
    /// so the next probe tries again.
    pub async fn restart(&mut self, reason: &str) -> bool {
        warn!("Restarting worker: {}", reason);

        let leftover = self.client.take_stderr();
        if !leftover.trim().is_empty() {
            eprintln!("{}", leftover.trim_end().dimmed());
        }

        match self.client.restart(&self.launch).await {
            Ok(()) => {
                self.formatter.print_info(&format!(
                    "Worker restarted (pid {})",
                    self.client
                        .pid()
                        .map_or_else(|| "unknown".to_string(), |p| p.to_string())
                ));
                true
            }
            Err(e) => {
                warn!("Restart failed: {}", e);
                self.formatter
                    .print_error(&format!("Could not restart worker: {}", e));
                false
            }
        }
    }

    pub async fn close(&mut self) {
        self.client.close().await;
    }

    async fn execute(&mut self, command: &str) {
        debug!("Sending command {:?}", command);
        match self.client.send_command(command).await {
            Ok(outcome) => self.formatter.display_outcome(&outcome),
            Err(e) if e.requires_restart() => {
                self.formatter
                    .print_warning(&format!("Worker stopped responding: {}", e));
                self.restart("request failed").await;
            }
            Err(e) => self.formatter.print_error(&e.to_string()),
        }
    }

    fn show_status(&self) {
        let endpoint = self
            .client
            .endpoint()
            .map_or_else(|| "-".to_string(), |e| e.to_string());
        let pid = self
            .client
            .pid()
            .map_or_else(|| "-".to_string(), |p| p.to_string());

        println!("  state:    {}", self.client.state().to_string().bright_white());
        println!("  pid:      {}", pid);
        println!("  pipe:     {}", endpoint);
    }
}

fn show_help() {
    println!("{}", "Console commands:".bright_cyan().bold());
    println!("  {}        - Show worker state", ".status".bright_yellow());
    println!("  {}       - Replace the worker", ".restart".bright_yellow());
    println!("  {}    - Leave the console", "exit, quit".bright_yellow());
    println!("Anything else is sent to the worker as one command.");
}
