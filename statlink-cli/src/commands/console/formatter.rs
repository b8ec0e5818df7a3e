//! Output formatting for console results

use colored::*;
use statlink_execution::CommandOutcome;

/// Coloured status output for the console and one-shot commands
#[derive(Debug, Default)]
pub struct OutputFormatter {}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {}
    }

    /// Print a command's status followed by whatever the worker printed
    pub fn display_outcome(&self, outcome: &CommandOutcome) {
        print_block(&outcome.stdout);
        if outcome.is_success() {
            self.print_success(&format!("status {}", outcome.status));
        } else {
            self.print_error(&format!("status {}", outcome.status));
            if !outcome.stderr.trim().is_empty() {
                eprintln!("{}", outcome.stderr.trim_end().red());
            }
        }
    }

    /// Print a success message
    pub fn print_success(&self, message: &str) {
        println!("{} {}", "✓".bright_green().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".bright_red().bold(), message.bright_red());
    }

    /// Print a warning message
    pub fn print_warning(&self, message: &str) {
        println!("{} {}", "⚠".bright_yellow().bold(), message.bright_yellow());
    }

    /// Print an info message
    pub fn print_info(&self, message: &str) {
        println!("{} {}", "ℹ".bright_blue().bold(), message);
    }
}

fn print_block(text: &str) {
    let text = text.trim_end();
    if !text.is_empty() {
        println!("{}", text);
    }
}
