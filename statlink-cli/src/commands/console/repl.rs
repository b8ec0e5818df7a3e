//! Read loop for the statlink console

use std::path::PathBuf;

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use super::formatter::OutputFormatter;
use super::session::{ConsoleInput, ConsoleSession, LineOutcome};
use super::ConsoleConfig;

/// Interactive console bound to one worker at a time
pub struct StatConsole {
    editor: DefaultEditor,
    session: ConsoleSession,
    history_file: Option<PathBuf>,
    formatter: OutputFormatter,
}

impl StatConsole {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(history_file) = &config.history_file {
            let _ = editor.load_history(history_file);
        }

        Ok(Self {
            editor,
            session: ConsoleSession::new(config.launch, config.settings),
            history_file: config.history_file,
            formatter: OutputFormatter::new(),
        })
    }

    /// Run the console until the user exits
    pub async fn run(&mut self) -> Result<()> {
        self.show_banner();

        // A worker that cannot even be launched is fatal
        self.session.start().await?;

        self.read_loop().await;

        self.session.close().await;
        self.save_history();
        self.formatter.print_info("Goodbye!");
        Ok(())
    }

    async fn read_loop(&mut self) {
        loop {
            self.session.ensure_alive().await;

            let line = match self.editor.readline(&"stat> ".bright_green().to_string()) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("Use 'exit' or Ctrl+D to quit");
                    continue;
                }
                Err(ReadlineError::Eof) => return,
                Err(e) => {
                    self.formatter.print_error(&format!("Input error: {}", e));
                    return;
                }
            };

            if ConsoleInput::parse(&line) != ConsoleInput::Empty {
                let _ = self.editor.add_history_entry(line.trim());
            }

            if self.session.handle_line(&line).await == LineOutcome::Exit {
                return;
            }
        }
    }

    fn show_banner(&self) {
        println!("{}", "statlink console".bright_cyan().bold());
        println!(
            "Worker: {}  (type {} for help)",
            self.session.launch().display_name().bright_white(),
            "help".bright_yellow()
        );
    }

    fn save_history(&mut self) {
        if let Some(history_file) = &self.history_file {
            if let Err(e) = self.editor.save_history(history_file) {
                debug!("Could not save history: {}", e);
            }
        }
    }
}
