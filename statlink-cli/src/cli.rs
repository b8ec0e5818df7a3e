//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive client for a supervised stat worker", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Directory containing the worker executable
    #[arg(long, value_name = "DIR", global = true)]
    pub install_dir: Option<PathBuf>,

    /// Worker executable name
    #[arg(long, value_name = "NAME", global = true)]
    pub executable: Option<String>,

    /// Seconds to wait for each reply
    #[arg(long, value_name = "SECONDS", global = true)]
    pub request_timeout: Option<u64>,

    /// Extra argument passed to the worker (repeatable)
    #[arg(
        long = "worker-arg",
        value_name = "ARG",
        global = true,
        allow_hyphen_values = true
    )]
    pub worker_args: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive session (the default)
    Console,

    /// Start the worker, send one command and print its status
    Send {
        /// Command line to send
        text: String,
    },

    /// Check that the worker starts and answers the liveness probe
    Probe,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Write a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_console() {
        let cli = Cli::try_parse_from(["statlink"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.worker_args.is_empty());
    }

    #[test]
    fn test_send_with_global_options() {
        let cli = Cli::try_parse_from([
            "statlink",
            "send",
            "run job1",
            "--install-dir",
            "/opt/stat",
            "--request-timeout",
            "5",
            "--worker-arg",
            "--quiet",
            "--worker-arg=--log-file=mine.log",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Send { text }) => assert_eq!(text, "run job1"),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.install_dir, Some(PathBuf::from("/opt/stat")));
        assert_eq!(cli.request_timeout, Some(5));
        assert_eq!(cli.worker_args, vec!["--quiet", "--log-file=mine.log"]);
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from([
            "statlink",
            "config",
            "generate",
            "--output",
            "statlink.yaml",
            "--force",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                config_cmd: ConfigCommands::Generate { force: true, .. }
            })
        ));

        assert!(Cli::try_parse_from(["statlink", "config", "validate"]).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_timeout() {
        assert!(Cli::try_parse_from(["statlink", "--request-timeout", "soon"]).is_err());
    }
}
