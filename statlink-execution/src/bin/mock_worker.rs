//! Stand-in worker used by the client tests.
//!
//! Invoked the same way as the real worker, `mock_worker listen <pipe>
//! [--mode <mode>] [--log-file <path>]`, and serves a single connection.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "mock_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the pipe and serve one client
    Listen {
        endpoint: String,

        #[arg(long, default_value = "echo")]
        mode: Mode,

        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Reply with each request line
    Echo,
    /// Reply with a status; requests starting with `fail` report an error on stderr
    Status,
    /// Read requests and never reply or exit
    Hang,
    /// Exit before opening the pipe
    Exit,
    /// Stay alive without ever opening the pipe
    NoEndpoint,
    /// Echo this many requests, then drop the connection and exit
    CloseAfter(usize),
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "echo" => Ok(Mode::Echo),
            "status" => Ok(Mode::Status),
            "hang" => Ok(Mode::Hang),
            "exit" => Ok(Mode::Exit),
            "no-endpoint" => Ok(Mode::NoEndpoint),
            other => other
                .strip_prefix("close-after=")
                .and_then(|n| n.parse().ok())
                .map(Mode::CloseAfter)
                .ok_or_else(|| format!("unknown mode: {}", other)),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    let Command::Listen {
        endpoint,
        mode,
        log_file,
    } = Args::parse().command;

    if let Some(path) = &log_file {
        std::fs::write(path, format!("listening on {}\n", endpoint))?;
    }

    match mode {
        Mode::Exit => return Ok(()),
        Mode::NoEndpoint => loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
        },
        _ => {}
    }

    let stream = accept_one(&endpoint).await?;
    serve(stream, mode).await
}

async fn serve<S>(stream: S, mode: Mode) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    let mut served = 0usize;

    while let Some(line) = lines.next_line().await? {
        let reply = match mode {
            Mode::Hang => continue,
            Mode::CloseAfter(limit) if served >= limit => return Ok(()),
            _ if line == "alive" => "0".to_string(),
            Mode::Status => {
                if line.starts_with("fail") {
                    eprintln!("cannot run: {}", line);
                    "2".to_string()
                } else {
                    println!("ran: {}", line);
                    "0".to_string()
                }
            }
            _ => line,
        };

        write_half.write_all(format!("{}\n", reply).as_bytes()).await?;
        write_half.flush().await?;
        served += 1;
    }

    if mode == Mode::Hang {
        // ignore the client going away and wait to be killed
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn accept_one(endpoint: &str) -> std::io::Result<tokio::net::UnixStream> {
    let listener = tokio::net::UnixListener::bind(endpoint)?;
    let (stream, _) = listener.accept().await?;
    Ok(stream)
}

#[cfg(windows)]
async fn accept_one(
    endpoint: &str,
) -> std::io::Result<tokio::net::windows::named_pipe::NamedPipeServer> {
    use tokio::net::windows::named_pipe::ServerOptions;

    let server = ServerOptions::new()
        .first_pipe_instance(true)
        .create(endpoint)?;
    server.connect().await?;
    Ok(server)
}
