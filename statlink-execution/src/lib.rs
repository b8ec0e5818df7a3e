//! Supervised worker client for statlink
//!
//! Spawns the worker process, connects to the pipe it opens, and exchanges
//! line-framed requests with it under a time limit. A worker that stops
//! answering is detected, killed and can be replaced without leaking tasks
//! or processes.

pub mod bounded;
pub mod client;
pub mod error;
pub mod launch;
pub mod output;
pub mod supervisor;

// Re-export main types
pub use bounded::{BoundedExecutor, Operation, PendingOperation};
pub use client::{
    parse_status, ClientSettings, ClientState, CommandOutcome, StatClient, PROBE_REQUEST,
    STATUS_OK,
};
pub use error::{ClientError, ClientResult};
pub use launch::WorkerLaunch;
pub use output::OutputBuffer;
pub use supervisor::{ProcessSupervisor, WorkerProcess};
