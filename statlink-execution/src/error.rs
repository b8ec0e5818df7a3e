//! Error types for the worker client

use std::time::Duration;

use statlink_ipc::IpcError;
use thiserror::Error;

/// Result alias used throughout the client
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the supervised worker client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to launch worker '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker did not open pipe {endpoint} within {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Worker closed the pipe")]
    EndOfStream,

    #[error("No reply from worker within {0:?}")]
    Timeout(Duration),

    #[error("Unexpected reply from worker: {0:?}")]
    InvalidReply(String),

    #[error("Cannot {operation} while client is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Executor task is no longer running")]
    ExecutorStopped,
}

impl ClientError {
    /// Whether the worker instance that produced this error must be replaced
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout(_)
                | ClientError::EndOfStream
                | ClientError::Transport(_)
                | ClientError::ExecutorStopped
        )
    }
}

impl From<IpcError> for ClientError {
    fn from(err: IpcError) -> Self {
        match err {
            IpcError::EndOfStream => ClientError::EndOfStream,
            IpcError::ConnectTimeout { endpoint, timeout } => {
                ClientError::ConnectTimeout { endpoint, timeout }
            }
            other => ClientError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipc_errors_map_onto_client_errors() {
        assert!(matches!(
            ClientError::from(IpcError::EndOfStream),
            ClientError::EndOfStream
        ));
        assert!(matches!(
            ClientError::from(IpcError::InvalidFrame("bad".into())),
            ClientError::Transport(_)
        ));

        let err = ClientError::from(IpcError::ConnectTimeout {
            endpoint: "pipe".into(),
            timeout: Duration::from_secs(10),
        });
        match err {
            ClientError::ConnectTimeout { endpoint, timeout } => {
                assert_eq!(endpoint, "pipe");
                assert_eq!(timeout, Duration::from_secs(10));
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_requires_restart() {
        assert!(ClientError::Timeout(Duration::from_secs(1)).requires_restart());
        assert!(ClientError::EndOfStream.requires_restart());
        assert!(ClientError::ExecutorStopped.requires_restart());
        assert!(!ClientError::InvalidReply("x".into()).requires_restart());
        assert!(!ClientError::InvalidState {
            operation: "send",
            state: "closed".into()
        }
        .requires_restart());
    }
}
