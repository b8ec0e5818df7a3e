//! IPC error types

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for IPC operations
pub type IpcResult<T> = Result<T, IpcError>;

/// IPC error types
#[derive(Debug, Error)]
pub enum IpcError {
    /// IO error on the channel
    #[error("IO error: {0}")]
    Io(#[source] io::Error),

    /// The channel closed before a frame terminator was read
    #[error("Channel closed by peer; the worker process may have ended")]
    EndOfStream,

    /// Frame could not be encoded or decoded
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The worker never created its endpoint
    #[error("Timed out after {timeout:?} connecting to pipe {endpoint}")]
    ConnectTimeout { endpoint: String, timeout: Duration },
}

impl IpcError {
    /// Check if this error means the peer is gone
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, IpcError::EndOfStream)
    }

    /// Check if a failed connect attempt should be retried.
    ///
    /// The worker creates its endpoint asynchronously after spawn, so
    /// "not there yet" conditions are expected during startup.
    pub fn is_retryable_connect(err: &io::Error) -> bool {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => true,
            // ERROR_PIPE_BUSY: every server instance is taken, try again
            _ => cfg!(windows) && err.raw_os_error() == Some(231),
        }
    }
}

impl From<io::Error> for IpcError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => IpcError::EndOfStream,
            _ => IpcError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_gone_maps_to_end_of_stream() {
        let err: IpcError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(err.is_end_of_stream());

        let err: IpcError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(err.is_end_of_stream());

        let err: IpcError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, IpcError::Io(_)));
    }

    #[test]
    fn test_retryable_connect() {
        assert!(IpcError::is_retryable_connect(&io::Error::from(
            io::ErrorKind::NotFound
        )));
        assert!(IpcError::is_retryable_connect(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
        assert!(!IpcError::is_retryable_connect(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }
}
