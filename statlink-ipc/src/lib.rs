//! Inter-process communication for statlink
//!
//! This crate provides the line-framed wire codec and the named pipe
//! transport used to talk to a supervised worker process.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use codec::{LineCodec, FRAME_TERMINATOR};
pub use endpoint::PipeEndpoint;
pub use error::{IpcError, IpcResult};
pub use transport::{FrameTransport, PipeTransport};
