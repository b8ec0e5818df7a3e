//! Newline-delimited UTF-8 framing

use crate::error::{IpcError, IpcResult};

/// Byte that terminates every frame on the wire
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Stateless codec for one-message-per-line text frames.
///
/// A frame is the UTF-8 encoding of the message followed by a single `\n`.
/// Decoding tolerates a trailing `\r` so workers that write CRLF are
/// understood. Payloads containing `\r` or `\n` cannot be represented and
/// are rejected on encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl LineCodec {
    /// Encode a message into a terminated frame
    pub fn encode(text: &str) -> IpcResult<Vec<u8>> {
        if text.contains(['\r', '\n']) {
            return Err(IpcError::InvalidFrame(format!(
                "message may not contain line breaks: {:?}",
                text
            )));
        }

        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(FRAME_TERMINATOR);
        Ok(frame)
    }

    /// Decode a frame, stripping trailing CR/LF
    pub fn decode(frame: &[u8]) -> IpcResult<String> {
        let end = frame
            .iter()
            .rposition(|b| *b != b'\n' && *b != b'\r')
            .map_or(0, |i| i + 1);

        String::from_utf8(frame[..end].to_vec())
            .map_err(|e| IpcError::InvalidFrame(format!("reply is not valid UTF-8: {}", e)))
    }
}
