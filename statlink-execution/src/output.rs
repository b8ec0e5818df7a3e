//! Captured worker output

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Shared byte sink for one of the worker's output streams.
///
/// A drain task appends while the client reads; `take` empties the buffer
/// under the same lock, so no byte is seen twice or lost.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, bytes: &[u8]) {
        self.inner.lock().extend_from_slice(bytes);
    }

    /// Return everything captured so far and clear the buffer
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Like [`take`](Self::take), decoded as lossy UTF-8
    pub fn take_string(&self) -> String {
        String::from_utf8_lossy(&self.take()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `stream` into this buffer on a background task until it ends
    pub fn drain_from<R>(&self, stream: R, label: &'static str) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = self.clone();
        tokio::spawn(async move {
            let mut stream = stream;
            let mut chunk = [0u8; 4096];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) => {
                        trace!("Worker {} reached end of stream", label);
                        break;
                    }
                    Ok(n) => buffer.append(&chunk[..n]),
                    Err(e) => {
                        warn!("Failed to read worker {}: {}", label, e);
                        break;
                    }
                }
            }
        })
    }
}
