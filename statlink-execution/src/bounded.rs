//! Time-bounded execution of pipe operations
//!
//! The transport lives on its own task and is fed one [`PendingOperation`]
//! at a time. Callers wait on the reply with a timeout; giving up drops the
//! reply receiver, which the task notices and treats as cancellation. The
//! channel is never shared between two operations, and a caller is never
//! blocked for longer than its timeout no matter what the worker does.

use std::time::Duration;

use statlink_ipc::{FrameTransport, IpcResult};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, trace, warn};

use crate::error::{ClientError, ClientResult};

/// A single pipe operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Send one frame without waiting for a reply
    Write(String),
    /// Wait for the next frame
    Read,
    /// Send one frame and wait for the reply
    WriteThenRead(String),
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::Write(_) => "write",
            Operation::Read => "read",
            Operation::WriteThenRead(_) => "write+read",
        }
    }
}

/// Queued operation together with its outcome slot
pub struct PendingOperation {
    pub operation: Operation,
    pub deadline: Instant,
    reply: oneshot::Sender<IpcResult<Option<String>>>,
}

/// Serializes pipe operations on a dedicated task
pub struct BoundedExecutor {
    sender: Option<mpsc::Sender<PendingOperation>>,
    task: Option<JoinHandle<()>>,
}

impl BoundedExecutor {
    /// Move `transport` onto a new task and return a handle to it
    pub fn spawn<T>(transport: T) -> Self
    where
        T: FrameTransport + 'static,
    {
        let (sender, receiver) = mpsc::channel(1);
        let task = tokio::spawn(run_operations(transport, receiver));
        Self {
            sender: Some(sender),
            task: Some(task),
        }
    }

    /// Run `operation`, giving up once `limit` has elapsed.
    ///
    /// The limit covers waiting for a previous operation as well as the
    /// operation itself. On timeout the operation is abandoned; bytes it
    /// already wrote stay written.
    pub async fn run_bounded(
        &self,
        operation: Operation,
        limit: Duration,
    ) -> ClientResult<Option<String>> {
        let sender = self.sender.as_ref().ok_or(ClientError::ExecutorStopped)?;
        let label = operation.label();
        let (reply, outcome) = oneshot::channel();
        let pending = PendingOperation {
            operation,
            deadline: Instant::now() + limit,
            reply,
        };

        let exchange = async move {
            sender
                .send(pending)
                .await
                .map_err(|_| ClientError::ExecutorStopped)?;
            match outcome.await {
                Ok(result) => result.map_err(ClientError::from),
                Err(_) => Err(ClientError::ExecutorStopped),
            }
        };

        match timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Pipe {} abandoned after {:?}", label, limit);
                Err(ClientError::Timeout(limit))
            }
        }
    }

    /// Stop accepting work and close the transport.
    ///
    /// Waits at most `wait` for the task to close the channel, then aborts
    /// it. Returns whether the task finished in time. Safe to call twice.
    pub async fn shutdown(&mut self, wait: Duration) -> bool {
        // Dropping the sender ends the task's receive loop
        self.sender.take();

        let Some(mut task) = self.task.take() else {
            return true;
        };

        match timeout(wait, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Executor task ended abnormally: {}", e);
                true
            }
            Err(_) => {
                warn!("Pipe did not close within {:?}, aborting executor", wait);
                task.abort();
                false
            }
        }
    }

    /// Whether the executor still accepts operations
    pub fn is_running(&self) -> bool {
        match (&self.sender, &self.task) {
            (Some(sender), Some(task)) => !sender.is_closed() && !task.is_finished(),
            _ => false,
        }
    }
}

impl Drop for BoundedExecutor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_operations<T>(mut transport: T, mut receiver: mpsc::Receiver<PendingOperation>)
where
    T: FrameTransport,
{
    while let Some(pending) = receiver.recv().await {
        let PendingOperation {
            operation,
            deadline,
            mut reply,
        } = pending;

        if reply.is_closed() || Instant::now() >= deadline {
            trace!("Skipping {} whose caller already gave up", operation.label());
            continue;
        }

        let label = operation.label();
        let outcome = tokio::select! {
            result = perform(&mut transport, operation) => Some(result),
            _ = reply.closed() => None,
        };

        match outcome {
            Some(result) => {
                // The caller may have timed out at the same instant
                let _ = reply.send(result);
            }
            None => {
                // The frame may be half-written or the reply still in flight,
                // so the channel is no longer usable for new exchanges.
                debug!("Pipe {} cancelled by its caller", label);
                break;
            }
        }
    }

    if let Err(e) = transport.close().await {
        debug!("Error closing pipe: {}", e);
    }
}

async fn perform<T>(transport: &mut T, operation: Operation) -> IpcResult<Option<String>>
where
    T: FrameTransport,
{
    match operation {
        Operation::Write(text) => {
            transport.write_frame(&text).await?;
            Ok(None)
        }
        Operation::Read => transport.read_frame().await.map(Some),
        Operation::WriteThenRead(text) => {
            transport.write_frame(&text).await?;
            transport.read_frame().await.map(Some)
        }
    }
}
