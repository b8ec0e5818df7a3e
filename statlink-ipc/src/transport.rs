//! IPC transport implementations

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::time::Instant;

use crate::codec::{LineCodec, FRAME_TERMINATOR};
use crate::endpoint::PipeEndpoint;
use crate::error::{IpcError, IpcResult};

/// Byte stream usable as a channel
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T> AsyncIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

type IoBox = Box<dyn AsyncIo>;

/// Upper bound on a single connect attempt
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

/// Frame-level transport trait.
///
/// Implementations are driven by one logical operation at a time; callers
/// never read and write concurrently.
#[async_trait]
pub trait FrameTransport: Send {
    /// Write one message as a terminated frame
    async fn write_frame(&mut self, text: &str) -> IpcResult<()>;

    /// Read one frame and return its payload
    async fn read_frame(&mut self) -> IpcResult<String>;

    /// Close the transport
    async fn close(&mut self) -> IpcResult<()>;
}

/// Client side of a worker's named endpoint
pub struct PipeTransport {
    endpoint: PipeEndpoint,
    reader: BufReader<ReadHalf<IoBox>>,
    writer: Option<WriteHalf<IoBox>>,
}

impl PipeTransport {
    /// Connect to the worker's endpoint, polling until it exists.
    ///
    /// The worker creates its endpoint some time after it is spawned and
    /// there is no signal for that other than trying. Each attempt is
    /// preceded by `retry_interval`; once `connect_timeout` has elapsed the
    /// call fails with [`IpcError::ConnectTimeout`].
    pub async fn connect(
        endpoint: &PipeEndpoint,
        connect_timeout: Duration,
        retry_interval: Duration,
    ) -> IpcResult<Self> {
        let deadline = Instant::now() + connect_timeout;
        let mut attempts = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Giving up on pipe {} after {} attempts",
                    endpoint, attempts
                );
                return Err(IpcError::ConnectTimeout {
                    endpoint: endpoint.to_string(),
                    timeout: connect_timeout,
                });
            }

            tokio::time::sleep(retry_interval.min(deadline - now)).await;
            attempts += 1;

            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt_timeout = remaining.clamp(Duration::from_millis(1), CONNECT_ATTEMPT_TIMEOUT);
            match tokio::time::timeout(attempt_timeout, open_endpoint(endpoint)).await {
                Ok(Ok(io)) => {
                    debug!("Connected to pipe {} after {} attempts", endpoint, attempts);
                    return Ok(Self::from_boxed(endpoint.clone(), io));
                }
                Ok(Err(e)) if IpcError::is_retryable_connect(&e) => {
                    trace!("Pipe {} not ready yet: {}", endpoint, e);
                }
                Ok(Err(e)) => return Err(IpcError::Io(e)),
                Err(_) => trace!("Connect attempt to pipe {} stalled", endpoint),
            }
        }
    }

    /// Wrap an already-open stream
    pub fn from_stream<S>(endpoint: PipeEndpoint, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::from_boxed(endpoint, Box::new(stream))
    }

    fn from_boxed(endpoint: PipeEndpoint, io: IoBox) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        Self {
            endpoint,
            reader: BufReader::new(read_half),
            writer: Some(write_half),
        }
    }

    /// Endpoint this transport is connected to
    pub fn endpoint(&self) -> &PipeEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl FrameTransport for PipeTransport {
    async fn write_frame(&mut self, text: &str) -> IpcResult<()> {
        let frame = LineCodec::encode(text)?;
        let writer = self.writer.as_mut().ok_or_else(|| {
            IpcError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "pipe already closed",
            ))
        })?;

        writer.write_all(&frame).await?;
        writer.flush().await?;
        trace!("Wrote {} byte frame to {}", frame.len(), self.endpoint);
        Ok(())
    }

    async fn read_frame(&mut self) -> IpcResult<String> {
        let mut frame = Vec::new();
        let read = self.reader.read_until(FRAME_TERMINATOR, &mut frame).await?;

        if read == 0 || frame.last() != Some(&FRAME_TERMINATOR) {
            debug!(
                "Pipe {} closed with {} unterminated bytes pending",
                self.endpoint,
                frame.len()
            );
            return Err(IpcError::EndOfStream);
        }

        LineCodec::decode(&frame)
    }

    async fn close(&mut self) -> IpcResult<()> {
        // Shutting down our write half is what tells the worker we are done
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
            debug!("Closed pipe {}", self.endpoint);
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn open_endpoint(endpoint: &PipeEndpoint) -> io::Result<IoBox> {
    let stream = tokio::net::UnixStream::connect(endpoint.as_str()).await?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
async fn open_endpoint(endpoint: &PipeEndpoint) -> io::Result<IoBox> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new().open(endpoint.as_str())?;
    Ok(Box::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn duplex_pair() -> (PipeTransport, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(1024);
        (
            PipeTransport::from_stream(PipeEndpoint::new("test-pipe"), client),
            server,
        )
    }

    #[tokio::test]
    async fn test_write_frame_appends_newline() {
        let (mut transport, mut server) = duplex_pair();

        transport.write_frame("run nightly").await.unwrap();

        let mut buf = [0u8; 12];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"run nightly\n");
    }

    #[tokio::test]
    async fn test_read_frame_strips_crlf() {
        let (mut transport, mut server) = duplex_pair();

        server.write_all(b"0\r\n17\n").await.unwrap();

        assert_eq!(transport.read_frame().await.unwrap(), "0");
        assert_eq!(transport.read_frame().await.unwrap(), "17");
    }

    #[tokio::test]
    async fn test_read_frame_end_of_stream() {
        let (mut transport, server) = duplex_pair();
        drop(server);

        let err = transport.read_frame().await.unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[tokio::test]
    async fn test_unterminated_frame_is_end_of_stream() {
        let (mut transport, mut server) = duplex_pair();
        server.write_all(b"partial").await.unwrap();
        drop(server);

        assert!(transport.read_frame().await.unwrap_err().is_end_of_stream());
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (mut transport, _server) = duplex_pair();

        transport.close().await.unwrap();
        // closing twice is fine
        transport.close().await.unwrap();

        assert!(matches!(
            transport.write_frame("late").await,
            Err(IpcError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (mut transport, mut server) = duplex_pair();
        transport.close().await.unwrap();

        let mut rest = Vec::new();
        server.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_times_out_when_endpoint_missing() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = PipeEndpoint::new(dir.path().join("never.sock").to_string_lossy());

        let started = std::time::Instant::now();
        let result = PipeTransport::connect(
            &endpoint,
            Duration::from_millis(600),
            Duration::from_millis(100),
        )
        .await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(IpcError::ConnectTimeout { .. })));
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_retries_until_endpoint_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.sock");
        let endpoint = PipeEndpoint::new(path.to_string_lossy());

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let listener = tokio::net::UnixListener::bind(&path).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = tokio::io::split(stream);
            let mut lines = BufReader::new(read_half).lines();
            while let Some(line) = lines.next_line().await.unwrap() {
                write_half
                    .write_all(format!("{}\n", line).as_bytes())
                    .await
                    .unwrap();
            }
        });

        let mut transport = PipeTransport::connect(
            &endpoint,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();

        transport.write_frame("ping").await.unwrap();
        assert_eq!(transport.read_frame().await.unwrap(), "ping");

        transport.close().await.unwrap();
        server.await.unwrap();
    }
}
