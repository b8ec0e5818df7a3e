//! Supervised worker client
//!
//! [`StatClient`] owns at most one worker instance: a process, the pipe it
//! listens on, and the executor that serializes traffic on that pipe. The
//! three are created together by [`StatClient::start`] and torn down
//! together by [`StatClient::close`].

use std::fmt;
use std::time::Duration;

use statlink_config::TimeoutConfig;
use statlink_ipc::{PipeEndpoint, PipeTransport};
use tracing::{debug, info, warn};

use crate::bounded::{BoundedExecutor, Operation};
use crate::error::{ClientError, ClientResult};
use crate::launch::WorkerLaunch;
use crate::supervisor::{ProcessSupervisor, WorkerProcess};

/// Request sent to check that the worker still answers
pub const PROBE_REQUEST: &str = "alive";

/// Status a healthy worker returns
pub const STATUS_OK: i32 = 0;

/// Lifecycle of a [`StatClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unstarted,
    Starting,
    Ready,
    Sending,
    /// A request timed out or the pipe broke; the instance must be replaced
    Faulted,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Unstarted => "unstarted",
            ClientState::Starting => "starting",
            ClientState::Ready => "ready",
            ClientState::Sending => "sending",
            ClientState::Faulted => "faulted",
            ClientState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Time budgets used by the client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub connect_retry_interval: Duration,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub channel_close: Duration,
    pub terminate_grace: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ClientSettings {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect_timeout: config.connect,
            connect_retry_interval: config.connect_retry_interval,
            request_timeout: config.request,
            probe_timeout: config.probe,
            channel_close: config.channel_close,
            terminate_grace: config.terminate_grace,
        }
    }
}

/// Result of a command: the worker's status and what it printed meanwhile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

struct WorkerInstance {
    endpoint: PipeEndpoint,
    process: WorkerProcess,
    executor: BoundedExecutor,
}

/// Client for one supervised worker at a time
pub struct StatClient {
    settings: ClientSettings,
    state: ClientState,
    instance: Option<WorkerInstance>,
}

impl StatClient {
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            state: ClientState::Unstarted,
            instance: None,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Spawn a worker and connect to its pipe.
    ///
    /// On failure anything already created is torn down and the client is
    /// left closed, ready for another attempt.
    pub async fn start(&mut self, launch: &WorkerLaunch) -> ClientResult<()> {
        if !matches!(self.state, ClientState::Unstarted | ClientState::Closed) {
            return Err(self.invalid_state("start"));
        }

        self.state = ClientState::Starting;
        let endpoint = PipeEndpoint::fresh(&launch.pipe_prefix);

        let mut process = match ProcessSupervisor::spawn(launch, &endpoint) {
            Ok(process) => process,
            Err(e) => {
                self.state = ClientState::Closed;
                return Err(e);
            }
        };

        let transport = match PipeTransport::connect(
            &endpoint,
            self.settings.connect_timeout,
            self.settings.connect_retry_interval,
        )
        .await
        {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Could not connect to worker on {}: {}", endpoint, e);
                ProcessSupervisor::terminate(&mut process, self.settings.terminate_grace).await;
                endpoint.cleanup();
                self.state = ClientState::Closed;
                return Err(e.into());
            }
        };

        info!("Worker {:?} ready on {}", process.pid(), endpoint);
        self.instance = Some(WorkerInstance {
            endpoint,
            process,
            executor: BoundedExecutor::spawn(transport),
        });
        self.state = ClientState::Ready;
        Ok(())
    }

    /// Close the current instance, if any, and start a new one
    pub async fn restart(&mut self, launch: &WorkerLaunch) -> ClientResult<()> {
        self.close().await;
        self.start(launch).await
    }

    /// Send one line and return the reply, using the default request timeout
    pub async fn send_request(&mut self, text: &str) -> ClientResult<String> {
        let limit = self.settings.request_timeout;
        self.send_request_with_timeout(text, limit).await
    }

    /// Send one line and wait at most `limit` for the reply.
    ///
    /// A timeout or broken pipe faults the instance; it then refuses further
    /// requests until it is closed and started again.
    pub async fn send_request_with_timeout(
        &mut self,
        text: &str,
        limit: Duration,
    ) -> ClientResult<String> {
        if self.state != ClientState::Ready {
            return Err(self.invalid_state("send a request"));
        }
        let Some(instance) = self.instance.as_ref() else {
            return Err(self.invalid_state("send a request"));
        };

        self.state = ClientState::Sending;
        let result = instance
            .executor
            .run_bounded(Operation::WriteThenRead(text.to_string()), limit)
            .await
            .and_then(reply_line);

        match result {
            Ok(reply) => {
                self.state = ClientState::Ready;
                debug!("Worker replied {:?} to {:?}", reply, text);
                Ok(reply)
            }
            Err(e) => {
                if e.requires_restart() {
                    self.fault(&e);
                } else {
                    self.state = ClientState::Ready;
                }
                Err(e)
            }
        }
    }

    /// Send a command and interpret the reply as an integer status
    pub async fn send_command(&mut self, text: &str) -> ClientResult<CommandOutcome> {
        let reply = self.send_request(text).await?;
        let status = parse_status(&reply)?;

        Ok(CommandOutcome {
            status,
            stdout: self.take_stdout(),
            stderr: self.take_stderr(),
        })
    }

    /// Whether the worker is running and answers the liveness probe.
    ///
    /// Never fails: every problem reads as "not alive". A probe that times
    /// out or breaks the pipe faults the instance.
    pub async fn is_alive(&mut self) -> bool {
        if self.state != ClientState::Ready {
            return false;
        }
        let Some(instance) = self.instance.as_mut() else {
            return false;
        };
        if !ProcessSupervisor::is_running(&mut instance.process) {
            debug!("Worker {:?} is no longer running", instance.process.pid());
            return false;
        }

        let limit = self.settings.probe_timeout;
        match self.send_request_with_timeout(PROBE_REQUEST, limit).await {
            Ok(reply) => match parse_status(&reply) {
                Ok(STATUS_OK) => true,
                Ok(status) => {
                    debug!("Liveness probe returned status {}", status);
                    false
                }
                Err(e) => {
                    debug!("Liveness probe failed: {}", e);
                    false
                }
            },
            Err(e) => {
                debug!("Liveness probe failed: {}", e);
                false
            }
        }
    }

    /// Tear down the current instance.
    ///
    /// The pipe gets `channel_close` to shut down, then the worker gets
    /// `terminate_grace` to exit before it is killed. Never fails and may be
    /// called any number of times.
    pub async fn close(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            debug!("Closing worker on {}", instance.endpoint);
            if !instance.executor.shutdown(self.settings.channel_close).await {
                warn!("Pipe {} did not close cleanly", instance.endpoint);
            }
            ProcessSupervisor::terminate(&mut instance.process, self.settings.terminate_grace)
                .await;
            instance.endpoint.cleanup();
            info!("Worker {:?} closed", instance.process.pid());
        }
        self.state = ClientState::Closed;
    }

    /// Everything the worker wrote to stdout since the last call
    pub fn take_stdout(&self) -> String {
        self.instance
            .as_ref()
            .map(|i| i.process.stdout().take_string())
            .unwrap_or_default()
    }

    /// Everything the worker wrote to stderr since the last call
    pub fn take_stderr(&self) -> String {
        self.instance
            .as_ref()
            .map(|i| i.process.stderr().take_string())
            .unwrap_or_default()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn endpoint(&self) -> Option<&PipeEndpoint> {
        self.instance.as_ref().map(|i| &i.endpoint)
    }

    pub fn pid(&self) -> Option<u32> {
        self.instance.as_ref().and_then(|i| i.process.pid())
    }

    fn fault(&mut self, cause: &ClientError) {
        warn!("Worker instance faulted: {}", cause);
        self.state = ClientState::Faulted;
    }

    fn invalid_state(&self, operation: &'static str) -> ClientError {
        ClientError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }
}

impl Default for StatClient {
    fn default() -> Self {
        Self::new(ClientSettings::default())
    }
}

impl Drop for StatClient {
    fn drop(&mut self) {
        // The child is killed on drop; only the socket file needs removing
        if let Some(instance) = self.instance.take() {
            instance.endpoint.cleanup();
        }
    }
}

/// A write+read must come back with a line; anything else is not a reply
fn reply_line(reply: Option<String>) -> ClientResult<String> {
    reply.ok_or_else(|| ClientError::InvalidReply(String::new()))
}

/// Parse a status reply line
pub fn parse_status(reply: &str) -> ClientResult<i32> {
    reply
        .trim()
        .parse()
        .map_err(|_| ClientError::InvalidReply(reply.to_string()))
}
