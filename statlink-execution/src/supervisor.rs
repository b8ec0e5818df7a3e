//! Worker process lifecycle

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use statlink_ipc::PipeEndpoint;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::launch::WorkerLaunch;
use crate::output::OutputBuffer;

/// How long to wait for a killed worker to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long an output drain may keep running after the worker is gone
const DRAIN_FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// A spawned worker and its captured output
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: Option<u32>,
    exit_status: Option<ExitStatus>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    drains: Vec<JoinHandle<()>>,
}

impl WorkerProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status, once the process has been observed to exit
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn stdout(&self) -> &OutputBuffer {
        &self.stdout
    }

    pub fn stderr(&self) -> &OutputBuffer {
        &self.stderr
    }
}

/// Spawns, polls and terminates worker processes
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Launch the worker listening on `endpoint` and start draining its output
    pub fn spawn(launch: &WorkerLaunch, endpoint: &PipeEndpoint) -> ClientResult<WorkerProcess> {
        let mut command = Command::new(&launch.executable);
        command
            .args(launch.command_args(endpoint))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &launch.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ClientError::Spawn {
            executable: launch.display_name(),
            source,
        })?;

        let pid = child.id();
        info!(
            "Spawned worker {} (pid {:?}) listening on {}",
            launch.display_name(),
            pid,
            endpoint
        );

        let stdout = OutputBuffer::new();
        let stderr = OutputBuffer::new();
        let mut drains = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            drains.push(stdout.drain_from(out, "stdout"));
        }
        if let Some(err) = child.stderr.take() {
            drains.push(stderr.drain_from(err, "stderr"));
        }

        Ok(WorkerProcess {
            child,
            pid,
            exit_status: None,
            stdout,
            stderr,
            drains,
        })
    }

    /// Non-blocking liveness check
    pub fn is_running(process: &mut WorkerProcess) -> bool {
        if process.exit_status.is_some() {
            return false;
        }

        match process.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Worker {:?} exited with {}", process.pid, status);
                process.exit_status = Some(status);
                false
            }
            Err(e) => {
                warn!("Failed to poll worker {:?}: {}", process.pid, e);
                false
            }
        }
    }

    /// Wait up to `grace` for the worker to exit, then kill it.
    ///
    /// Never fails; problems are logged. The output drains are stopped once
    /// the process is gone.
    pub async fn terminate(process: &mut WorkerProcess, grace: Duration) {
        if process.exit_status.is_none() {
            match timeout(grace, process.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("Worker {:?} exited on its own with {}", process.pid, status);
                    process.exit_status = Some(status);
                }
                Ok(Err(e)) => warn!("Error waiting for worker {:?}: {}", process.pid, e),
                Err(_) => info!(
                    "Worker {:?} still running after {:?}, killing it",
                    process.pid, grace
                ),
            }
        }

        if process.exit_status.is_none() {
            if let Err(e) = process.child.start_kill() {
                warn!("Failed to kill worker {:?}: {}", process.pid, e);
            }

            match timeout(REAP_TIMEOUT, process.child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Worker {:?} killed ({})", process.pid, status);
                    process.exit_status = Some(status);
                }
                Ok(Err(e)) => warn!("Error reaping worker {:?}: {}", process.pid, e),
                Err(_) => warn!(
                    "Worker {:?} did not exit even after being killed",
                    process.pid
                ),
            }
        }

        // Give the drains a moment to pick up the final bytes
        for mut drain in process.drains.drain(..) {
            if timeout(DRAIN_FLUSH_TIMEOUT, &mut drain).await.is_err() {
                drain.abort();
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    // `sh listen <endpoint>` runs a script named `listen` from the working
    // directory, with the endpoint as $1.
    fn script_worker(dir: &Path, body: &str) -> WorkerLaunch {
        std::fs::write(dir.join("listen"), body).unwrap();
        WorkerLaunch::new("/bin/sh").with_working_dir(dir)
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let launch = WorkerLaunch::new("/definitely/not/a/worker");
        let err = ProcessSupervisor::spawn(&launch, &PipeEndpoint::new("unused")).unwrap_err();
        assert!(matches!(err, ClientError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_terminate_kills_hung_process() {
        let dir = tempfile::tempdir().unwrap();
        let launch = script_worker(dir.path(), "echo \"pipe $1\"\necho oops >&2\nexec sleep 30\n");
        let mut process = ProcessSupervisor::spawn(&launch, &PipeEndpoint::new("p1")).unwrap();

        assert!(process.pid().is_some());
        assert!(ProcessSupervisor::is_running(&mut process));

        let started = std::time::Instant::now();
        ProcessSupervisor::terminate(&mut process, Duration::from_millis(300)).await;
        assert!(started.elapsed() < Duration::from_secs(3));

        assert!(!ProcessSupervisor::is_running(&mut process));
        assert!(process.exit_status().is_some());
        assert_eq!(process.stdout().take_string(), "pipe p1\n");
        assert_eq!(process.stderr().take_string(), "oops\n");
    }

    #[tokio::test]
    async fn test_exited_process_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let launch = script_worker(dir.path(), "exit 3\n");
        let mut process = ProcessSupervisor::spawn(&launch, &PipeEndpoint::new("p2")).unwrap();

        let mut running = true;
        for _ in 0..50 {
            running = ProcessSupervisor::is_running(&mut process);
            if !running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!running);
        assert_eq!(process.exit_status().and_then(|s| s.code()), Some(3));

        // terminating an exited worker returns immediately
        let started = std::time::Instant::now();
        ProcessSupervisor::terminate(&mut process, Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
