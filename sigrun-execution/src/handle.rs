//! Worker processes as seen from the pool
//!
//! Each worker gets two tasks: a driver that owns the `Child`, writes
//! requests to its stdin and reports its exit, and a reader that forwards
//! replies from its stdout. Both report to the pool actor tagged with the
//! worker id.

use serde_json::Value as JsonValue;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use sigrun_ipc::{IpcError, LineReader, LineWriter, WorkerReply, WorkerRequest};

use crate::config::WorkerCommand;
use crate::error::PoolError;

pub(crate) type TaskReply = oneshot::Sender<Result<JsonValue, PoolError>>;

/// Things that happen to workers, delivered to the pool actor
#[derive(Debug)]
pub(crate) enum PoolEvent {
    Reply { worker_id: u64, reply: WorkerReply },
    Exited { worker_id: u64, status: String },
    Unreadable { worker_id: u64, error: String },
    TimedOut { worker_id: u64, task_id: Uuid },
    ShutdownDeadline,
}

/// The task a worker is currently running
pub(crate) struct InFlight {
    pub task_id: Uuid,
    pub reply: Option<TaskReply>,
    pub started_at: Instant,
    pub timeout: Duration,
    pub timer: AbortHandle,
}

impl InFlight {
    /// Resolve the caller exactly once; later calls are no-ops
    pub fn resolve(&mut self, result: Result<JsonValue, PoolError>) {
        self.timer.abort();
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(result);
        }
    }

    /// Busy for longer than twice its own timeout, or than `floor` if that is
    /// larger; a healthy worker's timer fires well before either
    pub fn is_stale(&self, floor: Duration) -> bool {
        self.started_at.elapsed() > floor.max(self.timeout * 2)
    }
}

pub(crate) struct WorkerHandle {
    pub id: u64,
    pub pid: Option<u32>,
    pub in_flight: Option<InFlight>,
    pub tasks_completed: u64,
    pub created_at: Instant,
    pub last_activity: Instant,
    outbox: mpsc::UnboundedSender<WorkerRequest>,
    kill: Option<oneshot::Sender<()>>,
}

impl WorkerHandle {
    /// Launch a worker process and its driver/reader tasks
    pub fn spawn(
        id: u64,
        command: &WorkerCommand,
        events: mpsc::UnboundedSender<PoolEvent>,
    ) -> Result<Self, PoolError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .arg("--worker-id")
            .arg(id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PoolError::Spawn(format!("{}: {}", command.program.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PoolError::Spawn("worker stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PoolError::Spawn("worker stdout was not captured".to_string()))?;
        let pid = child.id();

        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(read_replies(id, stdout, events.clone()));
        tokio::spawn(drive(id, child, stdin, outbox_rx, kill_rx, events));

        debug!(worker_id = id, pid = ?pid, "Spawned worker process");
        let now = Instant::now();
        Ok(Self {
            id,
            pid,
            in_flight: None,
            tasks_completed: 0,
            created_at: now,
            last_activity: now,
            outbox: outbox_tx,
            kill: Some(kill_tx),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Queue a request for the driver; false if the driver is gone
    pub fn send(&self, request: WorkerRequest) -> bool {
        self.outbox.send(request).is_ok()
    }

    /// Terminate the process. Its exit event will be ignored by the pool
    /// once the handle is removed.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn drive(
    id: u64,
    mut child: Child,
    stdin: ChildStdin,
    mut outbox: mpsc::UnboundedReceiver<WorkerRequest>,
    mut kill: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<PoolEvent>,
) {
    let mut writer = LineWriter::new(stdin);
    let mut killed = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = &mut kill, if !killed => {
                killed = true;
                let _ = child.start_kill();
            }
            request = outbox.recv(), if !killed => match request {
                Some(request) => {
                    // A worker that stops reading must not wedge the driver
                    tokio::select! {
                        result = writer.send(&request) => {
                            if let Err(e) = result {
                                warn!(worker_id = id, "Failed to write to worker: {}", e);
                            }
                        }
                        _ = &mut kill => {
                            killed = true;
                            let _ = child.start_kill();
                        }
                    }
                }
                None => {
                    killed = true;
                    let _ = child.start_kill();
                }
            }
        }
    };

    let status = describe_exit(status);
    debug!(worker_id = id, "Worker exited: {}", status);
    let _ = events.send(PoolEvent::Exited { worker_id: id, status });
}

async fn read_replies(id: u64, stdout: ChildStdout, events: mpsc::UnboundedSender<PoolEvent>) {
    let mut reader = LineReader::new(stdout);
    loop {
        match reader.receive::<WorkerReply>().await {
            Ok(envelope) => {
                trace!(worker_id = id, "Reply: {:?}", envelope.message);
                let event = PoolEvent::Reply {
                    worker_id: id,
                    reply: envelope.message,
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(IpcError::ConnectionClosed) => break,
            Err(e) if e.is_fatal() => {
                let _ = events.send(PoolEvent::Unreadable {
                    worker_id: id,
                    error: e.to_string(),
                });
                break;
            }
            Err(e) => warn!(worker_id = id, "Ignoring unreadable worker output: {}", e),
        }
    }
}

fn describe_exit(status: std::io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => match status.code() {
            Some(code) => format!("exit code {}", code),
            None => describe_signal(&status),
        },
        Err(e) => format!("wait failed: {}", e),
    }
}

#[cfg(unix)]
fn describe_signal(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("killed by signal {}", signal),
        None => status.to_string(),
    }
}

#[cfg(not(unix))]
fn describe_signal(status: &ExitStatus) -> String {
    status.to_string()
}
