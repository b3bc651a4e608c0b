//! Worker process implementation
//!
//! A worker runs one task at a time. The pool owns timeouts: a worker that
//! takes too long is killed, so nothing here bounds execution time.

use std::time::Instant;
use tracing::{debug, error, info, warn};

use sigrun_ipc::{
    IpcError, IpcTransport, StdioTransport, WorkerReply, WorkerRequest, WorkerResponse, WorkerTask,
};

use crate::operations::dispatch_named;

/// Worker process main entry point
pub async fn worker_main(worker_id: u64) -> Result<(), IpcError> {
    info!("Starting worker process: {}", worker_id);

    let mut worker = Worker::new(worker_id, StdioTransport::stdio());
    worker.send_ready().await?;
    worker.run().await?;

    info!("Worker process {} shutting down", worker_id);
    Ok(())
}

/// Worker loop over any transport
pub struct Worker<T> {
    worker_id: u64,
    transport: T,
    tasks_executed: u64,
}

impl<T: IpcTransport> Worker<T> {
    pub fn new(worker_id: u64, transport: T) -> Self {
        Self {
            worker_id,
            transport,
            tasks_executed: 0,
        }
    }

    /// Announce readiness to the pool
    pub async fn send_ready(&mut self) -> Result<(), IpcError> {
        let ready = WorkerReply::Ready {
            worker_id: self.worker_id,
            pid: std::process::id(),
        };
        self.transport.send(&ready).await
    }

    /// Serve requests until shutdown or until the pool goes away
    pub async fn run(&mut self) -> Result<(), IpcError> {
        loop {
            let envelope = match self.transport.receive::<WorkerRequest>().await {
                Ok(envelope) => envelope,
                Err(IpcError::ConnectionClosed) => {
                    debug!("Pool closed the connection");
                    break;
                }
                Err(e) if e.is_fatal() => {
                    error!("Failed to receive message: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Discarding unreadable request: {}", e);
                    self.transport
                        .send(&WorkerReply::Error {
                            task_id: None,
                            error: e.to_string(),
                        })
                        .await?;
                    continue;
                }
            };

            match envelope.message {
                WorkerRequest::Execute(task) => {
                    let response = self.execute(task).await;
                    self.transport.send(&WorkerReply::Result(response)).await?;
                }
                WorkerRequest::Ping => {
                    let pong = WorkerReply::Pong {
                        worker_id: self.worker_id,
                        tasks_executed: self.tasks_executed,
                    };
                    self.transport.send(&pong).await?;
                }
                WorkerRequest::Shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.transport.close().await
    }

    async fn execute(&mut self, task: WorkerTask) -> WorkerResponse {
        let started = Instant::now();
        debug!(task_id = %task.task_id, operation = %task.operation, "Executing task");

        let response = match dispatch_named(&task.operation, task.payload).await {
            Ok(result) => WorkerResponse::success(task.task_id, result, started.elapsed()),
            Err(e) => {
                debug!(task_id = %task.task_id, "Task failed: {}", e);
                WorkerResponse::failure(task.task_id, e.to_string(), started.elapsed())
            }
        };

        self.tasks_executed += 1;
        response
    }

    pub fn tasks_executed(&self) -> u64 {
        self.tasks_executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigrun_ipc::{MessageEnvelope, OperationKind, StreamTransport};
    use std::time::Duration;
    use tokio::io::{duplex, split};

    #[tokio::test]
    async fn test_worker_round_trip() {
        let (pool_side, worker_side) = duplex(64 * 1024);
        let (worker_read, worker_write) = split(worker_side);
        let (pool_read, pool_write) = split(pool_side);

        let handle = tokio::spawn(async move {
            let mut worker = Worker::new(7, StreamTransport::new(worker_read, worker_write));
            worker.send_ready().await.unwrap();
            worker.run().await.unwrap();
            worker.tasks_executed()
        });

        let mut pool = StreamTransport::new(pool_read, pool_write);
        let ready: MessageEnvelope<WorkerReply> = pool.receive().await.unwrap();
        assert!(matches!(ready.message, WorkerReply::Ready { worker_id: 7, .. }));

        let task = WorkerTask::new(OperationKind::Statistics, json!({"values": [1.0, 3.0]}), Duration::from_secs(1));
        pool.send(&WorkerRequest::Execute(task.clone())).await.unwrap();
        let reply: MessageEnvelope<WorkerReply> = pool.receive().await.unwrap();
        match reply.message {
            WorkerReply::Result(response) => {
                assert_eq!(response.task_id, task.task_id);
                assert!(response.success);
                assert_eq!(response.result.unwrap()["mean"], 2.0);
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        let mut unknown = WorkerTask::new(OperationKind::Fft, json!({}), Duration::from_secs(1));
        unknown.operation = "teleport".to_string();
        pool.send(&WorkerRequest::Execute(unknown)).await.unwrap();
        let reply: MessageEnvelope<WorkerReply> = pool.receive().await.unwrap();
        match reply.message {
            WorkerReply::Result(response) => {
                assert!(!response.success);
                assert_eq!(response.error.as_deref(), Some("Unknown operation: teleport"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        pool.send(&WorkerRequest::Ping).await.unwrap();
        let reply: MessageEnvelope<WorkerReply> = pool.receive().await.unwrap();
        assert_eq!(reply.message, WorkerReply::Pong { worker_id: 7, tasks_executed: 2 });

        pool.send(&WorkerRequest::Shutdown).await.unwrap();
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_worker_exits_when_pool_disappears() {
        let (pool_side, worker_side) = duplex(1024);
        let (worker_read, worker_write) = split(worker_side);

        let handle = tokio::spawn(async move {
            let mut worker = Worker::new(1, StreamTransport::new(worker_read, worker_write));
            worker.run().await
        });

        drop(pool_side);
        assert!(handle.await.unwrap().is_ok());
    }
}
