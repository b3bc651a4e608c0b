//! The worker pool
//!
//! All bookkeeping lives in one actor task. [`WorkerPool`] is a cheap handle
//! that sends it commands; callers get their result through a oneshot
//! channel that the actor resolves exactly once.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use sigrun_core::Priority;
use sigrun_interfaces::{OffloadError, SubmitOptions, TaskOffloader};
use sigrun_ipc::{OperationKind, WorkerReply, WorkerRequest, WorkerResponse, WorkerTask};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::handle::{InFlight, PoolEvent, TaskReply, WorkerHandle};
use crate::queue::TaskQueue;
use crate::stats::{PoolCounters, PoolStats};

enum PoolCommand {
    Submit {
        task: WorkerTask,
        priority: Priority,
        timeout: Duration,
        reply: TaskReply,
    },
    Stats(oneshot::Sender<PoolStats>),
    WorkerPids(oneshot::Sender<Vec<u32>>),
    Shutdown {
        deadline: Duration,
        done: oneshot::Sender<()>,
    },
}

/// A submitted task whose result has not been collected yet
pub struct TaskTicket {
    task_id: uuid::Uuid,
    result: Result<oneshot::Receiver<Result<JsonValue, PoolError>>, PoolError>,
}

impl TaskTicket {
    pub fn task_id(&self) -> uuid::Uuid {
        self.task_id
    }

    /// Wait for the task to resolve
    pub async fn wait(self) -> Result<JsonValue, PoolError> {
        self.await
    }
}

impl Future for TaskTicket {
    type Output = Result<JsonValue, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.result {
            Ok(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|result| result.unwrap_or(Err(PoolError::Unavailable))),
            Err(e) => Poll::Ready(Err(e.clone())),
        }
    }
}

/// Handle to a running worker pool
#[derive(Clone)]
pub struct WorkerPool {
    commands: mpsc::UnboundedSender<PoolCommand>,
    default_timeout: Duration,
}

impl WorkerPool {
    /// Spawn the workers and the pool actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let default_timeout = config.task_timeout;

        let mut actor = PoolActor::new(config, events_tx);
        actor.top_up();
        if actor.workers.is_empty() {
            return Err(PoolError::Spawn(format!(
                "none of {} workers could be started from {}",
                actor.config.worker_count,
                actor.config.worker_command.program.display()
            )));
        }

        info!(
            "Worker pool started with {} workers (queue limit {})",
            actor.workers.len(),
            actor.config.max_queue_size
        );
        tokio::spawn(actor.run(commands_rx, events_rx));

        Ok(Self {
            commands: commands_tx,
            default_timeout,
        })
    }

    /// Submit a task and hand back a ticket without waiting.
    ///
    /// Submissions reach the pool in call order.
    pub fn enqueue(&self, operation: OperationKind, payload: JsonValue, options: SubmitOptions) -> TaskTicket {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let task = WorkerTask::new(operation, payload, timeout);
        let task_id = task.task_id;
        let (reply, receiver) = oneshot::channel();

        let command = PoolCommand::Submit {
            task,
            priority: options.priority.unwrap_or_default(),
            timeout,
            reply,
        };
        let result = match self.commands.send(command) {
            Ok(()) => Ok(receiver),
            Err(_) => Err(PoolError::Unavailable),
        };
        TaskTicket { task_id, result }
    }

    /// Run `operation` on a worker and wait for its result
    pub async fn submit(
        &self,
        operation: OperationKind,
        payload: JsonValue,
        options: SubmitOptions,
    ) -> Result<JsonValue, PoolError> {
        self.enqueue(operation, payload, options).await
    }

    /// Like [`submit`](Self::submit), starting from a wire name
    pub async fn submit_named(
        &self,
        operation: &str,
        payload: JsonValue,
        options: SubmitOptions,
    ) -> Result<JsonValue, PoolError> {
        let operation = operation.parse::<OperationKind>()?;
        self.submit(operation, payload, options).await
    }

    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PoolCommand::Stats(tx))
            .map_err(|_| PoolError::Unavailable)?;
        rx.await.map_err(|_| PoolError::Unavailable)
    }

    /// OS process ids of the current workers
    pub async fn worker_pids(&self) -> Result<Vec<u32>, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PoolCommand::WorkerPids(tx))
            .map_err(|_| PoolError::Unavailable)?;
        rx.await.map_err(|_| PoolError::Unavailable)
    }

    /// Stop accepting work, let busy workers finish until `deadline`, then
    /// kill every worker. Safe to call more than once.
    pub async fn shutdown(&self, deadline: Duration) {
        let (done, rx) = oneshot::channel();
        if self
            .commands
            .send(PoolCommand::Shutdown { deadline, done })
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

#[async_trait]
impl TaskOffloader for WorkerPool {
    async fn offload(
        &self,
        operation: OperationKind,
        payload: JsonValue,
        options: SubmitOptions,
    ) -> Result<JsonValue, OffloadError> {
        self.submit(operation, payload, options)
            .await
            .map_err(OffloadError::from)
    }

    async fn shutdown(&self, deadline: Duration) {
        WorkerPool::shutdown(self, deadline).await
    }
}

struct PendingTask {
    task: WorkerTask,
    timeout: Duration,
    reply: TaskReply,
}

enum PoolState {
    Running,
    Draining { waiters: Vec<oneshot::Sender<()>> },
    Stopped,
}

struct PoolActor {
    config: PoolConfig,
    workers: BTreeMap<u64, WorkerHandle>,
    queue: TaskQueue<PendingTask>,
    counters: PoolCounters,
    state: PoolState,
    next_worker_id: u64,
    events: mpsc::UnboundedSender<PoolEvent>,
}

impl PoolActor {
    fn new(config: PoolConfig, events: mpsc::UnboundedSender<PoolEvent>) -> Self {
        Self {
            queue: TaskQueue::new(config.max_queue_size),
            config,
            workers: BTreeMap::new(),
            counters: PoolCounters::default(),
            state: PoolState::Running,
            next_worker_id: 1,
            events,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PoolCommand>,
        mut events: mpsc::UnboundedReceiver<PoolEvent>,
    ) {
        let period = self.config.health_check_interval;
        let mut health = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = health.tick() => self.health_check(),
            }
        }

        debug!("All pool handles dropped, stopping workers");
        self.finish_shutdown();
    }

    fn handle_command(&mut self, command: PoolCommand) {
        match command {
            PoolCommand::Submit {
                task,
                priority,
                timeout,
                reply,
            } => self.submit(PendingTask { task, timeout, reply }, priority),
            PoolCommand::Stats(reply) => {
                let busy = self.workers.values().filter(|w| w.is_busy()).count();
                let _ = reply.send(self.counters.snapshot(self.workers.len(), busy, self.queue.len()));
            }
            PoolCommand::WorkerPids(reply) => {
                let _ = reply.send(self.workers.values().filter_map(|w| w.pid).collect());
            }
            PoolCommand::Shutdown { deadline, done } => self.begin_shutdown(deadline, done),
        }
    }

    fn submit(&mut self, pending: PendingTask, priority: Priority) {
        if !matches!(self.state, PoolState::Running) {
            let _ = pending.reply.send(Err(PoolError::ShuttingDown));
            return;
        }

        if let Some(worker_id) = self.idle_worker() {
            self.counters.submitted += 1;
            self.dispatch(worker_id, pending);
            return;
        }

        match self.queue.push(priority, pending) {
            Ok(()) => {
                self.counters.submitted += 1;
                debug!("All workers busy, {} task(s) queued", self.queue.len());
            }
            Err(rejected) => {
                self.counters.rejected += 1;
                warn!("Task queue full, rejecting task {}", rejected.task.task_id);
                let _ = rejected.reply.send(Err(PoolError::QueueFull(self.queue.len())));
            }
        }
    }

    fn idle_worker(&self) -> Option<u64> {
        self.workers
            .values()
            .find(|worker| !worker.is_busy())
            .map(|worker| worker.id)
    }

    fn dispatch(&mut self, worker_id: u64, pending: PendingTask) {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return;
        };

        let task_id = pending.task.task_id;
        let events = self.events.clone();
        let timeout = pending.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(PoolEvent::TimedOut { worker_id, task_id });
        });

        let now = Instant::now();
        worker.in_flight = Some(InFlight {
            task_id,
            reply: Some(pending.reply),
            started_at: now,
            timeout,
            timer: timer.abort_handle(),
        });
        worker.last_activity = now;

        debug!(worker_id, %task_id, operation = %pending.task.operation, "Dispatching task");
        if !worker.send(WorkerRequest::Execute(pending.task)) {
            // The driver is gone; its exit event resolves the task
            warn!(worker_id, "Worker driver already stopped");
        }
    }

    /// Hand queued tasks to idle workers
    fn drain_queue(&mut self) {
        if !matches!(self.state, PoolState::Running) {
            return;
        }
        while let Some(worker_id) = self.idle_worker() {
            let Some(pending) = self.queue.pop() else {
                break;
            };
            if pending.reply.is_closed() {
                debug!("Caller gave up on task {}, skipping", pending.task.task_id);
                self.counters.failed += 1;
                continue;
            }
            self.dispatch(worker_id, pending);
        }
    }

    fn handle_event(&mut self, event: PoolEvent) {
        match event {
            PoolEvent::Reply { worker_id, reply } => self.handle_reply(worker_id, reply),
            PoolEvent::TimedOut { worker_id, task_id } => self.handle_timeout(worker_id, task_id),
            PoolEvent::Exited { worker_id, status } => {
                self.handle_lost_worker(worker_id, format!("worker {} exited ({})", worker_id, status))
            }
            PoolEvent::Unreadable { worker_id, error } => self.handle_lost_worker(
                worker_id,
                format!("worker {} produced unreadable output: {}", worker_id, error),
            ),
            PoolEvent::ShutdownDeadline => {
                if matches!(self.state, PoolState::Draining { .. }) {
                    warn!("Shutdown deadline reached, killing remaining workers");
                    self.finish_shutdown();
                }
            }
        }
        self.after_change();
    }

    fn handle_reply(&mut self, worker_id: u64, reply: WorkerReply) {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            debug!(worker_id, "Ignoring reply from retired worker");
            return;
        };
        worker.last_activity = Instant::now();

        match reply {
            WorkerReply::Ready { pid, .. } => {
                debug!(worker_id, pid, "Worker ready");
                worker.pid.get_or_insert(pid);
            }
            WorkerReply::Pong { tasks_executed, .. } => {
                debug!(worker_id, tasks_executed, "Worker answered ping");
            }
            WorkerReply::Result(response) => self.handle_response(worker_id, response),
            WorkerReply::Error { task_id, error } => {
                let in_flight_id = worker.in_flight.as_ref().map(|f| f.task_id);
                match (task_id, in_flight_id) {
                    (Some(id), Some(current)) if id != current => {
                        warn!(worker_id, "Worker error for unknown task {}: {}", id, error);
                    }
                    (_, Some(_)) => self.finish_task(worker_id, Err(PoolError::Ipc(error)), None),
                    (_, None) => warn!(worker_id, "Worker reported an error while idle: {}", error),
                }
            }
        }
    }

    fn handle_response(&mut self, worker_id: u64, response: WorkerResponse) {
        let matches_current = self
            .workers
            .get(&worker_id)
            .and_then(|w| w.in_flight.as_ref())
            .is_some_and(|f| f.task_id == response.task_id);
        if !matches_current {
            debug!(worker_id, task_id = %response.task_id, "Ignoring stale response");
            return;
        }

        let result = if response.success {
            Ok(response.result.unwrap_or(JsonValue::Null))
        } else {
            Err(PoolError::TaskFailed(
                response.error.unwrap_or_else(|| "worker reported failure without a message".to_string()),
            ))
        };
        self.finish_task(worker_id, result, Some(Duration::from_millis(response.duration_ms)));
    }

    /// Resolve a worker's in-flight task after the worker answered for it
    fn finish_task(&mut self, worker_id: u64, result: Result<JsonValue, PoolError>, reported: Option<Duration>) {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return;
        };
        let Some(mut in_flight) = worker.in_flight.take() else {
            return;
        };

        let duration = reported.unwrap_or_else(|| in_flight.started_at.elapsed());
        self.counters.record_answer(result.is_ok(), duration);
        in_flight.resolve(result);

        worker.tasks_completed += 1;
        if worker.tasks_completed >= self.config.max_tasks_per_worker {
            info!(worker_id, tasks = worker.tasks_completed, "Recycling worker");
            self.counters.recycled += 1;
            self.retire(worker_id);
            self.replace();
        }
    }

    fn handle_timeout(&mut self, worker_id: u64, task_id: uuid::Uuid) {
        let current = self
            .workers
            .get(&worker_id)
            .and_then(|w| w.in_flight.as_ref())
            .map(|f| f.task_id);
        if current != Some(task_id) {
            return;
        }

        let Some(mut worker) = self.workers.remove(&worker_id) else {
            return;
        };
        if let Some(mut in_flight) = worker.in_flight.take() {
            warn!(worker_id, %task_id, "Task timed out after {:?}, replacing worker", in_flight.timeout);
            self.counters.failed += 1;
            self.counters.timed_out += 1;
            in_flight.resolve(Err(PoolError::Timeout(in_flight.timeout)));
        }
        worker.kill();
        self.replace();
    }

    /// A worker died or became unusable without the pool asking for it
    fn handle_lost_worker(&mut self, worker_id: u64, reason: String) {
        let Some(mut worker) = self.workers.remove(&worker_id) else {
            debug!(worker_id, "Retired worker exited");
            return;
        };
        worker.kill();

        if let Some(mut in_flight) = worker.in_flight.take() {
            error!(worker_id, task_id = %in_flight.task_id, "Worker crashed: {}", reason);
            self.counters.failed += 1;
            self.counters.crashed += 1;
            in_flight.resolve(Err(PoolError::WorkerCrashed(reason)));
        } else if matches!(self.state, PoolState::Running) {
            warn!(worker_id, "Idle worker lost: {}", reason);
        }
        self.replace();
    }

    fn health_check(&mut self) {
        if !matches!(self.state, PoolState::Running) {
            return;
        }

        let stale_after = self.config.stale_after();
        let stale: Vec<u64> = self
            .workers
            .values()
            .filter(|w| w.in_flight.as_ref().is_some_and(|f| f.is_stale(stale_after)))
            .map(|w| w.id)
            .collect();

        for worker_id in stale {
            if let Some(mut worker) = self.workers.remove(&worker_id) {
                if let Some(mut in_flight) = worker.in_flight.take() {
                    let elapsed = in_flight.started_at.elapsed();
                    warn!(worker_id, "Worker busy for {:?}, presumed hung", elapsed);
                    self.counters.failed += 1;
                    self.counters.timed_out += 1;
                    in_flight.resolve(Err(PoolError::Timeout(elapsed)));
                }
                worker.kill();
            }
        }

        for worker in self.workers.values().filter(|w| !w.is_busy()) {
            worker.send(WorkerRequest::Ping);
        }

        self.top_up();
        self.drain_queue();
    }

    fn retire(&mut self, worker_id: u64) {
        if let Some(mut worker) = self.workers.remove(&worker_id) {
            debug!(
                worker_id,
                age = ?worker.created_at.elapsed(),
                "Retiring worker"
            );
            worker.kill();
        }
    }

    /// Spawn one worker in place of a removed one, unless shutting down
    fn replace(&mut self) {
        if matches!(self.state, PoolState::Running) && self.workers.len() < self.config.worker_count {
            self.spawn_worker();
        }
    }

    /// Bring the pool back to `worker_count`
    fn top_up(&mut self) {
        while matches!(self.state, PoolState::Running) && self.workers.len() < self.config.worker_count {
            if !self.spawn_worker() {
                break;
            }
        }
    }

    fn spawn_worker(&mut self) -> bool {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        match WorkerHandle::spawn(id, &self.config.worker_command, self.events.clone()) {
            Ok(worker) => {
                self.workers.insert(id, worker);
                true
            }
            Err(e) => {
                error!("Failed to spawn worker {}: {}", id, e);
                false
            }
        }
    }

    fn after_change(&mut self) {
        match self.state {
            PoolState::Running => self.drain_queue(),
            PoolState::Draining { .. } => {
                if self.workers.values().all(|w| !w.is_busy()) {
                    self.finish_shutdown();
                }
            }
            PoolState::Stopped => {}
        }
    }

    fn begin_shutdown(&mut self, deadline: Duration, done: oneshot::Sender<()>) {
        match &mut self.state {
            PoolState::Stopped => {
                let _ = done.send(());
                return;
            }
            PoolState::Draining { waiters } => {
                waiters.push(done);
                return;
            }
            PoolState::Running => {}
        }

        let queued = self.queue.drain();
        info!(
            "Shutting down worker pool ({} queued task(s) rejected, deadline {:?})",
            queued.len(),
            deadline
        );
        for pending in queued {
            self.counters.failed += 1;
            let _ = pending.reply.send(Err(PoolError::ShuttingDown));
        }

        self.state = PoolState::Draining { waiters: vec![done] };
        if self.workers.values().all(|w| !w.is_busy()) {
            self.finish_shutdown();
            return;
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let _ = events.send(PoolEvent::ShutdownDeadline);
        });
    }

    /// Kill every worker, rejecting whatever they were still running
    fn finish_shutdown(&mut self) {
        for pending in self.queue.drain() {
            let _ = pending.reply.send(Err(PoolError::ShuttingDown));
        }

        for (_, mut worker) in std::mem::take(&mut self.workers) {
            if let Some(mut in_flight) = worker.in_flight.take() {
                self.counters.failed += 1;
                in_flight.resolve(Err(PoolError::ShuttingDown));
            }
            worker.kill();
        }

        if let PoolState::Draining { waiters } = std::mem::replace(&mut self.state, PoolState::Stopped) {
            info!("Worker pool stopped");
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
        self.state = PoolState::Stopped;
    }
}
