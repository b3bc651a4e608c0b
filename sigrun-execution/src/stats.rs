//! Pool statistics

use serde::Serialize;
use std::time::Duration;

/// Point-in-time view of the pool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    pub pool_size: usize,
    pub busy_workers: usize,
    pub idle_workers: usize,
    pub queue_length: usize,
    /// Tasks accepted (dispatched or queued)
    pub total_submitted: u64,
    /// Tasks that returned a successful result
    pub total_completed: u64,
    /// Accepted tasks that did not succeed, for any reason
    pub total_failed: u64,
    pub total_timed_out: u64,
    pub total_crashed: u64,
    pub total_recycled: u64,
    /// Submissions refused because the queue was full
    pub total_rejected: u64,
    pub avg_task_duration_ms: f64,
}

/// Running counters, owned by the pool actor
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub crashed: u64,
    pub recycled: u64,
    pub rejected: u64,
    measured: u64,
    total_duration: Duration,
}

impl PoolCounters {
    /// A worker answered for a task after `duration`
    pub fn record_answer(&mut self, success: bool, duration: Duration) {
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        self.measured += 1;
        self.total_duration += duration;
    }

    pub fn snapshot(&self, pool_size: usize, busy_workers: usize, queue_length: usize) -> PoolStats {
        let avg_task_duration_ms = if self.measured == 0 {
            0.0
        } else {
            self.total_duration.as_secs_f64() * 1000.0 / self.measured as f64
        };

        PoolStats {
            pool_size,
            busy_workers,
            idle_workers: pool_size.saturating_sub(busy_workers),
            queue_length,
            total_submitted: self.submitted,
            total_completed: self.completed,
            total_failed: self.failed,
            total_timed_out: self.timed_out,
            total_crashed: self.crashed,
            total_recycled: self.recycled,
            total_rejected: self.rejected,
            avg_task_duration_ms,
        }
    }
}
