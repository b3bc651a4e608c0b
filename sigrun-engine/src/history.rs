//! Bounded execution history, newest records kept

use std::collections::VecDeque;

use parking_lot::Mutex;
use sigrun_core::ExecutionRecord;

pub const DEFAULT_MAX_HISTORY_SIZE: usize = 1000;

#[derive(Debug)]
pub struct ExecutionHistory {
    records: Mutex<VecDeque<ExecutionRecord>>,
    capacity: usize,
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_SIZE)
    }
}

impl ExecutionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_MAX_HISTORY_SIZE))),
            capacity,
        }
    }

    /// Append a record, dropping the oldest when full
    pub fn push(&self, record: ExecutionRecord) {
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `limit` records, newest first
    pub fn recent(&self, limit: Option<usize>) -> Vec<ExecutionRecord> {
        let records = self.records.lock();
        let limit = limit.unwrap_or(records.len());
        records.iter().rev().take(limit).cloned().collect()
    }

    /// Records of one algorithm, newest first
    pub fn for_algorithm(&self, algorithm_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .filter(|record| record.algorithm_id == algorithm_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
