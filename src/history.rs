// src/history.rs

//! Run-history collaborator.
//!
//! The coordinator reports one [`TaskRunRecord`] per task and interval once
//! the interval is over. Stores are append-only and must ignore a second
//! report for the same (workflow, interval, task).

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::{AttemptRecord, FailureReason, TaskRunState};
use crate::engine::TaskName;
use crate::schedule::Interval;
use crate::types::IntervalState;

/// Final record of one task within one interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRunRecord {
    pub workflow_id: String,
    pub interval: Interval,
    pub task: TaskName,
    pub final_state: TaskRunState,
    pub failure: Option<FailureReason>,
    pub attempts: Vec<AttemptRecord>,
}

/// Outcome of a whole interval run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalReport {
    pub workflow_id: String,
    pub interval: Interval,
    pub state: IntervalState,
    /// One record per task, in declaration order.
    pub tasks: Vec<TaskRunRecord>,
}

impl IntervalReport {
    pub fn task(&self, name: &str) -> Option<&TaskRunRecord> {
        self.tasks.iter().find(|record| record.task == name)
    }

    pub fn succeeded(&self) -> bool {
        self.state.is_success()
    }
}

pub trait RunHistory: Send + Sync {
    /// Append `record`. Returns `false` if a record for the same workflow,
    /// interval and task was already stored, in which case nothing changes.
    fn record(&self, record: TaskRunRecord) -> bool;

    /// Start of the latest interval with any stored record for `workflow_id`.
    fn last_recorded_interval(&self, workflow_id: &str) -> Option<DateTime<Utc>>;
}

/// Process-local history, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryRunHistory {
    inner: Mutex<HistoryState>,
}

#[derive(Debug, Default)]
struct HistoryState {
    records: Vec<TaskRunRecord>,
    seen: HashSet<(String, DateTime<Utc>, TaskName)>,
}

impl InMemoryRunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record in insertion order.
    pub fn records(&self) -> Vec<TaskRunRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryState> {
        // A poisoned lock only means another reporter panicked mid-append;
        // the vector and set are still consistent with each other.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunHistory for InMemoryRunHistory {
    fn record(&self, record: TaskRunRecord) -> bool {
        let mut state = self.lock();
        let key = (
            record.workflow_id.clone(),
            record.interval.start(),
            record.task.clone(),
        );

        if !state.seen.insert(key) {
            debug!(
                task = %record.task,
                interval = %record.interval,
                "duplicate task run report; ignoring"
            );
            return false;
        }

        state.records.push(record);
        true
    }

    fn last_recorded_interval(&self, workflow_id: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.workflow_id == workflow_id)
            .map(|r| r.interval.start())
            .max()
    }
}
