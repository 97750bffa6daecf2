// src/dag/task_run.rs

//! Per-interval execution record of a single task.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::engine::TaskName;
use crate::exec::Outcome;
use crate::schedule::Interval;

/// State of a task within one interval run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRunState {
    /// Waiting on upstream tasks.
    Pending,
    /// All upstream succeeded; waiting for a concurrency slot.
    Ready,
    /// An attempt has been dispatched.
    Running,
    /// The last attempt failed; waiting out the backoff delay.
    UpForRetry,
    Succeeded,
    Failed,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskRunState::Succeeded | TaskRunState::Failed)
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskRunState::Pending => "pending",
            TaskRunState::Ready => "ready",
            TaskRunState::Running => "running",
            TaskRunState::UpForRetry => "up_for_retry",
            TaskRunState::Succeeded => "succeeded",
            TaskRunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a task run ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The task's own attempts failed and the retry policy gave up.
    ExecutionFailure,
    /// An upstream task failed; this one never ran.
    UpstreamFailed,
    /// The interval was cancelled before this task finished.
    Cancelled,
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    Succeeded,
    /// The runnable reported failure.
    Failed(String),
    /// The runnable crashed or could not be started.
    Faulted(String),
    /// The attempt exceeded the task's execution timeout.
    TimedOut(Duration),
    Cancelled,
}

impl AttemptStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptStatus::Succeeded)
    }
}

impl From<Outcome> for AttemptStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => AttemptStatus::Succeeded,
            Outcome::Failure(cause) => AttemptStatus::Failed(cause),
            Outcome::Fault(cause) => AttemptStatus::Faulted(cause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: AttemptStatus,
}

/// Mutable state of one task within one interval.
///
/// Only the owning interval scheduler mutates this.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub task: TaskName,
    pub state: TaskRunState,
    pub attempts: Vec<AttemptRecord>,
    /// Dispatch time of the current attempt while `Running`.
    pub running_since: Option<DateTime<Utc>>,
    /// Earliest time the next attempt may start while `UpForRetry`.
    pub next_eligible_at: Option<DateTime<Utc>>,
    /// Set once the task run is `Failed`.
    pub failure: Option<FailureReason>,
}

impl TaskRun {
    pub fn new(task: TaskName) -> Self {
        Self {
            task,
            state: TaskRunState::Pending,
            attempts: Vec::new(),
            running_since: None,
            next_eligible_at: None,
            failure: None,
        }
    }

    /// Number of attempts made so far.
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }
}

/// An attempt the scheduler wants executed now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAttempt {
    pub task: TaskName,
    pub interval: Interval,
    /// 1-based attempt number this dispatch represents.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}
