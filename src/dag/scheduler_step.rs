// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the interval scheduler.

use std::time::Duration;

use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step an interval run and
/// make assertions about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks that moved to `Ready` in this step.
    pub newly_ready: Vec<TaskName>,
    /// Tasks that became `Failed` in this step, the failing task first and
    /// then any downstream tasks failed along with it.
    pub newly_failed: Vec<TaskName>,
    /// Tasks that moved to `UpForRetry`, with the delay before their next
    /// attempt.
    pub retries_scheduled: Vec<(TaskName, Duration)>,
    /// Whether this step brought every task run to a terminal state.
    pub run_just_finished: bool,
}
