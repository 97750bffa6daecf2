// src/engine/event_handlers.rs

//! Event handling logic for the coordinator core.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::{AttemptStatus, IntervalScheduler, ScheduledAttempt, SchedulerStep};
use crate::engine::TaskName;
use crate::types::IntervalState;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start these attempts.
    Dispatch(Vec<ScheduledAttempt>),
    /// Emit `RetryDue` for `task` once `delay` has elapsed.
    ScheduleRetry { task: TaskName, delay: Duration },
    /// Signal cancellation to every running attempt.
    CancelRunning,
    /// Every task run is terminal.
    Finish(IntervalState),
}

/// Decision returned by the core after handling a single `RunEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

/// Seed the run and dispatch the roots.
pub fn handle_start(
    scheduler: &mut IntervalScheduler,
    in_flight: &mut HashSet<TaskName>,
    max_concurrent_tasks: usize,
    now: DateTime<Utc>,
) -> CoreStep {
    let step = scheduler.start();
    finish_step(scheduler, in_flight, max_concurrent_tasks, step, now)
}

/// Handle the end of an attempt.
#[allow(clippy::too_many_arguments)]
pub fn handle_attempt_finished(
    scheduler: &mut IntervalScheduler,
    in_flight: &mut HashSet<TaskName>,
    max_concurrent_tasks: usize,
    task: TaskName,
    attempt: u32,
    status: AttemptStatus,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CoreStep {
    if !in_flight.remove(&task) {
        debug!(task = %task, attempt, "attempt finished for a task not in flight");
    }

    let step = scheduler.handle_completion(&task, status, started_at, now);
    finish_step(scheduler, in_flight, max_concurrent_tasks, step, now)
}

/// Handle an elapsed retry backoff.
pub fn handle_retry_due(
    scheduler: &mut IntervalScheduler,
    in_flight: &mut HashSet<TaskName>,
    max_concurrent_tasks: usize,
    task: TaskName,
    now: DateTime<Utc>,
) -> CoreStep {
    let step = scheduler.handle_retry_due(&task);
    finish_step(scheduler, in_flight, max_concurrent_tasks, step, now)
}

/// Cancel the interval run.
pub fn handle_cancel(
    scheduler: &mut IntervalScheduler,
    in_flight: &mut HashSet<TaskName>,
    now: DateTime<Utc>,
) -> CoreStep {
    let mut commands = Vec::new();
    scheduler.cancel(now);

    if !in_flight.is_empty() {
        commands.push(CoreCommand::CancelRunning);
        in_flight.clear();
    }

    let state = scheduler.final_state().unwrap_or(IntervalState::Failed);
    commands.push(CoreCommand::Finish(state));

    CoreStep {
        commands,
        keep_running: false,
    }
}

/// Turn a scheduler step into commands: retries to time, ready tasks to
/// dispatch within the concurrency limit, and the finish signal.
fn finish_step(
    scheduler: &mut IntervalScheduler,
    in_flight: &mut HashSet<TaskName>,
    max_concurrent_tasks: usize,
    step: SchedulerStep,
    now: DateTime<Utc>,
) -> CoreStep {
    let mut commands: Vec<CoreCommand> = step
        .retries_scheduled
        .into_iter()
        .map(|(task, delay)| CoreCommand::ScheduleRetry { task, delay })
        .collect();

    let attempts = dispatch_ready(scheduler, in_flight, max_concurrent_tasks, now);
    if !attempts.is_empty() {
        commands.push(CoreCommand::Dispatch(attempts));
    }

    let mut keep_running = true;
    if let Some(state) = scheduler.final_state() {
        commands.push(CoreCommand::Finish(state));
        keep_running = false;
    }

    CoreStep {
        commands,
        keep_running,
    }
}

/// Move ready tasks to running while slots are free.
fn dispatch_ready(
    scheduler: &mut IntervalScheduler,
    in_flight: &mut HashSet<TaskName>,
    max_concurrent_tasks: usize,
    now: DateTime<Utc>,
) -> Vec<ScheduledAttempt> {
    let mut attempts = Vec::new();

    for task in scheduler.ready_tasks() {
        if in_flight.len() >= max_concurrent_tasks {
            debug!(
                in_flight = in_flight.len(),
                max_concurrent_tasks,
                "task concurrency limit reached; leaving remaining tasks Ready"
            );
            break;
        }

        if let Some(attempt) = scheduler.mark_running(&task, now) {
            in_flight.insert(task);
            attempts.push(attempt);
        }
    }

    attempts
}
