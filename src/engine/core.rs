// src/engine/core.rs

//! Pure coordinator state machine.
//!
//! [`CoordinatorCore`] consumes [`RunEvent`]s for one interval run and
//! produces:
//! - an updated per-interval scheduler state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::coordinator::RunCoordinator`) is responsible
//! for spawning attempts, timing retries and forwarding cancellation.
//!
//! Like the scheduler it wraps, the core is deterministic: callers pass in
//! `now`, and nothing here touches Tokio, channels or processes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::dag::IntervalScheduler;
use crate::engine::event_handlers::{
    handle_attempt_finished, handle_cancel, handle_retry_due, handle_start, CoreStep,
};
use crate::engine::{RunEvent, TaskName};
use crate::history::IntervalReport;

/// Pure coordinator state for one interval run.
#[derive(Debug)]
pub struct CoordinatorCore {
    scheduler: IntervalScheduler,
    max_concurrent_tasks: usize,
    in_flight: HashSet<TaskName>,
}

impl CoordinatorCore {
    pub fn new(scheduler: IntervalScheduler, max_concurrent_tasks: usize) -> Self {
        Self {
            scheduler,
            max_concurrent_tasks: max_concurrent_tasks.max(1),
            in_flight: HashSet::new(),
        }
    }

    pub fn scheduler(&self) -> &IntervalScheduler {
        &self.scheduler
    }

    /// Number of attempts currently dispatched and not yet reported.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Handle a single event, returning the commands for the IO shell.
    pub fn step(&mut self, event: RunEvent, now: DateTime<Utc>) -> CoreStep {
        match event {
            RunEvent::Start => handle_start(
                &mut self.scheduler,
                &mut self.in_flight,
                self.max_concurrent_tasks,
                now,
            ),
            RunEvent::AttemptFinished {
                task,
                attempt,
                started_at,
                status,
            } => handle_attempt_finished(
                &mut self.scheduler,
                &mut self.in_flight,
                self.max_concurrent_tasks,
                task,
                attempt,
                status,
                started_at,
                now,
            ),
            RunEvent::RetryDue { task } => handle_retry_due(
                &mut self.scheduler,
                &mut self.in_flight,
                self.max_concurrent_tasks,
                task,
                now,
            ),
            RunEvent::CancelRequested => {
                handle_cancel(&mut self.scheduler, &mut self.in_flight, now)
            }
        }
    }

    pub fn into_report(self) -> IntervalReport {
        self.scheduler.into_report()
    }
}
