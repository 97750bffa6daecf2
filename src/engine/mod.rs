// src/engine/mod.rs

//! Orchestration engine for tickdag.
//!
//! This module ties together:
//! - the per-interval scheduler
//! - the coordinator event loop that reacts to:
//!   - attempt completions
//!   - elapsed retry backoffs
//!   - cancellation
//! - the recurring runtime that asks the schedule clock what is due
//!
//! The pure core state machine lives in [`core`]; the async/IO shell for one
//! interval is implemented in [`coordinator`], and [`runtime`] drives
//! coordinators from the schedule.

use chrono::{DateTime, Utc};

use crate::dag::AttemptStatus;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Events flowing into the coordinator of one interval run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Seed the run: roots become ready.
    Start,
    /// An attempt ended, one way or another.
    AttemptFinished {
        task: TaskName,
        attempt: u32,
        started_at: DateTime<Utc>,
        status: AttemptStatus,
    },
    /// The backoff delay of a task that is up for retry has elapsed.
    RetryDue { task: TaskName },
    /// The interval run should stop.
    CancelRequested,
}

pub mod coordinator;
pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use coordinator::RunCoordinator;
pub use core::CoordinatorCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::WorkflowRuntime;
