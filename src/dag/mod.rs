// src/dag/mod.rs

//! Task graph and per-interval scheduling.
//!
//! - [`graph`] holds the acyclic task graph shared by every run.
//! - [`scheduler`] contains the per-interval state machine that decides
//!   which tasks are ready, when to retry and what fails with a task.
//! - [`task_run`] provides the per-task run state and attempt records.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] applies dependency-driven state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_run;

pub use graph::Graph;
pub use scheduler::IntervalScheduler;
pub use scheduler_step::SchedulerStep;
pub use task_run::{
    AttemptRecord, AttemptStatus, FailureReason, ScheduledAttempt, TaskRun, TaskRunState,
};
