// src/lib.rs

//! tickdag: recurring workflows of dependent tasks.
//!
//! A [`workflow::Workflow`] is an acyclic graph of tasks on a fixed
//! cadence. The [`schedule::ScheduleClock`] decides which logical intervals
//! are due, an [`engine::RunCoordinator`] executes one interval with
//! per-task retries, and every task's final state lands in a
//! [`history::RunHistory`].

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod history;
pub mod logging;
pub mod retry;
pub mod schedule;
pub mod types;
pub mod workflow;

pub use errors::{DefinitionError, Result, TickdagError};
