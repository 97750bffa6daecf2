// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually running task bodies and turning
//! what happens into an [`AttemptStatus`](crate::dag::AttemptStatus) for the
//! coordinator.
//!
//! - [`runnable`] defines the two kinds of task body (shell command and
//!   in-process callable) and the context they receive.
//! - [`task_runner`] runs a single attempt, including timeouts and
//!   cancellation.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RunnableExecutor` used in production, which tests can replace with a
//!   scripted implementation.

pub mod backend;
pub mod runnable;
pub mod task_runner;

pub use backend::{ExecutorBackend, RunnableExecutor, TaskInvocation};
pub use runnable::{
    Callable, CallableFn, CallableRegistry, Outcome, Runnable, ShellCommand, TaskContext,
};
pub use task_runner::run_attempt;
