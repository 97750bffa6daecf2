// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The coordinator talks to an `ExecutorBackend` instead of running task
//! bodies itself. This makes it easy to swap in a scripted executor in tests
//! while keeping the production implementation in [`RunnableExecutor`].

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::exec::runnable::{Outcome, Runnable, TaskContext};
use crate::exec::task_runner::{run_callable, run_shell};

/// Everything an executor needs for one attempt.
#[derive(Debug, Clone)]
pub struct TaskInvocation {
    pub context: TaskContext,
    pub runnable: Runnable,
    /// Fires when the interval is cancelled. Implementations should stop
    /// promptly; the coordinator stops waiting either way.
    pub cancel: CancellationToken,
}

/// Trait abstracting how a single attempt is executed.
///
/// Production code uses [`RunnableExecutor`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send + Sync {
    fn execute(
        &self,
        invocation: TaskInvocation,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + '_>>;
}

/// Real executor backend: runs shell commands as child processes and
/// callables on Tokio's blocking pool.
#[derive(Debug, Clone, Default)]
pub struct RunnableExecutor;

impl RunnableExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorBackend for RunnableExecutor {
    fn execute(
        &self,
        invocation: TaskInvocation,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + '_>> {
        Box::pin(async move {
            let TaskInvocation {
                context,
                runnable,
                cancel,
            } = invocation;

            match runnable {
                Runnable::Shell(cmd) => run_shell(&context, &cmd, cancel).await,
                Runnable::Callable(callable) => run_callable(context, callable, cancel).await,
            }
        })
    }
}
