use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tickdag::exec::{ExecutorBackend, Outcome, TaskInvocation};

/// One recorded call into the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedAttempt {
    pub task: String,
    pub interval_start: DateTime<Utc>,
    pub attempt: u32,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, VecDeque<Outcome>>,
    delays: HashMap<String, Duration>,
    hanging: HashSet<String>,
    log: Vec<ExecutedAttempt>,
    running: usize,
    max_running: usize,
}

/// A fake executor that:
/// - records every attempt it is asked to run
/// - answers with scripted outcomes per task (`Success` once the script is
///   exhausted)
/// - optionally sleeps per task, or hangs until cancelled
/// - tracks how many attempts ran at the same time
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    state: Arc<Mutex<State>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes returned for successive attempts of `task`, across intervals.
    pub fn script(self, task: &str, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.lock()
            .scripts
            .entry(task.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// `task` takes `delay` before answering.
    pub fn delay(self, task: &str, delay: Duration) -> Self {
        self.lock().delays.insert(task.to_string(), delay);
        self
    }

    /// `task` never finishes unless cancelled.
    pub fn hang(self, task: &str) -> Self {
        self.lock().hanging.insert(task.to_string());
        self
    }

    pub fn executions(&self) -> Vec<ExecutedAttempt> {
        self.lock().log.clone()
    }

    pub fn executed_tasks(&self) -> Vec<String> {
        self.lock().log.iter().map(|e| e.task.clone()).collect()
    }

    pub fn attempts_of(&self, task: &str) -> usize {
        self.lock().log.iter().filter(|e| e.task == task).count()
    }

    pub fn max_concurrency(&self) -> usize {
        self.lock().max_running
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("executor state poisoned")
    }
}

/// Decrements the running counter even when the attempt future is dropped.
struct RunningGuard(Arc<Mutex<State>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.lock() {
            state.running = state.running.saturating_sub(1);
        }
    }
}

impl ExecutorBackend for ScriptedExecutor {
    fn execute(
        &self,
        invocation: TaskInvocation,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + '_>> {
        let ctx = invocation.context;
        let cancel = invocation.cancel;

        let (outcome, delay, hang) = {
            let mut state = self.lock();
            state.log.push(ExecutedAttempt {
                task: ctx.task.clone(),
                interval_start: ctx.interval.start(),
                attempt: ctx.attempt,
            });
            state.running += 1;
            state.max_running = state.max_running.max(state.running);

            let outcome = state
                .scripts
                .get_mut(&ctx.task)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Outcome::Success);
            let delay = state.delays.get(&ctx.task).copied();
            let hang = state.hanging.contains(&ctx.task);
            (outcome, delay, hang)
        };
        let guard = RunningGuard(Arc::clone(&self.state));

        Box::pin(async move {
            let _guard = guard;

            if hang {
                cancel.cancelled().await;
                return Outcome::Failure("cancelled".to_string());
            }

            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Outcome::Failure("cancelled".to_string()),
                }
            }

            outcome
        })
    }
}
