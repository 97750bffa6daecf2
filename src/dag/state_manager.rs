// src/dag/state_manager.rs

//! Per-interval state transitions for task runs.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::dag::task_run::{AttemptRecord, AttemptStatus, FailureReason, TaskRun, TaskRunState};
use crate::dag::Graph;
use crate::engine::TaskName;

/// Applies dependency-driven state transitions to the task runs of one
/// interval.
///
/// Every method that returns task names returns them in declaration order.
pub struct StateManager<'a> {
    graph: &'a Graph,
    runs: &'a mut HashMap<TaskName, TaskRun>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a Graph, runs: &'a mut HashMap<TaskName, TaskRun>) -> Self {
        Self { graph, runs }
    }

    /// Move every `Pending` root to `Ready`.
    pub fn promote_roots(&mut self) -> Vec<TaskName> {
        let roots: Vec<TaskName> = self.graph.roots().into_iter().map(str::to_string).collect();
        roots
            .into_iter()
            .filter(|name| self.promote_if_satisfied(name))
            .collect()
    }

    /// After `task` succeeded, move each direct downstream whose upstream
    /// all succeeded from `Pending` to `Ready`.
    pub fn promote_ready_downstream(&mut self, task: &str) -> Vec<TaskName> {
        let downstream: Vec<TaskName> = self
            .graph
            .downstream_of(task)
            .into_iter()
            .map(str::to_string)
            .collect();

        downstream
            .into_iter()
            .filter(|name| self.promote_if_satisfied(name))
            .collect()
    }

    /// Fail every non-terminal transitive downstream of `failed_task` as
    /// `UpstreamFailed`. These never get an attempt.
    ///
    /// Returns the tasks newly marked, excluding `failed_task` itself.
    pub fn mark_downstream_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<&str> = self.graph.downstream_of(failed_task);
        let mut visited: HashSet<&str> = HashSet::new();
        let mut marked: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name) {
                continue;
            }

            match self.runs.get_mut(name) {
                Some(run) if !run.state.is_terminal() => {
                    if run.state == TaskRunState::Running || run.state == TaskRunState::UpForRetry {
                        // Cannot happen while the ordering invariant holds.
                        warn!(task = %name, state = %run.state, "downstream of a failed task was already active");
                    }
                    run.state = TaskRunState::Failed;
                    run.running_since = None;
                    run.failure = Some(FailureReason::UpstreamFailed);
                    run.next_eligible_at = None;
                    debug!(task = %name, upstream = %failed_task, "marked Failed: upstream failed");
                    marked.insert(name.to_string());
                }
                Some(_) => {}
                None => warn!(task = %name, "node in graph not present in task runs"),
            }

            stack.extend(self.graph.downstream_of(name));
        }

        self.in_declaration_order(marked)
    }

    /// Fail every task run that has not reached a terminal state yet.
    ///
    /// A `Running` task run keeps its in-flight attempt as a `Cancelled`
    /// attempt record ending at `now`.
    pub fn fail_all_non_terminal(
        &mut self,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Vec<TaskName> {
        let mut failed = Vec::new();
        for name in self.graph.tasks() {
            if let Some(run) = self.runs.get_mut(name) {
                if !run.state.is_terminal() {
                    if run.state == TaskRunState::Running {
                        let number = run.attempt_count() + 1;
                        run.attempts.push(AttemptRecord {
                            number,
                            started_at: run.running_since.unwrap_or(now),
                            finished_at: now,
                            status: AttemptStatus::Cancelled,
                        });
                        debug!(task = %name, attempt = number, "in-flight attempt recorded as cancelled");
                    }
                    run.running_since = None;
                    run.state = TaskRunState::Failed;
                    run.failure = Some(reason);
                    run.next_eligible_at = None;
                    failed.push(name.to_string());
                }
            }
        }
        failed
    }

    pub fn all_terminal(&self) -> bool {
        self.runs.values().all(|run| run.state.is_terminal())
    }

    fn promote_if_satisfied(&mut self, name: &str) -> bool {
        let satisfied = deps_satisfied(self.graph, self.runs, name);
        match self.runs.get_mut(name) {
            Some(run) if run.state == TaskRunState::Pending && satisfied => {
                run.state = TaskRunState::Ready;
                debug!(task = %name, "upstream satisfied; marked Ready");
                true
            }
            _ => false,
        }
    }

    fn in_declaration_order(&self, set: HashSet<TaskName>) -> Vec<TaskName> {
        self.graph
            .tasks()
            .filter(|name| set.contains(*name))
            .map(str::to_string)
            .collect()
    }
}

/// Whether every upstream task run of `task` has succeeded.
pub fn deps_satisfied(graph: &Graph, runs: &HashMap<TaskName, TaskRun>, task: &str) -> bool {
    graph.upstream_of(task).into_iter().all(|up| {
        runs.get(up)
            .is_some_and(|run| run.state == TaskRunState::Succeeded)
    })
}
