use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{deps_satisfied, StateManager};
use crate::dag::task_run::{
    AttemptRecord, AttemptStatus, FailureReason, ScheduledAttempt, TaskRun, TaskRunState,
};
use crate::engine::TaskName;
use crate::history::{IntervalReport, TaskRunRecord};
use crate::schedule::Interval;
use crate::types::IntervalState;
use crate::workflow::Workflow;

/// Per-interval state machine over the workflow's task graph.
///
/// It is responsible for:
/// - creating one `Pending` task run per task and seeding the roots
/// - moving tasks to `Ready` once every upstream succeeded
/// - recording attempts and consulting the retry policy on failure
/// - failing everything downstream of a task that gave up
/// - knowing when every task run is terminal
///
/// It performs no IO and holds no Tokio types; the caller supplies `now`.
#[derive(Debug)]
pub struct IntervalScheduler {
    workflow: Arc<Workflow>,
    interval: Interval,
    runs: HashMap<TaskName, TaskRun>,
    started: bool,
    cancelled: bool,
    finished: bool,
}

impl IntervalScheduler {
    pub fn new(workflow: Arc<Workflow>, interval: Interval) -> Self {
        let runs = workflow
            .graph()
            .tasks()
            .map(|name| (name.to_string(), TaskRun::new(name.to_string())))
            .collect();

        Self {
            workflow,
            interval,
            runs,
            started: false,
            cancelled: false,
            finished: false,
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn task_run(&self, task: &str) -> Option<&TaskRun> {
        self.runs.get(task)
    }

    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        self.runs.get(task).map(|run| run.state)
    }

    /// Whether every upstream of `task` has succeeded in this interval.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        if !self.runs.contains_key(task) {
            return None;
        }
        Some(deps_satisfied(self.workflow.graph(), &self.runs, task))
    }

    /// Aggregate result once finished: succeeded iff every task run did.
    pub fn final_state(&self) -> Option<IntervalState> {
        if !self.finished {
            return None;
        }
        let all_ok = self
            .runs
            .values()
            .all(|run| run.state == TaskRunState::Succeeded);
        Some(if all_ok {
            IntervalState::Succeeded
        } else {
            IntervalState::Failed
        })
    }

    /// Ready tasks in declaration order.
    pub fn ready_tasks(&self) -> Vec<TaskName> {
        self.workflow
            .graph()
            .tasks()
            .filter(|name| self.run_state_of(name) == Some(TaskRunState::Ready))
            .map(str::to_string)
            .collect()
    }

    /// Begin the interval: every root moves to `Ready`.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(interval = %self.interval, "interval run already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;

        info!(
            workflow = %self.workflow.id(),
            interval = %self.interval,
            tasks = self.runs.len(),
            "starting interval run"
        );

        let mut manager = StateManager::new(self.workflow.graph(), &mut self.runs);
        let newly_ready = manager.promote_roots();

        SchedulerStep {
            newly_ready,
            run_just_finished: self.maybe_finish(),
            ..SchedulerStep::default()
        }
    }

    /// Dispatch a `Ready` task: it becomes `Running` and gets its next
    /// attempt number.
    pub fn mark_running(&mut self, task: &str, now: DateTime<Utc>) -> Option<ScheduledAttempt> {
        let satisfied = deps_satisfied(self.workflow.graph(), &self.runs, task);
        let run = self.runs.get_mut(task)?;

        if run.state != TaskRunState::Ready {
            warn!(task = %task, state = %run.state, "mark_running on a task that is not Ready; ignoring");
            return None;
        }
        if !satisfied {
            warn!(task = %task, "Ready task has unsatisfied upstream; refusing to run it");
            return None;
        }

        run.state = TaskRunState::Running;
        run.running_since = Some(now);
        run.next_eligible_at = None;
        let attempt = run.attempt_count() + 1;

        debug!(
            task = %task,
            interval = %self.interval,
            attempt,
            "marked Running"
        );

        Some(ScheduledAttempt {
            task: task.to_string(),
            interval: self.interval,
            attempt,
            started_at: now,
        })
    }

    /// Record the end of a `Running` attempt and apply the resulting
    /// transitions.
    ///
    /// Reports for tasks that are not `Running` (for example after the
    /// interval was cancelled) are ignored.
    pub fn handle_completion(
        &mut self,
        task: &str,
        status: AttemptStatus,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SchedulerStep {
        let policy = self
            .workflow
            .task(task)
            .map(|spec| spec.retry)
            .unwrap_or_default();
        let cancelled = self.cancelled;

        let Some(run) = self.runs.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        if run.state != TaskRunState::Running {
            debug!(
                task = %task,
                state = %run.state,
                "completion for a task that is not Running; ignoring"
            );
            return SchedulerStep::default();
        }

        let number = run.attempt_count() + 1;
        run.running_since = None;
        run.attempts.push(AttemptRecord {
            number,
            started_at,
            finished_at: now,
            status: status.clone(),
        });

        let mut step = SchedulerStep::default();

        match status {
            AttemptStatus::Succeeded => {
                run.state = TaskRunState::Succeeded;
                info!(task = %task, interval = %self.interval, attempt = number, "task succeeded");
                let mut manager = StateManager::new(self.workflow.graph(), &mut self.runs);
                step.newly_ready = manager.promote_ready_downstream(task);
            }
            AttemptStatus::Cancelled => {
                run.state = TaskRunState::Failed;
                run.failure = Some(FailureReason::Cancelled);
                warn!(task = %task, interval = %self.interval, attempt = number, "task attempt cancelled");
                step.newly_failed.push(task.to_string());
                let mut manager = StateManager::new(self.workflow.graph(), &mut self.runs);
                step.newly_failed.extend(manager.mark_downstream_failed(task));
            }
            failure => {
                if policy.should_retry(number) && !cancelled {
                    let delay = policy.backoff_delay(number);
                    run.state = TaskRunState::UpForRetry;
                    run.next_eligible_at = TimeDelta::from_std(delay)
                        .ok()
                        .and_then(|d| now.checked_add_signed(d));
                    warn!(
                        task = %task,
                        interval = %self.interval,
                        attempt = number,
                        max_retries = policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        status = ?failure,
                        "attempt failed; scheduling retry"
                    );
                    step.retries_scheduled.push((task.to_string(), delay));
                } else {
                    run.state = TaskRunState::Failed;
                    run.failure = Some(FailureReason::ExecutionFailure);
                    warn!(
                        task = %task,
                        interval = %self.interval,
                        attempt = number,
                        status = ?failure,
                        "task failed; failing downstream tasks in this interval"
                    );
                    step.newly_failed.push(task.to_string());
                    let mut manager = StateManager::new(self.workflow.graph(), &mut self.runs);
                    step.newly_failed.extend(manager.mark_downstream_failed(task));
                }
            }
        }

        step.run_just_finished = self.maybe_finish();
        step
    }

    /// The backoff delay of `task` has elapsed: `UpForRetry` becomes `Ready`.
    pub fn handle_retry_due(&mut self, task: &str) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        match self.runs.get_mut(task) {
            Some(run) if run.state == TaskRunState::UpForRetry => {
                run.state = TaskRunState::Ready;
                run.next_eligible_at = None;
                debug!(task = %task, next_attempt = run.attempt_count() + 1, "retry due; marked Ready");
                step.newly_ready.push(task.to_string());
            }
            Some(run) => {
                debug!(task = %task, state = %run.state, "retry due for a task that is not UpForRetry; ignoring");
            }
            None => warn!(task = %task, "retry due for unknown task; ignoring"),
        }
        step
    }

    /// Cancel the interval: every non-terminal task run fails without
    /// further execution. Attempts still running are recorded as
    /// `Cancelled`, finishing at `now`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> SchedulerStep {
        if self.finished {
            return SchedulerStep::default();
        }
        self.cancelled = true;

        let mut manager = StateManager::new(self.workflow.graph(), &mut self.runs);
        let newly_failed = manager.fail_all_non_terminal(FailureReason::Cancelled, now);
        info!(
            interval = %self.interval,
            cancelled_tasks = newly_failed.len(),
            "interval run cancelled"
        );

        SchedulerStep {
            newly_failed,
            run_just_finished: self.maybe_finish(),
            ..SchedulerStep::default()
        }
    }

    /// Consume the scheduler into a report with per-task detail.
    pub fn into_report(self) -> IntervalReport {
        let state = self.final_state().unwrap_or(IntervalState::Failed);
        let workflow_id = self.workflow.id().to_string();
        let mut runs = self.runs;

        let tasks = self
            .workflow
            .graph()
            .tasks()
            .filter_map(|name| runs.remove(name))
            .map(|run| TaskRunRecord {
                workflow_id: workflow_id.clone(),
                interval: self.interval,
                task: run.task,
                final_state: run.state,
                failure: run.failure,
                attempts: run.attempts,
            })
            .collect();

        IntervalReport {
            workflow_id,
            interval: self.interval,
            state,
            tasks,
        }
    }

    /// Mark the run finished once every task run is terminal.
    ///
    /// Returns `true` only for the call that made the transition.
    fn maybe_finish(&mut self) -> bool {
        if self.finished {
            return false;
        }

        let manager = StateManager::new(self.workflow.graph(), &mut self.runs);
        if manager.all_terminal() {
            self.finished = true;
            info!(
                workflow = %self.workflow.id(),
                interval = %self.interval,
                cancelled = self.cancelled,
                "all task runs terminal; interval run finished"
            );
            true
        } else {
            false
        }
    }
}
