// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::history::{IntervalReport, RunHistory};
use crate::schedule::ScheduleClock;
use crate::workflow::Workflow;

use super::coordinator::RunCoordinator;

/// Drives a workflow on its schedule.
///
/// Each tick asks the [`ScheduleClock`] which intervals are due and runs
/// them through a shared [`RunCoordinator`], at most
/// `max_concurrent_intervals` at a time. Bookkeeping resumes from the run
/// history, so intervals already recorded are not materialized again.
pub struct WorkflowRuntime<E: ExecutorBackend + 'static> {
    workflow: Arc<Workflow>,
    clock: ScheduleClock,
    coordinator: Arc<RunCoordinator<E>>,
}

impl<E: ExecutorBackend + 'static> fmt::Debug for WorkflowRuntime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRuntime")
            .field("workflow", &self.workflow.id())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend + 'static> WorkflowRuntime<E> {
    pub fn new(workflow: Arc<Workflow>, executor: Arc<E>, history: Arc<dyn RunHistory>) -> Self {
        let mut clock = workflow.clock();
        if let Some(last) = history.last_recorded_interval(workflow.id()) {
            info!(
                workflow = %workflow.id(),
                last_interval_start = %last,
                "resuming schedule from run history"
            );
            clock = clock.resume_after(last);
        }

        let coordinator = Arc::new(RunCoordinator::new(
            Arc::clone(&workflow),
            executor,
            history,
        ));

        Self {
            workflow,
            clock,
            coordinator,
        }
    }

    pub fn clock(&self) -> &ScheduleClock {
        &self.clock
    }

    pub fn coordinator(&self) -> &Arc<RunCoordinator<E>> {
        &self.coordinator
    }

    /// Run every interval due at `now` and wait for all of them.
    ///
    /// `max_concurrent_intervals` bounds overlap within one tick; a tick
    /// returns only after all of its intervals finished, so intervals from
    /// different ticks never overlap.
    ///
    /// Intervals are started in ascending order. An interval is only marked
    /// materialized once it has been handed to a coordinator, so intervals
    /// skipped because of `shutdown` are picked up by a later tick.
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        shutdown: &CancellationToken,
    ) -> Result<Vec<IntervalReport>> {
        let due: Vec<_> = self.clock.due_intervals(now).collect();
        if due.is_empty() {
            debug!(workflow = %self.workflow.id(), now = %now, "nothing due");
            return Ok(Vec::new());
        }

        info!(
            workflow = %self.workflow.id(),
            due = due.len(),
            first = %due[0],
            "running due intervals"
        );

        let limit = Arc::new(Semaphore::new(self.workflow.max_concurrent_intervals()));
        let mut running = JoinSet::new();

        for interval in due {
            let permit = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    warn!(interval = %interval, "shutdown requested; not starting further intervals");
                    break;
                }

                permit = Arc::clone(&limit).acquire_owned() => {
                    permit.map_err(anyhow::Error::from)?
                }
            };

            self.clock.mark_materialized(&interval);

            let coordinator = Arc::clone(&self.coordinator);
            let cancel = shutdown.child_token();
            running.spawn(async move {
                let _permit = permit;
                coordinator.run_interval(interval, cancel).await
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = running.join_next().await {
            reports.push(joined.map_err(anyhow::Error::from)?);
        }
        reports.sort_by_key(|report| report.interval);

        Ok(reports)
    }

    /// Tick whenever the next interval becomes due, until `shutdown` fires or
    /// the schedule passes its `end_date`.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!(workflow = %self.workflow.id(), "workflow runtime started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            for report in self.tick(Utc::now(), &shutdown).await? {
                info!(
                    workflow = %report.workflow_id,
                    interval = %report.interval,
                    state = ?report.state,
                    "interval finished"
                );
            }

            let Some(due_at) = self.clock.next_due_at() else {
                info!(workflow = %self.workflow.id(), "schedule exhausted past end_date");
                break;
            };

            let wait = (due_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!(
                next_due_at = %due_at,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "sleeping until next interval"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!(workflow = %self.workflow.id(), "workflow runtime exiting");
        Ok(())
    }
}
