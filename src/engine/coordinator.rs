// src/engine/coordinator.rs

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::{AttemptStatus, IntervalScheduler, ScheduledAttempt};
use crate::exec::{run_attempt, ExecutorBackend, TaskContext, TaskInvocation};
use crate::history::{IntervalReport, RunHistory};
use crate::schedule::Interval;
use crate::workflow::Workflow;

use super::core::CoordinatorCore;
use super::{CoreCommand, RunEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Executes interval runs of one workflow.
///
/// This is the IO shell around [`CoordinatorCore`]: it feeds events into the
/// core, spawns attempts on the executor backend, times retry backoffs and
/// forwards cancellation. All run semantics live in the core.
pub struct RunCoordinator<E: ExecutorBackend + 'static> {
    workflow: Arc<Workflow>,
    executor: Arc<E>,
    history: Arc<dyn RunHistory>,
}

impl<E: ExecutorBackend + 'static> fmt::Debug for RunCoordinator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCoordinator")
            .field("workflow", &self.workflow.id())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend + 'static> RunCoordinator<E> {
    pub fn new(workflow: Arc<Workflow>, executor: Arc<E>, history: Arc<dyn RunHistory>) -> Self {
        Self {
            workflow,
            executor,
            history,
        }
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    /// Run every task of the workflow for `interval` until each task run is
    /// terminal or `cancel` fires, then report the result to run history.
    ///
    /// Independent tasks run concurrently, up to the workflow's
    /// `max_concurrent_tasks`.
    pub async fn run_interval(&self, interval: Interval, cancel: CancellationToken) -> IntervalReport {
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        // Fired only through `CoreCommand::CancelRunning`, so the core sees
        // the cancellation before any attempt reports it.
        let attempts_cancel = CancellationToken::new();
        let mut spawned: JoinSet<()> = JoinSet::new();

        let scheduler = IntervalScheduler::new(Arc::clone(&self.workflow), interval);
        let mut core = CoordinatorCore::new(scheduler, self.workflow.max_concurrent_tasks());
        let mut seed = Some(RunEvent::Start);
        let mut cancel_seen = false;

        loop {
            let next = match seed.take() {
                Some(event) => Some(event),
                None => tokio::select! {
                    biased;

                    _ = cancel.cancelled(), if !cancel_seen => {
                        cancel_seen = true;
                        Some(RunEvent::CancelRequested)
                    }

                    event = event_rx.recv() => event,

                    Some(joined) = spawned.join_next(), if !spawned.is_empty() => {
                        if let Err(e) = joined {
                            if e.is_panic() {
                                warn!(interval = %interval, error = %e, "coordinator helper task panicked");
                            }
                        }
                        continue;
                    }
                },
            };

            // The coordinator keeps a sender alive, so the channel never
            // closes while we are looping.
            let Some(event) = next else {
                warn!(interval = %interval, "event channel closed unexpectedly");
                break;
            };

            debug!(?event, interval = %interval, "coordinator received event");

            let step = core.step(event, Utc::now());
            for command in step.commands {
                self.execute_command(command, &event_tx, &attempts_cancel, &mut spawned);
            }

            if !step.keep_running {
                break;
            }
        }

        // Anything still running belongs to a cancelled interval.
        attempts_cancel.cancel();
        spawned.shutdown().await;

        let report = core.into_report();
        for record in &report.tasks {
            if !self.history.record(record.clone()) {
                debug!(
                    task = %record.task,
                    interval = %record.interval,
                    "run history already holds this task run; skipped"
                );
            }
        }

        info!(
            workflow = %report.workflow_id,
            interval = %report.interval,
            state = ?report.state,
            "interval run reported"
        );
        report
    }

    fn execute_command(
        &self,
        command: CoreCommand,
        event_tx: &mpsc::Sender<RunEvent>,
        attempts_cancel: &CancellationToken,
        spawned: &mut JoinSet<()>,
    ) {
        match command {
            CoreCommand::Dispatch(attempts) => {
                let names: Vec<_> = attempts.iter().map(|a| a.task.as_str()).collect();
                debug!(?names, "dispatching attempts");
                for attempt in attempts {
                    self.spawn_attempt(attempt, event_tx.clone(), attempts_cancel.clone(), spawned);
                }
            }
            CoreCommand::ScheduleRetry { task, delay } => {
                let tx = event_tx.clone();
                spawned.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(RunEvent::RetryDue { task }).await;
                });
            }
            CoreCommand::CancelRunning => {
                info!("cancelling running attempts");
                attempts_cancel.cancel();
            }
            CoreCommand::Finish(state) => {
                debug!(?state, "core reported interval finished");
            }
        }
    }

    fn spawn_attempt(
        &self,
        attempt: ScheduledAttempt,
        event_tx: mpsc::Sender<RunEvent>,
        cancel: CancellationToken,
        spawned: &mut JoinSet<()>,
    ) {
        let ScheduledAttempt {
            task,
            interval,
            attempt,
            started_at,
        } = attempt;

        let spec = self.workflow.require_task(&task).cloned();
        let executor = Arc::clone(&self.executor);
        let workflow_id = self.workflow.id().to_string();

        spawned.spawn(async move {
            let status = match spec {
                Ok(spec) => {
                    let invocation = TaskInvocation {
                        context: TaskContext {
                            workflow_id,
                            task: task.clone(),
                            interval,
                            attempt,
                        },
                        runnable: spec.runnable,
                        cancel,
                    };
                    run_attempt(executor.as_ref(), invocation, spec.execution_timeout).await
                }
                Err(e) => AttemptStatus::Faulted(e.to_string()),
            };

            let _ = event_tx
                .send(RunEvent::AttemptFinished {
                    task,
                    attempt,
                    started_at,
                    status,
                })
                .await;
        });
    }
}
