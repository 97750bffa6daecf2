use std::sync::Arc;
use std::time::Duration;

use tickdag::dag::{AttemptStatus, FailureReason, TaskRunState};
use tickdag::engine::RunCoordinator;
use tickdag::exec::{Outcome, Runnable};
use tickdag::history::{InMemoryRunHistory, RunHistory};
use tickdag::types::IntervalState;
use tickdag::workflow::TaskDecl;
use tickdag_test_utils::builders::{chain_workflow, first_interval, WorkflowFixture};
use tickdag_test_utils::fake_executor::ScriptedExecutor;
use tickdag_test_utils::{init_tracing, with_timeout};
use tokio_util::sync::CancellationToken;

fn fail(msg: &str) -> Outcome {
    Outcome::Failure(msg.to_string())
}

#[tokio::test(start_paused = true)]
async fn chain_runs_in_dependency_order() {
    init_tracing();
    let wf = chain_workflow("etl", &["extract", "transform", "load"], 0, Duration::ZERO);
    let executor = Arc::new(ScriptedExecutor::new());
    let history = Arc::new(InMemoryRunHistory::new());
    let coordinator = RunCoordinator::new(wf, Arc::clone(&executor), history.clone());

    let report = with_timeout(coordinator.run_interval(first_interval(), CancellationToken::new())).await;

    assert!(report.succeeded());
    assert_eq!(executor.executed_tasks(), vec!["extract", "transform", "load"]);
    assert!(executor
        .executions()
        .iter()
        .all(|e| e.interval_start == first_interval().start() && e.attempt == 1));
    assert_eq!(history.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_downstream_without_running_it() {
    init_tracing();
    // Default 5 minute delay; the paused clock skips the wait.
    let wf = chain_workflow("wf", &["a", "b"], 1, Duration::from_secs(300));
    let executor = Arc::new(ScriptedExecutor::new().script("a", [fail("one"), fail("two")]));
    let history = Arc::new(InMemoryRunHistory::new());
    let coordinator = RunCoordinator::new(wf, Arc::clone(&executor), history.clone());

    let started = tokio::time::Instant::now();
    let report = coordinator
        .run_interval(first_interval(), CancellationToken::new())
        .await;

    assert_eq!(report.state, IntervalState::Failed);
    assert!(started.elapsed() >= Duration::from_secs(300));

    let a = report.task("a").unwrap();
    assert_eq!(a.final_state, TaskRunState::Failed);
    assert_eq!(a.failure, Some(FailureReason::ExecutionFailure));
    assert_eq!(a.attempts.len(), 2);
    assert_eq!(a.attempts[1].status, AttemptStatus::Failed("two".to_string()));

    let b = report.task("b").unwrap();
    assert_eq!(b.final_state, TaskRunState::Failed);
    assert_eq!(b.failure, Some(FailureReason::UpstreamFailed));
    assert!(b.attempts.is_empty());
    assert_eq!(executor.attempts_of("b"), 0);

    assert_eq!(history.records().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    init_tracing();
    let wf = chain_workflow("wf", &["a", "b"], 3, Duration::from_secs(300));
    let executor = Arc::new(
        ScriptedExecutor::new().script("a", [fail("flaky"), Outcome::Fault("crash".into())]),
    );
    let history = Arc::new(InMemoryRunHistory::new());
    let coordinator = RunCoordinator::new(wf, Arc::clone(&executor), history);

    let report = coordinator
        .run_interval(first_interval(), CancellationToken::new())
        .await;

    assert!(report.succeeded());
    let a = report.task("a").unwrap();
    assert_eq!(
        a.attempts.iter().map(|r| r.number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(a.attempts[1].status, AttemptStatus::Faulted("crash".to_string()));
    assert_eq!(executor.attempts_of("b"), 1);
    assert_eq!(
        executor
            .executions()
            .iter()
            .filter(|e| e.task == "a")
            .map(|e| e.attempt)
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test(start_paused = true)]
async fn execution_timeout_counts_as_failed_attempt() {
    init_tracing();
    let wf = WorkflowFixture::new("wf")
        .decl(
            TaskDecl::new("slow", Runnable::shell("sleep 60"))
                .execution_timeout(Duration::from_secs(1)),
        )
        .build();
    let executor = Arc::new(ScriptedExecutor::new().delay("slow", Duration::from_secs(60)));
    let coordinator = RunCoordinator::new(wf, executor, Arc::new(InMemoryRunHistory::new()));

    let report = with_timeout(coordinator.run_interval(first_interval(), CancellationToken::new())).await;

    let slow = report.task("slow").unwrap();
    assert_eq!(slow.final_state, TaskRunState::Failed);
    assert_eq!(
        slow.attempts[0].status,
        AttemptStatus::TimedOut(Duration::from_secs(1))
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_fails_running_and_pending_tasks() {
    init_tracing();
    let wf = chain_workflow("wf", &["stuck", "after"], 0, Duration::ZERO);
    let executor = Arc::new(ScriptedExecutor::new().hang("stuck"));
    let history = Arc::new(InMemoryRunHistory::new());
    let coordinator = RunCoordinator::new(wf, Arc::clone(&executor), history.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let report = with_timeout(coordinator.run_interval(first_interval(), cancel)).await;

    assert_eq!(report.state, IntervalState::Failed);
    for task in ["stuck", "after"] {
        let record = report.task(task).unwrap();
        assert_eq!(record.final_state, TaskRunState::Failed);
        assert_eq!(record.failure, Some(FailureReason::Cancelled));
    }
    assert_eq!(executor.attempts_of("stuck"), 1);
    assert_eq!(executor.attempts_of("after"), 0);

    let stuck = report.task("stuck").unwrap();
    assert_eq!(stuck.attempts.len(), 1);
    assert_eq!(stuck.attempts[0].status, AttemptStatus::Cancelled);
    assert!(stuck.attempts[0].finished_at >= stuck.attempts[0].started_at);
    assert!(report.task("after").unwrap().attempts.is_empty());

    assert_eq!(history.len(), 2);
    let recorded = history
        .records()
        .into_iter()
        .find(|r| r.task == "stuck")
        .unwrap();
    assert_eq!(recorded.attempts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn independent_tasks_share_the_concurrency_limit() {
    init_tracing();
    let mut fixture = WorkflowFixture::new("fanout").max_concurrent_tasks(2);
    for task in ["a", "b", "c", "d", "e"] {
        fixture = fixture.task(task);
    }
    let wf = fixture.build();

    let mut executor = ScriptedExecutor::new();
    for task in ["a", "b", "c", "d", "e"] {
        executor = executor.delay(task, Duration::from_millis(100));
    }
    let executor = Arc::new(executor);
    let coordinator = RunCoordinator::new(wf, Arc::clone(&executor), Arc::new(InMemoryRunHistory::new()));

    let report = with_timeout(coordinator.run_interval(first_interval(), CancellationToken::new())).await;

    assert!(report.succeeded());
    assert_eq!(executor.executed_tasks().len(), 5);
    assert_eq!(executor.max_concurrency(), 2);
}

#[tokio::test(start_paused = true)]
async fn history_ignores_a_repeated_interval_report() {
    init_tracing();
    let wf = chain_workflow("wf", &["only"], 0, Duration::ZERO);
    let executor = Arc::new(ScriptedExecutor::new().script("only", [Outcome::Success, fail("late")]));
    let history = Arc::new(InMemoryRunHistory::new());
    let coordinator = RunCoordinator::new(wf, Arc::clone(&executor), history.clone());

    let first = coordinator
        .run_interval(first_interval(), CancellationToken::new())
        .await;
    let second = coordinator
        .run_interval(first_interval(), CancellationToken::new())
        .await;

    assert!(first.succeeded());
    assert!(!second.succeeded());

    let stored = history.records();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].final_state, TaskRunState::Succeeded);
    assert_eq!(
        history.last_recorded_interval("wf"),
        Some(first_interval().start())
    );
}
