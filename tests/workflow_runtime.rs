use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tickdag::engine::WorkflowRuntime;
use tickdag::history::{InMemoryRunHistory, RunHistory};
use tickdag_test_utils::builders::WorkflowFixture;
use tickdag_test_utils::fake_executor::ScriptedExecutor;
use tickdag_test_utils::{init_tracing, utc_date, with_timeout};
use tokio_util::sync::CancellationToken;

fn day(n: i64) -> chrono::DateTime<chrono::Utc> {
    utc_date(2024, 1, 1) + TimeDelta::days(n)
}

#[tokio::test(start_paused = true)]
async fn catchup_runs_every_missed_interval_once() {
    init_tracing();
    let wf = WorkflowFixture::new("daily").task("a").then("b").catchup(true).build();
    let executor = Arc::new(ScriptedExecutor::new());
    let history = Arc::new(InMemoryRunHistory::new());
    let mut runtime = WorkflowRuntime::new(wf, Arc::clone(&executor), history.clone());
    let shutdown = CancellationToken::new();

    let reports = with_timeout(runtime.tick(day(10), &shutdown)).await.unwrap();

    assert_eq!(reports.len(), 10);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.interval.start(), day(i as i64));
        assert!(report.succeeded());
    }
    assert_eq!(executor.attempts_of("a"), 10);
    assert_eq!(history.len(), 20);

    let again = runtime.tick(day(10), &shutdown).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(executor.attempts_of("a"), 10);
}

#[tokio::test(start_paused = true)]
async fn without_catchup_only_the_latest_interval_runs() {
    init_tracing();
    let wf = WorkflowFixture::new("daily").task("a").build();
    let executor = Arc::new(ScriptedExecutor::new());
    let mut runtime =
        WorkflowRuntime::new(wf, Arc::clone(&executor), Arc::new(InMemoryRunHistory::new()));

    let reports = runtime
        .tick(day(10), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].interval.start(), day(9));
    assert_eq!(reports[0].interval.end(), day(10));
    assert_eq!(executor.executions()[0].interval_start, day(9));
}

#[tokio::test(start_paused = true)]
async fn runtime_resumes_after_recorded_intervals() {
    init_tracing();
    let wf = WorkflowFixture::new("daily").task("a").catchup(true).build();
    let history = Arc::new(InMemoryRunHistory::new());

    {
        let mut first =
            WorkflowRuntime::new(Arc::clone(&wf), Arc::new(ScriptedExecutor::new()), history.clone());
        let done = first.tick(day(7), &CancellationToken::new()).await.unwrap();
        assert_eq!(done.len(), 7);
    }
    assert_eq!(history.last_recorded_interval("daily"), Some(day(6)));

    let executor = Arc::new(ScriptedExecutor::new());
    let mut second = WorkflowRuntime::new(wf, Arc::clone(&executor), history.clone());
    let reports = second.tick(day(10), &CancellationToken::new()).await.unwrap();

    assert_eq!(
        reports.iter().map(|r| r.interval.start()).collect::<Vec<_>>(),
        vec![day(7), day(8), day(9)]
    );
    assert_eq!(history.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn interval_concurrency_is_bounded() {
    init_tracing();
    let wf = WorkflowFixture::new("daily")
        .task("a")
        .catchup(true)
        .max_concurrent_intervals(2)
        .build();
    let executor = Arc::new(ScriptedExecutor::new().delay("a", Duration::from_millis(50)));
    let mut runtime =
        WorkflowRuntime::new(wf, Arc::clone(&executor), Arc::new(InMemoryRunHistory::new()));

    let reports = with_timeout(runtime.tick(day(6), &CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|r| r.succeeded()));
    assert_eq!(executor.max_concurrency(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_tick_starts_nothing() {
    init_tracing();
    let wf = WorkflowFixture::new("daily").task("a").catchup(true).build();
    let executor = Arc::new(ScriptedExecutor::new());
    let mut runtime =
        WorkflowRuntime::new(wf, Arc::clone(&executor), Arc::new(InMemoryRunHistory::new()));

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let reports = runtime.tick(day(3), &shutdown).await.unwrap();

    assert!(reports.is_empty());
    assert!(executor.executions().is_empty());
    assert!(runtime.clock().last_materialized().is_none());
}

#[tokio::test(start_paused = true)]
async fn run_stops_once_the_schedule_is_past_its_end_date() {
    init_tracing();
    let wf = WorkflowFixture::new("bounded")
        .task("a")
        .catchup(true)
        .map(|b| b.end_date(day(3)))
        .build();
    let executor = Arc::new(ScriptedExecutor::new());
    let history = Arc::new(InMemoryRunHistory::new());
    let runtime = WorkflowRuntime::new(wf, Arc::clone(&executor), history.clone());

    with_timeout(runtime.run(CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(executor.attempts_of("a"), 3);
    assert_eq!(history.last_recorded_interval("bounded"), Some(day(2)));
}

#[tokio::test(start_paused = true)]
async fn run_waiting_on_a_distant_interval_exits_on_shutdown() {
    init_tracing();
    let wf = WorkflowFixture::new("far_future")
        .task("a")
        .map(|b| b.start_date(utc_date(9000, 1, 1)))
        .build();
    let executor = Arc::new(ScriptedExecutor::new());
    let runtime =
        WorkflowRuntime::new(wf, Arc::clone(&executor), Arc::new(InMemoryRunHistory::new()));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    with_timeout(runtime.run(shutdown)).await.unwrap();
    assert!(executor.executions().is_empty());
}
