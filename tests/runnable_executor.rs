#![cfg(unix)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tickdag::dag::AttemptStatus;
use tickdag::exec::{
    run_attempt, ExecutorBackend, Outcome, Runnable, RunnableExecutor, ShellCommand, TaskContext,
    TaskInvocation,
};
use tickdag_test_utils::builders::first_interval;
use tickdag_test_utils::{init_tracing, with_timeout};
use tokio_util::sync::CancellationToken;

fn invocation(runnable: Runnable) -> TaskInvocation {
    TaskInvocation {
        context: TaskContext {
            workflow_id: "wf".to_string(),
            task: "task".to_string(),
            interval: first_interval(),
            attempt: 2,
        },
        runnable,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn shell_exit_codes_map_to_outcomes() {
    init_tracing();
    let executor = RunnableExecutor::new();

    let ok = with_timeout(executor.execute(invocation(Runnable::shell("echo hello")))).await;
    assert_eq!(ok, Outcome::Success);

    let failed = with_timeout(executor.execute(invocation(Runnable::shell("exit 3")))).await;
    assert_eq!(failed, Outcome::Failure("process exited with code 3".to_string()));
}

#[tokio::test]
async fn shell_sees_attempt_context_and_extra_env() {
    init_tracing();
    let dir = tempdir().unwrap();
    let out = dir.path().join("env.txt");

    let mut cmd = ShellCommand::new(format!(
        "printf '%s|%s|%s|%s|%s' \"$TICKDAG_WORKFLOW_ID\" \"$TICKDAG_TASK_ID\" \
         \"$TICKDAG_INTERVAL_START\" \"$TICKDAG_ATTEMPT\" \"$GREETING\" > {}",
        out.display()
    ));
    cmd.env.insert("GREETING".to_string(), "hi".to_string());

    let outcome = with_timeout(RunnableExecutor::new().execute(invocation(Runnable::Shell(cmd)))).await;
    assert_eq!(outcome, Outcome::Success);

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "wf|task|2024-01-01T00:00:00Z|2|hi");
}

#[tokio::test]
async fn callables_report_errors_and_panics() {
    init_tracing();
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    let counting = Runnable::callable("count", move |ctx| {
        seen.fetch_add(ctx.attempt, Ordering::SeqCst);
        Ok(())
    });
    let executor = RunnableExecutor::new();

    assert_eq!(with_timeout(executor.execute(invocation(counting))).await, Outcome::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let erroring = Runnable::callable("err", |_| Err(anyhow::anyhow!("upstream API down")));
    assert_eq!(
        with_timeout(executor.execute(invocation(erroring))).await,
        Outcome::Failure("upstream API down".to_string())
    );

    let panicking = Runnable::callable("panic", |_| panic!("bad state"));
    match with_timeout(executor.execute(invocation(panicking))).await {
        Outcome::Fault(msg) => assert!(msg.contains("bad state")),
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn run_attempt_enforces_timeout_on_real_process() {
    init_tracing();
    let status = with_timeout(run_attempt(
        &RunnableExecutor::new(),
        invocation(Runnable::shell("sleep 30")),
        Some(Duration::from_millis(200)),
    ))
    .await;

    assert_eq!(status, AttemptStatus::TimedOut(Duration::from_millis(200)));
}

#[tokio::test]
async fn run_attempt_stops_on_cancellation() {
    init_tracing();
    let inv = invocation(Runnable::shell("sleep 30"));
    let cancel = inv.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let status = with_timeout(run_attempt(&RunnableExecutor::new(), inv, None)).await;
    assert_eq!(status, AttemptStatus::Cancelled);
}
