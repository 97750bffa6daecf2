// src/exec/task_runner.rs

//! Running a single attempt: shell processes, callables, timeouts and
//! cancellation.

use std::any::Any;
use std::process::Stdio;
use std::time::Duration;

use chrono::SecondsFormat;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::AttemptStatus;
use crate::exec::backend::{ExecutorBackend, TaskInvocation};
use crate::exec::runnable::{Callable, Outcome, ShellCommand, TaskContext};

/// Run one attempt through `executor`, enforcing `timeout` and honouring
/// the invocation's cancellation token.
///
/// When the timeout or the cancellation wins, the executor future is dropped;
/// shell children are killed on drop.
pub async fn run_attempt<E>(
    executor: &E,
    invocation: TaskInvocation,
    timeout: Option<Duration>,
) -> AttemptStatus
where
    E: ExecutorBackend + ?Sized,
{
    let cancel = invocation.cancel.clone();
    let task = invocation.context.task.clone();
    let attempt = invocation.context.attempt;
    let fut = executor.execute(invocation);

    let limited = async move {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!(task = %task, attempt, "attempt cancelled");
            AttemptStatus::Cancelled
        }

        res = limited => match res {
            Ok(outcome) => outcome.into(),
            Err(limit) => {
                warn!(
                    task = %task,
                    attempt,
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "attempt exceeded execution timeout"
                );
                AttemptStatus::TimedOut(limit)
            }
        },
    }
}

/// Run a shell command for one attempt.
///
/// The child sees the attempt context through `TICKDAG_*` environment
/// variables. A non-zero exit is a `Failure`; failing to spawn or wait on the
/// child is a `Fault`.
pub async fn run_shell(
    ctx: &TaskContext,
    shell: &ShellCommand,
    cancel: CancellationToken,
) -> Outcome {
    info!(
        task = %ctx.task,
        interval = %ctx.interval,
        attempt = ctx.attempt,
        cmd = %shell.command,
        "starting task process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&shell.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&shell.command);
        c
    };

    cmd.envs(context_env(ctx))
        .envs(&shell.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Outcome::Fault(format!(
                "spawning process for task '{}': {e}",
                ctx.task
            ));
        }
    };

    // Always consume output so pipe buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        let task_name = ctx.task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task_name = ctx.task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = match status_res {
                Ok(status) => status,
                Err(e) => {
                    return Outcome::Fault(format!(
                        "waiting for process of task '{}': {e}",
                        ctx.task
                    ));
                }
            };

            let code = status.code().unwrap_or(-1);
            info!(
                task = %ctx.task,
                attempt = ctx.attempt,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            if status.success() {
                Outcome::Success
            } else {
                Outcome::Failure(format!("process exited with code {code}"))
            }
        }

        _ = cancel.cancelled() => {
            info!(
                task = %ctx.task,
                attempt = ctx.attempt,
                "cancellation requested for running task; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(
                    task = %ctx.task,
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            Outcome::Failure("cancelled".to_string())
        }
    }
}

/// Run a callable on the blocking pool.
///
/// `Err` is a `Failure`; a panic is a `Fault`. Cancellation stops waiting but
/// cannot interrupt the callable itself.
pub async fn run_callable(
    ctx: TaskContext,
    callable: Callable,
    cancel: CancellationToken,
) -> Outcome {
    info!(
        task = %ctx.task,
        interval = %ctx.interval,
        attempt = ctx.attempt,
        callable = %callable.name,
        "invoking callable"
    );

    let task = ctx.task.clone();
    let handle = tokio::task::spawn_blocking(move || callable.call(&ctx));

    tokio::select! {
        joined = handle => match joined {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err(err)) => Outcome::Failure(format!("{err:#}")),
            Err(join_err) if join_err.is_panic() => {
                Outcome::Fault(format!("callable panicked: {}", panic_message(join_err.into_panic())))
            }
            Err(join_err) => Outcome::Fault(format!("callable did not complete: {join_err}")),
        },

        _ = cancel.cancelled() => {
            warn!(task = %task, "cancellation requested; abandoning callable");
            Outcome::Failure("cancelled".to_string())
        }
    }
}

fn context_env(ctx: &TaskContext) -> Vec<(&'static str, String)> {
    vec![
        ("TICKDAG_WORKFLOW_ID", ctx.workflow_id.clone()),
        ("TICKDAG_TASK_ID", ctx.task.clone()),
        (
            "TICKDAG_INTERVAL_START",
            ctx.interval.start().to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (
            "TICKDAG_INTERVAL_END",
            ctx.interval.end().to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("TICKDAG_ATTEMPT", ctx.attempt.to_string()),
    ]
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
