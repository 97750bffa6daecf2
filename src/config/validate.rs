// src/config/validate.rs

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::config::model::{
    DefaultSection, RawWorkflowFile, TaskBody, TaskConfig, TaskFileSpec, WorkflowFile,
};
use crate::engine::TaskName;
use crate::errors::{Result, TickdagError};
use crate::exec::ShellCommand;
use crate::schedule::{parse_duration, Cadence};
use crate::workflow::WorkflowDefaults;

impl TryFrom<RawWorkflowFile> for WorkflowFile {
    type Error = TickdagError;

    fn try_from(raw: RawWorkflowFile) -> std::result::Result<Self, Self::Error> {
        let RawWorkflowFile {
            workflow,
            default,
            tasks,
        } = raw;

        let id = workflow.id.trim().to_string();
        if id.is_empty() {
            return Err(config_error("[workflow].id must not be empty"));
        }
        if tasks.is_empty() {
            return Err(TickdagError::ConfigError(format!(
                "workflow '{id}' must contain at least one [[task]] entry"
            )));
        }

        let cadence: Cadence = workflow.schedule.parse().map_err(|e| {
            TickdagError::ConfigError(format!("[workflow].schedule: {e}"))
        })?;
        let start_date = parse_datetime(&workflow.start_date)
            .map_err(|e| TickdagError::ConfigError(format!("[workflow].start_date: {e}")))?;
        let end_date = workflow
            .end_date
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(|e| TickdagError::ConfigError(format!("[workflow].end_date: {e}")))?;

        if let Some(end) = end_date {
            if end <= start_date {
                return Err(TickdagError::ConfigError(format!(
                    "[workflow].end_date ({end}) must be after start_date ({start_date})"
                )));
            }
        }

        for (key, value) in [
            ("max_concurrent_intervals", workflow.max_concurrent_intervals),
            ("max_concurrent_tasks", workflow.max_concurrent_tasks),
        ] {
            if value == Some(0) {
                return Err(TickdagError::ConfigError(format!(
                    "[workflow].{key} must be >= 1 (got 0)"
                )));
            }
        }

        let defaults = validate_defaults(default)?;
        let tasks = tasks
            .into_iter()
            .map(validate_task)
            .collect::<Result<Vec<_>>>()?;

        let mut edges = Vec::new();
        for chain in &workflow.dependencies {
            edges.extend(parse_dependency_chain(chain)?);
        }

        Ok(WorkflowFile {
            id,
            description: workflow.description,
            cadence,
            start_date,
            end_date,
            catchup: workflow.catchup,
            tags: workflow.tags,
            max_concurrent_intervals: workflow.max_concurrent_intervals,
            max_concurrent_tasks: workflow.max_concurrent_tasks,
            defaults,
            tasks,
            edges,
        })
    }
}

fn validate_defaults(section: DefaultSection) -> Result<WorkflowDefaults> {
    let base = WorkflowDefaults::default();
    Ok(WorkflowDefaults {
        owner: section.owner,
        retries: section.retries.unwrap_or(base.retries),
        retry_delay: optional_duration("[default].retry_delay", section.retry_delay)?
            .unwrap_or(base.retry_delay),
        backoff: section.backoff.unwrap_or(base.backoff),
        max_retry_delay: optional_duration("[default].max_retry_delay", section.max_retry_delay)?,
        execution_timeout: optional_duration(
            "[default].execution_timeout",
            section.execution_timeout,
        )?,
    })
}

fn validate_task(task: TaskConfig) -> Result<TaskFileSpec> {
    let id = task.id.trim().to_string();
    if id.is_empty() {
        return Err(config_error("[[task]] entries need a non-empty id"));
    }

    let body = match (task.cmd, task.callable) {
        (Some(cmd), None) => TaskBody::Shell(ShellCommand {
            command: cmd,
            env: task.env,
        }),
        (None, Some(name)) => TaskBody::Callable(name),
        (Some(_), Some(_)) => {
            return Err(TickdagError::ConfigError(format!(
                "task '{id}' sets both `cmd` and `callable`; pick one"
            )));
        }
        (None, None) => {
            return Err(TickdagError::ConfigError(format!(
                "task '{id}' needs either `cmd` or `callable`"
            )));
        }
    };

    let field = |name: &str| format!("task '{id}' {name}");

    Ok(TaskFileSpec {
        retry_delay: optional_duration(&field("retry_delay"), task.retry_delay)?,
        max_retry_delay: optional_duration(&field("max_retry_delay"), task.max_retry_delay)?,
        execution_timeout: optional_duration(&field("execution_timeout"), task.execution_timeout)?,
        id,
        body,
        upstream: task.upstream,
        owner: task.owner,
        retries: task.retries,
        backoff: task.backoff,
    })
}

/// Split `"a >> b >> c"` into `[(a, b), (b, c)]`.
pub fn parse_dependency_chain(chain: &str) -> Result<Vec<(TaskName, TaskName)>> {
    let ids: Vec<&str> = chain.split(">>").map(str::trim).collect();

    if ids.len() < 2 || ids.iter().any(|id| id.is_empty()) {
        return Err(TickdagError::ConfigError(format!(
            "malformed dependency chain '{chain}'; expected 'upstream >> downstream'"
        )));
    }

    Ok(ids
        .windows(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect())
}

/// Parse a date-time in UTC.
///
/// Accepts RFC 3339 (`2024-01-01T06:00:00+02:00`), a naive
/// `2024-01-01T06:00:00` taken as UTC, or a bare `2024-01-01` meaning
/// midnight UTC.
pub fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(format!(
        "invalid date '{s}'; expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD"
    ))
}

fn optional_duration(field: &str, value: Option<String>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(&s)
                .map_err(|e| TickdagError::ConfigError(format!("{field}: {e}")))
        })
        .transpose()
}

fn config_error(msg: &str) -> TickdagError {
    TickdagError::ConfigError(msg.to_string())
}
