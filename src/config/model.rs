// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::TaskName;
use crate::exec::ShellCommand;
use crate::schedule::Cadence;
use crate::types::BackoffStrategy;
use crate::workflow::WorkflowDefaults;

/// A workflow file as read from TOML, before validation.
///
/// ```toml
/// [workflow]
/// id = "hello_world_dag"
/// schedule = "@daily"
/// start_date = "2024-01-01"
/// dependencies = ["hello_python >> hello_bash"]
///
/// [default]
/// retries = 1
/// retry_delay = "5m"
///
/// [[task]]
/// id = "hello_python"
/// callable = "print_hello"
///
/// [[task]]
/// id = "hello_bash"
/// cmd = 'echo "Hello World from Bash!"'
/// ```
///
/// Tasks are an array of tables so declaration order survives parsing.
/// Keys this crate does not know (pools, priorities, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowFile {
    pub workflow: WorkflowSection,

    #[serde(default)]
    pub default: DefaultSection,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    /// `@hourly`, `@daily`, `@weekly` or a duration such as `"6h"`.
    pub schedule: String,

    pub start_date: String,

    #[serde(default)]
    pub end_date: Option<String>,

    #[serde(default)]
    pub catchup: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Dependency chains such as `"extract >> transform >> load"`.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub max_concurrent_intervals: Option<usize>,

    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,
}

/// `[default]` section: task settings every task inherits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default)]
    pub retry_delay: Option<String>,

    #[serde(default)]
    pub backoff: Option<BackoffStrategy>,

    #[serde(default)]
    pub max_retry_delay: Option<String>,

    #[serde(default)]
    pub execution_timeout: Option<String>,
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,

    /// Shell command; exclusive with `callable`.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Name of a registered callable; exclusive with `cmd`.
    #[serde(default)]
    pub callable: Option<String>,

    #[serde(default)]
    pub upstream: Vec<String>,

    /// Extra environment for `cmd` tasks.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default)]
    pub retry_delay: Option<String>,

    #[serde(default)]
    pub backoff: Option<BackoffStrategy>,

    #[serde(default)]
    pub max_retry_delay: Option<String>,

    #[serde(default)]
    pub execution_timeout: Option<String>,
}

/// A validated workflow file.
///
/// Everything is parsed and typed; only callable names are left to resolve
/// against a [`crate::exec::CallableRegistry`].
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub id: String,
    pub description: Option<String>,
    pub cadence: Cadence,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub catchup: bool,
    pub tags: Vec<String>,
    pub max_concurrent_intervals: Option<usize>,
    pub max_concurrent_tasks: Option<usize>,
    pub defaults: WorkflowDefaults,
    /// Tasks in declaration order.
    pub tasks: Vec<TaskFileSpec>,
    /// `(upstream, downstream)` pairs from `dependencies` chains.
    pub edges: Vec<(TaskName, TaskName)>,
}

/// What a task runs, as written in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskBody {
    Shell(ShellCommand),
    Callable(String),
}

/// A validated `[[task]]` entry.
#[derive(Debug, Clone)]
pub struct TaskFileSpec {
    pub id: TaskName,
    pub body: TaskBody,
    pub upstream: Vec<TaskName>,
    pub owner: Option<String>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub backoff: Option<BackoffStrategy>,
    pub max_retry_delay: Option<Duration>,
    pub execution_timeout: Option<Duration>,
}
