// src/workflow/builder.rs

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::Graph;
use crate::engine::TaskName;
use crate::errors::{DefinitionError, Result, TickdagError};
use crate::exec::Runnable;
use crate::schedule::Cadence;
use crate::types::BackoffStrategy;
use crate::workflow::{TaskSpec, Workflow, WorkflowDefaults};

/// Declaration of a task before workflow defaults are applied.
///
/// Every `None` override falls back to the workflow's [`WorkflowDefaults`]
/// when the workflow is built.
#[derive(Debug, Clone)]
pub struct TaskDecl {
    id: TaskName,
    runnable: Runnable,
    upstream: Vec<TaskName>,
    owner: Option<String>,
    retries: Option<u32>,
    retry_delay: Option<Duration>,
    backoff: Option<BackoffStrategy>,
    max_retry_delay: Option<Duration>,
    execution_timeout: Option<Duration>,
}

impl TaskDecl {
    pub fn new(id: impl Into<TaskName>, runnable: Runnable) -> Self {
        Self {
            id: id.into(),
            runnable,
            upstream: Vec::new(),
            owner: None,
            retries: None,
            retry_delay: None,
            backoff: None,
            max_retry_delay: None,
            execution_timeout: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn upstream(mut self, id: impl Into<TaskName>) -> Self {
        self.upstream.push(id.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn max_retry_delay(mut self, cap: Duration) -> Self {
        self.max_retry_delay = Some(cap);
        self
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    fn resolve(self, defaults: &WorkflowDefaults) -> TaskSpec {
        let mut retry = defaults.retry_policy();
        if let Some(n) = self.retries {
            retry.max_retries = n;
        }
        if let Some(d) = self.retry_delay {
            retry.retry_delay = d;
        }
        if let Some(b) = self.backoff {
            retry.backoff = b;
        }
        if let Some(cap) = self.max_retry_delay {
            retry.max_retry_delay = Some(cap);
        }

        TaskSpec {
            id: self.id,
            runnable: self.runnable,
            retry,
            execution_timeout: self.execution_timeout.or(defaults.execution_timeout),
            owner: self.owner.or_else(|| defaults.owner.clone()),
        }
    }
}

/// Builder for [`Workflow`].
///
/// Graph errors surface as soon as the offending task or edge is added;
/// schedule settings and defaults are checked and applied by
/// [`WorkflowBuilder::build`], so they may be set in any order.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    id: String,
    description: Option<String>,
    cadence: Option<Cadence>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    catchup: bool,
    tags: BTreeSet<String>,
    defaults: WorkflowDefaults,
    max_concurrent_intervals: usize,
    max_concurrent_tasks: usize,
    graph: Graph,
    decls: Vec<TaskDecl>,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            cadence: None,
            start_date: None,
            end_date: None,
            catchup: false,
            tags: BTreeSet::new(),
            defaults: WorkflowDefaults::default(),
            max_concurrent_intervals: 16,
            max_concurrent_tasks: 16,
            graph: Graph::new(),
            decls: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn catchup(mut self, catchup: bool) -> Self {
        self.catchup = catchup;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn defaults(mut self, defaults: WorkflowDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn max_concurrent_intervals(mut self, n: usize) -> Self {
        self.max_concurrent_intervals = n;
        self
    }

    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = n;
        self
    }

    /// Declare a task; its upstream tasks must already be declared.
    pub fn add_task(mut self, decl: TaskDecl) -> std::result::Result<Self, DefinitionError> {
        let upstream: Vec<&str> = decl.upstream.iter().map(String::as_str).collect();
        self.graph.add_task(&decl.id, &upstream)?;
        debug!(workflow = %self.id, task = %decl.id, ?upstream, "declared task");
        self.decls.push(decl);
        Ok(self)
    }

    /// `upstream` must succeed before `downstream` may run.
    pub fn add_edge(
        mut self,
        upstream: &str,
        downstream: &str,
    ) -> std::result::Result<Self, DefinitionError> {
        self.graph.add_edge(upstream, downstream)?;
        Ok(self)
    }

    /// Add edges between each consecutive pair: `chain(&["a", "b", "c"])`
    /// is `a -> b` and `b -> c`.
    pub fn chain(mut self, ids: &[&str]) -> std::result::Result<Self, DefinitionError> {
        for pair in ids.windows(2) {
            self = self.add_edge(pair[0], pair[1])?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Workflow> {
        if self.id.trim().is_empty() {
            return Err(TickdagError::ConfigError(
                "workflow id must not be empty".to_string(),
            ));
        }
        let cadence = self.cadence.ok_or_else(|| {
            TickdagError::ConfigError(format!("workflow '{}' has no schedule", self.id))
        })?;
        let start_date = self.start_date.ok_or_else(|| {
            TickdagError::ConfigError(format!("workflow '{}' has no start_date", self.id))
        })?;
        if let Some(end) = self.end_date {
            if end <= start_date {
                return Err(TickdagError::ConfigError(format!(
                    "workflow '{}': end_date {} is not after start_date {}",
                    self.id, end, start_date
                )));
            }
        }
        if self.graph.is_empty() {
            return Err(TickdagError::ConfigError(format!(
                "workflow '{}' must contain at least one task",
                self.id
            )));
        }
        if self.max_concurrent_intervals == 0 || self.max_concurrent_tasks == 0 {
            return Err(TickdagError::ConfigError(format!(
                "workflow '{}': concurrency limits must be >= 1",
                self.id
            )));
        }

        let tasks: HashMap<TaskName, TaskSpec> = self
            .decls
            .into_iter()
            .map(|decl| {
                let spec = decl.resolve(&self.defaults);
                (spec.id.clone(), spec)
            })
            .collect();

        Ok(Workflow {
            id: self.id,
            description: self.description,
            cadence,
            start_date,
            end_date: self.end_date,
            catchup: self.catchup,
            tags: self.tags,
            defaults: self.defaults,
            max_concurrent_intervals: self.max_concurrent_intervals,
            max_concurrent_tasks: self.max_concurrent_tasks,
            graph: self.graph,
            tasks,
        })
    }
}
