// src/workflow/mod.rs

//! Workflow definitions.
//!
//! A [`Workflow`] is the immutable description a run is materialized from:
//! schedule settings, resolved per-task specs and the task graph. It is
//! shared read-only (`Arc<Workflow>`) by every concurrent interval run.

pub mod builder;
pub mod defaults;

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dag::Graph;
use crate::engine::TaskName;
use crate::errors::{Result, TickdagError};
use crate::exec::Runnable;
use crate::retry::RetryPolicy;
use crate::schedule::{Cadence, ScheduleClock};

pub use builder::{TaskDecl, WorkflowBuilder};
pub use defaults::WorkflowDefaults;

/// Fully resolved description of one task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub id: TaskName,
    pub runnable: Runnable,
    pub retry: RetryPolicy,
    pub execution_timeout: Option<Duration>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    id: String,
    description: Option<String>,
    cadence: Cadence,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    catchup: bool,
    tags: BTreeSet<String>,
    defaults: WorkflowDefaults,
    max_concurrent_intervals: usize,
    max_concurrent_tasks: usize,
    graph: Graph,
    tasks: HashMap<TaskName, TaskSpec>,
}

impl Workflow {
    pub fn builder(id: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn catchup(&self) -> bool {
        self.catchup
    }

    /// Opaque metadata; never affects scheduling.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn defaults(&self) -> &WorkflowDefaults {
        &self.defaults
    }

    pub fn max_concurrent_intervals(&self) -> usize {
        self.max_concurrent_intervals
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.get(id)
    }

    pub fn require_task(&self, id: &str) -> Result<&TaskSpec> {
        self.tasks
            .get(id)
            .ok_or_else(|| TickdagError::TaskNotFound(format!("{id} (workflow '{}')", self.id)))
    }

    /// Task specs in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.graph.tasks().filter_map(|id| self.tasks.get(id))
    }

    /// A fresh schedule clock for this workflow's cadence and window.
    pub fn clock(&self) -> ScheduleClock {
        ScheduleClock::new(self.cadence, self.start_date, self.catchup)
            .with_end_date(self.end_date)
    }
}
