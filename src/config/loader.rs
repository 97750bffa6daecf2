// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{RawWorkflowFile, TaskBody, WorkflowFile};
use crate::errors::{Result, TickdagError};
use crate::exec::{CallableRegistry, Runnable};
use crate::workflow::{TaskDecl, Workflow};

/// Load a workflow file from a given path and return the raw
/// `RawWorkflowFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkflowFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawWorkflowFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a workflow file from path and validate it.
///
/// - Reads TOML.
/// - Applies `[default]` values.
/// - Parses schedule, dates, durations and dependency chains.
///
/// Graph problems (unknown tasks, duplicates, cycles) surface when the file
/// is turned into a [`Workflow`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowFile> {
    let raw = load_from_path(&path)?;
    WorkflowFile::try_from(raw)
}

/// Parse and validate workflow TOML held in memory.
pub fn parse_workflow_str(contents: &str) -> Result<WorkflowFile> {
    let raw: RawWorkflowFile = toml::from_str(contents)?;
    WorkflowFile::try_from(raw)
}

/// Load, validate and build a workflow, resolving callables by name.
pub fn load_workflow(path: impl AsRef<Path>, registry: &CallableRegistry) -> Result<Workflow> {
    let file = load_and_validate(&path)?;
    debug!(
        path = %path.as_ref().display(),
        workflow = %file.id,
        tasks = file.tasks.len(),
        "loaded workflow file"
    );
    file.into_workflow(registry)
}

impl WorkflowFile {
    /// Build the [`Workflow`] this file describes.
    ///
    /// Every task is declared first, in file order, and dependencies are
    /// added afterwards, so `upstream` lists may name tasks declared later
    /// in the file.
    pub fn into_workflow(self, registry: &CallableRegistry) -> Result<Workflow> {
        let mut builder = Workflow::builder(self.id.as_str())
            .cadence(self.cadence)
            .start_date(self.start_date)
            .catchup(self.catchup)
            .defaults(self.defaults);

        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        if let Some(end) = self.end_date {
            builder = builder.end_date(end);
        }
        for tag in self.tags {
            builder = builder.tag(tag);
        }
        if let Some(n) = self.max_concurrent_intervals {
            builder = builder.max_concurrent_intervals(n);
        }
        if let Some(n) = self.max_concurrent_tasks {
            builder = builder.max_concurrent_tasks(n);
        }

        let mut edges = Vec::new();
        for task in self.tasks {
            let runnable = match task.body {
                TaskBody::Shell(cmd) => Runnable::Shell(cmd),
                TaskBody::Callable(name) => {
                    let callable = registry.get(&name).cloned().ok_or_else(|| {
                        TickdagError::ConfigError(format!(
                            "task '{}' refers to unregistered callable '{name}'",
                            task.id
                        ))
                    })?;
                    Runnable::Callable(callable)
                }
            };

            let mut decl = TaskDecl::new(task.id.clone(), runnable);
            if let Some(owner) = task.owner {
                decl = decl.owner(owner);
            }
            if let Some(n) = task.retries {
                decl = decl.retries(n);
            }
            if let Some(d) = task.retry_delay {
                decl = decl.retry_delay(d);
            }
            if let Some(b) = task.backoff {
                decl = decl.backoff(b);
            }
            if let Some(cap) = task.max_retry_delay {
                decl = decl.max_retry_delay(cap);
            }
            if let Some(t) = task.execution_timeout {
                decl = decl.execution_timeout(t);
            }

            edges.extend(task.upstream.into_iter().map(|up| (up, task.id.clone())));
            builder = builder.add_task(decl)?;
        }

        edges.extend(self.edges);
        for (upstream, downstream) in &edges {
            builder = builder.add_edge(upstream, downstream)?;
        }

        builder.build()
    }
}
