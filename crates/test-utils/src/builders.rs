#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tickdag::exec::Runnable;
use tickdag::schedule::{Cadence, Interval};
use tickdag::workflow::{TaskDecl, Workflow, WorkflowBuilder, WorkflowDefaults};

use crate::utc_date;

/// Builder for test workflows: daily cadence starting 2024-01-01, every
/// task a placeholder shell command (scripted executors never run it).
pub struct WorkflowFixture {
    builder: WorkflowBuilder,
    last: Option<String>,
}

impl WorkflowFixture {
    pub fn new(id: &str) -> Self {
        Self {
            builder: Workflow::builder(id)
                .cadence(Cadence::days(1))
                .start_date(utc_date(2024, 1, 1)),
            last: None,
        }
    }

    /// Independent task.
    pub fn task(mut self, id: &str) -> Self {
        self.builder = self
            .builder
            .add_task(TaskDecl::new(id, placeholder(id)))
            .expect("valid test task");
        self.last = Some(id.to_string());
        self
    }

    /// Task downstream of the previously added one.
    pub fn then(mut self, id: &str) -> Self {
        let mut decl = TaskDecl::new(id, placeholder(id));
        if let Some(prev) = &self.last {
            decl = decl.upstream(prev.clone());
        }
        self.builder = self.builder.add_task(decl).expect("valid test task");
        self.last = Some(id.to_string());
        self
    }

    /// Fully custom declaration.
    pub fn decl(mut self, decl: TaskDecl) -> Self {
        self.last = Some(decl.id().to_string());
        self.builder = self.builder.add_task(decl).expect("valid test task");
        self
    }

    pub fn retries(mut self, retries: u32, delay: Duration) -> Self {
        self.builder = self.builder.defaults(WorkflowDefaults {
            retries,
            retry_delay: delay,
            ..WorkflowDefaults::default()
        });
        self
    }

    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.builder = self.builder.max_concurrent_tasks(n);
        self
    }

    pub fn max_concurrent_intervals(mut self, n: usize) -> Self {
        self.builder = self.builder.max_concurrent_intervals(n);
        self
    }

    pub fn catchup(mut self, catchup: bool) -> Self {
        self.builder = self.builder.catchup(catchup);
        self
    }

    pub fn map(mut self, f: impl FnOnce(WorkflowBuilder) -> WorkflowBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }

    pub fn build(self) -> Arc<Workflow> {
        Arc::new(self.builder.build().expect("valid test workflow"))
    }
}

/// `a -> b -> c ...` with the given retry settings.
pub fn chain_workflow(id: &str, tasks: &[&str], retries: u32, delay: Duration) -> Arc<Workflow> {
    let mut fixture = WorkflowFixture::new(id).retries(retries, delay);
    for task in tasks {
        fixture = fixture.then(task);
    }
    fixture.build()
}

/// The first daily interval of test workflows: `[2024-01-01, 2024-01-02)`.
pub fn first_interval() -> Interval {
    Interval::starting_at(utc_date(2024, 1, 1), Cadence::days(1))
}

fn placeholder(id: &str) -> Runnable {
    Runnable::shell(format!("echo {id}"))
}
