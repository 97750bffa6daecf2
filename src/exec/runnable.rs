// src/exec/runnable.rs

//! The units of work a task can run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::engine::TaskName;
use crate::schedule::Interval;

/// What a runnable gets to see about the attempt it is executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub workflow_id: String,
    pub task: TaskName,
    pub interval: Interval,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Result of one runnable invocation.
///
/// `Failure` is an error the unit reported itself; `Fault` is something
/// unexpected (a panic, a process that could not be spawned). Both count as a
/// failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
    Fault(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Body of a callable task.
pub type CallableFn = dyn Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync;

/// A named in-process function.
#[derive(Clone)]
pub struct Callable {
    pub name: String,
    func: Arc<CallableFn>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A command line run through the platform shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub command: String,
    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
        }
    }
}

/// The two kinds of task body.
#[derive(Debug, Clone)]
pub enum Runnable {
    Shell(ShellCommand),
    Callable(Callable),
}

impl Runnable {
    pub fn shell(command: impl Into<String>) -> Self {
        Runnable::Shell(ShellCommand::new(command))
    }

    pub fn callable<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Runnable::Callable(Callable::new(name, func))
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Runnable::Shell(cmd) => format!("shell: {}", cmd.command),
            Runnable::Callable(c) => format!("callable: {}", c.name),
        }
    }
}

/// Named callables that workflow files can refer to.
#[derive(Debug, Clone, Default)]
pub struct CallableRegistry {
    callables: HashMap<String, Callable>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callables
            .insert(name.to_string(), Callable::new(name, func));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Callable> {
        self.callables.get(name)
    }
}
