// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::engine::TaskName;

/// Problems found while building a workflow's task graph.
///
/// These are fatal to loading that one workflow and never occur at run time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("edge '{upstream}' -> '{downstream}' would close a cycle")]
    Cycle {
        upstream: TaskName,
        downstream: TaskName,
    },

    #[error("task '{0}' is declared more than once")]
    DuplicateTask(TaskName),

    #[error("task '{task}' references undeclared upstream '{upstream}'")]
    UnknownUpstream { task: TaskName, upstream: TaskName },

    #[error("task '{0}' is not declared")]
    UnknownTask(TaskName),
}

#[derive(Error, Debug)]
pub enum TickdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Workflow definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TickdagError>;
