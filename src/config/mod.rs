// src/config/mod.rs

//! Workflow files for tickdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a workflow file from disk or a string (`loader.rs`).
//! - Validate and type every field (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_workflow, parse_workflow_str};
pub use model::{
    DefaultSection, RawWorkflowFile, TaskBody, TaskConfig, TaskFileSpec, WorkflowFile,
    WorkflowSection,
};
pub use validate::{parse_datetime, parse_dependency_chain};
