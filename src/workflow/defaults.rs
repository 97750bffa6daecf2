// src/workflow/defaults.rs

use std::time::Duration;

use crate::retry::{RetryPolicy, DEFAULT_RETRY_DELAY};
use crate::types::BackoffStrategy;

/// Workflow-level task defaults, overridable per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefaults {
    pub owner: Option<String>,
    pub retries: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffStrategy,
    pub max_retry_delay: Option<Duration>,
    pub execution_timeout: Option<Duration>,
}

impl Default for WorkflowDefaults {
    fn default() -> Self {
        Self {
            owner: None,
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            backoff: BackoffStrategy::Fixed,
            max_retry_delay: None,
            execution_timeout: None,
        }
    }
}

impl WorkflowDefaults {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries,
            retry_delay: self.retry_delay,
            backoff: self.backoff,
            max_retry_delay: self.max_retry_delay,
        }
    }
}
