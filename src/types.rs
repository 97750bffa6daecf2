use serde::Deserialize;

/// How the delay between retries grows.
///
/// - `Fixed`: every retry waits the base delay (default).
/// - `Exponential`: the delay doubles per failed attempt, optionally capped
///   by `max_retry_delay`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// Final state of a whole interval run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalState {
    Succeeded,
    Failed,
}

impl IntervalState {
    pub fn is_success(self) -> bool {
        matches!(self, IntervalState::Succeeded)
    }
}
