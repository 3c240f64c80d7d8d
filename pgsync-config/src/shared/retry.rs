use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for a single table's sync sequence.
///
/// The delay before retry `i` (1-based) grows linearly: `backoff_step_ms * i`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included, before a table is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay increment, in milliseconds, added for every retry.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

impl RetryConfig {
    /// Returns the delay to wait before the given retry (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(u64::from(retry)))
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    2_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}
