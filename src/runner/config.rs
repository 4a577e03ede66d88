//! Knobs controlling a single run

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::RunError;

/// Run options, fixed once a session starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Halt the run and skip the rest after the first failed or errored step
    #[serde(default)]
    pub stop_on_failure: bool,
    /// Pause between consecutive requests, in milliseconds
    #[serde(default)]
    pub delay_ms: i64,
}

impl RunConfig {
    pub fn new(stop_on_failure: bool, delay_ms: i64) -> Self {
        RunConfig {
            stop_on_failure,
            delay_ms,
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.delay_ms < 0 {
            return Err(RunError::Config(format!(
                "delay must not be negative (got {}ms)",
                self.delay_ms
            )));
        }
        Ok(())
    }

    /// Inter-request pause, `None` when requests run back to back
    pub fn delay(&self) -> Option<Duration> {
        u64::try_from(self.delay_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
