use std::time::Duration;

use serde::Serialize;

use crate::config::RunConfig;
use crate::error::{AppError, Result};
use crate::fanout::Concurrency;

/// Tunables for one run, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSettings {
    pub concurrency: Concurrency,
    pub wait: Duration,
    pub total_timeout: Duration,
}

impl RunSettings {
    pub fn new(max_concurrency: usize, wait: Duration, total_timeout: Duration) -> Self {
        Self {
            concurrency: Concurrency::from_max(max_concurrency),
            wait,
            total_timeout,
        }
    }

    /// Build from second counts as they arrive from config files or requests.
    pub fn from_secs(max_concurrency: usize, wait_secs: f64, timeout_secs: f64) -> Result<Self> {
        Ok(Self::new(
            max_concurrency,
            duration_from_secs("wait_duration_secs", wait_secs)?,
            duration_from_secs("timeout_secs", timeout_secs)?,
        ))
    }

    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Self::from_secs(
            config.max_concurrency,
            config.wait_duration_secs,
            config.timeout_secs,
        )
    }
}

pub(crate) fn duration_from_secs(field: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "{field} must be a non-negative number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AppError::InvalidInput(format!("{field}: {e}")))
}
