use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::run::RunSettings;
use crate::store::types::RunKey;

/// A request to start a run. Unset fields fall back to configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub run_key: Option<String>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub wait_duration_secs: Option<f64>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

impl RunRequest {
    pub fn resolve(&self, config: &AppConfig) -> Result<(RunKey, RunSettings)> {
        let key = self
            .run_key
            .clone()
            .or_else(|| config.store.default_run_key.clone())
            .ok_or_else(|| {
                AppError::InvalidInput("no run key given and store.default_run_key is unset".into())
            })?;

        let settings = RunSettings::from_secs(
            self.max_concurrency.unwrap_or(config.run.max_concurrency),
            self.wait_duration_secs
                .unwrap_or(config.run.wait_duration_secs),
            self.timeout_secs.unwrap_or(config.run.timeout_secs),
        )?;

        Ok((RunKey::new(key)?, settings))
    }
}
