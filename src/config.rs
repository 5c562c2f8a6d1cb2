use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub invoke: InvokeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Table file holding one row per key.
    #[serde(default = "default_table_path")]
    pub path: PathBuf,
    #[serde(default = "default_partition_key_name")]
    pub partition_key_name: String,
    #[serde(default = "default_values_attribute")]
    pub values_attribute: String,
    /// Key used when a trigger does not name one.
    #[serde(default)]
    pub default_run_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// 0 means unbounded.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_wait_duration_secs")]
    pub wait_duration_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    /// JSON pointer the pass stage narrows each item to.
    #[serde(default)]
    pub input_pointer: Option<String>,
    #[serde(default)]
    pub invoke_timeout_secs: Option<f64>,
}

#[derive(Deserialize, Clone, Default)]
pub struct InvokeConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<f64>,
}

// Manual Debug impl to avoid leaking credentials embedded in the URL
impl std::fmt::Debug for InvokeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeConfig")
            .field("url", &self.url.as_deref().map(redact_url))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() || !parsed.username().is_empty() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            format!("{parsed} [credentials redacted]")
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "[unparseable]".to_string(),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_table_path(),
            partition_key_name: default_partition_key_name(),
            values_attribute: default_values_attribute(),
            default_run_key: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            wait_duration_secs: default_wait_duration_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_table_path() -> PathBuf {
    PathBuf::from("mapflow-table.json")
}

fn default_partition_key_name() -> String {
    "mapstatelist".to_string()
}

fn default_values_attribute() -> String {
    "values".to_string()
}

fn default_max_concurrency() -> usize {
    2
}

fn default_wait_duration_secs() -> f64 {
    5.0
}

fn default_timeout_secs() -> f64 {
    300.0
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("mapflow").required(false));
        }

        // Environment variable overrides with MAPFLOW_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("MAPFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn invoke_url(&self) -> Result<&str> {
        self.invoke
            .url
            .as_deref()
            .ok_or_else(|| AppError::Config("invoke.url is not set".into()))
    }
}
