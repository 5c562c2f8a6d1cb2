use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to read the item list. Fatal to the run that hit it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no entry for key {key:?}")]
    NotFound { key: String },

    /// Transient backend failure; the caller may retry the run.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed store entry: {0}")]
    Malformed(String),
}

/// Failure of a single remote call.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum InvokeError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("remote returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("function error ({error_type}): {body}")]
    Application { error_type: String, body: String },
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        InvokeError::Transport {
            message: e.to_string(),
        }
    }
}

/// Item-level failure. Recorded in the item's outcome, never fatal to the run.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum ItemError {
    #[error("invoke failed: {0}")]
    #[serde(rename = "InvokeError")]
    Invoke(#[from] InvokeError),

    #[error("stage {stage} exceeded {after_ms}ms")]
    StageTimeout { stage: String, after_ms: u64 },

    #[error("pointer {pointer:?} did not resolve")]
    Shape { pointer: String },

    #[error("pipeline task panicked")]
    Panicked,
}

impl ItemError {
    /// Stable name of the error kind, as reported in run results.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Invoke(_) => "InvokeError",
            ItemError::StageTimeout { .. } => "StageTimeout",
            ItemError::Shape { .. } => "Shape",
            ItemError::Panicked => "Panicked",
        }
    }
}
