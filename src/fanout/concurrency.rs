use std::fmt;
use std::num::NonZeroUsize;

use serde::Serialize;

/// Ceiling on simultaneously active item pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    Unbounded,
    Limited(NonZeroUsize),
}

impl Concurrency {
    /// 0 means unbounded.
    pub fn from_max(max: usize) -> Self {
        match NonZeroUsize::new(max) {
            Some(k) => Concurrency::Limited(k),
            None => Concurrency::Unbounded,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Concurrency::Unbounded => None,
            Concurrency::Limited(k) => Some(k.get()),
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concurrency::Unbounded => f.write_str("unbounded"),
            Concurrency::Limited(k) => write!(f, "{k}"),
        }
    }
}
