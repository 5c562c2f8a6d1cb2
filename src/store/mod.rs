pub mod file;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::error::StoreError;
use types::{ItemList, RunKey};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Read side of the key-value store holding item lists.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch the full list stored under `key` in one atomic read.
    ///
    /// An empty list is a valid result.
    async fn get(&self, key: &RunKey) -> std::result::Result<ItemList, StoreError>;
}
