pub mod http;

use async_trait::async_trait;

use crate::error::InvokeError;

pub use http::HttpInvoker;

/// A remote function treated as a black box.
///
/// Implementations must not retry on their own: each call is at most one
/// invocation of the remote function.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        payload: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, InvokeError>;
}
