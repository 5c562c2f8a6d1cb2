use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, InvokeError, Result};
use crate::invoke::Invoker;

/// Response header a function host sets when the function itself raised.
pub const FUNCTION_ERROR_HEADER: &str = "x-function-error";

/// Invokes a remote function by POSTing the payload as JSON.
pub struct HttpInvoker {
    client: Client,
    url: reqwest::Url,
}

impl HttpInvoker {
    pub fn new(url: &str, request_timeout: Option<Duration>) -> Result<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AppError::Config(format!("Invalid invoke url: {e}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url,
        })
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, payload: &Value) -> std::result::Result<Value, InvokeError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await?;

        if !status.is_success() {
            return Err(InvokeError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        if let Some(error_type) = function_error {
            return Err(InvokeError::Application { error_type, body });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| InvokeError::Transport {
            message: format!("Failed to decode response: {e}"),
        })
    }
}
