use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::server::AppState;
use crate::trigger::request::RunRequest;

/// `POST /runs`: execute one run and return its result.
///
/// The response is 200 whatever the run status; 400 means the request
/// itself was unusable and no run was started.
pub async fn handle_run(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        match serde_json::from_slice::<RunRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse run request");
                return bad_request(format!("invalid request body: {e}"));
            }
        }
    };

    let (run_key, settings) = match request.resolve(&state.config) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected run request");
            return bad_request(e.to_string());
        }
    };

    tracing::info!(run_key = %run_key, "Received run request");

    let result = state.controller.execute(run_key, &settings).await;
    (StatusCode::OK, Json(result)).into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
