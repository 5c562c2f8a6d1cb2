use std::sync::Arc;

use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::run::RunController;

pub struct AppState {
    pub config: AppConfig,
    pub controller: RunController,
}

impl AppState {
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        let controller = RunController::from_config(&config)?;
        Ok(Self::with_controller(config, controller))
    }

    pub fn with_controller(config: AppConfig, controller: RunController) -> Self {
        Self { config, controller }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/runs", post(crate::trigger::handler::handle_run))
        .route("/health", axum::routing::get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
