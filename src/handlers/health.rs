// handlers/health.rs - GET /health

use axum::extract::State;
use serde_json::{json, Value};

use crate::config::StoreBackend;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    let backend = match state.config.database.backend {
        StoreBackend::Postgres => "postgres",
        StoreBackend::Memory => "memory",
    };

    if let Some(database) = &state.database {
        if let Err(err) = database.health_check().await {
            tracing::error!("Health check failed: {}", err);
            return Err(ApiError::service_unavailable("Database is unreachable"));
        }
    }

    Ok(ApiResponse::success(json!({
        "status": "ok",
        "backend": backend,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
