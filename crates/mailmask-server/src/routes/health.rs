//! Liveness check.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(status))
}

/// GET /: liveness.
async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "Status": "Running" }))
}
