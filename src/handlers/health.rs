use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

/// Liveness probe. Also re-creates any missing tables; a failure there is
/// logged but never turns the probe red.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    if let Err(e) = state.db.ensure_schema() {
        tracing::warn!(error = %e, "schema check during health probe failed");
    }
    Json(json!({ "status": "ok" }))
}
