use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Backend is running.",
        "api_health": "/api/health",
        "api_root": "/api",
        "name": state.settings.app_name,
        "version": VERSION,
    }))
}

pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "name": state.settings.app_name, "version": VERSION }))
}
