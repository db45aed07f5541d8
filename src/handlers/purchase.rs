use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{ApiError, AppJson};
use crate::models::trade::*;
use crate::pricing;

pub async fn ping() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn create_purchase(
    State(state): State<AppState>,
    AppJson(mut req): AppJson<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let items = req.items.take().unwrap_or_default();
    if items.is_empty() {
        return Ok(Json(PurchaseResponse::empty()));
    }
    pricing::validate_items(&items)?;

    let codes: Vec<&str> = items.iter().map(|it| it.product_code.trim()).collect();
    let catalogue = state.db.find_products_by_codes(&codes)?;
    let now = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string();
    let (trade, totals) = pricing::build_trade(&req, &items, &catalogue, now)?;

    let id = state.db.record_trade(&trade)?;
    tracing::info!(
        trade_id = id,
        lines = trade.details.len(),
        subtotal = totals.subtotal,
        tax = totals.tax,
        total = totals.total,
        "purchase recorded"
    );
    Ok(Json(PurchaseResponse::accepted(id, totals.subtotal, totals.total)))
}
