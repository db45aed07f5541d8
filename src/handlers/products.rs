use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{ApiError, AppJson};
use crate::models::product::*;

pub async fn get_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductLookupResponse>, ApiError> {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Ok(Json(ProductLookupResponse { items: Vec::new() }));
    };
    let items = state
        .db
        .lookup_product(&code)?
        .map(ProductItem::from)
        .into_iter()
        .collect();
    Ok(Json(ProductLookupResponse { items }))
}

/// Development helper: seed sample products into an empty catalogue.
pub async fn dev_seed(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.db.seed_sample_products()?;
    tracing::info!(count, "dev seed applied");
    Ok(Json(json!({ "count": count })))
}

pub async fn bulk_upsert(
    State(state): State<AppState>,
    AppJson(req): AppJson<BulkUpsertRequest>,
) -> Result<Json<BulkUpsertSummary>, ApiError> {
    let raw = req.items.unwrap_or_default();
    let mut items = Vec::with_capacity(raw.len());
    for (idx, value) in raw.iter().enumerate() {
        if let Some(item) = ProductUpsert::from_value(idx, value).map_err(ApiError::Validation)? {
            items.push(item);
        }
    }
    let summary = state.db.bulk_upsert(&items)?;
    tracing::info!(
        inserted = summary.inserted,
        updated = summary.updated,
        count = summary.count,
        "bulk product upsert"
    );
    Ok(Json(summary))
}
