use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

use super::current_user;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: String,
    pub currency: Option<String>,
}

/// POST /api/paypal/create-order
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    current_user(&state, &headers).await?;

    let currency = req.currency.as_deref().unwrap_or("USD");
    let order = state.paypal.create_order(&req.amount, currency).await?;

    Ok(Json(serde_json::json!({ "id": order["id"] })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOrderRequest {
    pub order_id: String,
}

/// POST /api/paypal/capture-order
pub async fn capture_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CaptureOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    current_user(&state, &headers).await?;

    let capture = state.paypal.capture_order(&req.order_id).await?;

    Ok(Json(serde_json::json!({
        "status": capture["status"],
        "id": capture["id"],
    })))
}
