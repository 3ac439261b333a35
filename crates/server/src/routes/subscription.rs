use axum::{extract::State, http::HeaderMap, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{error::AppError, paypal::OrderItem, state::AppState};

use super::current_user;

/// GET /api/subscription
pub async fn get_plans(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    current_user(&state, &headers).await?;
    let plans = state.db.list_subscription_plans().await?;
    Ok(Json(serde_json::json!({ "subscriptions": plans })))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionOrderRequest {
    pub amount: String,
    pub item: OrderItem,
    pub currency: Option<String>,
}

/// POST /api/subscription/create-order
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSubscriptionOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    current_user(&state, &headers).await?;

    let currency = req.currency.as_deref().unwrap_or("USD");
    let order = state
        .paypal
        .create_subscription_order(&req.amount, &req.item, currency)
        .await?;

    Ok(Json(serde_json::json!({ "id": order["id"] })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSubscriptionOrderRequest {
    pub order_id: String,
    pub subscription_plan_id: String,
    pub email: Option<String>,
}

/// POST /api/subscription/capture-order
///
/// On a completed capture the subscription is recorded and the account
/// upgraded to the agency role.
pub async fn capture_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CaptureSubscriptionOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    let capture = state.paypal.capture_order(&req.order_id).await?;
    let order_id = capture["id"].as_str().unwrap_or(&req.order_id).to_string();
    let status = capture["status"].as_str().unwrap_or("UNKNOWN").to_string();

    if status == "COMPLETED" {
        let plan = state
            .db
            .get_subscription_plan(&req.subscription_plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription plan not found".to_string()))?;

        let start = Utc::now();
        let end = start + Duration::days(plan.duration_days);
        state
            .db
            .activate_subscription(
                &user.id,
                &plan.id,
                &order_id,
                &start.to_rfc3339(),
                &end.to_rfc3339(),
            )
            .await?;

        let customer_email = req
            .email
            .clone()
            .or_else(|| {
                capture["payer"]["email_address"]
                    .as_str()
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| user.email.clone());
        state
            .mailer
            .send_subscription_success_email(&customer_email, &order_id, &plan.name)
            .await;

        tracing::info!(
            "Subscription {} activated for user {} via order {}",
            plan.name,
            user.id,
            order_id
        );
    }

    Ok(Json(serde_json::json!({ "status": status, "id": order_id })))
}
