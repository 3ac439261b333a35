//! Search-filter aggregates over active listings.

use axum::{extract::State, Json};

use crate::{error::AppError, state::AppState};

/// GET /api/filters/price-range
pub async fn price_range(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let range = state
        .db
        .price_range()
        .await?
        .ok_or_else(|| AppError::NotFound("No valid price range data found".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "priceRange": { "minPrice": range.0, "maxPrice": range.1 },
    })))
}

/// GET /api/filters/area-range
pub async fn area_range(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let range = state
        .db
        .area_range()
        .await?
        .ok_or_else(|| AppError::NotFound("No valid area range data found".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "areaRange": { "minArea": range.0, "maxArea": range.1 },
    })))
}

/// GET /api/filters/rooms
pub async fn rooms(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let rooms = state.db.distinct_rooms().await?;
    if rooms.is_empty() {
        return Err(AppError::NotFound("No valid rooms data found".to_string()));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "rooms": rooms,
    })))
}

/// GET /api/filters/transaction-types
pub async fn transaction_types(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let types = state.db.distinct_transaction_types().await?;
    if types.is_empty() {
        return Err(AppError::NotFound(
            "No valid transaction types data found".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "transactionTypes": types,
    })))
}

/// GET /api/filters/property-types
pub async fn property_types(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let types = state.db.distinct_property_types().await?;
    if types.is_empty() {
        return Err(AppError::NotFound(
            "No valid property types data found".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "propertyTypes": types,
    })))
}
