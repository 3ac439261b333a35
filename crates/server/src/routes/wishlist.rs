use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::{db::WishlistItem, error::AppError, state::AppState};

use super::current_user;

/// GET /api/wishlist
pub async fn get_wishlist(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<WishlistItem>>, AppError> {
    let user = current_user(&state, &headers).await?;
    let items = state.db.get_wishlist(&user.id).await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistRequest {
    pub property_id: String,
}

/// POST /api/wishlist
pub async fn add_wishlist_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddWishlistRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let user = current_user(&state, &headers).await?;

    if req.property_id.is_empty() {
        return Err(AppError::BadRequest("Missing propertyId".to_string()));
    }

    if state.db.is_in_wishlist(&user.id, &req.property_id).await? {
        return Err(AppError::Conflict("Already in wishlist".to_string()));
    }

    state.db.add_to_wishlist(&user.id, &req.property_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Added to wishlist" })),
    ))
}

/// DELETE /api/wishlist/:propertyId
pub async fn remove_wishlist_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;
    state.db.remove_from_wishlist(&user.id, &property_id).await?;
    Ok(Json(serde_json::json!({ "message": "Removed from wishlist" })))
}
