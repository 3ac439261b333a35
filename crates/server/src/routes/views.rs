use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

use super::current_user;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordViewRequest {
    pub property_id: String,
}

/// POST /api/views
///
/// Records that the caller viewed a property; a repeat view refreshes
/// the existing row's timestamp instead of adding another.
pub async fn record_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordViewRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    if req.property_id.is_empty() {
        return Err(AppError::BadRequest(
            "Bad Request: propertyId is required".to_string(),
        ));
    }

    state
        .db
        .record_property_view(&user.id, &req.property_id)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Property view recorded successfully",
    })))
}
