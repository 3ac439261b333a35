use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{
        Property, PropertyImageInput, PropertyStatus, PropertyType, PropertyUpdate,
        PropertyWithRelations, Role, TransactionType, User,
    },
    error::AppError,
    state::AppState,
};

use super::{current_user, require_role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    pub title: String,
    pub description: Option<String>,
    pub property_type: PropertyType,
    pub transaction_type: TransactionType,
    pub price: f64,
    pub currency: Option<String>,
    pub size: Option<f64>,
    pub rooms: Option<i64>,
    pub address: String,
    pub status: Option<PropertyStatus>,
    pub document_url: Option<String>,
    pub verification_comments: Option<String>,
    #[serde(default)]
    pub images: Vec<PropertyImageInput>,
}

/// GET /api/properties
pub async fn get_all_properties(
    State(state): State<AppState>,
) -> Result<Json<Vec<PropertyWithRelations>>, AppError> {
    let properties = state.db.list_properties().await?;
    Ok(Json(properties))
}

/// GET /api/properties/:propertyId
pub async fn get_property(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<Json<PropertyWithRelations>, AppError> {
    let property = state
        .db
        .get_property(&property_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Property with ID {} not found", property_id))
        })?;
    Ok(Json(property))
}

/// POST /api/properties
pub async fn add_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<PropertyWithRelations>), AppError> {
    let user = current_user(&state, &headers).await?;

    // -1 means unlimited
    if user.listing_limit >= 0 {
        let count = state.db.count_properties_for_owner(&user.id).await?;
        if count >= user.listing_limit {
            return Err(AppError::Forbidden(
                "Listing limit reached for this account".to_string(),
            ));
        }
    }

    let now = Utc::now().to_rfc3339();
    let property = Property {
        id: Uuid::new_v4().to_string(),
        owner_id: user.id.clone(),
        is_verified: false,
        title: req.title,
        description: req.description,
        property_type: req.property_type,
        transaction_type: req.transaction_type,
        price: req.price,
        currency: req.currency.unwrap_or_else(|| "USD".to_string()),
        size: req.size,
        rooms: req.rooms,
        address: req.address,
        status: req.status.unwrap_or(PropertyStatus::Active),
        document_url: req.document_url,
        verification_comments: req.verification_comments,
        created_at: now.clone(),
        updated_at: now,
    };

    let created = state.db.insert_property(&property, &req.images).await?;
    tracing::info!("Property {} created by {}", created.property.id, user.id);

    Ok((StatusCode::CREATED, Json(created)))
}

fn can_manage(user: &User, property: &Property) -> bool {
    property.owner_id == user.id || matches!(user.role, Role::Moderator | Role::Admin)
}

/// PATCH /api/properties/:propertyId
pub async fn update_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(mut update): Json<PropertyUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    let existing = state
        .db
        .get_property_row(&property_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Property with ID {} not found", property_id))
        })?;

    if !can_manage(&user, &existing) {
        return Err(AppError::Forbidden(
            "You are not authorized to update this property".to_string(),
        ));
    }

    // Verification state is only changed through the verify endpoint
    if !matches!(user.role, Role::Moderator | Role::Admin) {
        update.is_verified = None;
    }

    let images = update.images.take();
    let price_changed = update.price.is_some() || update.currency.is_some();

    let updated = state
        .db
        .update_property_fields(&property_id, &update)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Property with ID {} not found", property_id))
        })?;

    if let Some(images) = images {
        state
            .db
            .replace_property_images(&property_id, &images)
            .await?;
    }

    // Any price or currency change lands in the pricing history
    if price_changed {
        state
            .db
            .append_pricing_history(&property_id, updated.price, &updated.currency)
            .await?;
    }

    let data = state
        .db
        .get_property(&property_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Property with ID {} not found", property_id))
        })?;

    Ok(Json(serde_json::json!({
        "message": "Property updated successfully",
        "data": data,
    })))
}

/// DELETE /api/properties/:propertyId
pub async fn delete_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    let existing = state
        .db
        .get_property_row(&property_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Property with ID {} not found", property_id))
        })?;

    if !can_manage(&user, &existing) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this property".to_string(),
        ));
    }

    state.db.delete_property(&property_id).await?;
    tracing::info!("Property {} deleted by {}", property_id, user.id);

    Ok(Json(serde_json::json!({
        "message": "Property deleted successfully",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPropertyRequest {
    pub is_verified: Option<bool>,
    pub verification_comments: Option<String>,
}

/// PATCH /api/properties/:propertyId/verify (moderator/admin)
pub async fn verify_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(req): Json<VerifyPropertyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = require_role(&state, &headers, &[Role::Moderator, Role::Admin]).await?;

    if state.db.get_property_row(&property_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Property with ID {} not found",
            property_id
        )));
    }

    let property = state
        .db
        .set_property_verified(
            &property_id,
            req.is_verified.unwrap_or(true),
            req.verification_comments.as_deref(),
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Property with ID {} not found", property_id))
        })?;

    tracing::info!(
        "Property {} verification set to {} by {}",
        property_id,
        property.is_verified,
        user.id
    );

    Ok(Json(serde_json::json!({
        "message": "Property verification updated",
        "data": property,
    })))
}
