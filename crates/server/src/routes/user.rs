//! User profiles, admin user management and the token-confirmed
//! email/password change flows.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{
        ChangeRequestKind, PropertyWithRelations, Role, SubscriptionSummary, User,
    },
    error::AppError,
    state::AppState,
};

use super::{auth, current_user, require_role};

/// GET /api/user
pub async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub paypal_credentials: Option<String>,
}

/// PATCH /api/user
pub async fn update_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let user = current_user(&state, &headers).await?;

    if req.username.is_none()
        && req.avatar_url.is_none()
        && req.bio.is_none()
        && req.paypal_credentials.is_none()
    {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    let updated = state
        .db
        .update_user_profile(
            &user.id,
            req.username.as_deref(),
            req.avatar_url.as_deref(),
            req.bio.as_deref(),
            req.paypal_credentials.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(updated))
}

/// GET /api/user/all (admin)
pub async fn get_all_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, AppError> {
    let admin = require_role(&state, &headers, &[Role::Admin]).await?;
    let users = state.db.list_users_except(&admin.id).await?;
    Ok(Json(users))
}

/// Public profile: the user, their verified listings and any running
/// subscription.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    #[serde(flatten)]
    pub user: User,
    pub properties: Vec<PropertyWithRelations>,
    pub subscription: Option<SubscriptionSummary>,
}

/// GET /api/user/:userId
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicProfile>, AppError> {
    let user = state
        .db
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let properties = state.db.list_verified_properties_for_owner(&user.id).await?;
    let subscription = state.db.get_current_subscription(&user.id).await?;

    Ok(Json(PublicProfile {
        user,
        properties,
        subscription,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

/// POST /api/user (admin) — create a pre-verified account.
pub async fn add_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    require_role(&state, &headers, &[Role::Admin]).await?;

    if state.db.get_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let now = Utc::now().to_rfc3339();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email,
        password_hash: Some(password_hash),
        role: req.role,
        is_email_verified: true,
        paypal_credentials: None,
        listing_limit: req.role.default_listing_limit(),
        avatar_url: req.avatar_url.unwrap_or_else(auth::default_avatar_url),
        bio: req.bio.unwrap_or_else(|| "This section is yet empty.".to_string()),
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.create_user(&user).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub listing_limit: Option<i64>,
}

/// PATCH /api/user/:userId (admin)
pub async fn update_user_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    require_role(&state, &headers, &[Role::Admin]).await?;

    if req.username.is_none()
        && req.avatar_url.is_none()
        && req.bio.is_none()
        && req.email.is_none()
        && req.role.is_none()
        && req.listing_limit.is_none()
    {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    if let Some(email) = &req.email {
        if state.db.email_in_use_by_other(email, &user_id).await? {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
    }

    let updated = state
        .db
        .admin_update_user(
            &user_id,
            req.username.as_deref(),
            req.avatar_url.as_deref(),
            req.bio.as_deref(),
            req.email.as_deref(),
            req.role,
            req.listing_limit,
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(updated))
}

/// DELETE /api/user/:userId (admin)
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Admin]).await?;

    if !state.db.delete_user(&user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "User deleted successfully" })))
}

// ============================================================================
// Change-request flow (email & password change, password reset)
// ============================================================================

const CHANGE_REQUEST_TTL_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEmailChangeRequest {
    pub new_email: String,
}

/// POST /api/user/request-email-change
pub async fn request_email_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RequestEmailChangeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    if req.new_email.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required field: newEmail".to_string(),
        ));
    }
    if state
        .db
        .email_in_use_by_other(&req.new_email, &user.id)
        .await?
    {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let token = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + Duration::hours(CHANGE_REQUEST_TTL_HOURS)).to_rfc3339();
    state
        .db
        .create_change_request(
            &user.id,
            ChangeRequestKind::Email,
            &req.new_email,
            &token,
            &expires_at,
        )
        .await?;

    state
        .mailer
        .send_change_confirmation_email(&req.new_email, &token, ChangeRequestKind::Email)
        .await;

    Ok(Json(serde_json::json!({
        "message": "Confirmation email sent to new address",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPasswordChangeRequest {
    pub new_password: String,
}

/// POST /api/user/request-password-change
///
/// The new password is hashed up front; only the hash is stored as the
/// pending value.
pub async fn request_password_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RequestPasswordChangeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = current_user(&state, &headers).await?;

    if req.new_password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let hashed = auth::hash_password(&req.new_password)?;
    let token = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + Duration::hours(CHANGE_REQUEST_TTL_HOURS)).to_rfc3339();
    state
        .db
        .create_change_request(
            &user.id,
            ChangeRequestKind::Password,
            &hashed,
            &token,
            &expires_at,
        )
        .await?;

    state
        .mailer
        .send_change_confirmation_email(&user.email, &token, ChangeRequestKind::Password)
        .await;

    Ok(Json(serde_json::json!({
        "message": "Confirmation link sent to your email",
    })))
}

/// GET /api/user/confirm-change/:token
///
/// Consumes the token exactly once and applies the pending value. A
/// duplicate confirm finds no row and fails like an expired one.
pub async fn confirm_change(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request = state
        .db
        .consume_change_request(&token)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;

    if auth::is_expired(&request.expires_at) {
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    match request.kind {
        ChangeRequestKind::Email => {
            state
                .db
                .update_user_email(&request.user_id, &request.new_value)
                .await?;
        }
        ChangeRequestKind::Password => {
            state
                .db
                .update_user_password(&request.user_id, &request.new_value)
                .await?;
        }
    }

    tracing::info!(
        "Change request applied for user {} ({:?})",
        request.user_id,
        request.kind
    );

    Ok(Json(serde_json::json!({ "message": "Change confirmed" })))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /api/user/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = state.db.get_user_by_email(&req.email).await?;

    // Always report success to prevent email enumeration
    let Some(user) = user else {
        tracing::info!("Password reset requested for non-existent email: {}", req.email);
        return Ok(Json(serde_json::json!({
            "success": true,
            "message": "If your email is registered, you will receive a password reset link.",
        })));
    };

    // The replacement password arrives at reset time; the row only needs
    // to tie the token to the account.
    let token = auth::random_token(32);
    let expires_at = (Utc::now() + Duration::hours(CHANGE_REQUEST_TTL_HOURS)).to_rfc3339();
    state
        .db
        .create_change_request(&user.id, ChangeRequestKind::Password, "", &token, &expires_at)
        .await?;

    state
        .mailer
        .send_password_reset_email(&req.email, &token)
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "If your email is registered, you will receive a password reset link.",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// POST /api/user/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let request = state
        .db
        .consume_change_request(&req.token)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    if auth::is_expired(&request.expires_at) || request.kind != ChangeRequestKind::Password {
        return Err(AppError::BadRequest(
            "Invalid or expired reset token".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let updated = state
        .db
        .update_user_password(&request.user_id, &password_hash)
        .await?;
    if !updated {
        return Err(AppError::Internal("Failed to update password".to_string()));
    }

    tracing::info!("Password reset completed for user {}", request.user_id);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password has been reset successfully.",
    })))
}
