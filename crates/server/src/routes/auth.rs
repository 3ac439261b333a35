use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{Role, User},
    error::AppError,
    oauth,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub exp: usize,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    // Check if user already exists
    if state.db.get_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;

    let now = Utc::now().to_rfc3339();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email.clone(),
        password_hash: Some(password_hash),
        role: req.role,
        is_email_verified: false,
        paypal_credentials: None,
        listing_limit: req.role.default_listing_limit(),
        avatar_url: default_avatar_url(),
        bio: "This section is yet empty.".to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.create_user(&user).await?;

    // Store the verification token and mail the confirmation link
    let verification_token = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + Duration::hours(24)).to_rfc3339();
    state
        .db
        .create_email_verification_token(&user.id, &verification_token, &expires_at)
        .await?;
    state
        .mailer
        .send_verification_email(&req.email, &verification_token)
        .await;

    tracing::info!("Registered user {} with role {}", user.id, user.role.as_str());

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Registration successful. Please verify your email.",
            "userId": user.id,
        })),
    ))
}

/// GET /api/auth/verify-email/:token
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let consumed = state.db.consume_email_verification_token(&token).await?;

    let Some((user_id, expires_at)) = consumed else {
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    };

    if is_expired(&expires_at) {
        // A stale link is fine when the account got verified some other way
        let already_verified = state
            .db
            .get_user_by_id(&user_id)
            .await?
            .map(|user| user.is_email_verified)
            .unwrap_or(false);
        if already_verified {
            return Ok(Json(
                serde_json::json!({ "message": "Email verified successfully" }),
            ));
        }
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    state.db.set_email_verified(&user_id).await?;
    tracing::info!("Email verified for user {}", user_id);

    Ok(Json(
        serde_json::json!({ "message": "Email verified successfully" }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    let user = state
        .db
        .get_user_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User with this email does not exist".to_string()))?;

    if !user.is_email_verified {
        return Err(AppError::Forbidden("Please verify your email".to_string()));
    }

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Incorrect password".to_string()))?;
    if !verify_password(&req.password, password_hash)? {
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    issue_token_pair(&state, &user).await.map(Json)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Single-use rotation: the presented token is revoked and a fresh pair
/// is issued.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    let (user_id, expires_at) = state
        .db
        .consume_refresh_token(&req.refresh_token)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid or expired refresh token".to_string())
        })?;

    if is_expired(&expires_at) {
        return Err(AppError::Unauthorized(
            "Invalid or expired refresh token".to_string(),
        ));
    }

    let user = state
        .db
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    issue_token_pair(&state, &user).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct OAuthRequest {
    pub code: String,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub is_new_user: bool,
    pub message: String,
}

pub async fn google_auth(
    State(state): State<AppState>,
    Json(req): Json<OAuthRequest>,
) -> Result<Json<OAuthResponse>, AppError> {
    if req.code.is_empty() {
        return Err(AppError::BadRequest(
            "Authorization code is required".to_string(),
        ));
    }

    let tokens = oauth::exchange_google_code(&state.http, &state.config.google, &req.code).await?;
    let info = oauth::fetch_google_userinfo(&state.http, &tokens.access_token).await?;

    let (user, is_new_user) = resolve_oauth_user(&state, &info.email, req.role).await?;

    // Reject a Google identity already linked to a different account
    if let Some(owner) = state.db.get_google_credential_owner(&info.id).await? {
        if owner != user.id {
            return Err(AppError::BadRequest(
                "This Google account is already linked to another user".to_string(),
            ));
        }
    }

    let token_expiry = tokens
        .expires_in
        .map(|seconds| (Utc::now() + Duration::seconds(seconds)).to_rfc3339());
    state
        .db
        .upsert_google_credentials(
            &user.id,
            &info.id,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            token_expiry.as_deref(),
        )
        .await?;

    let pair = issue_token_pair(&state, &user).await?;
    Ok(Json(OAuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        is_new_user,
        message: if is_new_user {
            "User created and logged in via Google".to_string()
        } else {
            "Logged in via Google".to_string()
        },
    }))
}

pub async fn facebook_auth(
    State(state): State<AppState>,
    Json(req): Json<OAuthRequest>,
) -> Result<Json<OAuthResponse>, AppError> {
    if req.code.is_empty() {
        return Err(AppError::BadRequest(
            "Authorization code is required".to_string(),
        ));
    }

    let tokens =
        oauth::exchange_facebook_code(&state.http, &state.config.facebook, &req.code).await?;
    let info = oauth::fetch_facebook_userinfo(&state.http, &tokens.access_token).await?;

    let (user, is_new_user) = resolve_oauth_user(&state, &info.email, req.role).await?;

    if let Some(owner) = state.db.get_facebook_credential_owner(&info.id).await? {
        if owner != user.id {
            return Err(AppError::BadRequest(
                "This Facebook account is already linked to another user".to_string(),
            ));
        }
    }

    let token_expiry = tokens
        .expires_in
        .map(|seconds| (Utc::now() + Duration::seconds(seconds)).to_rfc3339());
    state
        .db
        .upsert_facebook_credentials(&user.id, &info.id, &tokens.access_token, token_expiry.as_deref())
        .await?;

    let pair = issue_token_pair(&state, &user).await?;
    Ok(Json(OAuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        is_new_user,
        message: if is_new_user {
            "User created and logged in via Facebook".to_string()
        } else {
            "Logged in via Facebook".to_string()
        },
    }))
}

/// Find the account for an OAuth sign-in, creating it (pre-verified) on
/// first contact. The provider address is trusted as verified.
async fn resolve_oauth_user(
    state: &AppState,
    email: &str,
    role: Option<Role>,
) -> Result<(User, bool), AppError> {
    if let Some(existing) = state.db.get_user_by_email(email).await? {
        if let Some(requested) = role {
            if existing.role != requested {
                return Err(AppError::BadRequest(format!(
                    "Account already exists with a different role: {}",
                    existing.role.as_str()
                )));
            }
        }
        state.db.set_email_verified(&existing.id).await?;
        return Ok((existing, false));
    }

    let role = role.ok_or_else(|| {
        AppError::BadRequest("Role is required for new user registration".to_string())
    })?;

    let username = email.split('@').next().unwrap_or(email).to_string();
    let now = Utc::now().to_rfc3339();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username,
        email: email.to_string(),
        password_hash: None,
        role,
        is_email_verified: true,
        paypal_credentials: None,
        listing_limit: role.default_listing_limit(),
        avatar_url: default_avatar_url(),
        bio: "This section is yet empty.".to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.create_user(&user).await?;
    tracing::info!("Created user {} via OAuth sign-in", user.id);

    Ok((user, true))
}

// ============================================================================
// Token and password helpers
// ============================================================================

pub(crate) async fn issue_token_pair(
    state: &AppState,
    user: &User,
) -> Result<TokenPairResponse, AppError> {
    let access_token = generate_token(&user.id, &user.email, &state.config.auth)?;

    let refresh_token = random_token(64);
    let expires_at =
        (Utc::now() + Duration::days(state.config.auth.refresh_expiry_days as i64)).to_rfc3339();
    state
        .db
        .create_refresh_token(&user.id, &refresh_token, &expires_at)
        .await?;

    Ok(TokenPairResponse {
        access_token,
        refresh_token,
    })
}

fn generate_token(
    user_id: &str,
    email: &str,
    auth_config: &crate::config::AuthConfig,
) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(e.to_string()))
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub(crate) fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Whether an RFC 3339 expiry has passed. Unparseable stamps count as
/// expired.
pub(crate) fn is_expired(expires_at: &str) -> bool {
    DateTime::parse_from_rfc3339(expires_at)
        .map(|t| t < Utc::now())
        .unwrap_or(true)
}

pub(crate) fn default_avatar_url() -> String {
    "https://t4.ftcdn.net/jpg/02/15/84/43/360_F_215844325_ttX9YiIIyeaR7Ne6EaLLjMAmy4GvPC69.jpg"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let config = crate::config::AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_expiry_hours: 1,
            refresh_expiry_days: 7,
        };
        let token = generate_token("user-1", "a@example.com", &config).unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let config = crate::config::AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_expiry_hours: 1,
            refresh_expiry_days: 7,
        };
        let token = generate_token("user-1", "a@example.com", &config).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_is_expired() {
        let past = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        let future = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        assert!(is_expired(&past));
        assert!(!is_expired(&future));
        assert!(is_expired("not-a-date"));
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, random_token(32));
    }
}
