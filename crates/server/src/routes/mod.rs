use axum::{
    http::{header, HeaderMap},
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

mod ai;
mod auth;
mod filters;
mod health;
mod paypal;
mod properties;
mod stats;
mod subscription;
mod user;
mod views;
mod wishlist;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh-token", post(auth::refresh_token))
        .route("/api/auth/google", post(auth::google_auth))
        .route("/api/auth/facebook", post(auth::facebook_auth))
        .route("/api/auth/verify-email/:token", get(auth::verify_email))
        // AI assistant
        .route(
            "/api/ai/system-prompt",
            get(ai::get_system_prompt).put(ai::update_system_prompt),
        )
        .route("/api/ai/conversations", post(ai::create_conversation))
        .route(
            "/api/ai/conversations/history",
            get(ai::get_conversation_history),
        )
        .route(
            "/api/ai/conversations/visible-history",
            get(ai::get_visible_conversation_history),
        )
        .route("/api/ai/conversations/messages", post(ai::send_message))
        // Properties
        .route(
            "/api/properties",
            get(properties::get_all_properties).post(properties::add_property),
        )
        .route(
            "/api/properties/:propertyId",
            get(properties::get_property)
                .patch(properties::update_property)
                .delete(properties::delete_property),
        )
        .route(
            "/api/properties/:propertyId/verify",
            patch(properties::verify_property),
        )
        // Filters
        .route("/api/filters/price-range", get(filters::price_range))
        .route("/api/filters/area-range", get(filters::area_range))
        .route("/api/filters/rooms", get(filters::rooms))
        .route(
            "/api/filters/transaction-types",
            get(filters::transaction_types),
        )
        .route("/api/filters/property-types", get(filters::property_types))
        // Statistics
        .route("/api/stats/listings-by-region", get(stats::listings_by_region))
        .route(
            "/api/stats/price-stats-by-region",
            get(stats::price_stats_by_region),
        )
        .route("/api/stats/top-regions", get(stats::top_regions))
        .route(
            "/api/stats/average-price-growth",
            get(stats::average_price_growth),
        )
        .route(
            "/api/stats/property-views/:propertyId",
            get(stats::property_views),
        )
        .route("/api/stats/total-sales", get(stats::total_sales))
        .route("/api/stats/top-viewed", get(stats::top_viewed))
        .route("/api/stats/new-users", get(stats::new_users))
        // Wishlist
        .route(
            "/api/wishlist",
            get(wishlist::get_wishlist).post(wishlist::add_wishlist_item),
        )
        .route(
            "/api/wishlist/:propertyId",
            delete(wishlist::remove_wishlist_item),
        )
        // Property views
        .route("/api/views", post(views::record_view))
        // Users & change requests
        .route(
            "/api/user",
            get(user::get_current_user)
                .patch(user::update_current_user)
                .post(user::add_user),
        )
        .route("/api/user/all", get(user::get_all_users))
        .route(
            "/api/user/request-email-change",
            post(user::request_email_change),
        )
        .route(
            "/api/user/request-password-change",
            post(user::request_password_change),
        )
        .route("/api/user/confirm-change/:token", get(user::confirm_change))
        .route("/api/user/forgot-password", post(user::forgot_password))
        .route("/api/user/reset-password", post(user::reset_password))
        .route(
            "/api/user/:userId",
            get(user::get_user_by_id)
                .patch(user::update_user_by_id)
                .delete(user::delete_user),
        )
        // Subscriptions
        .route("/api/subscription", get(subscription::get_plans))
        .route(
            "/api/subscription/create-order",
            post(subscription::create_order),
        )
        .route(
            "/api/subscription/capture-order",
            post(subscription::capture_order),
        )
        // PayPal (listing promotion)
        .route("/api/paypal/create-order", post(paypal::create_order))
        .route("/api/paypal/capture-order", post(paypal::capture_order))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Extract and verify the Bearer token, returning the authenticated user.
pub(crate) async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    let claims = auth::verify_token(token, &state.config.auth.jwt_secret)?;

    state
        .db
        .get_user_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
}

/// Like [`current_user`], but additionally checks the user's role.
pub(crate) async fn require_role(
    state: &AppState,
    headers: &HeaderMap,
    allowed: &[Role],
) -> Result<User, AppError> {
    let user = current_user(state, headers).await?;
    if !allowed.contains(&user.role) {
        return Err(AppError::Forbidden(
            "Forbidden: insufficient role".to_string(),
        ));
    }
    Ok(user)
}
