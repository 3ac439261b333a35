//! Marketplace statistics, gated to moderator (and admin for the
//! platform-wide reports).

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use crate::{db::Role, error::AppError, state::AppState};

use super::{current_user, require_role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthQuery {
    pub previous_start: Option<String>,
    pub previous_end: Option<String>,
    pub current_start: Option<String>,
    pub current_end: Option<String>,
}

/// Accepts RFC 3339 timestamps or plain dates (YYYY-MM-DD, midnight UTC).
fn parse_date(value: Option<&String>) -> Option<DateTime<Utc>> {
    let value = value?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Extend an end bound to the last instant of its day, so a date-only
/// range includes the whole end day.
fn end_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    let start_of_day = Utc.from_utc_datetime(&date.date_naive().and_time(NaiveTime::MIN));
    start_of_day + Duration::days(1) - Duration::milliseconds(1)
}

fn parse_range(query: &RangeQuery) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    match (
        parse_date(query.start_date.as_ref()),
        parse_date(query.end_date.as_ref()),
    ) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(AppError::BadRequest(
            "Missing or invalid startDate or endDate".to_string(),
        )),
    }
}

/// GET /api/stats/listings-by-region (moderator)
pub async fn listings_by_region(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator]).await?;
    let (start, end) = parse_range(&query)?;

    let data = state
        .db
        .listings_by_region(&start.to_rfc3339(), &end.to_rfc3339())
        .await?;
    Ok(Json(serde_json::json!(data)))
}

/// GET /api/stats/price-stats-by-region (moderator)
pub async fn price_stats_by_region(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator]).await?;
    let (start, end) = parse_range(&query)?;

    let data = state
        .db
        .price_stats_by_region(&start.to_rfc3339(), &end.to_rfc3339())
        .await?;
    Ok(Json(serde_json::json!(data)))
}

/// GET /api/stats/top-regions (moderator)
pub async fn top_regions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator]).await?;
    let (start, end) = parse_range(&query)?;

    let data = state
        .db
        .top_regions(&start.to_rfc3339(), &end.to_rfc3339(), 5)
        .await?;
    Ok(Json(serde_json::json!(data)))
}

/// GET /api/stats/average-price-growth (moderator)
pub async fn average_price_growth(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GrowthQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator]).await?;

    let parsed = (
        parse_date(query.previous_start.as_ref()),
        parse_date(query.previous_end.as_ref()),
        parse_date(query.current_start.as_ref()),
        parse_date(query.current_end.as_ref()),
    );
    let (Some(previous_start), Some(previous_end), Some(current_start), Some(current_end)) =
        parsed
    else {
        return Err(AppError::BadRequest(
            "Missing or invalid required date ranges".to_string(),
        ));
    };

    let data = state
        .db
        .average_price_growth(
            &previous_start.to_rfc3339(),
            &previous_end.to_rfc3339(),
            &current_start.to_rfc3339(),
            &current_end.to_rfc3339(),
        )
        .await?;
    Ok(Json(serde_json::json!(data)))
}

/// GET /api/stats/property-views/:propertyId
pub async fn property_views(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    current_user(&state, &headers).await?;
    let (start, end) = parse_range(&query)?;

    let count = state
        .db
        .property_view_count(
            &property_id,
            &start.to_rfc3339(),
            &end_of_day(end).to_rfc3339(),
        )
        .await?;
    Ok(Json(serde_json::json!({ "viewCount": count })))
}

/// GET /api/stats/total-sales (moderator/admin)
pub async fn total_sales(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator, Role::Admin]).await?;
    let (start, end) = parse_range(&query)?;

    let totals = state
        .db
        .total_sales(&start.to_rfc3339(), &end_of_day(end).to_rfc3339())
        .await?;
    Ok(Json(serde_json::json!(totals)))
}

/// GET /api/stats/top-viewed (moderator/admin)
pub async fn top_viewed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator, Role::Admin]).await?;
    let (start, end) = parse_range(&query)?;

    let data = state
        .db
        .top_viewed_properties(&start.to_rfc3339(), &end_of_day(end).to_rfc3339(), 10)
        .await?;
    Ok(Json(serde_json::json!(data)))
}

/// GET /api/stats/new-users (moderator/admin)
pub async fn new_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_role(&state, &headers, &[Role::Moderator, Role::Admin]).await?;
    let (start, end) = parse_range(&query)?;

    let stats = state
        .db
        .new_users_stats(&start.to_rfc3339(), &end_of_day(end).to_rfc3339())
        .await?;
    Ok(Json(serde_json::json!(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_both_formats() {
        let iso = "2024-03-05T10:30:00+00:00".to_string();
        let day = "2024-03-05".to_string();
        assert!(parse_date(Some(&iso)).is_some());
        let midnight = parse_date(Some(&day)).unwrap();
        assert_eq!(midnight.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert!(parse_date(Some(&"not-a-date".to_string())).is_none());
        assert!(parse_date(None).is_none());
    }

    #[test]
    fn test_end_of_day_extends_to_last_instant() {
        let day = parse_date(Some(&"2024-03-05".to_string())).unwrap();
        let end = end_of_day(day);
        assert_eq!(end.to_rfc3339(), "2024-03-05T23:59:59.999+00:00");
    }
}
