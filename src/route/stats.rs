use axum::{Json, extract::{State, Query}};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use time::{Date, Month, OffsetDateTime};

use crate::{models::booking::Booking, utils::{billing::billable_days, errorhandler::AppError, jwt::verify_auth_token}};

#[derive(Deserialize)]
pub struct MonthlyRevenueQuery {
    pub year: i32,
    pub month: u8,
}

/// Revenue of a set of completed bookings at days x frozen daily rate.
/// Rows persisted without a rate contribute nothing.
fn completed_revenue(bookings: &[Booking]) -> f64 {
    bookings
        .iter()
        .map(|b| billable_days(b.from_date, b.to_date) as f64 * b.daily_rate.unwrap_or(0.0))
        .sum()
}

pub async fn get_dashboard_stats(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    let total_lots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_lots")
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    let total_levels: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_levels")
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    let total_slots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_slots")
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    let total_bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    let now = OffsetDateTime::now_utc();

    let active_bookings: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE from_date <= $1 AND to_date >= $1 AND status IN ('Confirmed', 'Active')",
        )
        .bind(now)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    let month_start = Date::from_calendar_date(now.year(), now.month(), 1)
        .map_err(|_| AppError::Unexpected)?
        .midnight()
        .assume_utc();

    let monthly_bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE status = 'Completed' AND from_date >= $1",
        )
        .bind(month_start)
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "total_lots": total_lots,
        "total_levels": total_levels,
        "total_slots": total_slots,
        "total_bookings": total_bookings,
        "active_bookings": active_bookings,
        "monthly_revenue": completed_revenue(&monthly_bookings)
    })))
}

pub async fn get_monthly_revenue(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<MonthlyRevenueQuery>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    let month = Month::try_from(params.month)
        .map_err(|_| AppError::invalid_input("month must be between 1 and 12"))?;

    let start = Date::from_calendar_date(params.year, month, 1)
        .map_err(|_| AppError::invalid_input("invalid year/month"))?
        .midnight()
        .assume_utc();

    let (next_year, next_month) = match month {
        Month::December => (params.year + 1, Month::January),
        _ => (params.year, month.next()),
    };
    let end = Date::from_calendar_date(next_year, next_month, 1)
        .map_err(|_| AppError::invalid_input("invalid year/month"))?
        .midnight()
        .assume_utc();

    let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE status = 'Completed' AND from_date >= $1 AND from_date < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({"revenue": completed_revenue(&bookings)})))
}
