use axum::{Json, extract::State};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    models::booking::Booking,
    routemount::route::AppState,
    utils::{billing::assess_overstay, errorhandler::AppError, jwt::{AccessRole, verify_auth_token}},
};

#[derive(Serialize, Default)]
pub struct SweepReport {
    pub processed: u64,
    pub failures: Vec<SweepFailure>,
}

#[derive(Serialize)]
pub struct SweepFailure {
    pub booking_id: Uuid,
    pub error: String,
}

/// Marks every Active booking past its due date as Overstayed with the
/// accrued fine. Overstay figures are always recomputed from to_date, so
/// running the sweep twice in the same hour yields the same numbers.
/// One failed booking is reported, never aborts the rest of the batch.
pub async fn sweep_overstays(pool: &PgPool, default_daily_fine: f64) -> Result<SweepReport, AppError> {
    let now = OffsetDateTime::now_utc();

    let overdue = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE status = 'Active' AND to_date < $1",
        )
        .bind(now)
        .fetch_all(pool)
        .await
        .map_err(AppError::from)?;

    let mut report = SweepReport::default();

    for booking in overdue {
        match sweep_one(pool, &booking, now, default_daily_fine).await {
            Ok(true) => report.processed += 1,
            // resolved concurrently (e.g. an admin completed it), skip
            Ok(false) => {}
            Err(err) => {
                warn!("overstay sweep failed for booking {}: {}", booking.booking_id, err);
                report.failures.push(SweepFailure {
                    booking_id: booking.booking_id,
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(report)
}

async fn sweep_one(
    pool: &PgPool,
    booking: &Booking,
    now: OffsetDateTime,
    default_daily_fine: f64,
) -> Result<bool, AppError> {
    let Some(assessed) = assess_overstay(booking.to_date, now, booking.daily_rate, default_daily_fine) else {
        return Ok(false);
    };

    // status = 'Active' in the WHERE clause keeps this write atomic against
    // a concurrent completion of the same booking
    let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'Overstayed',
                overstay_days = $2,
                fine_amount = $3,
                updated_at = now()
            WHERE booking_id = $1 AND status = 'Active'
            "#,
        )
        .bind(booking.booking_id)
        .bind(assessed.overstay_days as i32)
        .bind(assessed.fine_amount)
        .execute(pool)
        .await
        .map_err(AppError::from)?;

    Ok(result.rows_affected() > 0)
}

/// Background schedule, hourly by default. The sweep is also reachable on
/// demand through the admin endpoint below.
pub fn spawn_overstay_sweeper(pool: PgPool, config: AppConfig) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.sweep_interval);
        loop {
            ticker.tick().await;
            match sweep_overstays(&pool, config.default_daily_fine).await {
                Ok(report) => {
                    info!(
                        "overstay sweep finished: {} processed, {} failures",
                        report.processed,
                        report.failures.len()
                    );
                }
                Err(err) => warn!("overstay sweep run failed: {}", err),
            }
        }
    });
}

pub async fn run_overstay_sweep(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<SweepReport>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators have access"));
    }

    let report = sweep_overstays(&state.pool, state.config.default_daily_fine).await?;

    Ok(Json(report))
}
