use axum::{Json, extract::{State, Path, Query}, http::StatusCode};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{json, Value};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::{
    models::{
        booking::{Booking, SlotReview},
        slot::{AvailabilityQuery, AvailableSlotsQuery, CreateSlotReq, ParkingSlot, SlotQueryParams, SlotStatus, UpdateSlotReq, UpdateSlotStatusReq},
    },
    route::booking::has_overlapping_booking,
    utils::{errorhandler::AppError, jwt::{AccessRole, verify_auth_token}},
};

pub async fn create_slot(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateSlotReq>
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    if payload.slot_number.trim().is_empty() {
        return Err(AppError::invalid_input("slot number is required"));
    }
    if payload.price < 0.0 {
        return Err(AppError::invalid_input("price must not be negative"));
    }
    if payload.fine_amount.is_some_and(|f| f < 0.0) {
        return Err(AppError::invalid_input("fine amount must not be negative"));
    }

    let level_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parking_levels WHERE level_id = $1)")
        .bind(payload.level_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if !level_exists {
        return Err(AppError::not_found("parking level not found"));
    }

    // slot numbers are unique per level, duplicate maps to Conflict
    let slot = sqlx::query_as::<_, ParkingSlot>(
            r#"
            INSERT INTO parking_slots (level_id, slot_number, price, fine_amount)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(payload.level_id)
        .bind(payload.slot_number.trim())
        .bind(payload.price)
        .bind(payload.fine_amount.unwrap_or(0.0))
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok((StatusCode::CREATED, Json(json!(slot))))
}

pub async fn get_slots(
    State(pg): State<PgPool>,
    Query(params): Query<SlotQueryParams>,
) -> Result<Json<Value>, AppError> {

    let mut query_builder = QueryBuilder::new("SELECT * FROM parking_slots WHERE 1=1");

    if let Some(level) = params.level {
        query_builder.push(" AND level_id = ");
        query_builder.push_bind(level);
    };

    if let Some(status) = params.status {
        query_builder.push(" AND status = ");
        query_builder.push_bind(status);
    };

    query_builder.push(" ORDER BY slot_number");

    let slots = query_builder.build_query_as::<ParkingSlot>()
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({"data": slots})))
}

pub async fn get_slot_by_id(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {

    let slot = sqlx::query_as::<_, ParkingSlot>("SELECT * FROM parking_slots WHERE slot_id = $1")
        .bind(slot_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking slot not found"))?;

    Ok(Json(json!({"data": slot})))
}

pub async fn update_slot(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateSlotReq>
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    if payload.price.is_some_and(|p| p < 0.0) {
        return Err(AppError::invalid_input("price must not be negative"));
    }
    if payload.fine_amount.is_some_and(|f| f < 0.0) {
        return Err(AppError::invalid_input("fine amount must not be negative"));
    }

    let slot = sqlx::query_as::<_, ParkingSlot>("SELECT * FROM parking_slots WHERE slot_id = $1")
        .bind(slot_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking slot not found"))?;

    if let Some(level_id) = payload.level_id {
        if level_id != slot.level_id && claims.role != AccessRole::Admin {
            return Err(AppError::forbidden("only administrators can move a slot to another level"));
        }

        let level_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parking_levels WHERE level_id = $1)")
            .bind(level_id)
            .fetch_one(&pg)
            .await
            .map_err(AppError::from)?;

        if !level_exists {
            return Err(AppError::not_found("parking level not found"));
        }
    }

    // Note: price edits never touch existing bookings, their daily_rate
    // was frozen at admission time.
    let updated = sqlx::query_as::<_, ParkingSlot>(
            r#"
            UPDATE parking_slots
            SET slot_number = COALESCE($2, slot_number),
                level_id = COALESCE($3, level_id),
                price = COALESCE($4, price),
                fine_amount = COALESCE($5, fine_amount)
            WHERE slot_id = $1
            RETURNING *
            "#,
        )
        .bind(slot_id)
        .bind(payload.slot_number.as_deref().map(str::trim))
        .bind(payload.level_id)
        .bind(payload.price)
        .bind(payload.fine_amount)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(updated)))
}

pub async fn update_slot_status(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateSlotStatusReq>
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    let slot = sqlx::query_as::<_, ParkingSlot>(
            "UPDATE parking_slots SET status = $2 WHERE slot_id = $1 RETURNING *",
        )
        .bind(slot_id)
        .bind(payload.status)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking slot not found"))?;

    Ok(Json(json!(slot)))
}

pub async fn delete_slot(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    let slot_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parking_slots WHERE slot_id = $1)")
        .bind(slot_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if !slot_exists {
        return Err(AppError::not_found("parking slot not found"));
    }

    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE slot_id = $1")
        .bind(slot_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    // only an admin may cascade the referencing bookings away
    if bookings > 0 && claims.role != AccessRole::Admin {
        return Err(AppError::conflict("cannot delete slot with bookings, contact admin"));
    }

    let mut tx = pg.begin().await.map_err(AppError::from)?;

    sqlx::query("DELETE FROM bookings WHERE slot_id = $1")
        .bind(slot_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

    sqlx::query("DELETE FROM parking_slots WHERE slot_id = $1")
        .bind(slot_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

    tx.commit().await.map_err(AppError::from)?;

    Ok(Json(json!({"message": "parking slot deleted successfully"})))
}

pub async fn check_slot_availability(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {

    if params.to <= params.from {
        return Err(AppError::invalid_input("end date must be after start date"));
    }

    let slot = sqlx::query_as::<_, ParkingSlot>("SELECT * FROM parking_slots WHERE slot_id = $1")
        .bind(slot_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking slot not found"))?;

    let available = slot.status == SlotStatus::Available
        && !has_overlapping_booking(&pg, slot_id, params.from, params.to, None).await?;

    Ok(Json(json!({"available": available})))
}

pub async fn get_available_slots(
    State(pg): State<PgPool>,
    Query(params): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {

    let mut query_builder = QueryBuilder::new("SELECT s.* FROM parking_slots s WHERE s.status = 'Available'");

    if let Some(level) = params.level {
        query_builder.push(" AND s.level_id = ");
        query_builder.push_bind(level);
    };

    // One NOT EXISTS over the whole listing instead of an overlap query per
    // slot. Same inclusive boundary test as the single-slot check.
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if to <= from {
            return Err(AppError::invalid_input("end date must be after start date"));
        }

        query_builder.push(
            " AND NOT EXISTS (
                SELECT 1 FROM bookings b
                WHERE b.slot_id = s.slot_id
                  AND b.status IN ('Confirmed', 'Active')
                  AND b.from_date <= ");
        query_builder.push_bind(to);
        query_builder.push(" AND b.to_date >= ");
        query_builder.push_bind(from);
        query_builder.push(")");
    }

    query_builder.push(" ORDER BY s.slot_number");

    let slots = query_builder.build_query_as::<ParkingSlot>()
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({"data": slots})))
}

pub async fn get_bookings_by_slot(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE slot_id = $1 ORDER BY from_date",
        )
        .bind(slot_id)
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(bookings)))
}

pub async fn get_slot_reviews(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {

    let slot_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parking_slots WHERE slot_id = $1)")
        .bind(slot_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if !slot_exists {
        return Err(AppError::not_found("parking slot not found"));
    }

    // read-time aggregation over completed reviewed bookings, no counter
    // is maintained anywhere
    let reviews = sqlx::query_as::<_, SlotReview>(
            r#"
            SELECT
                b.booking_id,
                u.first_name,
                u.email,
                b.review_rating AS rating,
                b.review_comment AS comment,
                b.reviewed_at,
                b.vehicle_number,
                b.from_date
            FROM bookings AS b
            INNER JOIN users AS u ON u.user_id = b.booked_by
            WHERE b.slot_id = $1
              AND b.status = 'Completed'
              AND b.review_rating IS NOT NULL
              AND b.reviewed_at IS NOT NULL
            ORDER BY b.reviewed_at DESC
            "#,
        )
        .bind(slot_id)
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    let review_count = reviews.len();
    let average_rating = if review_count > 0 {
        reviews.iter().map(|r| r.rating as f64).sum::<f64>() / review_count as f64
    } else {
        0.0
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "reviews": reviews,
            "average_rating": average_rating,
            "review_count": review_count
        }
    })))
}
