use axum::{Json, extract::{State, Path}, http::StatusCode};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{json, Value};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    models::{
        booking::{Booking, BookingReceipt, BookingStatus, CreateBookingReq, SubmitReviewReq, UpdateBookingReq, UpdateBookingStatusReq},
        slot::{ParkingSlot, SlotStatus},
    },
    routemount::route::AppState,
    utils::{
        billing::{assess_overstay, billable_days, is_past_date},
        errorhandler::AppError,
        jwt::{AccessRole, verify_auth_token},
    },
};

/// True when any Confirmed/Active booking on the slot overlaps the range
/// under the inclusive test (shared boundary dates count as a conflict).
/// `exclude_booking` lets date edits ignore the booking being edited.
pub async fn has_overlapping_booking<'e, E>(
    executor: E,
    slot_id: Uuid,
    from_date: OffsetDateTime,
    to_date: OffsetDateTime,
    exclude_booking: Option<Uuid>,
) -> Result<bool, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bookings
                WHERE
                    slot_id = $1 AND
                    status IN ('Confirmed', 'Active') AND
                    from_date <= $3 AND to_date >= $2 AND
                    ($4::uuid IS NULL OR booking_id <> $4)
            )
            "#,
        )
        .bind(slot_id)
        .bind(from_date)
        .bind(to_date)
        .bind(exclude_booking)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)?;

    Ok(exists)
}

/// Outcome of a staff status edit, resolved before anything is written.
#[derive(Debug)]
pub struct StatusResolution {
    pub status: BookingStatus,
    pub actual_exit_time: Option<OffsetDateTime>,
    pub overstay_days: i32,
    pub fine_amount: f64,
    pub is_fine_paid: bool,
}

/// Lifecycle rules for a status edit. An exit after the due date lands in
/// Overstayed with the accrued fine even when the caller asked for
/// Completed; paying the fine is what completes it. Terminal bookings
/// reject all edits.
pub fn resolve_status_update(
    booking: &Booking,
    payload: &UpdateBookingStatusReq,
    default_daily_fine: f64,
) -> Result<StatusResolution, AppError> {
    if booking.status.is_terminal() {
        return Err(AppError::invalid_state("booking is already completed or cancelled"));
    }

    let mut status = payload.status.unwrap_or(booking.status);
    let mut actual_exit_time = booking.actual_exit_time;
    let mut overstay_days = booking.overstay_days;
    let mut fine_amount = booking.fine_amount;
    let mut is_fine_paid = booking.is_fine_paid;

    if let Some(exit_time) = payload.exit_time {
        actual_exit_time = Some(exit_time);

        if let Some(assessed) = assess_overstay(
            booking.to_date,
            exit_time,
            booking.daily_rate,
            default_daily_fine,
        ) {
            overstay_days = assessed.overstay_days as i32;
            fine_amount = assessed.fine_amount;
            status = BookingStatus::Overstayed;
        }
    }

    if let Some(paid) = payload.is_fine_paid {
        is_fine_paid = paid;
        if paid {
            status = BookingStatus::Completed;
        }
    }

    Ok(StatusResolution { status, actual_exit_time, overstay_days, fine_amount, is_fine_paid })
}

/// Review preconditions beyond existence: owner only, Completed only, once
/// only. The guarded UPDATE in submit_review repeats the once-only check.
pub fn check_review_allowed(booking: &Booking, reviewer: Uuid) -> Result<(), AppError> {
    if booking.booked_by != reviewer {
        return Err(AppError::forbidden("you can only review your own bookings"));
    }

    if booking.status != BookingStatus::Completed {
        return Err(AppError::invalid_state("only completed bookings can be reviewed"));
    }

    if booking.has_review() {
        return Err(AppError::conflict("this booking already has a review"));
    }

    Ok(())
}

pub async fn create_booking(
    State(pg): State<PgPool>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateBookingReq>
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    let (Some(from_date), Some(to_date)) = (payload.from_date, payload.to_date) else {
        return Err(AppError::invalid_input("both from_date and to_date are required"));
    };

    if to_date <= from_date {
        return Err(AppError::invalid_input("end date must be after start date"));
    }

    if is_past_date(from_date, OffsetDateTime::now_utc()) {
        return Err(AppError::past_date("cannot book for past dates"));
    }

    let vehicle_number = payload.vehicle_number.trim();
    if vehicle_number.is_empty() {
        return Err(AppError::invalid_input("vehicle number is required"));
    }

    // Lock the slot row so two admissions for the same slot serialize and
    // the availability check below cannot be invalidated mid-flight.
    let mut tx = pg.begin().await.map_err(AppError::from)?;

    let slot = sqlx::query_as::<_, ParkingSlot>(
            "SELECT * FROM parking_slots WHERE slot_id = $1 FOR UPDATE",
        )
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking slot not found"))?;

    if slot.status != SlotStatus::Available {
        return Err(AppError::slot_unavailable("slot is not open for booking"));
    }

    if has_overlapping_booking(&mut *tx, slot_id, from_date, to_date, None).await? {
        return Err(AppError::slot_unavailable("slot not available for the selected dates"));
    }

    // The bookings_no_overlap constraint is the backstop: if another
    // transaction slips in first, the insert fails as SlotUnavailable.
    let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (slot_id, booked_by, vehicle_number, from_date, to_date, status, daily_rate)
            VALUES ($1, $2, $3, $4, $5, 'Confirmed', $6)
            RETURNING *
            "#,
        )
        .bind(slot_id)
        .bind(claims.id)
        .bind(vehicle_number)
        .bind(from_date)
        .bind(to_date)
        .bind(slot.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

    tx.commit().await.map_err(AppError::from)?;

    let total_days = billable_days(from_date, to_date);
    let receipt = BookingReceipt {
        slot_number: slot.slot_number,
        total_days,
        daily_rate: slot.price,
        total_amount: total_days as f64 * slot.price,
    };

    Ok((StatusCode::CREATED, Json(json!({
        "message": "booking successful",
        "booking": booking,
        "receipt": receipt
    }))))
}

pub async fn get_own_bookings(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE booked_by = $1 ORDER BY created_at DESC",
        )
        .bind(claims.id)
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(bookings)))
}

pub async fn get_all_bookings(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    // staff see everything, everyone else is scoped to their own bookings
    let bookings = if claims.is_staff() {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings ORDER BY created_at DESC")
            .fetch_all(&pg)
            .await
            .map_err(AppError::from)?
    } else {
        sqlx::query_as::<_, Booking>(
                "SELECT * FROM bookings WHERE booked_by = $1 ORDER BY created_at DESC",
            )
            .bind(claims.id)
            .fetch_all(&pg)
            .await
            .map_err(AppError::from)?
    };

    Ok(Json(json!(bookings)))
}

pub async fn update_booking(
    State(pg): State<PgPool>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateBookingReq>
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators can edit bookings"));
    }

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("booking not found"))?;

    if let Some(vehicle) = &payload.vehicle_number {
        if vehicle.trim().is_empty() {
            return Err(AppError::invalid_input("vehicle number cannot be empty"));
        }
    }

    let new_from = payload.from_date.unwrap_or(booking.from_date);
    let new_to = payload.to_date.unwrap_or(booking.to_date);

    if payload.from_date.is_some() || payload.to_date.is_some() {
        if new_to <= new_from {
            return Err(AppError::invalid_input("end date must be after start date"));
        }

        // Date edits re-run the availability check against the other
        // bookings on the slot, excluding this booking itself.
        if booking.status.is_occupying()
            && has_overlapping_booking(&pg, booking.slot_id, new_from, new_to, Some(booking_id)).await?
        {
            return Err(AppError::slot_unavailable("requested dates conflict with another booking"));
        }
    }

    let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET vehicle_number = COALESCE($2, vehicle_number),
                from_date = $3,
                to_date = $4,
                updated_at = now()
            WHERE booking_id = $1
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(payload.vehicle_number.as_deref().map(str::trim))
        .bind(new_from)
        .bind(new_to)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(updated)))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateBookingStatusReq>
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators can update booking status"));
    }

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("booking not found"))?;

    let resolved = resolve_status_update(&booking, &payload, state.config.default_daily_fine)?;

    let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2,
                actual_exit_time = $3,
                overstay_days = $4,
                fine_amount = $5,
                is_fine_paid = $6,
                updated_at = now()
            WHERE booking_id = $1
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(resolved.status)
        .bind(resolved.actual_exit_time)
        .bind(resolved.overstay_days)
        .bind(resolved.fine_amount)
        .bind(resolved.is_fine_paid)
        .fetch_one(&state.pool)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(updated)))
}

pub async fn cancel_booking(
    State(pg): State<PgPool>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("booking not found"))?;

    if booking.booked_by != claims.id && !claims.is_staff() {
        return Err(AppError::forbidden("you can only cancel your own bookings"));
    }

    if booking.status.is_terminal() {
        return Err(AppError::invalid_state("booking is already completed or cancelled"));
    }

    let cancelled = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = 'Cancelled', updated_at = now() WHERE booking_id = $1 RETURNING *",
        )
        .bind(booking_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(cancelled)))
}

pub async fn delete_booking(
    State(pg): State<PgPool>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators can delete bookings"));
    }

    let slot_id: Uuid = sqlx::query_scalar(
            "DELETE FROM bookings WHERE booking_id = $1 RETURNING slot_id",
        )
        .bind(booking_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("booking not found"))?;

    // Occupancy is derived from bookings, so nothing is written back to the
    // slot. Report whether the deletion left the slot free of occupants.
    let occupying: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE slot_id = $1 AND status IN ('Confirmed', 'Active')",
        )
        .bind(slot_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "message": "booking deleted successfully",
        "slot_id": slot_id,
        "slot_freed": occupying == 0
    })))
}

pub async fn submit_review(
    State(pg): State<PgPool>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<SubmitReviewReq>
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::invalid_input("please provide a valid rating between 1 and 5"));
    }

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("booking not found"))?;

    check_review_allowed(&booking, claims.id)?;

    // The WHERE clause repeats the no-review condition so two concurrent
    // submissions cannot both land; the loser gets Conflict.
    let reviewed = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET review_rating = $2,
                review_comment = $3,
                reviewed_at = now(),
                updated_at = now()
            WHERE booking_id = $1
              AND review_rating IS NULL
              AND review_comment IS NULL
              AND reviewed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(payload.rating)
        .bind(payload.comment.as_deref())
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::conflict("this booking already has a review"))?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "message": "review submitted successfully",
        "data": {
            "booking_id": reviewed.booking_id,
            "review": {
                "rating": reviewed.review_rating,
                "comment": reviewed.review_comment
            }
        }
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, macros::datetime};

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            booking_id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            booked_by: Uuid::new_v4(),
            vehicle_number: "KA-01-1234".into(),
            from_date: datetime!(2030-05-01 00:00 UTC),
            to_date: datetime!(2030-05-05 00:00 UTC),
            status,
            daily_rate: Some(50.0),
            actual_exit_time: None,
            fine_amount: 0.0,
            is_fine_paid: false,
            overstay_days: 0,
            review_rating: None,
            review_comment: None,
            reviewed_at: None,
            created_at: datetime!(2030-04-20 00:00 UTC),
            updated_at: datetime!(2030-04-20 00:00 UTC),
        }
    }

    fn status_req(
        status: Option<BookingStatus>,
        exit_time: Option<OffsetDateTime>,
        is_fine_paid: Option<bool>,
    ) -> UpdateBookingStatusReq {
        UpdateBookingStatusReq { status, exit_time, is_fine_paid }
    }

    #[test]
    fn late_exit_reclassifies_requested_completion_as_overstayed() {
        let b = booking(BookingStatus::Active);
        let exit = b.to_date + Duration::days(2);
        let req = status_req(Some(BookingStatus::Completed), Some(exit), None);

        let resolved = resolve_status_update(&b, &req, 10.0).unwrap();
        assert_eq!(resolved.status, BookingStatus::Overstayed);
        assert_eq!(resolved.overstay_days, 2);
        assert_eq!(resolved.fine_amount, 100.0);
        assert_eq!(resolved.actual_exit_time, Some(exit));
        assert!(!resolved.is_fine_paid);
    }

    #[test]
    fn on_time_exit_completes_normally() {
        let b = booking(BookingStatus::Active);
        let req = status_req(
            Some(BookingStatus::Completed),
            Some(b.to_date - Duration::hours(1)),
            None,
        );

        let resolved = resolve_status_update(&b, &req, 10.0).unwrap();
        assert_eq!(resolved.status, BookingStatus::Completed);
        assert_eq!(resolved.overstay_days, 0);
        assert_eq!(resolved.fine_amount, 0.0);
    }

    #[test]
    fn late_exit_without_frozen_rate_uses_the_default_fine() {
        let mut b = booking(BookingStatus::Active);
        b.daily_rate = None;
        let req = status_req(None, Some(b.to_date + Duration::days(3)), None);

        let resolved = resolve_status_update(&b, &req, 10.0).unwrap();
        assert_eq!(resolved.status, BookingStatus::Overstayed);
        assert_eq!(resolved.overstay_days, 3);
        assert_eq!(resolved.fine_amount, 30.0);
    }

    #[test]
    fn paying_the_fine_completes_an_overstayed_booking() {
        let mut b = booking(BookingStatus::Overstayed);
        b.overstay_days = 2;
        b.fine_amount = 100.0;
        let req = status_req(None, None, Some(true));

        let resolved = resolve_status_update(&b, &req, 10.0).unwrap();
        assert_eq!(resolved.status, BookingStatus::Completed);
        assert!(resolved.is_fine_paid);
        // the fine stays on the record after payment
        assert_eq!(resolved.fine_amount, 100.0);
        assert_eq!(resolved.overstay_days, 2);
    }

    #[test]
    fn terminal_bookings_reject_status_edits() {
        for status in [BookingStatus::Completed, BookingStatus::Cancelled] {
            let b = booking(status);
            let req = status_req(Some(BookingStatus::Active), None, None);

            let err = resolve_status_update(&b, &req, 10.0).unwrap_err();
            assert!(matches!(err, AppError::InvalidState(_)));
        }
    }

    #[test]
    fn review_requires_a_completed_booking() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Active,
            BookingStatus::Overstayed,
        ] {
            let b = booking(status);
            let err = check_review_allowed(&b, b.booked_by).unwrap_err();
            assert!(matches!(err, AppError::InvalidState(_)));
        }

        let b = booking(BookingStatus::Completed);
        assert!(check_review_allowed(&b, b.booked_by).is_ok());
    }

    #[test]
    fn review_requires_ownership() {
        let b = booking(BookingStatus::Completed);
        let err = check_review_allowed(&b, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn second_review_is_a_conflict() {
        let mut b = booking(BookingStatus::Completed);
        b.review_rating = Some(4);
        b.reviewed_at = Some(datetime!(2030-05-06 12:00 UTC));

        let err = check_review_allowed(&b, b.booked_by).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
