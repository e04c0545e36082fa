//! Database-backed tests for the booking engine invariants. They need a
//! running Postgres (sqlx provisions a fresh database per test from
//! DATABASE_URL and applies ./migrations), so they are ignored by default:
//!
//!     cargo test -- --ignored

use parking_management_api::route::booking::has_overlapping_booking;
use parking_management_api::sweeper::sweep_overstays;
use parking_management_api::utils::errorhandler::AppError;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

async fn seed_slot(pool: &PgPool, price: f64) -> (Uuid, Uuid) {
    let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (first_name, email, password_hash) VALUES ('driver', $1, 'x') RETURNING user_id",
        )
        .bind(format!("{}@example.com", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

    let lot_id: Uuid = sqlx::query_scalar(
            "INSERT INTO parking_lots (name, address) VALUES ($1, 'somewhere') RETURNING lot_id",
        )
        .bind(format!("lot-{}", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

    let level_id: Uuid = sqlx::query_scalar(
            "INSERT INTO parking_levels (lot_id, name) VALUES ($1, 'G') RETURNING level_id",
        )
        .bind(lot_id)
        .fetch_one(pool)
        .await
        .unwrap();

    let slot_id: Uuid = sqlx::query_scalar(
            "INSERT INTO parking_slots (level_id, slot_number, price) VALUES ($1, 'A-1', $2) RETURNING slot_id",
        )
        .bind(level_id)
        .bind(price)
        .fetch_one(pool)
        .await
        .unwrap();

    (slot_id, user_id)
}

async fn insert_booking(
    pool: &PgPool,
    slot_id: Uuid,
    user_id: Uuid,
    from: OffsetDateTime,
    to: OffsetDateTime,
    status: &str,
    daily_rate: f64,
) -> Result<Uuid, AppError> {
    sqlx::query_scalar(
            r#"
            INSERT INTO bookings (slot_id, booked_by, vehicle_number, from_date, to_date, status, daily_rate)
            VALUES ($1, $2, 'KA-01-1234', $3, $4, $5::booking_status, $6)
            RETURNING booking_id
            "#,
        )
        .bind(slot_id)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(status)
        .bind(daily_rate)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn concurrent_admissions_admit_exactly_one(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 50.0).await;

    let from = datetime!(2030-01-01 00:00 UTC);
    let to = datetime!(2030-01-05 00:00 UTC);

    // both callers pass the availability check before either has persisted
    assert!(!has_overlapping_booking(&pool, slot_id, from, to, None).await.unwrap());
    assert!(!has_overlapping_booking(&pool, slot_id, from, to, None).await.unwrap());

    let (a, b) = tokio::join!(
        insert_booking(&pool, slot_id, user_id, from, to, "Confirmed", 50.0),
        insert_booking(&pool, slot_id, user_id, from, to, "Confirmed", 50.0),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let loser = results.into_iter().find(Result::is_err).unwrap().unwrap_err();
    assert!(matches!(loser, AppError::SlotUnavailable(_)));
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn shared_boundary_date_is_rejected_adjacent_range_is_not(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 50.0).await;

    insert_booking(
        &pool,
        slot_id,
        user_id,
        datetime!(2030-01-01 00:00 UTC),
        datetime!(2030-01-05 00:00 UTC),
        "Confirmed",
        50.0,
    )
    .await
    .unwrap();

    // same boundary date counts as overlap
    assert!(has_overlapping_booking(
        &pool,
        slot_id,
        datetime!(2030-01-05 00:00 UTC),
        datetime!(2030-01-08 00:00 UTC),
        None,
    )
    .await
    .unwrap());

    // next day is clear, both bookings may coexist
    assert!(!has_overlapping_booking(
        &pool,
        slot_id,
        datetime!(2030-01-06 00:00 UTC),
        datetime!(2030-01-08 00:00 UTC),
        None,
    )
    .await
    .unwrap());

    insert_booking(
        &pool,
        slot_id,
        user_id,
        datetime!(2030-01-06 00:00 UTC),
        datetime!(2030-01-08 00:00 UTC),
        "Confirmed",
        50.0,
    )
    .await
    .unwrap();
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn cancelled_bookings_do_not_block_availability(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 50.0).await;

    insert_booking(
        &pool,
        slot_id,
        user_id,
        datetime!(2030-02-01 00:00 UTC),
        datetime!(2030-02-05 00:00 UTC),
        "Cancelled",
        50.0,
    )
    .await
    .unwrap();

    assert!(!has_overlapping_booking(
        &pool,
        slot_id,
        datetime!(2030-02-01 00:00 UTC),
        datetime!(2030-02-05 00:00 UTC),
        None,
    )
    .await
    .unwrap());
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn sweep_is_idempotent(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 20.0).await;

    let now = OffsetDateTime::now_utc();
    // due just under three days ago, so ceil stays at 3 across both runs
    let to = now - Duration::days(3) + Duration::hours(1);
    let from = to - Duration::days(2);

    let booking_id = insert_booking(&pool, slot_id, user_id, from, to, "Active", 20.0)
        .await
        .unwrap();

    let first = sweep_overstays(&pool, 10.0).await.unwrap();
    assert_eq!(first.processed, 1);
    assert!(first.failures.is_empty());

    let second = sweep_overstays(&pool, 10.0).await.unwrap();
    assert_eq!(second.processed, 0);
    assert!(second.failures.is_empty());

    let (status, overstay_days, fine_amount): (String, i32, f64) = sqlx::query_as(
            "SELECT status::text, overstay_days, fine_amount FROM bookings WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(status, "Overstayed");
    assert_eq!(overstay_days, 3);
    assert_eq!(fine_amount, 60.0);
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn daily_rate_stays_frozen_when_slot_price_changes(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 50.0).await;

    let booking_id = insert_booking(
        &pool,
        slot_id,
        user_id,
        datetime!(2030-03-01 00:00 UTC),
        datetime!(2030-03-05 00:00 UTC),
        "Confirmed",
        50.0,
    )
    .await
    .unwrap();

    sqlx::query("UPDATE parking_slots SET price = 80 WHERE slot_id = $1")
        .bind(slot_id)
        .execute(&pool)
        .await
        .unwrap();

    let daily_rate: Option<f64> = sqlx::query_scalar("SELECT daily_rate FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(daily_rate, Some(50.0));
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn review_lands_exactly_once(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 50.0).await;

    let booking_id = insert_booking(
        &pool,
        slot_id,
        user_id,
        datetime!(2030-04-01 00:00 UTC),
        datetime!(2030-04-05 00:00 UTC),
        "Completed",
        50.0,
    )
    .await
    .unwrap();

    // the guarded write the review handler issues
    let guarded_review = |rating: i32, comment: Option<&'static str>| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                    r#"
                    UPDATE bookings
                    SET review_rating = $2, review_comment = $3, reviewed_at = now()
                    WHERE booking_id = $1
                      AND review_rating IS NULL
                      AND review_comment IS NULL
                      AND reviewed_at IS NULL
                    "#,
                )
                .bind(booking_id)
                .bind(rating)
                .bind(comment)
                .execute(&pool)
                .await
                .unwrap()
                .rows_affected()
        }
    };

    assert_eq!(guarded_review(5, Some("great spot")).await, 1);
    assert_eq!(guarded_review(1, Some("changed my mind")).await, 0);

    let (rating, comment): (Option<i32>, Option<String>) = sqlx::query_as(
            "SELECT review_rating, review_comment FROM bookings WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(rating, Some(5));
    assert_eq!(comment.as_deref(), Some("great spot"));
}

#[sqlx::test]
#[ignore = "needs a postgres instance"]
async fn comment_less_review_stores_null_and_still_lands_once(pool: PgPool) {
    let (slot_id, user_id) = seed_slot(&pool, 50.0).await;

    let booking_id = insert_booking(
        &pool,
        slot_id,
        user_id,
        datetime!(2030-05-01 00:00 UTC),
        datetime!(2030-05-05 00:00 UTC),
        "Completed",
        50.0,
    )
    .await
    .unwrap();

    let guarded_review = |rating: i32, comment: Option<&'static str>| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                    r#"
                    UPDATE bookings
                    SET review_rating = $2, review_comment = $3, reviewed_at = now()
                    WHERE booking_id = $1
                      AND review_rating IS NULL
                      AND review_comment IS NULL
                      AND reviewed_at IS NULL
                    "#,
                )
                .bind(booking_id)
                .bind(rating)
                .bind(comment)
                .execute(&pool)
                .await
                .unwrap()
                .rows_affected()
        }
    };

    assert_eq!(guarded_review(4, None).await, 1);

    // the comment column stays NULL rather than becoming an empty string
    let (rating, comment, reviewed_at): (Option<i32>, Option<String>, Option<OffsetDateTime>) =
        sqlx::query_as(
                "SELECT review_rating, review_comment, reviewed_at FROM bookings WHERE booking_id = $1",
            )
            .bind(booking_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    assert_eq!(rating, Some(4));
    assert_eq!(comment, None);
    assert!(reviewed_at.is_some());

    // a NULL comment must not reopen the one-shot guard
    assert_eq!(guarded_review(1, Some("second thoughts")).await, 0);
}
