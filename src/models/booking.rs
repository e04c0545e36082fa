use serde::{Deserialize, Serialize};
use sqlx::{Type, prelude::FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "booking_status")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Overstayed,
    Cancelled,
}

impl BookingStatus {
    /// Statuses that count against a slot's availability. Matches the
    /// WHERE clause of the bookings_no_overlap constraint.
    pub fn is_occupying(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Serialize, Deserialize, Debug, FromRow)]
pub struct Booking {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
    pub booked_by: Uuid,
    pub vehicle_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub from_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub to_date: OffsetDateTime,
    pub status: BookingStatus,
    /// Frozen from the slot's price at admission time. Never recalculated,
    /// even if the slot's price later changes. Nullable for legacy rows.
    pub daily_rate: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub actual_exit_time: Option<OffsetDateTime>,
    pub fine_amount: f64,
    pub is_fine_paid: bool,
    pub overstay_days: i32,
    pub review_rating: Option<i32>,
    pub review_comment: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Booking {
    /// A review exists if any of its parts were ever written. Guards against
    /// partially-initialized review fields counting as "no review".
    pub fn has_review(&self) -> bool {
        self.review_rating.is_some()
            || self.review_comment.is_some()
            || self.reviewed_at.is_some()
    }
}

#[derive(Deserialize)]
pub struct CreateBookingReq {
    pub vehicle_number: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to_date: Option<OffsetDateTime>,
}

#[derive(Serialize)]
pub struct BookingReceipt {
    pub slot_number: String,
    pub total_days: i64,
    pub daily_rate: f64,
    pub total_amount: f64,
}

#[derive(Deserialize)]
pub struct UpdateBookingReq {
    pub vehicle_number: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to_date: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
pub struct UpdateBookingStatusReq {
    pub status: Option<BookingStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub exit_time: Option<OffsetDateTime>,
    pub is_fine_paid: Option<bool>,
}

#[derive(Deserialize)]
pub struct SubmitReviewReq {
    pub rating: i32,
    pub comment: Option<String>,
}

/// One review row for the per-slot listing, joined with its reviewer.
#[derive(Serialize, FromRow)]
pub struct SlotReview {
    pub booking_id: Uuid,
    pub first_name: String,
    pub email: String,
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub reviewed_at: OffsetDateTime,
    pub vehicle_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub from_date: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupying_statuses_are_confirmed_and_active() {
        assert!(BookingStatus::Confirmed.is_occupying());
        assert!(BookingStatus::Active.is_occupying());
        assert!(!BookingStatus::Pending.is_occupying());
        assert!(!BookingStatus::Completed.is_occupying());
        assert!(!BookingStatus::Overstayed.is_occupying());
        assert!(!BookingStatus::Cancelled.is_occupying());
    }

    #[test]
    fn terminal_statuses_reject_further_transitions() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Overstayed.is_terminal());
        assert!(!BookingStatus::Active.is_terminal());
    }
}
