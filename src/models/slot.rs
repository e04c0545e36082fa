use serde::{Deserialize, Serialize};
use sqlx::{Type, prelude::FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Administrative state only. Occupancy is derived from Confirmed/Active
/// bookings at query time and is never written back to the slot row.
#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "slot_status")]
pub enum SlotStatus {
    Available,
    Unavailable,
}

#[derive(Serialize, Deserialize, Debug, FromRow)]
pub struct ParkingSlot {
    pub slot_id: Uuid,
    pub level_id: Uuid,
    pub slot_number: String,
    pub status: SlotStatus,
    pub price: f64,
    pub fine_amount: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Deserialize)]
pub struct CreateSlotReq {
    pub level_id: Uuid,
    pub slot_number: String,
    pub price: f64,
    pub fine_amount: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateSlotReq {
    pub slot_number: Option<String>,
    pub level_id: Option<Uuid>,
    pub price: Option<f64>,
    pub fine_amount: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateSlotStatusReq {
    pub status: SlotStatus,
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    #[serde(with = "time::serde::rfc3339")]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub to: OffsetDateTime,
}

#[derive(Deserialize)]
pub struct AvailableSlotsQuery {
    pub level: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
pub struct SlotQueryParams {
    pub level: Option<Uuid>,
    pub status: Option<SlotStatus>,
}
