use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, sqlx::FromRow)]
pub struct ParkingLot {
    pub lot_id: Uuid,
    pub name: String,
    pub address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Deserialize)]
pub struct CreateLotReq {
    pub name: String,
    pub address: String,
}

#[derive(Deserialize)]
pub struct UpdateLotReq {
    pub name: Option<String>,
    pub address: Option<String>,
}
