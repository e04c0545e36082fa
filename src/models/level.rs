use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, sqlx::FromRow)]
pub struct ParkingLevel {
    pub level_id: Uuid,
    pub lot_id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Deserialize)]
pub struct CreateLevelReq {
    pub lot_id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateLevelReq {
    pub name: Option<String>,
}
