use axum::{Json, extract::{State, Path}, http::StatusCode};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::level::{CreateLevelReq, ParkingLevel, UpdateLevelReq}, utils::{errorhandler::AppError, jwt::{AccessRole, verify_auth_token}}};

pub async fn create_level(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateLevelReq>
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::invalid_input("level name is required"));
    }

    let lot_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parking_lots WHERE lot_id = $1)")
        .bind(payload.lot_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if !lot_exists {
        return Err(AppError::not_found("parking lot not found"));
    }

    // level names are unique per lot, duplicate maps to Conflict
    let level = sqlx::query_as::<_, ParkingLevel>(
            "INSERT INTO parking_levels (lot_id, name) VALUES ($1, $2) RETURNING *",
        )
        .bind(payload.lot_id)
        .bind(payload.name.trim())
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok((StatusCode::CREATED, Json(json!(level))))
}

pub async fn get_levels_by_lot(
    State(pg): State<PgPool>,
    Path(lot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {

    let levels = sqlx::query_as::<_, ParkingLevel>(
            "SELECT * FROM parking_levels WHERE lot_id = $1 ORDER BY name",
        )
        .bind(lot_id)
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(levels)))
}

pub async fn update_level(
    State(pg): State<PgPool>,
    Path(level_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateLevelReq>
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if !claims.is_staff() {
        return Err(AppError::forbidden("only administrators and moderators have access"));
    }

    let name = match payload.name {
        Some(n) if !n.trim().is_empty() => n,
        _ => return Err(AppError::invalid_input("no parameters provided")),
    };

    let level = sqlx::query_as::<_, ParkingLevel>(
            "UPDATE parking_levels SET name = $2 WHERE level_id = $1 RETURNING *",
        )
        .bind(level_id)
        .bind(name.trim())
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking level not found"))?;

    Ok(Json(json!(level)))
}

pub async fn delete_level(
    State(pg): State<PgPool>,
    Path(level_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<StatusCode, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators have access"));
    }

    let slots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_slots WHERE level_id = $1")
        .bind(level_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if slots > 0 {
        return Err(AppError::conflict("cannot delete parking level with associated slots, delete slots first"));
    }

    let result = sqlx::query("DELETE FROM parking_levels WHERE level_id = $1")
        .bind(level_id)
        .execute(&pg)
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("parking level not found"));
    }

    Ok(StatusCode::OK)
}
