use axum::{Json, extract::{State, Path}, http::StatusCode};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::lot::{CreateLotReq, ParkingLot, UpdateLotReq}, utils::{errorhandler::AppError, jwt::{AccessRole, verify_auth_token}}};

pub async fn create_lot(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateLotReq>
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access for token"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators have access"));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::invalid_input("lot name is required"));
    }

    // duplicate name surfaces as Conflict through the unique constraint
    let lot = sqlx::query_as::<_, ParkingLot>(
            "INSERT INTO parking_lots (name, address) VALUES ($1, $2) RETURNING *",
        )
        .bind(payload.name.trim())
        .bind(&payload.address)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok((StatusCode::CREATED, Json(json!(lot))))
}

pub async fn get_lots(
    State(pg): State<PgPool>,
) -> Result<Json<Value>, AppError> {

    let lots = sqlx::query_as::<_, ParkingLot>("SELECT * FROM parking_lots ORDER BY created_at DESC")
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(lots)))
}

pub async fn update_lot(
    State(pg): State<PgPool>,
    Path(lot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateLotReq>
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators have access"));
    }

    if payload.name.is_none() && payload.address.is_none() {
        return Err(AppError::invalid_input("no parameters provided"));
    }

    let lot = sqlx::query_as::<_, ParkingLot>(
            r#"
            UPDATE parking_lots
            SET name = COALESCE($2, name), address = COALESCE($3, address)
            WHERE lot_id = $1
            RETURNING *
            "#,
        )
        .bind(lot_id)
        .bind(&payload.name)
        .bind(&payload.address)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("parking lot not found"))?;

    Ok(Json(json!(lot)))
}

pub async fn delete_lot(
    State(pg): State<PgPool>,
    Path(lot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<StatusCode, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators have access"));
    }

    let levels: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_levels WHERE lot_id = $1")
        .bind(lot_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if levels > 0 {
        return Err(AppError::conflict("cannot delete parking lot with associated levels, delete levels first"));
    }

    let result = sqlx::query("DELETE FROM parking_lots WHERE lot_id = $1")
        .bind(lot_id)
        .execute(&pg)
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("parking lot not found"));
    }

    Ok(StatusCode::OK)
}
