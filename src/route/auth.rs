use axum::{Json, extract::{State, Path}, http::StatusCode};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use bcrypt::{hash, verify};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{json, Value};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{models::user::{ChangePasswordReq, GetUser, LoginUser, RegisterUser, Role, UpdateUserReq, UpdateUserRoleReq, User}, utils::{errorhandler::AppError, jwt::{AccessRole, Claims, verify_auth_token}}};

/// Role changes are admin-only, and an admin may never change their own
/// role: every role edit is made by a second administrator.
fn check_role_change(claims: &Claims, target_id: Uuid) -> Result<(), AppError> {
    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators can change roles"));
    }

    if claims.id == target_id {
        return Err(AppError::forbidden("administrators cannot change their own role"));
    }

    Ok(())
}

/// Profile-level access: the account owner, or an administrator.
fn check_profile_access(claims: &Claims, target_id: Uuid) -> Result<(), AppError> {
    if claims.id != target_id && claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("you can only manage your own account"));
    }

    Ok(())
}

pub async fn register_user(
    State(pg): State<PgPool>,
    Json(payload): Json<RegisterUser>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    if payload.email.trim().is_empty() {
        return Err(AppError::invalid_input("email is required"))
    }
    if payload.password.trim().is_empty() {
        return Err(AppError::invalid_input("password is required"))
    }
    if payload.first_name.trim().is_empty() {
        return Err(AppError::invalid_input("first name is required"))
    }

    let hashed = hash(payload.password, 12)
        .map_err(|e| {
            warn!("password hashing failed: {}", e);
            AppError::Unexpected
        })?;

    // role is always 'user' at sign-up; staff roles are granted afterwards
    // by an admin through the role endpoint
    let user = sqlx::query_as::<_, GetUser>(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, first_name, last_name, email, role
            "#,
        )
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .bind(&payload.email)
        .bind(&hashed)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    Ok((StatusCode::CREATED, Json(json!(user))))
}

pub async fn login_user(
    State(pg): State<PgPool>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<Value>, AppError> {

    if payload.email.trim().is_empty() {
        return Err(AppError::invalid_input("invalid credentials"))
    }
    if payload.password.trim().is_empty() {
        return Err(AppError::invalid_input("invalid credentials"))
    }

    let user_opt = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&pg)
        .await
        .map_err(|e| {
            warn!("Database error fetching user: {}", e);
            AppError::database("Failed to fetch user")
        })?;

    let user = match user_opt {
        Some(u) => u,
        None => {
            warn!("Failed login attempt: user not found for email: {}", payload.email);
            return Err(AppError::unauthorized("invalid credentials"))
        }
    };

    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("invalid credentials"))?;

    if !valid {
        warn!("Failed login attempt: invalid password for email: {}", payload.email);
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user_role = match user.role {
        Role::Admin => AccessRole::Admin,
        Role::Moderator => AccessRole::Moderator,
        Role::User => AccessRole::User,
    };

    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "mysecret".into());
    let token_expiry_hours: i64 = std::env::var("TOKEN_EXPIRY_HOURS")
        .ok()
        .and_then(|h| h.parse().ok())
        .unwrap_or(1);

    let exp = (OffsetDateTime::now_utc() + time::Duration::hours(token_expiry_hours))
        .unix_timestamp() as usize;

    let claims = Claims{
        id: user.user_id,
        sub: user.email,
        role: user_role,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    ).map_err(|e| {
        warn!("JWT encoding failed: {}", e);
        AppError::Unexpected
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token
        }
    })))
}

pub async fn get_me(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    let user = sqlx::query_as::<_, GetUser>(
            "SELECT user_id, first_name, last_name, email, role FROM users WHERE user_id = $1",
        )
        .bind(claims.id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(json!(user)))
}

pub async fn get_users(
    State(pg): State<PgPool>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators have access"));
    }

    let users = sqlx::query_as::<_, GetUser>(
            "SELECT user_id, first_name, last_name, email, role FROM users ORDER BY created_at DESC",
        )
        .fetch_all(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(users)))
}

pub async fn update_user(
    State(pg): State<PgPool>,
    Path(user_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateUserReq>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    check_profile_access(&claims, user_id)?;

    if let Some(first_name) = &payload.first_name {
        if first_name.trim().is_empty() {
            return Err(AppError::invalid_input("first name cannot be empty"));
        }
    }
    if let Some(email) = &payload.email {
        if email.trim().is_empty() {
            return Err(AppError::invalid_input("email cannot be empty"));
        }
    }

    // a duplicate email trips the unique constraint and surfaces as Conflict
    let user = sqlx::query_as::<_, GetUser>(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email)
            WHERE user_id = $1
            RETURNING user_id, first_name, last_name, email, role
            "#,
        )
        .bind(user_id)
        .bind(payload.first_name.as_deref().map(str::trim))
        .bind(payload.last_name)
        .bind(payload.email.as_deref().map(str::trim))
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(json!(user)))
}

pub async fn update_user_role(
    State(pg): State<PgPool>,
    Path(user_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateUserRoleReq>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    check_role_change(&claims, user_id)?;

    let user = sqlx::query_as::<_, GetUser>(
            r#"
            UPDATE users SET role = $2 WHERE user_id = $1
            RETURNING user_id, first_name, last_name, email, role
            "#,
        )
        .bind(user_id)
        .bind(payload.role)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(json!(user)))
}

pub async fn change_password(
    State(pg): State<PgPool>,
    Path(user_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<ChangePasswordReq>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    check_profile_access(&claims, user_id)?;

    if payload.new_password.trim().is_empty() {
        return Err(AppError::invalid_input("new password is required"));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&pg)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    // the current password is always verified, admin or not
    let valid = verify(&payload.current_password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("invalid credentials"))?;

    if !valid {
        warn!("Failed password change: current password mismatch for user: {}", user_id);
        return Err(AppError::invalid_input("current password is incorrect"));
    }

    let hashed = hash(payload.new_password, 12)
        .map_err(|e| {
            warn!("password hashing failed: {}", e);
            AppError::Unexpected
        })?;

    sqlx::query("UPDATE users SET password_hash = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(&hashed)
        .execute(&pg)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "message": "password updated successfully"
    })))
}

pub async fn delete_user(
    State(pg): State<PgPool>,
    Path(user_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(TypedHeader(auth))
        .await
        .map_err(|_| AppError::unauthorized("do not have access"))?;

    if claims.role != AccessRole::Admin {
        return Err(AppError::forbidden("only administrators can delete users"));
    }

    // bookings reference their booker, so a user with history stays
    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE booked_by = $1")
        .bind(user_id)
        .fetch_one(&pg)
        .await
        .map_err(AppError::from)?;

    if bookings > 0 {
        return Err(AppError::conflict("user still has bookings"));
    }

    let deleted = sqlx::query("DELETE FROM users WHERE user_id = $1")
        .bind(user_id)
        .execute(&pg)
        .await
        .map_err(AppError::from)?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    Ok(Json(json!({
        "message": "user deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: AccessRole) -> Claims {
        Claims {
            id: Uuid::new_v4(),
            sub: "driver@example.com".into(),
            role,
            exp: 0,
        }
    }

    #[test]
    fn role_changes_are_admin_only() {
        for role in [AccessRole::User, AccessRole::Moderator] {
            let err = check_role_change(&claims(role), Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }

        assert!(check_role_change(&claims(AccessRole::Admin), Uuid::new_v4()).is_ok());
    }

    #[test]
    fn admins_cannot_change_their_own_role() {
        let admin = claims(AccessRole::Admin);
        let err = check_role_change(&admin, admin.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn profile_access_is_owner_or_admin() {
        let owner = claims(AccessRole::User);
        assert!(check_profile_access(&owner, owner.id).is_ok());
        assert!(check_profile_access(&claims(AccessRole::Admin), owner.id).is_ok());

        let stranger = claims(AccessRole::User);
        let err = check_profile_access(&stranger, owner.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // moderators get no profile-level override
        let moderator = claims(AccessRole::Moderator);
        let err = check_profile_access(&moderator, owner.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
