use serde::{Deserialize, Serialize};
use sqlx::{Type, prelude::FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Type, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Serialize, Deserialize, FromRow)]
pub struct GetUser {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct RegisterUser {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateUserReq {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRoleReq {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
}
