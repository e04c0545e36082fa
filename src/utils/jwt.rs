use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer}};
use axum::http::StatusCode;
use serde::{Deserialize,Serialize};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    User,
    Moderator,
    Admin
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub sub: String,
    pub role: AccessRole,
    pub exp: usize,
}

impl Claims {
    pub fn is_staff(&self) -> bool {
        matches!(self.role, AccessRole::Admin | AccessRole::Moderator)
    }
}

pub async fn verify_auth_token(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>
) -> Result<Claims, StatusCode> {

    let token = auth.token();

    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "mysecret".into());

    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(token_data.claims)
}
