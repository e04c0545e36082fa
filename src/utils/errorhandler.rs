use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response}
};

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {

    #[error("Database query failed: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Past date rejected: {0}")]
    PastDateRejected(String),

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Unexpected server error")]
    Unexpected,
}

impl AppError {

    pub fn database<T: Into<String>>(msg: T) -> Self {
        AppError::DatabaseError(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        AppError::InvalidInput(msg.into())
    }

    pub fn past_date<T: Into<String>>(msg: T) -> Self {
        AppError::PastDateRejected(msg.into())
    }

    pub fn slot_unavailable<T: Into<String>>(msg: T) -> Self {
        AppError::SlotUnavailable(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn invalid_state<T: Into<String>>(msg: T) -> Self {
        AppError::InvalidState(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        AppError::NotFound(msg.into())
    }

}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::not_found("resource not found"),

            sqlx::Error::Database(db) => match db.code().as_deref() {
                // exclusion_violation from the bookings_no_overlap constraint
                Some("23P01") => AppError::slot_unavailable("slot is already booked for an overlapping period"),
                // unique_violation
                Some("23505") => AppError::conflict("a record with the same identity already exists"),
                _ => AppError::database(err.to_string()),
            },

            _ => AppError::database(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),

            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            AppError::PastDateRejected(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            AppError::SlotUnavailable(msg) => (StatusCode::CONFLICT, msg.clone()),

            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),

            AppError::InvalidState(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),

            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),

            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),

            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),

            AppError::Unexpected => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),

        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": message,
                "kind": format!("{:?}",self)
            }
        }));

        (status, body).into_response()
    }
}
