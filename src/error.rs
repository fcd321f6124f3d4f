// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::checkout::CartError;
use crate::response::Envelope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Turns a unique-constraint failure into a 409, anything else into a store error.
pub fn conflict_on_duplicate(e: sqlx::Error, message: &str) -> ApiError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => ApiError::Conflict(message.to_string()),
        _ => ApiError::Database(e),
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<CartError> for ApiError {
    fn from(e: CartError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(e: bcrypt::BcryptError) -> Self {
        log::error!("bcrypt error: {e}");
        Self::Internal("Failed to process password".to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        log::error!("jwt encode error: {e}");
        Self::Internal("Failed to generate token".to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Database(e) => {
                log::error!("store error: {e}");
                "Database error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(Envelope::<()>::failure(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn renders_failure_envelope() {
        let resp = ApiError::Conflict("Cannot delete category with existing products".into()).error_response();
        let body = to_bytes(resp.into_body()).await.expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Cannot delete category with existing products");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn cart_limits_are_client_errors() {
        let err = ApiError::from(CartError::QuantityTooLarge);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "quantity must not exceed 10000");
    }

    #[test]
    fn non_unique_store_errors_stay_internal() {
        let err = conflict_on_duplicate(sqlx::Error::RowNotFound, "User with this email already exists");
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[actix_web::test]
    async fn hides_store_details() {
        let resp = ApiError::Database(sqlx::Error::PoolTimedOut).error_response();
        let body = to_bytes(resp.into_body()).await.expect("body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value["error"], "Database error");
    }
}
