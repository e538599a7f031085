use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::QuotaDenial;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(QuotaDenial),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden => "FORBIDDEN",
            AppError::QuotaExceeded(denial) => denial.code(),
            AppError::ExternalApiError(_) | AppError::ReqwestError(_) => "EXTERNAL_API_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (actix_web::http::StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (actix_web::http::StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("JWT error: {err}");
                (
                    actix_web::http::StatusCode::UNAUTHORIZED,
                    "Invalid token".to_string(),
                )
            }
            AppError::NotFound(msg) => (actix_web::http::StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "Forbidden".to_string(),
                )
            }
            AppError::QuotaExceeded(denial) => {
                log::info!("Quota denial: {denial}");
                (actix_web::http::StatusCode::CONFLICT, denial.to_string())
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                (actix_web::http::StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::ReqwestError(err) => {
                log::error!("HTTP request error: {err}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "Payment provider unavailable".to_string(),
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ValidationError("bad".into()).error_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden.error_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::QuotaExceeded(QuotaDenial::NoActiveSubscription)
                .error_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ExternalApiError("paypal".into())
                .error_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_quota_error_code() {
        let err = AppError::QuotaExceeded(QuotaDenial::ListingLimitExceeded { limit: 5 });
        assert_eq!(err.code(), "LISTING_LIMIT_EXCEEDED");
    }
}
