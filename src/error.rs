//! Error types for the catalog server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    DbFailure = 3,
    NoSuchItem = 5,
    ItemNotAvailable = 7,
    MaxBorrowsReached = 11,
    BadValue = 18,
    MissingFields = 22,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No copy available: {0}")]
    NoCopyAvailable(String),

    #[error("Reader already has {limit} books borrowed")]
    BorrowLimitExceeded { limit: u32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::MissingFields(_) => ErrorCode::MissingFields,
            AppError::NotFound(_) => ErrorCode::NoSuchItem,
            AppError::NoCopyAvailable(_) => ErrorCode::ItemNotAvailable,
            AppError::BorrowLimitExceeded { .. } => ErrorCode::MaxBorrowsReached,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort_unstable();
        AppError::MissingFields(fields.join(", "))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::MissingFields(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::NoCopyAvailable(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::BorrowLimitExceeded { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::MissingFields("title".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("Book".into()), StatusCode::NOT_FOUND),
            (AppError::NoCopyAvailable("Book".into()), StatusCode::BAD_REQUEST),
            (AppError::BorrowLimitExceeded { limit: 5 }, StatusCode::BAD_REQUEST),
            (AppError::Validation("copy".into()), StatusCode::BAD_REQUEST),
            (AppError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_borrow_limit_message() {
        let err = AppError::BorrowLimitExceeded { limit: 5 };
        assert_eq!(err.to_string(), "Reader already has 5 books borrowed");
        assert_eq!(err.code(), ErrorCode::MaxBorrowsReached);
    }
}
