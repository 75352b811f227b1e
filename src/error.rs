use actix_web::{error, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::services::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by discovery, signal and profile operations
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        AppError::BadInput(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        AppError::PreconditionFailed(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Stable machine-readable kind used in the JSON error body
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::BadInput(_) => "bad_input",
            AppError::PreconditionFailed(_) => "precondition_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Store(_) => "store_failure",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadInput(errors.to_string())
    }
}

impl error::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadInput(_) | AppError::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if let AppError::Store(e) = self {
            tracing::error!("Store failure: {}", e);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// Render JSON payload errors with the common error body
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    let body = ErrorResponse {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    };
    error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

/// Render query-string errors with the common error body
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    let body = ErrorResponse {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    };
    error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::bad_input("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::precondition("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        let store = AppError::from(StoreError::Constraint("boom".into()));
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(AppError::precondition("location not set").kind(), "precondition_failed");
        assert_eq!(AppError::precondition("location not set").to_string(), "location not set");
    }
}
