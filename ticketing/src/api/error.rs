//! HTTP error responses.
//!
//! [`AppError`] bridges engine errors and HTTP responses. The body is always
//! `{"code": ..., "message": ...}` so clients can branch on `code` and show
//! `message` inline.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boxoffice_core::error::{LookupError, PurchaseError, StoreError, ValidationError};
use boxoffice_runtime::catalog::CatalogError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    /// Internal error (logged, never exposed to the client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id {id} not found"),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// Create a 503 error for a failing backing store.
    #[must_use]
    pub fn store(err: StoreError) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE_FAILURE",
            "The ticket store is temporarily unavailable",
        )
        .with_source(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error code (for client error handling)
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(status = %self.status, code = %self.code, "Request failed"),
            }
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::store(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<PurchaseError> for AppError {
    fn from(err: PurchaseError) -> Self {
        let status = match &err {
            PurchaseError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PurchaseError::EventNotFound(_) => StatusCode::NOT_FOUND,
            PurchaseError::SoldOut(_) => StatusCode::CONFLICT,
            PurchaseError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let app = Self::new(status, err.code(), err.user_message());
        if status.is_server_error() {
            app.with_source(err)
        } else {
            app
        }
    }
}

impl From<LookupError> for AppError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound(id) => Self::not_found("Ticket", id),
            LookupError::Store(err) => Self::store(err),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(err) => err.into(),
            CatalogError::NotFound(id) => Self::new(
                StatusCode::NOT_FOUND,
                "EVENT_NOT_FOUND",
                format!("Event with id {id} not found"),
            ),
            CatalogError::Store(err) => Self::store(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
        .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::types::{EventId, TicketId};

    #[test]
    fn test_error_display() {
        let err = AppError::validation("Email is required");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] Email is required");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_purchase_error_mapping() {
        let sold_out: AppError = PurchaseError::SoldOut(EventId::from_string("event-6")).into();
        assert_eq!(sold_out.status(), StatusCode::CONFLICT);
        assert_eq!(sold_out.code(), "SOLD_OUT");
        assert_eq!(sold_out.message, "Sold Out");

        let missing: AppError = PurchaseError::EventNotFound(EventId::from_string("x")).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.code(), "EVENT_NOT_FOUND");

        let store: AppError = PurchaseError::Store(StoreError::Unavailable("down".into())).into();
        assert_eq!(store.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(store.code(), "STORE_FAILURE");
        assert!(store.source.is_some());
    }

    #[test]
    fn test_lookup_error_mapping() {
        let err: AppError = LookupError::NotFound(TicketId::from_string("t-1")).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "[NOT_FOUND] Ticket with id t-1 not found");
    }

    #[test]
    fn test_store_error_message_is_generic() {
        let err: AppError = StoreError::Database("password=hunter2".into()).into();
        assert!(!err.message.contains("hunter2"));
    }
}
