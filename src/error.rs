//! Error taxonomy for the winner subsystem
//!
//! Every error response carries a stable machine string (`error`) and, for
//! validation failures, a structured detail payload naming the field and
//! constraint that failed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Field-level detail attached to validation failures.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub constraint: &'static str,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    InvalidInput {
        message: String,
        detail: Option<FieldError>,
    },

    /// Currency gateway unreachable, timed out, or returned an unusable
    /// rate. The message always identifies it as an exchange-rate failure
    /// so callers can tell retryable dependency failures from validation
    /// bugs.
    #[error("Failed to fetch exchange rate: {0}")]
    ExchangeRate(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidInput {
            message: message.into(),
            detail: None,
        }
    }

    pub fn invalid_field(
        message: impl Into<String>,
        field: &'static str,
        constraint: &'static str,
    ) -> Self {
        ApiError::InvalidInput {
            message: message.into(),
            detail: Some(FieldError { field, constraint }),
        }
    }

    /// Stable machine string for the `error` field of every response.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidInput { .. } => "invalid_input",
            ApiError::ExchangeRate(_) => "exchange_rate_unavailable",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ApiError::ExchangeRate(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref e) = self {
            error!("Internal error: {:#}", e);
        }

        let detail = match &self {
            ApiError::InvalidInput { detail, .. } => detail.clone(),
            _ => None,
        };

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            detail,
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::invalid("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ExchangeRate("timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_exchange_rate_message_is_identifiable() {
        let e = ApiError::ExchangeRate("gateway timed out".into());
        assert!(e.to_string().contains("Failed to fetch exchange rate"));
        assert_eq!(e.code(), "exchange_rate_unavailable");
    }
}
