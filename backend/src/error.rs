//! Error handling for the Verdex seed inventory server
//!
//! Every failure leaves the ledger unchanged; the variants below say why.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{describe_field_errors, FieldError};
use thiserror::Error;

use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Caller-correctable input errors
    #[error("Validation error: {}", describe_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // Business rule violations
    #[error("Insufficient balance in {seed_batch_id}: requested {requested}, available {available}")]
    InsufficientBalance {
        seed_batch_id: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Stored records disagree with each other
    #[error("Ledger integrity violation: {0}")]
    Integrity(String),

    #[error("Transaction conflict, retry the operation")]
    TransactionConflict,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::Integrity(_) => "INTEGRITY_ERROR",
            AppError::TransactionConflict => "TRANSACTION_CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Store(StoreError::Conflict(_)) => "TRANSACTION_CONFLICT",
            AppError::Store(StoreError::Unavailable(_) | StoreError::Database(_)) => {
                "STORE_UNAVAILABLE"
            }
            AppError::Store(_) => "STORE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry(_) | AppError::TransactionConflict => StatusCode::CONFLICT,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Unavailable(_) | StoreError::Database(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Integrity(_)
            | AppError::Store(_)
            | AppError::Configuration(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Some fields are missing or invalid".to_string(),
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::DuplicateEntry(key) => format!("A record with this {} already exists", key),
            AppError::InsufficientBalance { .. }
            | AppError::TransactionConflict
            | AppError::Unauthorized(_) => self.to_string(),
            AppError::Integrity(_) => "Ledger records are inconsistent".to_string(),
            AppError::Store(StoreError::Conflict(_)) => {
                AppError::TransactionConflict.to_string()
            }
            AppError::Store(StoreError::Unavailable(_) | StoreError::Database(_)) => {
                "The ledger store is temporarily unavailable".to_string()
            }
            _ => "An internal server error occurred".to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(seed_batch_id) => {
                AppError::DuplicateEntry(format!("seedBatchId {}", seed_batch_id))
            }
            other => AppError::Store(other),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                fields: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse::new(self.code(), self.public_message());
        if let AppError::Validation(fields) = &self {
            body.error.fields = Some(fields.clone());
        }

        if status.is_server_error() {
            tracing::error!(code = self.code(), "Error: {:?}", self);
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
