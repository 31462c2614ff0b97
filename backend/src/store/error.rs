//! Errors raised by ledger store backends

use uuid::Uuid;

/// Errors from ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record read by the transaction changed before commit, or a
    /// concurrent transaction won a lock. Safe to retry from scratch.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Another batch already uses this seed batch id.
    #[error("seed batch id already in use: {0}")]
    DuplicateKey(String),

    /// A stored document could not be encoded or decoded.
    #[error("corrupt document {id}: {reason}")]
    Serialization { id: Uuid, reason: String },

    /// The backend cannot serve requests (poisoned lock, pool closed).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
