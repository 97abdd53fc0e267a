use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures surfaced by the sign-in ledger.
#[derive(Debug, Error)]
pub enum SigninError {
    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("{operation} exceeded its deadline")]
    Timeout { operation: &'static str },

    #[error("invalid window: end {end} is before start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("unknown sign-in type {0:?}")]
    UnknownType(String),
}

pub type SigninResult<T> = Result<T, SigninError>;
