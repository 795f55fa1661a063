//! Error types for the point ledger and the replay application.

use thiserror::Error;

/// Result type alias for application-level operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Rejections reported by the ledger service.
///
/// None of these leave a per-user lock held or a store partially updated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointError {
    /// Non-positive user id or amount. Raised before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A charge would push the balance above `MAX_POINT`.
    #[error("balance cannot exceed 1,000,000")]
    LimitExceeded,

    /// A use asks for more points than the user holds.
    #[error("insufficient balance")]
    InsufficientBalance,
}

/// Errors that can occur while running the replay application.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Ledger rejection surfaced to the caller
    #[error("Point error: {0}")]
    Point(#[from] PointError),
}
