use streak_types::models::TransitionError;
use thiserror::Error;

/// Errors produced by the store layer.
///
/// The message of every variant other than `Sqlite` / `LockPoisoned` is
/// meant to be shown to the caller as-is.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(&'static str),

    /// A uniqueness rule would be broken (email, username, duplicate request...).
    #[error("{0}")]
    Conflict(String),

    /// The request is well-formed but not allowed (self-targeting, bad range).
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("DB lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
