//! Error types for the reminder core.
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a host frontend.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(String),

    #[error("Version conflict on reminder {id}: expected {expected}, found {found}")]
    Conflict {
        id: String,
        expected: i64,
        found: i64,
    },

    #[error("Notification error: {0}")]
    Notification(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
