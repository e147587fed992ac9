//! Remedi core
//!
//! Recurring health-adherence reminders: a pure recurrence engine plus
//! the orchestration that keeps exactly one device notification aligned
//! with each reminder across create, update, complete, delete, and
//! share. Persistence and device alerts are collaborators behind the
//! `ReminderStore` and `NotificationService` traits.

pub mod config;
pub mod database;
pub mod error;
pub mod notifications;
pub mod recurrence;
pub mod services;

pub use error::{AppError, Result};
