//! Notification collaborator interface
//!
//! The core never talks to a device notification API directly; hosts
//! implement this trait over whatever alert mechanism they have
//! (OS notification center, push gateway, test double).

use crate::database::ReminderKind;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to a scheduled notification, used to cancel it later
pub type NotificationHandle = String;

/// Payload attached to a scheduled alert so the host UI can route a
/// tapped notification back to its reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub reminder_id: String,
    pub kind: ReminderKind,
    pub title: String,
}

/// Point-in-time alert scheduling collaborator.
///
/// Implementations own their retry/backoff policy. Failures are reported
/// as `AppError::Notification` and absorbed at the orchestrator boundary.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Schedule a single alert at `at` and return its handle
    async fn schedule_at(
        &self,
        at: DateTime<Utc>,
        payload: NotificationPayload,
    ) -> Result<NotificationHandle>;

    /// Cancel a previously scheduled alert
    async fn cancel(&self, handle: &str) -> Result<()>;
}
