//! Notification orchestrator
//!
//! Keeps at most one live device notification per reminder. Scheduling
//! failures degrade instead of erroring: the persisted reminder record
//! stays the source of truth and the alert is reconstructible later.

use crate::database::Reminder;
use crate::notifications::{NotificationHandle, NotificationPayload, NotificationService};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of a schedule attempt.
///
/// `Degraded` is deliberately not an error: callers persist the reminder
/// either way and tests can assert on the missing alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Alert scheduled; the handle must be persisted onto the reminder
    Scheduled(NotificationHandle),
    /// Nothing to schedule: disabled, no upcoming occurrence, or already past
    Skipped,
    /// Collaborator failed; the reminder record remains authoritative
    Degraded(String),
}

impl ScheduleOutcome {
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Scheduled(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Orchestrates schedule/cancel calls against the notification collaborator
#[derive(Clone)]
pub struct NotificationOrchestrator {
    notifier: Arc<dyn NotificationService>,
}

impl NotificationOrchestrator {
    pub fn new(notifier: Arc<dyn NotificationService>) -> Self {
        Self { notifier }
    }

    /// Request an alert at the reminder's `next_due`.
    ///
    /// Skips disabled reminders and occurrences that are absent or not
    /// strictly in the future.
    pub async fn schedule(&self, reminder: &Reminder, now: DateTime<Utc>) -> ScheduleOutcome {
        if !reminder.enabled {
            return ScheduleOutcome::Skipped;
        }
        let Some(due) = reminder.next_due else {
            return ScheduleOutcome::Skipped;
        };
        if due <= now {
            return ScheduleOutcome::Skipped;
        }

        let payload = NotificationPayload {
            reminder_id: reminder.id.clone(),
            kind: reminder.kind,
            title: reminder.title.clone(),
        };

        match self.notifier.schedule_at(due, payload).await {
            Ok(handle) => {
                tracing::debug!(
                    "Scheduled notification {} for reminder {} at {}",
                    handle,
                    reminder.id,
                    due
                );
                ScheduleOutcome::Scheduled(handle)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to schedule notification for reminder {}: {}",
                    reminder.id,
                    e
                );
                ScheduleOutcome::Degraded(e.to_string())
            }
        }
    }

    /// Best-effort cancel. A failure leaves a stale alert behind, which
    /// is acceptable collateral; it never blocks the mutation.
    pub async fn cancel(&self, reminder_id: &str, handle: &str) {
        if let Err(e) = self.notifier.cancel(handle).await {
            tracing::warn!(
                "Failed to cancel notification {} for reminder {}: {}",
                handle,
                reminder_id,
                e
            );
        }
    }

    /// Cancel the reminder's current handle, then schedule a fresh alert.
    /// Cancel always runs first so two live handles never coexist.
    pub async fn reschedule(&self, reminder: &Reminder, now: DateTime<Utc>) -> ScheduleOutcome {
        if let Some(handle) = &reminder.notification_id {
            self.cancel(&reminder.id, handle).await;
        }
        self.schedule(reminder, now).await
    }
}
