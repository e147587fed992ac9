//! Completion ledger
//!
//! Append-only completion history plus the re-anchoring it triggers:
//! every logged event moves the recurrence anchor to its timestamp and
//! realigns the outstanding notification.

use super::orchestrator::NotificationOrchestrator;
use super::{cap_to_end, MutationOutcome};
use crate::config;
use crate::database::{NewCompletion, ReminderPatch, ReminderStore};
use crate::error::{AppError, Result};
use crate::recurrence::{self, Anchor};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Records completion events and keeps `next_due` consistent with them
#[derive(Clone)]
pub struct CompletionLedger {
    store: Arc<dyn ReminderStore>,
    orchestrator: NotificationOrchestrator,
}

impl CompletionLedger {
    pub fn new(store: Arc<dyn ReminderStore>, orchestrator: NotificationOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Log a completion (or skip) and re-anchor the reminder from it.
    ///
    /// A skip (`completed = false`) advances the recurrence identically;
    /// it only records intent for history. Ordering: append log, persist
    /// the re-anchored reminder, then touch the notification side.
    pub async fn record_completion(
        &self,
        reminder_id: &str,
        timestamp: DateTime<Utc>,
        completed: bool,
        notes: Option<String>,
    ) -> Result<MutationOutcome> {
        if let Some(notes) = &notes {
            if notes.len() > config::MAX_NOTES_LENGTH {
                return Err(AppError::Validation(format!(
                    "Notes must be at most {} characters",
                    config::MAX_NOTES_LENGTH
                )));
            }
        }

        let reminder = self.store.get_reminder(reminder_id).await?;
        let rule = reminder.recurrence_rule()?;

        tracing::info!(
            "Recording {} for reminder {} at {}",
            if completed { "completion" } else { "skip" },
            reminder_id,
            timestamp
        );

        self.store
            .append_completion(
                &reminder.user_id,
                NewCompletion {
                    reminder_id: reminder.id.clone(),
                    timestamp,
                    completed,
                    notes,
                },
            )
            .await?;

        let now = Utc::now();
        let due = recurrence::next_due(&rule, Anchor::Completed(timestamp), now);
        let next_due = cap_to_end(due, reminder.end_date);

        let patch = ReminderPatch {
            next_due: Some(next_due),
            last_completed: Some(timestamp),
            ..Default::default()
        };
        let updated = self
            .store
            .update_reminder(reminder_id, patch, reminder.version)
            .await?;

        let outcome = self.orchestrator.reschedule(&updated, now).await;
        let handle = outcome.handle().map(str::to_string);
        let reminder = if updated.notification_id.as_deref() == handle.as_deref() {
            updated
        } else {
            self.store
                .update_reminder(
                    &updated.id,
                    ReminderPatch::notification(handle),
                    updated.version,
                )
                .await?
        };

        Ok(MutationOutcome {
            reminder,
            notification: outcome,
        })
    }
}
