//! Services module
//!
//! The orchestration layer: notification orchestrator, completion
//! ledger, and the lifecycle coordinator that sequences them.

pub mod completions;
pub mod lifecycle;
pub mod orchestrator;

pub use completions::CompletionLedger;
pub use lifecycle::ReminderLifecycleCoordinator;
pub use orchestrator::{NotificationOrchestrator, ScheduleOutcome};

use crate::database::Reminder;
use chrono::{DateTime, Utc};

/// Result of a reminder mutation: the persisted record plus what
/// happened on the notification side. Notification trouble never fails
/// the mutation, so it travels here instead of in an error.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub reminder: Reminder,
    pub notification: ScheduleOutcome,
}

/// Apply the reminder's hard end bound: occurrences past `end_date`
/// are dropped rather than scheduled.
pub(crate) fn cap_to_end(
    due: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match end_date {
        Some(end) if due > end => None,
        _ => Some(due),
    }
}
