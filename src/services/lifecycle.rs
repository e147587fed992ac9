//! Reminder lifecycle coordinator
//!
//! Top-level entry points for reminder mutations. Every path follows the
//! same ordering: validate, persist, then notify — a crash between steps
//! leaves a consistent record and at worst a stale alert.

use super::completions::CompletionLedger;
use super::orchestrator::{NotificationOrchestrator, ScheduleOutcome};
use super::{cap_to_end, MutationOutcome};
use crate::config;
use crate::database::{
    CreateReminderRequest, NewReminder, Reminder, ReminderCompletion, ReminderPatch,
    ReminderStore, UpdateReminderRequest,
};
use crate::error::{AppError, Result};
use crate::notifications::NotificationService;
use crate::recurrence::{self, Anchor, RecurrenceRule};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Sequences recurrence computation, persistence, and notification
/// orchestration for create/update/complete/delete/share.
#[derive(Clone)]
pub struct ReminderLifecycleCoordinator {
    store: Arc<dyn ReminderStore>,
    orchestrator: NotificationOrchestrator,
    ledger: CompletionLedger,
}

impl ReminderLifecycleCoordinator {
    pub fn new(store: Arc<dyn ReminderStore>, notifier: Arc<dyn NotificationService>) -> Self {
        let orchestrator = NotificationOrchestrator::new(notifier);
        let ledger = CompletionLedger::new(Arc::clone(&store), orchestrator.clone());
        Self {
            store,
            orchestrator,
            ledger,
        }
    }

    /// Create a reminder: compute its first occurrence from the start
    /// date, persist, then schedule the alert.
    pub async fn create(
        &self,
        user_id: &str,
        req: CreateReminderRequest,
    ) -> Result<MutationOutcome> {
        validate_create(&req)?;

        tracing::info!("Creating reminder \"{}\" for user {}", req.title, user_id);

        let now = Utc::now();
        let rule = RecurrenceRule {
            frequency: req.frequency,
            time: recurrence::parse_time(&req.time)?,
            days: req.days.clone(),
            day_of_month: req.day_of_month,
        };
        let due = recurrence::next_due(&rule, Anchor::Start(req.start_date), now);
        let next_due = cap_to_end(due, req.end_date);

        let data = NewReminder {
            title: req.title,
            kind: req.kind,
            frequency: req.frequency,
            time: req.time,
            start_date: req.start_date,
            end_date: req.end_date,
            days: req.days,
            day_of_month: req.day_of_month,
            enabled: req.enabled,
            next_due,
            notification_id: None,
            last_completed: None,
            shared_from_user: None,
            shared_from_reminder: None,
        };
        let created = self.store.create_reminder(user_id, data).await?;

        self.attach_notification(created, now).await
    }

    /// Apply a partial update, recomputing `next_due` when any
    /// recurrence-relevant field changed or the reminder was re-enabled.
    pub async fn update(&self, id: &str, req: UpdateReminderRequest) -> Result<MutationOutcome> {
        let current = self.store.get_reminder(id).await?;
        validate_update(&current, &req)?;

        tracing::debug!("Updating reminder: {}", id);

        let now = Utc::now();
        let disabling = req.enabled == Some(false) && current.enabled;
        let enabling = req.enabled == Some(true) && !current.enabled;

        let mut patch = ReminderPatch {
            title: req.title.clone(),
            kind: req.kind,
            frequency: req.frequency,
            time: req.time.clone(),
            start_date: req.start_date,
            end_date: req.end_date.map(Some),
            days: req
                .days
                .clone()
                .map(|d| if d.is_empty() { None } else { Some(d) }),
            day_of_month: req.day_of_month.map(Some),
            enabled: req.enabled,
            ..Default::default()
        };

        if disabling {
            // A disabled reminder keeps its next_due but must not keep
            // an alert: cancel first, then persist the cleared handle.
            if let Some(handle) = &current.notification_id {
                self.orchestrator.cancel(&current.id, handle).await;
            }
            patch.notification_id = Some(None);
            let updated = self.store.update_reminder(id, patch, current.version).await?;
            return Ok(MutationOutcome {
                reminder: updated,
                notification: ScheduleOutcome::Skipped,
            });
        }

        if enabling || req.touches_recurrence() {
            let rule = merged_rule(&current, &req)?;
            let start = req.start_date.unwrap_or(current.start_date);
            let end = req.end_date.or(current.end_date);
            let anchor = match current.last_completed {
                Some(t) => Anchor::Completed(t),
                None => Anchor::Start(start),
            };
            patch.next_due = Some(cap_to_end(recurrence::next_due(&rule, anchor, now), end));
        }

        let updated = self.store.update_reminder(id, patch, current.version).await?;
        let outcome = self.orchestrator.reschedule(&updated, now).await;
        let reminder = self.persist_handle(updated, &outcome).await?;

        Ok(MutationOutcome {
            reminder,
            notification: outcome,
        })
    }

    /// Log a completion (or skip) and re-anchor the recurrence from it
    pub async fn complete(
        &self,
        id: &str,
        timestamp: DateTime<Utc>,
        completed: bool,
        notes: Option<String>,
    ) -> Result<MutationOutcome> {
        self.ledger
            .record_completion(id, timestamp, completed, notes)
            .await
    }

    /// Delete a reminder, cancelling its alert first. Completion logs
    /// are removed with the record.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let current = self.store.get_reminder(id).await?;

        tracing::info!("Deleting reminder: {}", id);

        if let Some(handle) = &current.notification_id {
            self.orchestrator.cancel(&current.id, handle).await;
        }
        self.store.delete_reminder(id).await?;

        Ok(())
    }

    /// Copy a reminder to another user as an independent record.
    ///
    /// The copy starts its own history: completion state does not carry
    /// over, and its notification lifecycle is entirely its own. Only the
    /// provenance tag points back at the source.
    pub async fn share(&self, id: &str, target_user_id: &str) -> Result<MutationOutcome> {
        let source = self.store.get_reminder(id).await?;

        tracing::info!("Sharing reminder {} with user {}", id, target_user_id);

        let now = Utc::now();
        let rule = source.recurrence_rule()?;
        let due = recurrence::next_due(&rule, Anchor::Start(source.start_date), now);

        let data = NewReminder {
            title: source.title.clone(),
            kind: source.kind,
            frequency: source.frequency,
            time: source.time.clone(),
            start_date: source.start_date,
            end_date: source.end_date,
            days: source.days.clone(),
            day_of_month: source.day_of_month,
            enabled: true,
            next_due: cap_to_end(due, source.end_date),
            notification_id: None,
            last_completed: None,
            shared_from_user: Some(source.user_id.clone()),
            shared_from_reminder: Some(source.id.clone()),
        };
        let copy = self.store.create_reminder(target_user_id, data).await?;

        self.attach_notification(copy, now).await
    }

    /// Get a reminder by ID
    pub async fn get(&self, id: &str) -> Result<Reminder> {
        self.store.get_reminder(id).await
    }

    /// List a user's reminders
    pub async fn list(&self, user_id: &str) -> Result<Vec<Reminder>> {
        self.store.list_reminders(user_id).await
    }

    /// Completion history for a reminder, newest first
    pub async fn history(&self, reminder_id: &str) -> Result<Vec<ReminderCompletion>> {
        self.store.list_completions(reminder_id).await
    }

    /// Schedule an alert for a freshly created reminder and persist the
    /// handle. A freshly created record has no handle to cancel.
    async fn attach_notification(
        &self,
        reminder: Reminder,
        now: DateTime<Utc>,
    ) -> Result<MutationOutcome> {
        let outcome = self.orchestrator.schedule(&reminder, now).await;
        let reminder = self.persist_handle(reminder, &outcome).await?;
        Ok(MutationOutcome {
            reminder,
            notification: outcome,
        })
    }

    /// Persist the outcome's handle (or clear a stale one)
    async fn persist_handle(
        &self,
        reminder: Reminder,
        outcome: &ScheduleOutcome,
    ) -> Result<Reminder> {
        let handle = outcome.handle().map(str::to_string);
        if reminder.notification_id.as_deref() == handle.as_deref() {
            return Ok(reminder);
        }
        self.store
            .update_reminder(
                &reminder.id,
                ReminderPatch::notification(handle),
                reminder.version,
            )
            .await
    }
}

/// Merge the current record with an update request into a recurrence rule
fn merged_rule(current: &Reminder, req: &UpdateReminderRequest) -> Result<RecurrenceRule> {
    let time = match &req.time {
        Some(time) => recurrence::parse_time(time)?,
        None => recurrence::parse_time(&current.time)?,
    };
    let days = match &req.days {
        Some(days) if days.is_empty() => None,
        Some(days) => Some(days.clone()),
        None => current.days.clone(),
    };
    Ok(RecurrenceRule {
        frequency: req.frequency.unwrap_or(current.frequency),
        time,
        days,
        day_of_month: req.day_of_month.or(current.day_of_month),
    })
}

fn validate_create(req: &CreateReminderRequest) -> Result<()> {
    validate_title(&req.title)?;
    recurrence::parse_time(&req.time)?;
    validate_days(req.days.as_deref())?;
    validate_day_of_month(req.day_of_month)?;
    if let Some(end) = req.end_date {
        if end <= req.start_date {
            return Err(AppError::Validation(
                "end_date must be after start_date".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_update(current: &Reminder, req: &UpdateReminderRequest) -> Result<()> {
    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if let Some(time) = &req.time {
        recurrence::parse_time(time)?;
    }
    validate_days(req.days.as_deref())?;
    validate_day_of_month(req.day_of_month)?;

    let start = req.start_date.unwrap_or(current.start_date);
    if let Some(end) = req.end_date.or(current.end_date) {
        if end <= start {
            return Err(AppError::Validation(
                "end_date must be after start_date".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }
    if title.len() > config::MAX_TITLE_LENGTH {
        return Err(AppError::Validation(format!(
            "Title must be at most {} characters",
            config::MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_days(days: Option<&[u8]>) -> Result<()> {
    if let Some(days) = days {
        for day in days {
            if *day > config::MAX_WEEKDAY {
                return Err(AppError::Validation(format!(
                    "Weekday index {} out of range 0-{}",
                    day,
                    config::MAX_WEEKDAY
                )));
            }
        }
    }
    Ok(())
}

fn validate_day_of_month(day: Option<u32>) -> Result<()> {
    if let Some(day) = day {
        if !(config::MIN_DAY_OF_MONTH..=config::MAX_DAY_OF_MONTH).contains(&day) {
            return Err(AppError::Validation(format!(
                "Day of month {} out of range {}-{}",
                day,
                config::MIN_DAY_OF_MONTH,
                config::MAX_DAY_OF_MONTH
            )));
        }
    }
    Ok(())
}
