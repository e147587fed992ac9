//! Database models
//!
//! Rust structs representing reminder entities, plus the request and
//! patch types the services layer feeds into the repository.

use crate::error::Result;
use crate::recurrence::{self, Anchor, Frequency, RecurrenceRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// What the reminder is for. Pure classification; has no effect on
/// recurrence, but travels in the notification payload so the host UI
/// can pick an icon or route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReminderKind {
    Pill,
    Patch,
    Ring,
    Injection,
    Appointment,
    Other,
}

/// A recurring health-adherence reminder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub kind: ReminderKind,
    pub frequency: Frequency,
    /// Wall-clock "HH:MM" applied to every computed occurrence
    pub time: String,
    pub start_date: DateTime<Utc>,
    /// Hard upper bound: occurrences past this instant are not scheduled
    pub end_date: Option<DateTime<Utc>>,
    /// Weekday indices for weekly rules, 0 = Sunday
    pub days: Option<Vec<u8>>,
    /// Day-of-month for monthly rules, 1-31
    pub day_of_month: Option<u32>,
    pub enabled: bool,
    /// Single source of truth for "when does this fire next".
    /// Always engine-computed, never hand-edited.
    pub next_due: Option<DateTime<Utc>>,
    /// Handle of the currently scheduled device notification
    pub notification_id: Option<String>,
    /// Most recent completion. Once present it supersedes `start_date`
    /// as the recurrence anchor.
    pub last_completed: Option<DateTime<Utc>>,
    /// Provenance tag on shared copies: the user it was shared from
    pub shared_from_user: Option<String>,
    /// Provenance tag on shared copies: the reminder it was copied from
    pub shared_from_reminder: Option<String>,
    /// Optimistic-concurrency counter, bumped on every update
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// The recurrence-relevant slice of this reminder
    pub fn recurrence_rule(&self) -> Result<RecurrenceRule> {
        Ok(RecurrenceRule {
            frequency: self.frequency,
            time: recurrence::parse_time(&self.time)?,
            days: self.days.clone(),
            day_of_month: self.day_of_month,
        })
    }

    /// Recurrence anchor: latest completion if any, else the start date
    pub fn anchor(&self) -> Anchor {
        match self.last_completed {
            Some(t) => Anchor::Completed(t),
            None => Anchor::Start(self.start_date),
        }
    }
}

// Manual FromRow: `days` is stored as a JSON TEXT column and
// `day_of_month` as a nullable INTEGER.
impl FromRow<'_, SqliteRow> for Reminder {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let days: Option<String> = row.try_get("days")?;
        let days = days
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                    index: "days".into(),
                    source: Box::new(e),
                })
            })
            .transpose()?;
        let day_of_month: Option<i64> = row.try_get("day_of_month")?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            kind: row.try_get("kind")?,
            frequency: row.try_get("frequency")?,
            time: row.try_get("time")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            days,
            day_of_month: day_of_month.map(|d| d as u32),
            enabled: row.try_get("enabled")?,
            next_due: row.try_get("next_due")?,
            notification_id: row.try_get("notification_id")?,
            last_completed: row.try_get("last_completed")?,
            shared_from_user: row.try_get("shared_from_user")?,
            shared_from_reminder: row.try_get("shared_from_reminder")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// One append-only completion (or skip) log entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReminderCompletion {
    pub id: String,
    pub reminder_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// false records a deliberate skip. The recurrence still advances.
    pub completed: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create reminder request (user-facing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReminderRequest {
    pub title: String,
    pub kind: ReminderKind,
    pub frequency: Frequency,
    pub time: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub days: Option<Vec<u8>>,
    pub day_of_month: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Partial update request (user-facing). Absent fields are left as-is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReminderRequest {
    pub title: Option<String>,
    pub kind: Option<ReminderKind>,
    pub frequency: Option<Frequency>,
    pub time: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// An empty set clears the weekly day selection
    pub days: Option<Vec<u8>>,
    pub day_of_month: Option<u32>,
    pub enabled: Option<bool>,
}

impl UpdateReminderRequest {
    /// Does this update change any field `next_due` is derived from?
    pub fn touches_recurrence(&self) -> bool {
        self.frequency.is_some()
            || self.time.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.days.is_some()
            || self.day_of_month.is_some()
    }
}

/// Fully resolved new-reminder record handed to the store. The services
/// layer has already computed `next_due` and provenance by this point.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub kind: ReminderKind,
    pub frequency: Frequency,
    pub time: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub days: Option<Vec<u8>>,
    pub day_of_month: Option<u32>,
    pub enabled: bool,
    pub next_due: Option<DateTime<Utc>>,
    pub notification_id: Option<String>,
    pub last_completed: Option<DateTime<Utc>>,
    pub shared_from_user: Option<String>,
    pub shared_from_reminder: Option<String>,
}

/// Column-level patch applied by `Repository::update_reminder`.
/// Outer `None` leaves the column untouched; `Some(None)` writes NULL.
#[derive(Debug, Clone, Default)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub kind: Option<ReminderKind>,
    pub frequency: Option<Frequency>,
    pub time: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub days: Option<Option<Vec<u8>>>,
    pub day_of_month: Option<Option<u32>>,
    pub enabled: Option<bool>,
    pub next_due: Option<Option<DateTime<Utc>>>,
    pub notification_id: Option<Option<String>>,
    pub last_completed: Option<DateTime<Utc>>,
}

impl ReminderPatch {
    /// Patch that only replaces (or clears) the notification handle
    pub fn notification(handle: Option<String>) -> Self {
        Self {
            notification_id: Some(handle),
            ..Default::default()
        }
    }
}

/// New completion log entry
#[derive(Debug, Clone)]
pub struct NewCompletion {
    pub reminder_id: String,
    pub timestamp: DateTime<Utc>,
    pub completed: bool,
    pub notes: Option<String>,
}
