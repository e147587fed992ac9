//! Repository layer for database operations
//!
//! CRUD for reminders and the append-only completion log. Updates are
//! guarded by the per-reminder version counter so concurrent mutations
//! cannot both win.

use super::models::*;
use super::ReminderStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// SQLite-backed reminder store
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a fully resolved reminder record
    pub async fn create_reminder(&self, user_id: &str, data: NewReminder) -> Result<Reminder> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let days_json = data
            .days
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let reminder = sqlx::query_as::<_, Reminder>(
            r#"
            INSERT INTO reminders (
                id, user_id, title, kind, frequency, time, start_date, end_date,
                days, day_of_month, enabled, next_due, notification_id,
                last_completed, shared_from_user, shared_from_reminder,
                version, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&data.title)
        .bind(data.kind)
        .bind(data.frequency)
        .bind(&data.time)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(days_json)
        .bind(data.day_of_month.map(|d| d as i64))
        .bind(data.enabled)
        .bind(data.next_due)
        .bind(&data.notification_id)
        .bind(data.last_completed)
        .bind(&data.shared_from_user)
        .bind(&data.shared_from_reminder)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created reminder: {} for user: {}", id, user_id);
        Ok(reminder)
    }

    /// Get a reminder by ID
    pub async fn get_reminder(&self, id: &str) -> Result<Reminder> {
        sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ReminderNotFound(id.to_string()))
    }

    /// List a user's reminders, soonest due first
    pub async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT * FROM reminders
            WHERE user_id = ?
            ORDER BY next_due IS NULL, next_due ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    /// Apply a column patch, guarded by the expected version.
    ///
    /// The WHERE clause carries both id and version. Zero rows affected
    /// means either the record vanished or someone else updated it first,
    /// distinguished with a follow-up read.
    pub async fn update_reminder(
        &self,
        id: &str,
        patch: ReminderPatch,
        expected_version: i64,
    ) -> Result<Reminder> {
        let now = Utc::now();

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE reminders SET updated_at = ");
        qb.push_bind(now);

        if let Some(title) = patch.title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(kind) = patch.kind {
            qb.push(", kind = ");
            qb.push_bind(kind);
        }
        if let Some(frequency) = patch.frequency {
            qb.push(", frequency = ");
            qb.push_bind(frequency);
        }
        if let Some(time) = patch.time {
            qb.push(", time = ");
            qb.push_bind(time);
        }
        if let Some(start_date) = patch.start_date {
            qb.push(", start_date = ");
            qb.push_bind(start_date);
        }
        if let Some(end_date) = patch.end_date {
            qb.push(", end_date = ");
            qb.push_bind(end_date);
        }
        if let Some(days) = patch.days {
            let json = days.as_ref().map(serde_json::to_string).transpose()?;
            qb.push(", days = ");
            qb.push_bind(json);
        }
        if let Some(day_of_month) = patch.day_of_month {
            qb.push(", day_of_month = ");
            qb.push_bind(day_of_month.map(|d| d as i64));
        }
        if let Some(enabled) = patch.enabled {
            qb.push(", enabled = ");
            qb.push_bind(enabled);
        }
        if let Some(next_due) = patch.next_due {
            qb.push(", next_due = ");
            qb.push_bind(next_due);
        }
        if let Some(notification_id) = patch.notification_id {
            qb.push(", notification_id = ");
            qb.push_bind(notification_id);
        }
        if let Some(last_completed) = patch.last_completed {
            qb.push(", last_completed = ");
            qb.push_bind(last_completed);
        }

        qb.push(", version = version + 1 WHERE id = ");
        qb.push_bind(id.to_string());
        qb.push(" AND version = ");
        qb.push_bind(expected_version);

        let rows_affected = qb.build().execute(&self.pool).await?.rows_affected();

        if rows_affected == 0 {
            let current = sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match current {
                Some(found) => AppError::Conflict {
                    id: id.to_string(),
                    expected: expected_version,
                    found: found.version,
                },
                None => AppError::ReminderNotFound(id.to_string()),
            });
        }

        tracing::debug!("Updated reminder: {} (version {})", id, expected_version + 1);
        self.get_reminder(id).await
    }

    /// Delete a reminder. Completion logs go with it via cascade.
    pub async fn delete_reminder(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ReminderNotFound(id.to_string()));
        }

        tracing::debug!("Deleted reminder: {}", id);
        Ok(())
    }

    /// Append a completion log entry
    pub async fn append_completion(
        &self,
        user_id: &str,
        entry: NewCompletion,
    ) -> Result<ReminderCompletion> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let completion = sqlx::query_as::<_, ReminderCompletion>(
            r#"
            INSERT INTO reminder_completions (
                id, reminder_id, user_id, timestamp, completed, notes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&entry.reminder_id)
        .bind(user_id)
        .bind(entry.timestamp)
        .bind(entry.completed)
        .bind(&entry.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            "Logged completion: {} for reminder: {}",
            id,
            entry.reminder_id
        );
        Ok(completion)
    }

    /// List completion history for a reminder, newest first
    pub async fn list_completions(&self, reminder_id: &str) -> Result<Vec<ReminderCompletion>> {
        let completions = sqlx::query_as::<_, ReminderCompletion>(
            r#"
            SELECT * FROM reminder_completions
            WHERE reminder_id = ?
            ORDER BY timestamp DESC
            "#,
        )
        .bind(reminder_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(completions)
    }
}

#[async_trait]
impl ReminderStore for Repository {
    async fn get_reminder(&self, id: &str) -> Result<Reminder> {
        self.get_reminder(id).await
    }

    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        self.list_reminders(user_id).await
    }

    async fn create_reminder(&self, user_id: &str, data: NewReminder) -> Result<Reminder> {
        self.create_reminder(user_id, data).await
    }

    async fn update_reminder(
        &self,
        id: &str,
        patch: ReminderPatch,
        expected_version: i64,
    ) -> Result<Reminder> {
        self.update_reminder(id, patch, expected_version).await
    }

    async fn delete_reminder(&self, id: &str) -> Result<()> {
        self.delete_reminder(id).await
    }

    async fn append_completion(
        &self,
        user_id: &str,
        entry: NewCompletion,
    ) -> Result<ReminderCompletion> {
        self.append_completion(user_id, entry).await
    }

    async fn list_completions(&self, reminder_id: &str) -> Result<Vec<ReminderCompletion>> {
        self.list_completions(reminder_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use crate::recurrence::Frequency;
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    fn new_reminder(title: &str) -> NewReminder {
        NewReminder {
            title: title.to_string(),
            kind: ReminderKind::Pill,
            frequency: Frequency::Weekly,
            time: "08:00".to_string(),
            start_date: Utc::now(),
            end_date: None,
            days: Some(vec![1, 3]),
            day_of_month: None,
            enabled: true,
            next_due: Some(Utc::now() + Duration::days(1)),
            notification_id: None,
            last_completed: None,
            shared_from_user: None,
            shared_from_reminder: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_reminder() {
        let repo = create_test_repo().await;

        let created = repo
            .create_reminder("alice", new_reminder("Take pill"))
            .await
            .unwrap();

        assert_eq!(created.title, "Take pill");
        assert_eq!(created.version, 0);
        assert_eq!(created.days, Some(vec![1, 3]));

        let fetched = repo.get_reminder(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.kind, ReminderKind::Pill);
        assert_eq!(fetched.frequency, Frequency::Weekly);
    }

    #[tokio::test]
    async fn test_list_reminders_is_per_user() {
        let repo = create_test_repo().await;

        repo.create_reminder("alice", new_reminder("A"))
            .await
            .unwrap();
        repo.create_reminder("alice", new_reminder("B"))
            .await
            .unwrap();
        repo.create_reminder("bob", new_reminder("C"))
            .await
            .unwrap();

        assert_eq!(repo.list_reminders("alice").await.unwrap().len(), 2);
        assert_eq!(repo.list_reminders("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let repo = create_test_repo().await;

        let created = repo
            .create_reminder("alice", new_reminder("Patch"))
            .await
            .unwrap();

        let patch = ReminderPatch {
            title: Some("Replace patch".to_string()),
            days: Some(None),
            ..Default::default()
        };

        let updated = repo
            .update_reminder(&created.id, patch, created.version)
            .await
            .unwrap();

        assert_eq!(updated.title, "Replace patch");
        assert_eq!(updated.days, None);
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let repo = create_test_repo().await;

        let created = repo
            .create_reminder("alice", new_reminder("Ring"))
            .await
            .unwrap();

        repo.update_reminder(
            &created.id,
            ReminderPatch::notification(Some("n-1".to_string())),
            created.version,
        )
        .await
        .unwrap();

        // Re-using the original version must fail.
        let result = repo
            .update_reminder(
                &created.id,
                ReminderPatch::notification(Some("n-2".to_string())),
                created.version,
            )
            .await;

        match result {
            Err(AppError::Conflict {
                expected, found, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(found, 1);
            }
            other => panic!("expected version conflict, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn test_update_missing_reminder_is_not_found() {
        let repo = create_test_repo().await;

        let result = repo
            .update_reminder("nope", ReminderPatch::default(), 0)
            .await;

        assert!(matches!(result, Err(AppError::ReminderNotFound(_))));
    }

    #[tokio::test]
    async fn test_completions_append_and_list() {
        let repo = create_test_repo().await;

        let reminder = repo
            .create_reminder("alice", new_reminder("Injection"))
            .await
            .unwrap();

        let entry = NewCompletion {
            reminder_id: reminder.id.clone(),
            timestamp: Utc::now(),
            completed: true,
            notes: Some("on time".to_string()),
        };
        repo.append_completion("alice", entry).await.unwrap();

        let skip = NewCompletion {
            reminder_id: reminder.id.clone(),
            timestamp: Utc::now(),
            completed: false,
            notes: None,
        };
        repo.append_completion("alice", skip).await.unwrap();

        let history = repo.list_completions(&reminder.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|c| !c.completed));
    }

    #[tokio::test]
    async fn test_delete_cascades_completions() {
        let repo = create_test_repo().await;

        let reminder = repo
            .create_reminder("alice", new_reminder("Appointment"))
            .await
            .unwrap();

        repo.append_completion(
            "alice",
            NewCompletion {
                reminder_id: reminder.id.clone(),
                timestamp: Utc::now(),
                completed: true,
                notes: None,
            },
        )
        .await
        .unwrap();

        repo.delete_reminder(&reminder.id).await.unwrap();

        assert!(matches!(
            repo.get_reminder(&reminder.id).await,
            Err(AppError::ReminderNotFound(_))
        ));
        assert_eq!(repo.list_completions(&reminder.id).await.unwrap().len(), 0);
    }
}
