//! Database module
//!
//! Persistence for reminders and completion logs:
//! - Schema and migrations
//! - Model definitions
//! - The `ReminderStore` trait the services layer depends on
//! - The SQLite `Repository` reference implementation

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Persistence collaborator consumed by the lifecycle layer.
///
/// `Repository` is the bundled SQLite implementation; hosts with their
/// own storage implement this instead.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn get_reminder(&self, id: &str) -> Result<Reminder>;
    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>>;
    async fn create_reminder(&self, user_id: &str, data: NewReminder) -> Result<Reminder>;
    /// Apply a patch guarded by the optimistic version counter.
    /// Fails with `AppError::Conflict` when the record moved on.
    async fn update_reminder(
        &self,
        id: &str,
        patch: ReminderPatch,
        expected_version: i64,
    ) -> Result<Reminder>;
    async fn delete_reminder(&self, id: &str) -> Result<()>;
    async fn append_completion(
        &self,
        user_id: &str,
        entry: NewCompletion,
    ) -> Result<ReminderCompletion>;
    async fn list_completions(&self, reminder_id: &str) -> Result<Vec<ReminderCompletion>>;
}

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every application
/// connection opens against the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}
