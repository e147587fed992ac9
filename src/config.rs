//! Core configuration constants
//!
//! Central location for validation boundaries used throughout the crate.

// ===== Reminder Field Limits =====

/// Maximum length for a reminder title.
/// Prevents excessively long values from being stored.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for completion notes
pub const MAX_NOTES_LENGTH: usize = 2_000;

// ===== Recurrence Boundaries =====

/// Wall-clock time format for the reminder `time` field (e.g. "08:00")
pub const TIME_FORMAT: &str = "%H:%M";

/// Highest valid weekday index (0 = Sunday .. 6 = Saturday)
pub const MAX_WEEKDAY: u8 = 6;

/// Smallest valid day-of-month for monthly reminders
pub const MIN_DAY_OF_MONTH: u32 = 1;

/// Largest valid day-of-month for monthly reminders.
/// Months shorter than the requested day clamp to their last day.
pub const MAX_DAY_OF_MONTH: u32 = 31;
