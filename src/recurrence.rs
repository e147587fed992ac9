//! Recurrence engine
//!
//! Pure next-occurrence arithmetic for recurring reminders. No I/O and
//! no clock access beyond the `now` argument; the services layer owns
//! every side effect.

use crate::config;
use crate::error::{AppError, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a reminder recurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    /// Extension point; currently behaves like `Daily`
    Custom,
}

/// The recurrence-relevant slice of a reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Wall-clock time applied to every computed occurrence
    pub time: NaiveTime,
    /// Weekday indices for weekly rules, 0 = Sunday
    pub days: Option<Vec<u8>>,
    /// Day-of-month for monthly rules, 1-31
    pub day_of_month: Option<u32>,
}

/// The instant recurrence is computed from.
///
/// A reminder that has never been completed anchors at its start date and
/// may fire on that date itself; once completed, the latest completion
/// supersedes the start date and the next occurrence is strictly later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start(DateTime<Utc>),
    Completed(DateTime<Utc>),
}

/// Parse a wall-clock "HH:MM" string
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), config::TIME_FORMAT)
        .map_err(|_| AppError::Validation(format!("Invalid time \"{}\", expected HH:MM", s)))
}

/// Compute the next due instant for a rule.
///
/// Deterministic for identical inputs, and always strictly after `now`:
/// a computed occurrence that has already passed is bumped forward in
/// one-day steps with the wall-clock time re-applied.
pub fn next_due(rule: &RecurrenceRule, anchor: Anchor, now: DateTime<Utc>) -> DateTime<Utc> {
    let date = match anchor {
        Anchor::Start(t) => first_on_or_after(rule, t.date_naive()),
        Anchor::Completed(t) => advance(rule, t.date_naive()),
    };

    let mut due = date.and_time(rule.time).and_utc();
    while due <= now {
        due = (due.date_naive() + Duration::days(1))
            .and_time(rule.time)
            .and_utc();
    }
    due
}

/// One period after `anchor`, per the rule's frequency branch.
fn advance(rule: &RecurrenceRule, anchor: NaiveDate) -> NaiveDate {
    match rule.frequency {
        Frequency::Daily | Frequency::Custom => anchor + Duration::days(1),
        Frequency::Weekly => match cleaned_days(rule) {
            Some(days) => next_matching_weekday(anchor, &days),
            None => anchor + Duration::days(7),
        },
        Frequency::Monthly => {
            let base = add_months(anchor, 1);
            match rule.day_of_month {
                Some(day) => clamp_day(base, day),
                None => base,
            }
        }
        Frequency::Quarterly => add_months(anchor, 3),
    }
}

/// First date matching the rule on or after `start`.
fn first_on_or_after(rule: &RecurrenceRule, start: NaiveDate) -> NaiveDate {
    match rule.frequency {
        Frequency::Weekly => match cleaned_days(rule) {
            Some(days) => {
                let current = start.weekday().num_days_from_sunday() as u8;
                if days.contains(&current) {
                    start
                } else {
                    next_matching_weekday(start, &days)
                }
            }
            None => start,
        },
        Frequency::Monthly => match rule.day_of_month {
            Some(day) => {
                let candidate = clamp_day(start, day);
                if candidate >= start {
                    candidate
                } else {
                    clamp_day(add_months(start, 1), day)
                }
            }
            None => start,
        },
        _ => start,
    }
}

/// Weekday set with out-of-range entries dropped, sorted and deduplicated.
/// Returns None when nothing valid remains so callers fall back to the
/// plain every-seven-days branch.
fn cleaned_days(rule: &RecurrenceRule) -> Option<Vec<u8>> {
    let mut days: Vec<u8> = rule
        .days
        .as_deref()?
        .iter()
        .copied()
        .filter(|d| *d <= config::MAX_WEEKDAY)
        .collect();
    days.sort_unstable();
    days.dedup();
    if days.is_empty() {
        None
    } else {
        Some(days)
    }
}

/// Smallest weekday in `days` strictly after `anchor`'s weekday,
/// wrapping into the following week when none remains.
fn next_matching_weekday(anchor: NaiveDate, days: &[u8]) -> NaiveDate {
    let current = anchor.weekday().num_days_from_sunday() as u8;
    match days.iter().find(|d| **d > current) {
        Some(next) => anchor + Duration::days(i64::from(next - current)),
        None => anchor + Duration::days(i64::from(7 - current + days[0])),
    }
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    // checked_add_months already clamps the day to the target month
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

/// Force the day-of-month, clamping to the last day of short months.
fn clamp_day(date: NaiveDate, day: u32) -> NaiveDate {
    let last = days_in_month(date.year(), date.month());
    date.with_day(day.min(last)).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn rule(frequency: Frequency) -> RecurrenceRule {
        RecurrenceRule {
            frequency,
            time: parse_time("08:00").unwrap(),
            days: None,
            day_of_month: None,
        }
    }

    #[test]
    fn test_daily_start_anchor_fires_on_start_date() {
        // Created before the start instant: first occurrence is the start
        // instant itself.
        let start = utc(2024, 1, 1, 8, 0);
        let now = utc(2024, 1, 1, 7, 0);

        let due = next_due(&rule(Frequency::Daily), Anchor::Start(start), now);
        assert_eq!(due, utc(2024, 1, 1, 8, 0));
    }

    #[test]
    fn test_daily_completion_reanchors_to_next_day() {
        let completed = utc(2024, 1, 1, 8, 5);
        let now = completed;

        let due = next_due(&rule(Frequency::Daily), Anchor::Completed(completed), now);
        assert_eq!(due, utc(2024, 1, 2, 8, 0));
    }

    #[test]
    fn test_deterministic() {
        let mut r = rule(Frequency::Weekly);
        r.days = Some(vec![2, 5]);
        let anchor = Anchor::Completed(utc(2024, 3, 14, 12, 0));
        let now = utc(2024, 3, 14, 12, 0);

        assert_eq!(next_due(&r, anchor, now), next_due(&r, anchor, now));
    }

    #[test]
    fn test_weekly_wraps_past_last_configured_day() {
        // Mon + Wed configured, anchored on a Thursday: next is Monday.
        let mut r = rule(Frequency::Weekly);
        r.days = Some(vec![1, 3]);
        // 2024-01-04 is a Thursday
        let anchor = utc(2024, 1, 4, 8, 0);

        let due = next_due(&r, Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 1, 8, 8, 0)); // Monday
    }

    #[test]
    fn test_weekly_picks_next_configured_day_in_same_week() {
        let mut r = rule(Frequency::Weekly);
        r.days = Some(vec![1, 3]);
        // 2024-01-01 is a Monday
        let anchor = utc(2024, 1, 1, 9, 0);

        let due = next_due(&r, Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 1, 3, 8, 0)); // Wednesday
    }

    #[test]
    fn test_weekly_start_anchor_counts_start_day_itself() {
        let mut r = rule(Frequency::Weekly);
        r.days = Some(vec![3]);
        // 2024-01-03 is a Wednesday
        let start = utc(2024, 1, 3, 6, 0);
        let now = utc(2024, 1, 3, 6, 0);

        let due = next_due(&r, Anchor::Start(start), now);
        assert_eq!(due, utc(2024, 1, 3, 8, 0));
    }

    #[test]
    fn test_weekly_without_days_adds_seven() {
        let anchor = utc(2024, 1, 1, 8, 0);
        let due = next_due(&rule(Frequency::Weekly), Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 1, 8, 8, 0));
    }

    #[test]
    fn test_weekly_invalid_days_fall_back_to_seven() {
        let mut r = rule(Frequency::Weekly);
        r.days = Some(vec![9, 12]);
        let anchor = utc(2024, 1, 1, 8, 0);

        let due = next_due(&r, Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 1, 8, 8, 0));
    }

    #[test]
    fn test_monthly_clamps_short_months() {
        let mut r = rule(Frequency::Monthly);
        r.day_of_month = Some(31);
        // Jan 31 + 1 month lands in February; 2024 is a leap year.
        let anchor = utc(2024, 1, 31, 8, 0);

        let due = next_due(&r, Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 2, 29, 8, 0));
    }

    #[test]
    fn test_monthly_forces_day_of_month() {
        let mut r = rule(Frequency::Monthly);
        r.day_of_month = Some(15);
        let anchor = utc(2024, 1, 3, 8, 0);

        let due = next_due(&r, Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 2, 15, 8, 0));
    }

    #[test]
    fn test_monthly_without_day_keeps_anchor_day() {
        let anchor = utc(2024, 1, 10, 8, 0);
        let due = next_due(&rule(Frequency::Monthly), Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 2, 10, 8, 0));
    }

    #[test]
    fn test_monthly_start_anchor_rolls_to_next_month_when_day_passed() {
        let mut r = rule(Frequency::Monthly);
        r.day_of_month = Some(5);
        let start = utc(2024, 1, 20, 8, 0);
        let now = utc(2024, 1, 20, 8, 0);

        let due = next_due(&r, Anchor::Start(start), now);
        assert_eq!(due, utc(2024, 2, 5, 8, 0));
    }

    #[test]
    fn test_quarterly_adds_three_months() {
        let anchor = utc(2024, 1, 15, 8, 0);
        let due = next_due(&rule(Frequency::Quarterly), Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 4, 15, 8, 0));
    }

    #[test]
    fn test_custom_behaves_like_daily() {
        let anchor = utc(2024, 1, 1, 8, 0);
        let due = next_due(&rule(Frequency::Custom), Anchor::Completed(anchor), anchor);
        assert_eq!(due, utc(2024, 1, 2, 8, 0));
    }

    #[test]
    fn test_result_is_always_in_the_future() {
        // Stale anchor far behind `now`: the one-day bump loop must land
        // strictly ahead while preserving the configured time-of-day.
        let anchor = utc(2020, 6, 1, 8, 0);
        let now = utc(2024, 3, 14, 9, 30);

        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Quarterly,
            Frequency::Custom,
        ] {
            let due = next_due(&rule(frequency), Anchor::Completed(anchor), now);
            assert!(due > now, "{:?} produced a past instant", frequency);
            assert_eq!(due.time(), parse_time("08:00").unwrap());
        }
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("25:99").is_err());
        assert!(parse_time("eight").is_err());
        assert!(parse_time("").is_err());
        assert_eq!(
            parse_time("08:00").unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }
}
