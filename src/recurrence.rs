//! Recurrence kinds and next-due arithmetic

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How often a chore comes back once completed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatKind {
    /// Case-insensitive name lookup; unknown names read as `None`.
    pub fn from_name(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => RepeatKind::Daily,
            "weekly" => RepeatKind::Weekly,
            "monthly" => RepeatKind::Monthly,
            _ => RepeatKind::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepeatKind::None => "none",
            RepeatKind::Daily => "daily",
            RepeatKind::Weekly => "weekly",
            RepeatKind::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for RepeatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a caller-supplied recurrence value to a kind.
///
/// Accepts a bare string (`"weekly"`), an object carrying `type`
/// (`{"type": "weekly"}`), or anything else, which reads as `None`.
pub fn normalize_repeat(value: &Value) -> RepeatKind {
    let raw = match value {
        Value::Object(map) => map.get("type"),
        other => Some(other),
    };
    match raw {
        Some(Value::String(name)) => RepeatKind::from_name(name),
        _ => RepeatKind::None,
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Shift by whole calendar months, clamping the day to the target month's
/// last day. Time of day is kept.
pub fn add_months(at: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let index = at.year() * 12 + at.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = at.day().min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| date.and_time(at.time()).and_utc())
        .unwrap_or(at)
}

/// Due date of the occurrence after one due at `due`
pub fn compute_next_due(due: DateTime<Utc>, kind: RepeatKind) -> DateTime<Utc> {
    match kind {
        RepeatKind::None => due,
        RepeatKind::Daily => due + Duration::days(1),
        RepeatKind::Weekly => due + Duration::days(7),
        RepeatKind::Monthly => add_months(due, 1),
    }
}
