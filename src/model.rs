//! Household data model: members, tasks, subtasks, comments, snapshot.
//!
//! Field names serialize in camelCase and form the persisted document.
//! Records written by older versions are accepted as-is: missing
//! collections, timestamps and reminder state fall back to defaults,
//! `repeat` is normalized on the way in, and the original server's state
//! names are read as aliases. [`Snapshot::upgrade`] then repairs the
//! cross-field invariants serde cannot express.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::recurrence::{normalize_repeat, RepeatKind};

fn default_true() -> bool {
    true
}

fn default_occurrence() -> u32 {
    1
}

/// Parse an RFC 3339 timestamp; a naive `YYYY-MM-DDTHH:MM[:SS]` is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
}

/// Optional timestamps tolerate garbage: anything unparsable reads as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(parse_timestamp))
}

/// Per-member notification switches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderPrefs {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "remind24h", default = "default_true")]
    pub remind_24h: bool,
    #[serde(rename = "remind2h", default = "default_true")]
    pub remind_2h: bool,
    #[serde(default = "default_true")]
    pub overdue: bool,
}

impl Default for ReminderPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            remind_24h: true,
            remind_2h: true,
            overdue: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub reminder_prefs: ReminderPrefs,
}

/// Recurrence descriptor, persisted as `{"type": "<kind>"}`.
///
/// Deserialization goes through [`normalize_repeat`], so a bare string,
/// an object with `type`, `null` or junk all land on a valid kind.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct Repeat {
    #[serde(rename = "type")]
    pub kind: RepeatKind,
}

impl Repeat {
    pub fn new(kind: RepeatKind) -> Self {
        Self { kind }
    }

    pub fn is_recurring(&self) -> bool {
        self.kind != RepeatKind::None
    }
}

impl<'de> Deserialize<'de> for Repeat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Repeat::new(normalize_repeat(&raw)))
    }
}

/// Task progression. `Completed` is terminal; archive and soft-delete are
/// timestamps layered on top rather than states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[serde(alias = "已指派")]
    Assigned,
    #[serde(alias = "已接受")]
    Accepted,
    #[serde(alias = "进行中")]
    InProgress,
    #[serde(alias = "待确认")]
    PendingConfirm,
    #[serde(alias = "已完成")]
    Completed,
}

impl TaskState {
    /// States the reminder scheduler watches
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskState::Assigned | TaskState::Accepted | TaskState::InProgress
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Assigned => "assigned",
            TaskState::Accepted => "accepted",
            TaskState::InProgress => "in_progress",
            TaskState::PendingConfirm => "pending_confirm",
            TaskState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub done: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub done_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Reminder bookkeeping; cleared whenever the due date moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Reminders {
    #[serde(rename = "remind24hSent", default)]
    pub remind_24h_sent: bool,
    #[serde(rename = "remind2hSent", default)]
    pub remind_2h_sent: bool,
    #[serde(
        rename = "lastOverdueAt",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub last_overdue_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "snoozeUntil",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub snooze_until: Option<DateTime<Utc>>,
}

impl Reminders {
    pub fn reset(&mut self) {
        *self = Reminders::default();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default = "default_occurrence")]
    pub occurrence: u32,
    #[serde(default)]
    pub require_confirm: bool,
    #[serde(default)]
    pub created_by: String,
    pub state: TaskState,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub reminders: Reminders,
}

impl Task {
    pub fn is_owner(&self, member_id: &str) -> bool {
        self.owners.iter().any(|owner| owner == member_id)
    }

    pub fn is_creator(&self, member_id: &str) -> bool {
        self.created_by == member_id
    }

    /// Owner or creator
    pub fn is_participant(&self, member_id: &str) -> bool {
        self.is_owner(member_id) || self.is_creator(member_id)
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Move the due date and forget every reminder already sent for the old one.
    pub fn set_due(&mut self, due_at: Option<DateTime<Utc>>) {
        self.due_at = due_at;
        self.reminders.reset();
    }

    /// Repair invariants on a record read from disk. Returns true if
    /// anything changed; a second call always returns false.
    fn upgrade(&mut self) -> bool {
        let mut changed = false;

        if self.repeat.is_recurring() && self.due_at.is_none() {
            self.repeat = Repeat::default();
            changed = true;
        }
        if self.repeat.is_recurring() {
            if self.series_id.is_none() {
                self.series_id = Some(Uuid::new_v4().to_string());
                changed = true;
            }
        } else if self.series_id.is_some() {
            self.series_id = None;
            changed = true;
        }
        if self.occurrence == 0 {
            self.occurrence = 1;
            changed = true;
        }

        let mut seen = std::collections::HashSet::new();
        let before = self.owners.len();
        self.owners.retain(|owner| seen.insert(owner.clone()));
        changed |= self.owners.len() != before;

        changed
    }
}

/// Whole household state: the unit of persistence and of broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    pub fn member_mut(&mut self, id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    pub fn has_member(&self, id: &str) -> bool {
        self.member(id).is_some()
    }

    /// Repair every task; idempotent.
    pub fn upgrade(&mut self) -> bool {
        let mut changed = false;
        for task in &mut self.tasks {
            changed |= task.upgrade();
        }
        changed
    }
}
