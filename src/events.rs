//! Push events delivered to live subscribers.
//!
//! The payload is rendered to JSON once when the event is built and then
//! shared by every subscriber queue it lands in.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Snapshot;

/// Kinds of pushed messages.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Full snapshot after a change
    StateUpdate,
    /// Personal due-date reminder
    Reminder,
    /// Personal notice of an `@name` in a comment
    Mention,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StateUpdate => "state_update",
            EventKind::Reminder => "reminder",
            EventKind::Mention => "mention",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReminderType {
    #[serde(rename = "remind24h")]
    Remind24h,
    #[serde(rename = "remind2h")]
    Remind2h,
    #[serde(rename = "overdue")]
    Overdue,
}

impl ReminderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderType::Remind24h => "remind24h",
            ReminderType::Remind2h => "remind2h",
            ReminderType::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for ReminderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub task_id: String,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MentionPayload {
    pub task_id: String,
    pub comment_id: String,
    pub author_id: String,
    pub content: String,
}

/// A pushed message: kind plus pre-rendered JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub data: String,
}

impl Event {
    /// Build an event, rendering `payload` to JSON.
    pub fn new<T: Serialize>(kind: EventKind, payload: &T) -> Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_string(payload)?,
        })
    }

    pub fn state_update(snapshot: &Snapshot) -> Result<Self> {
        Self::new(EventKind::StateUpdate, snapshot)
    }

    pub fn reminder(payload: &ReminderPayload) -> Result<Self> {
        Self::new(EventKind::Reminder, payload)
    }

    pub fn mention(payload: &MentionPayload) -> Result<Self> {
        Self::new(EventKind::Mention, payload)
    }

    /// `event: <kind>` / `data: <json>` followed by a blank line.
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind.as_str(), self.data)
    }
}
