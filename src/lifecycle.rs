//! Task state machine.
//!
//! ```text
//! assigned --accept--> accepted --start--> in_progress
//!                          |                    |
//!                          +------complete------+
//!                                  |
//!               require_confirm? --+-- pending_confirm --confirm--> completed
//!                                  +------------------------------> completed
//! ```
//!
//! Archive is a flag on completed tasks; soft delete is a flag on any task
//! and blocks everything except restore and purge.
//!
//! [`apply`] checks every precondition before it writes anything, so a
//! rejected action leaves the task exactly as it was.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::factory::{self, TaskDraft};
use crate::model::{parse_timestamp, Member, Repeat, Task, TaskState};
use crate::recurrence::{compute_next_due, normalize_repeat};

/// Keep a present `null` distinct from an absent key.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Minutes as a JSON number or numeric string; anything else reads as absent.
fn lenient_minutes<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Partial update carried by [`TaskAction::Update`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub owners: Option<Vec<String>>,
    /// Present-but-null or unparsable clears the due date.
    #[serde(default, deserialize_with = "present")]
    pub due_at: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub repeat: Option<Value>,
    #[serde(default)]
    pub require_confirm: Option<bool>,
}

/// Everything a member can do to an existing task.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskAction {
    Accept,
    Start,
    Complete,
    Confirm,
    Snooze {
        #[serde(default, deserialize_with = "lenient_minutes")]
        minutes: Option<i64>,
    },
    Archive,
    Unarchive,
    Restore,
    Purge,
    SubtaskAdd {
        #[serde(default)]
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    SubtaskToggle {
        #[serde(default)]
        subtask_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SubtaskDelete {
        #[serde(default)]
        subtask_id: String,
    },
    Comment {
        #[serde(default)]
        content: String,
    },
    Update(TaskPatch),
}

/// Request body for an action: the acting member plus the action itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "actorId", default)]
    pub actor_id: String,
    #[serde(flatten)]
    pub action: TaskAction,
}

/// Relationship an actor needs to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Owner,
    Creator,
    Participant,
}

impl TaskAction {
    pub fn name(&self) -> &'static str {
        match self {
            TaskAction::Accept => "accept",
            TaskAction::Start => "start",
            TaskAction::Complete => "complete",
            TaskAction::Confirm => "confirm",
            TaskAction::Snooze { .. } => "snooze",
            TaskAction::Archive => "archive",
            TaskAction::Unarchive => "unarchive",
            TaskAction::Restore => "restore",
            TaskAction::Purge => "purge",
            TaskAction::SubtaskAdd { .. } => "subtask_add",
            TaskAction::SubtaskToggle { .. } => "subtask_toggle",
            TaskAction::SubtaskDelete { .. } => "subtask_delete",
            TaskAction::Comment { .. } => "comment",
            TaskAction::Update(_) => "update",
        }
    }

    /// Restore and purge are the only actions a soft-deleted task takes.
    pub fn allowed_when_deleted(&self) -> bool {
        matches!(self, TaskAction::Restore | TaskAction::Purge)
    }

    fn role(&self) -> Role {
        match self {
            TaskAction::Accept
            | TaskAction::Start
            | TaskAction::Complete
            | TaskAction::Snooze { .. } => Role::Owner,
            TaskAction::Confirm => Role::Creator,
            _ => Role::Participant,
        }
    }
}

/// Longest snooze accepted; larger requests are cut down to a year.
pub const MAX_SNOOZE_MINUTES: i64 = 365 * 24 * 60;

/// Inputs an action needs besides the task itself
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub actor_id: &'a str,
    pub members: &'a [Member],
    pub now: DateTime<Utc>,
    pub min_snooze_minutes: i64,
    pub default_snooze_minutes: i64,
}

/// What happened beyond the in-place mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Changed,
    /// A comment was added; `notify` lists members owed a mention push.
    Commented {
        comment_id: String,
        content: String,
        notify: Vec<String>,
    },
    /// The caller must remove the task from the collection.
    Purge,
}

fn no_effect(task: &Task, action: &TaskAction) -> Error {
    Error::NoEffect {
        task: task.id.clone(),
        action: action.name().to_string(),
    }
}

fn require(condition: bool, task: &Task, action: &TaskAction) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(no_effect(task, action))
    }
}

fn required_text(raw: &str, what: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Check `action` against `task` and apply it.
///
/// On error nothing has been written. `updated_at` is left to the caller,
/// as is removal for [`Effect::Purge`].
pub fn apply(task: &mut Task, action: &TaskAction, ctx: &ActionContext<'_>) -> Result<Effect> {
    if task.is_deleted() && !action.allowed_when_deleted() {
        return Err(Error::TaskDeleted(task.id.clone()));
    }

    let actor = ctx.actor_id.trim();
    if actor.is_empty() {
        return Err(Error::Validation("actorId is required".to_string()));
    }

    let permitted = match action.role() {
        Role::Owner => task.is_owner(actor),
        Role::Creator => task.is_creator(actor),
        Role::Participant => task.is_participant(actor),
    };
    if !permitted {
        return Err(Error::Forbidden {
            actor: actor.to_string(),
            task: task.id.clone(),
            action: action.name().to_string(),
        });
    }

    match action {
        TaskAction::Accept => {
            require(task.state == TaskState::Assigned, task, action)?;
            task.state = TaskState::Accepted;
        }
        TaskAction::Start => {
            require(task.state == TaskState::Accepted, task, action)?;
            task.state = TaskState::InProgress;
        }
        TaskAction::Complete => {
            require(
                matches!(task.state, TaskState::Accepted | TaskState::InProgress),
                task,
                action,
            )?;
            task.state = if task.require_confirm {
                TaskState::PendingConfirm
            } else {
                TaskState::Completed
            };
        }
        TaskAction::Confirm => {
            require(task.state == TaskState::PendingConfirm, task, action)?;
            task.state = TaskState::Completed;
        }
        TaskAction::Snooze { minutes } => {
            let requested = minutes
                .filter(|minutes| *minutes != 0)
                .unwrap_or(ctx.default_snooze_minutes);
            let minutes = requested.max(ctx.min_snooze_minutes).min(MAX_SNOOZE_MINUTES);
            let until = Duration::try_minutes(minutes)
                .and_then(|offset| ctx.now.checked_add_signed(offset))
                .ok_or_else(|| Error::Validation(format!("snooze of {minutes} minutes is out of range")))?;
            task.reminders.snooze_until = Some(until);
        }
        TaskAction::Archive => {
            require(
                task.state == TaskState::Completed && !task.is_archived(),
                task,
                action,
            )?;
            task.archived_at = Some(ctx.now);
        }
        TaskAction::Unarchive => {
            require(task.is_archived(), task, action)?;
            task.archived_at = None;
        }
        TaskAction::Restore => {
            require(task.is_deleted(), task, action)?;
            task.deleted_at = None;
        }
        TaskAction::Purge => {
            require(task.is_deleted(), task, action)?;
            return Ok(Effect::Purge);
        }
        TaskAction::SubtaskAdd { content } => {
            let content = required_text(content, "subtask content")?;
            task.subtasks.push(factory::create_subtask(content, ctx.now));
        }
        TaskAction::SubtaskToggle { subtask_id } => {
            let subtask_id = subtask_id.trim();
            let subtask = task
                .subtasks
                .iter_mut()
                .find(|subtask| subtask.id == subtask_id)
                .ok_or_else(|| Error::SubtaskNotFound(subtask_id.to_string()))?;
            subtask.done = !subtask.done;
            subtask.done_at = subtask.done.then_some(ctx.now);
        }
        TaskAction::SubtaskDelete { subtask_id } => {
            let subtask_id = subtask_id.trim();
            let index = task
                .subtasks
                .iter()
                .position(|subtask| subtask.id == subtask_id)
                .ok_or_else(|| Error::SubtaskNotFound(subtask_id.to_string()))?;
            task.subtasks.remove(index);
        }
        TaskAction::Comment { content } => {
            let content = required_text(content, "comment content")?;
            let mentions = factory::extract_mentions(&content, ctx.members);
            let notify = mentions
                .iter()
                .filter(|id| id.as_str() != actor)
                .filter(|id| {
                    ctx.members
                        .iter()
                        .find(|member| &member.id == *id)
                        .is_some_and(|member| member.reminder_prefs.enabled)
                })
                .cloned()
                .collect();
            let comment = factory::create_comment(actor, content.clone(), mentions, ctx.now);
            let comment_id = comment.id.clone();
            task.comments.push(comment);
            return Ok(Effect::Commented {
                comment_id,
                content,
                notify,
            });
        }
        TaskAction::Update(patch) => apply_patch(task, patch, ctx.members)?,
    }

    Ok(Effect::Changed)
}

fn apply_patch(task: &mut Task, patch: &TaskPatch, members: &[Member]) -> Result<()> {
    let content = patch
        .content
        .as_deref()
        .map(str::trim)
        .filter(|content| !content.is_empty());

    let owners = patch.owners.as_ref().map(|owners| known_owners(owners, members));

    let due_at = patch
        .due_at
        .as_ref()
        .map(|raw| raw.as_str().and_then(parse_timestamp));
    let repeat = patch.repeat.as_ref().map(|raw| Repeat::new(normalize_repeat(raw)));

    let effective_due = due_at.unwrap_or(task.due_at);
    let effective_repeat = repeat.unwrap_or(task.repeat);
    if effective_repeat.is_recurring() && effective_due.is_none() {
        return Err(Error::Validation(
            "a recurring task needs a due date".to_string(),
        ));
    }

    if let Some(content) = content {
        task.content = content.to_string();
    }
    if let Some(owners) = owners.filter(|owners| !owners.is_empty()) {
        task.owners = owners;
    }
    if let Some(due_at) = due_at {
        task.set_due(due_at);
    }
    if let Some(repeat) = repeat {
        task.repeat = repeat;
        if !repeat.is_recurring() {
            task.series_id = None;
        } else if task.series_id.is_none() {
            task.series_id = Some(uuid::Uuid::new_v4().to_string());
            task.occurrence = 1;
        }
    }
    if let Some(require_confirm) = patch.require_confirm {
        task.require_confirm = require_confirm;
    }
    Ok(())
}

/// Known member ids from `requested`, first occurrence order, no repeats.
pub fn known_owners(requested: &[String], members: &[Member]) -> Vec<String> {
    let mut owners: Vec<String> = Vec::new();
    for id in requested {
        let id = id.trim();
        if members.iter().any(|member| member.id == id) && !owners.iter().any(|seen| seen == id)
        {
            owners.push(id.to_string());
        }
    }
    owners
}

/// The next occurrence owed after an action moved `task` out of
/// `previous` into `completed`, if any.
pub fn next_occurrence(previous: TaskState, task: &Task, now: DateTime<Utc>) -> Option<Task> {
    if previous == TaskState::Completed || task.state != TaskState::Completed {
        return None;
    }
    if task.is_archived() || task.is_deleted() || !task.repeat.is_recurring() {
        return None;
    }
    let due = task.due_at?;

    let draft = TaskDraft {
        content: task.content.clone(),
        owners: task.owners.clone(),
        due_at: Some(compute_next_due(due, task.repeat.kind)),
        repeat: task.repeat.kind,
        require_confirm: task.require_confirm,
        created_by: task.created_by.clone(),
        series_id: task.series_id.clone(),
        occurrence: task.occurrence.saturating_add(1),
    };
    let mut next = factory::create_task(draft, now);
    next.subtasks = task
        .subtasks
        .iter()
        .map(|subtask| factory::create_subtask(subtask.content.clone(), now))
        .collect();
    Some(next)
}
