//! Construction of fresh records.
//!
//! Nothing here looks at the store; callers validate inputs first and
//! pass the clock in.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Comment, Member, ReminderPrefs, Reminders, Repeat, Subtask, Task, TaskState};
use crate::recurrence::RepeatKind;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fields a caller chooses when creating a task
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub content: String,
    pub owners: Vec<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub repeat: RepeatKind,
    pub require_confirm: bool,
    pub created_by: String,
    /// Existing series to join; a recurring draft without one starts a new series.
    pub series_id: Option<String>,
    pub occurrence: u32,
}

impl TaskDraft {
    pub fn new(content: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            owners: Vec::new(),
            due_at: None,
            repeat: RepeatKind::None,
            require_confirm: false,
            created_by: created_by.into(),
            series_id: None,
            occurrence: 1,
        }
    }
}

pub fn create_member(name: impl Into<String>) -> Member {
    Member {
        id: new_id(),
        name: name.into(),
        reminder_prefs: ReminderPrefs::default(),
    }
}

pub fn create_task(draft: TaskDraft, now: DateTime<Utc>) -> Task {
    let repeat = Repeat::new(draft.repeat);
    let series_id = if repeat.is_recurring() {
        draft.series_id.or_else(|| Some(new_id()))
    } else {
        None
    };

    Task {
        id: new_id(),
        content: draft.content,
        owners: draft.owners,
        due_at: draft.due_at,
        repeat,
        series_id,
        occurrence: draft.occurrence.max(1),
        require_confirm: draft.require_confirm,
        created_by: draft.created_by,
        state: TaskState::Assigned,
        subtasks: Vec::new(),
        comments: Vec::new(),
        archived_at: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
        reminders: Reminders::default(),
    }
}

pub fn create_subtask(content: impl Into<String>, now: DateTime<Utc>) -> Subtask {
    Subtask {
        id: new_id(),
        content: content.into(),
        done: false,
        created_at: now,
        done_at: None,
    }
}

pub fn create_comment(
    author_id: impl Into<String>,
    content: impl Into<String>,
    mentions: Vec<String>,
    now: DateTime<Utc>,
) -> Comment {
    Comment {
        id: new_id(),
        author_id: author_id.into(),
        content: content.into(),
        mentions,
        created_at: now,
    }
}

/// Member ids whose `@<name>` appears anywhere in `content`.
///
/// Plain substring containment, in member order, each id at most once. A
/// name that prefixes another ("Dad" and "Dada") matches both when the
/// longer one is written.
pub fn extract_mentions(content: &str, members: &[Member]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    if content.is_empty() {
        return found;
    }

    for member in members {
        let name = member.name.trim();
        let id = member.id.trim();
        if name.is_empty() || id.is_empty() {
            continue;
        }
        if content.contains(&format!("@{name}")) && !found.iter().any(|seen| seen == id) {
            found.push(id.to_string());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: id.to_string(),
            name: name.to_string(),
            reminder_prefs: ReminderPrefs::default(),
        }
    }

    #[test]
    fn new_task_starts_assigned_and_clean() {
        let mut draft = TaskDraft::new("Take out bins", "mom");
        draft.owners = vec!["dad".to_string()];
        let task = create_task(draft, now());

        assert_eq!(task.state, TaskState::Assigned);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.subtasks.is_empty());
        assert!(task.comments.is_empty());
        assert!(task.series_id.is_none());
        assert_eq!(task.occurrence, 1);
        assert_eq!(task.reminders, Reminders::default());
    }

    #[test]
    fn recurring_task_gets_series_unless_supplied() {
        let mut draft = TaskDraft::new("Water plants", "mom");
        draft.repeat = RepeatKind::Weekly;
        draft.due_at = Some(now());
        let fresh = create_task(draft.clone(), now());
        assert!(fresh.series_id.is_some());

        draft.series_id = Some("series-1".to_string());
        draft.occurrence = 4;
        let joined = create_task(draft, now());
        assert_eq!(joined.series_id.as_deref(), Some("series-1"));
        assert_eq!(joined.occurrence, 4);
    }

    #[test]
    fn mentions_match_full_name_in_member_order() {
        let members = vec![member("m-dadbot", "Dadbot"), member("m-dad", "Dad")];
        assert_eq!(
            extract_mentions("@Dad please check", &members),
            vec!["m-dad".to_string()]
        );
        assert!(extract_mentions("@dad lowercase", &members).is_empty());
        assert!(extract_mentions("", &members).is_empty());
    }

    #[test]
    fn prefix_names_both_match_the_longer_mention() {
        let members = vec![member("m-dad", "Dad"), member("m-dada", "Dada")];
        assert_eq!(
            extract_mentions("thanks @Dada", &members),
            vec!["m-dad".to_string(), "m-dada".to_string()]
        );
    }

    #[test]
    fn repeated_mentions_are_deduplicated() {
        let members = vec![member("m-mom", "Mom")];
        assert_eq!(
            extract_mentions("@Mom @Mom @Mom", &members),
            vec!["m-mom".to_string()]
        );
    }
}
