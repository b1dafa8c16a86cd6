//! Household service: the operations callers invoke.
//!
//! Each mutating operation runs entirely under the store lock: build the
//! next snapshot, persist it, swap it in, then publish while still holding
//! the lock, so subscribers see saves in the order they happened.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::activity::{member_stats, ActivityLog, ActivityRecord, ActivityStats, StatsWindow};
use crate::config::{Config, HouseholdConfig};
use crate::error::{Error, Result};
use crate::events::{Event, MentionPayload};
use crate::factory::{self, TaskDraft};
use crate::hub::{EventHub, Subscription, SubscriptionId};
use crate::lifecycle::{self, ActionContext, ActionRequest, Effect, TaskAction};
use crate::model::{parse_timestamp, Member, ReminderPrefs, Snapshot, Task};
use crate::recurrence::normalize_repeat;
use crate::storage::Storage;
use crate::store::{SnapshotStore, StoreGuard};

/// Body of a task creation request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub repeat: Option<Value>,
    #[serde(default)]
    pub require_confirm: bool,
    #[serde(default)]
    pub created_by: String,
}

/// Reminder flags as sent by a client; missing flags read as off.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PrefsUpdate {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "remind24h", default)]
    pub remind_24h: bool,
    #[serde(rename = "remind2h", default)]
    pub remind_2h: bool,
    #[serde(default)]
    pub overdue: bool,
}

impl From<PrefsUpdate> for ReminderPrefs {
    fn from(update: PrefsUpdate) -> Self {
        ReminderPrefs {
            enabled: update.enabled,
            remind_24h: update.remind_24h,
            remind_2h: update.remind_2h,
            overdue: update.overdue,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub reminder_prefs: Option<PrefsUpdate>,
}

/// Outcome of [`Household::apply_action`]
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Updated { task: Task, spawned: Option<Task> },
    Purged { task_id: String },
}

pub struct Household {
    store: SnapshotStore,
    hub: Arc<EventHub>,
    activity: Option<ActivityLog>,
    settings: HouseholdConfig,
}

impl Household {
    pub fn new(store: SnapshotStore, hub: Arc<EventHub>, settings: HouseholdConfig) -> Self {
        Self {
            store,
            hub,
            activity: None,
            settings,
        }
    }

    pub fn with_activity(mut self, log: ActivityLog) -> Self {
        self.activity = Some(log);
        self
    }

    /// Load the data directory and wire up a hub and activity log.
    pub fn open(storage: Storage, config: &Config) -> Self {
        let activity = ActivityLog::for_storage(&storage);
        let store = SnapshotStore::open(storage, &config.household.default_members);
        let hub = Arc::new(EventHub::new(config.hub.queue_capacity));
        Self::new(store, hub, config.household.clone()).with_activity(activity)
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub fn create_member(&self, name: &str) -> Result<Member> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("member name cannot be empty".to_string()));
        }

        let mut guard = self.store.lock();
        let mut next = guard.clone();
        let member = factory::create_member(name);
        next.members.push(member.clone());
        guard.commit(next)?;
        self.broadcast_state(&guard);

        info!(member = %member.id, name = %member.name, "member added");
        Ok(member)
    }

    pub fn update_member(&self, member_id: &str, patch: &MemberPatch) -> Result<Member> {
        let mut guard = self.store.lock();
        let mut next = guard.clone();
        let member = next
            .member_mut(member_id)
            .ok_or_else(|| Error::MemberNotFound(member_id.to_string()))?;

        if let Some(name) = patch
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            member.name = name.to_string();
        }
        if let Some(prefs) = patch.reminder_prefs {
            member.reminder_prefs = prefs.into();
        }
        let member = member.clone();

        guard.commit(next)?;
        self.broadcast_state(&guard);
        debug!(member = %member.id, "member updated");
        Ok(member)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn create_task(&self, request: &NewTask) -> Result<Task> {
        self.create_task_at(request, Utc::now())
    }

    pub fn create_task_at(&self, request: &NewTask, now: DateTime<Utc>) -> Result<Task> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(Error::Validation("task content cannot be empty".to_string()));
        }
        let creator = request.created_by.trim();
        if creator.is_empty() {
            return Err(Error::Validation("createdBy is required".to_string()));
        }
        let due_at = request.due_at.as_deref().and_then(parse_timestamp);
        let repeat = request
            .repeat
            .as_ref()
            .map(normalize_repeat)
            .unwrap_or_default();
        if repeat != crate::recurrence::RepeatKind::None && due_at.is_none() {
            return Err(Error::Validation(
                "a recurring task needs a due date".to_string(),
            ));
        }

        let mut guard = self.store.lock();
        if !guard.has_member(creator) {
            return Err(Error::MemberNotFound(creator.to_string()));
        }
        let mut owners = lifecycle::known_owners(&request.owners, &guard.members);
        if owners.is_empty() {
            owners.push(creator.to_string());
        }

        let mut draft = TaskDraft::new(content, creator);
        draft.owners = owners;
        draft.due_at = due_at;
        draft.repeat = repeat;
        draft.require_confirm = request.require_confirm;
        let task = factory::create_task(draft, now);

        let mut next = guard.clone();
        next.tasks.insert(0, task.clone());
        guard.commit(next)?;
        self.broadcast_state(&guard);
        self.record(ActivityRecord::task_action(&task.id, Some(creator), "create", now));

        info!(task = %task.id, creator = %creator, "task created");
        Ok(task)
    }

    pub fn apply_action(&self, task_id: &str, request: &ActionRequest) -> Result<ActionResult> {
        self.apply_action_at(task_id, &request.actor_id, &request.action, Utc::now())
    }

    pub fn apply_action_at(
        &self,
        task_id: &str,
        actor_id: &str,
        action: &TaskAction,
        now: DateTime<Utc>,
    ) -> Result<ActionResult> {
        let actor_id = actor_id.trim();
        let mut guard = self.store.lock();
        let mut next = guard.clone();
        let index = next
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

        let ctx = ActionContext {
            actor_id,
            members: &next.members,
            now,
            min_snooze_minutes: self.settings.min_snooze_minutes,
            default_snooze_minutes: self.settings.default_snooze_minutes,
        };
        let task = &mut next.tasks[index];
        let previous = task.state;
        let effect = lifecycle::apply(task, action, &ctx)?;

        if effect == Effect::Purge {
            next.tasks.remove(index);
            guard.commit(next)?;
            self.broadcast_state(&guard);
            self.record(ActivityRecord::task_action(task_id, Some(actor_id), "purge", now));
            info!(task = %task_id, actor = %actor_id, "task purged");
            return Ok(ActionResult::Purged {
                task_id: task_id.to_string(),
            });
        }

        task.updated_at = now;
        let spawned = lifecycle::next_occurrence(previous, task, now);
        let updated = task.clone();
        if let Some(spawned) = &spawned {
            next.tasks.insert(0, spawned.clone());
        }

        guard.commit(next)?;
        self.broadcast_state(&guard);
        if let Effect::Commented {
            comment_id,
            content,
            notify,
        } = &effect
        {
            self.send_mentions(&updated.id, comment_id, actor_id, content, notify);
        }

        debug!(task = %task_id, actor = %actor_id, action = action.name(), state = %updated.state, "action applied");
        self.record(ActivityRecord::task_action(task_id, Some(actor_id), action.name(), now));
        if let Some(spawned) = &spawned {
            info!(
                task = %spawned.id,
                series = spawned.series_id.as_deref().unwrap_or_default(),
                occurrence = spawned.occurrence,
                "spawned next occurrence"
            );
            self.record(ActivityRecord::task_action(&spawned.id, None, "spawn", now));
        }

        Ok(ActionResult::Updated {
            task: updated,
            spawned,
        })
    }

    /// Move a task to the recycle bin. Deleting it again changes nothing.
    pub fn delete_task(&self, task_id: &str, actor_id: &str) -> Result<Task> {
        self.delete_task_at(task_id, actor_id, Utc::now())
    }

    pub fn delete_task_at(&self, task_id: &str, actor_id: &str, now: DateTime<Utc>) -> Result<Task> {
        let actor_id = actor_id.trim();
        let mut guard = self.store.lock();
        let existing = guard
            .task(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        if actor_id.is_empty() {
            return Err(Error::Validation("actorId is required".to_string()));
        }
        if !existing.is_participant(actor_id) {
            return Err(Error::Forbidden {
                actor: actor_id.to_string(),
                task: task_id.to_string(),
                action: "delete".to_string(),
            });
        }
        if existing.is_deleted() {
            return Ok(existing.clone());
        }

        let mut next = guard.clone();
        let task = next
            .task_mut(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        task.deleted_at = Some(now);
        task.updated_at = now;
        let deleted = task.clone();

        guard.commit(next)?;
        self.broadcast_state(&guard);
        self.record(ActivityRecord::task_action(task_id, Some(actor_id), "delete", now));
        info!(task = %task_id, actor = %actor_id, "task moved to recycle bin");
        Ok(deleted)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe `member_id`; the first message is the current snapshot.
    pub fn subscribe(&self, member_id: &str) -> Subscription {
        let guard = self.store.lock();
        let initial = match Event::state_update(&guard) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(error = %err, "could not render initial state");
                None
            }
        };
        self.hub.subscribe_with(member_id, initial)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id);
    }

    // =========================================================================
    // Activity
    // =========================================================================

    pub fn activity(&self) -> Option<&ActivityLog> {
        self.activity.as_ref()
    }

    /// Statistics over the last `days` days, member completion included.
    pub fn activity_stats(&self, days: u32) -> Result<ActivityStats> {
        self.activity_stats_at(days, Utc::now())
    }

    pub fn activity_stats_at(&self, days: u32, now: DateTime<Utc>) -> Result<ActivityStats> {
        let window = StatsWindow::last_days(days, now);
        let mut stats = match &self.activity {
            Some(log) => log.stats(&window)?,
            None => ActivityStats::empty(&window),
        };
        stats.members = self.store.read(|snapshot| member_stats(snapshot, &window));
        Ok(stats)
    }

    /// Append to the activity log; failures are logged and otherwise ignored.
    pub(crate) fn record(&self, record: ActivityRecord) {
        if let Some(log) = &self.activity {
            if let Err(err) = log.append(&record) {
                warn!(task = %record.task_id, error = %err, "could not append activity record");
            }
        }
    }

    fn broadcast_state(&self, guard: &StoreGuard<'_>) {
        match Event::state_update(guard) {
            Ok(event) => {
                let delivered = self.hub.broadcast(event);
                debug!(subscribers = delivered, "state broadcast");
            }
            Err(err) => warn!(error = %err, "could not render state update"),
        }
    }

    fn send_mentions(
        &self,
        task_id: &str,
        comment_id: &str,
        author_id: &str,
        content: &str,
        notify: &[String],
    ) {
        let payload = MentionPayload {
            task_id: task_id.to_string(),
            comment_id: comment_id.to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
        };
        let event = match Event::mention(&payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "could not render mention");
                return;
            }
        };
        for member_id in notify {
            self.hub.send_to_member(member_id, event.clone());
        }
    }
}
