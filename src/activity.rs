//! Activity log
//!
//! Append-only record of task actions and reminder deliveries, kept in
//! `<data-dir>/activity.jsonl`. Nothing reads it back except statistics,
//! which are always taken over a trailing window of days.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Result;
use crate::events::ReminderType;
use crate::model::{Snapshot, Task, TaskState};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TaskAction,
    Reminder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_type: Option<ReminderType>,
}

impl ActivityRecord {
    pub fn task_action(
        task_id: impl Into<String>,
        actor_id: Option<&str>,
        action: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            occurred_at: at,
            kind: ActivityKind::TaskAction,
            task_id: task_id.into(),
            actor_id: actor_id.map(str::to_string),
            action: Some(action.into()),
            member_id: None,
            reminder_type: None,
        }
    }

    pub fn reminder(
        task_id: impl Into<String>,
        member_id: impl Into<String>,
        reminder_type: ReminderType,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            occurred_at: at,
            kind: ActivityKind::Reminder,
            task_id: task_id.into(),
            actor_id: None,
            action: None,
            member_id: Some(member_id.into()),
            reminder_type: Some(reminder_type),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

/// Reminder deliveries of one type on one UTC day
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrendEntry {
    /// `YYYY-MM-DD`
    pub day: String,
    #[serde(rename = "type")]
    pub reminder_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub member_id: String,
    pub name: String,
    pub total_assigned: usize,
    pub completed: usize,
    /// `completed / total_assigned`, four decimals; 0 with nothing assigned.
    pub completion_rate: f64,
}

/// Statistics window used when a caller names none
pub const DEFAULT_STATS_DAYS: u32 = 7;
const MAX_STATS_DAYS: u32 = 3650;

/// Trailing window of whole days ending at a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    pub days: u32,
    pub since: DateTime<Utc>,
}

impl StatsWindow {
    /// `days` is kept within 1..=3650.
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        let days = days.clamp(1, MAX_STATS_DAYS);
        let since = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { days, since }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.since
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub total_actions: usize,
    pub total_reminders: usize,
    pub by_action: Vec<CountEntry>,
    pub by_actor: Vec<CountEntry>,
    pub by_reminder_type: Vec<CountEntry>,
    pub by_member: Vec<CountEntry>,
    pub by_task: Vec<CountEntry>,
    pub reminder_trend: Vec<TrendEntry>,
    /// Filled from the snapshot by the household, not from the log.
    pub members: Vec<MemberStats>,
}

impl ActivityStats {
    pub fn empty(window: &StatsWindow) -> Self {
        Self {
            days: window.days,
            since: window.since,
            total_actions: 0,
            total_reminders: 0,
            by_action: Vec::new(),
            by_actor: Vec::new(),
            by_reminder_type: Vec::new(),
            by_member: Vec::new(),
            by_task: Vec::new(),
            reminder_trend: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Count the records that fall inside `window`.
    pub fn from_records(records: &[ActivityRecord], window: &StatsWindow) -> Self {
        let mut by_action = BTreeMap::new();
        let mut by_actor = BTreeMap::new();
        let mut by_reminder_type = BTreeMap::new();
        let mut by_member = BTreeMap::new();
        let mut by_task = BTreeMap::new();
        let mut trend: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut stats = ActivityStats::empty(window);

        for record in records.iter().filter(|record| window.contains(record.occurred_at)) {
            match record.kind {
                ActivityKind::TaskAction => {
                    stats.total_actions += 1;
                    if let Some(action) = &record.action {
                        *by_action.entry(action.clone()).or_insert(0) += 1;
                    }
                    if let Some(actor) = &record.actor_id {
                        *by_actor.entry(actor.clone()).or_insert(0) += 1;
                    }
                }
                ActivityKind::Reminder => {
                    stats.total_reminders += 1;
                    *by_task.entry(record.task_id.clone()).or_insert(0) += 1;
                    if let Some(reminder_type) = record.reminder_type {
                        let name = reminder_type.as_str().to_string();
                        *by_reminder_type.entry(name.clone()).or_insert(0) += 1;
                        let day = record.occurred_at.format("%Y-%m-%d").to_string();
                        *trend.entry((day, name)).or_insert(0) += 1;
                    }
                    if let Some(member) = &record.member_id {
                        *by_member.entry(member.clone()).or_insert(0) += 1;
                    }
                }
            }
        }

        stats.by_action = ranked(by_action);
        stats.by_actor = ranked(by_actor);
        stats.by_reminder_type = ranked(by_reminder_type);
        stats.by_member = ranked(by_member);
        stats.by_task = ranked(by_task);
        stats.reminder_trend = trend
            .into_iter()
            .map(|((day, reminder_type), count)| TrendEntry {
                day,
                reminder_type,
                count,
            })
            .collect();
        stats
    }
}

/// Per-member completion over tasks they own.
///
/// A task counts as assigned when it was created inside the window and as
/// completed when it is `completed` and was last touched inside the window.
pub fn member_stats(snapshot: &Snapshot, window: &StatsWindow) -> Vec<MemberStats> {
    snapshot
        .members
        .iter()
        .map(|member| {
            let total_assigned = owned_by(snapshot, &member.id)
                .filter(|task| window.contains(task.created_at))
                .count();
            let completed = owned_by(snapshot, &member.id)
                .filter(|task| task.state == TaskState::Completed && window.contains(task.updated_at))
                .count();
            let completion_rate = if total_assigned == 0 {
                0.0
            } else {
                (completed as f64 / total_assigned as f64 * 10_000.0).round() / 10_000.0
            };
            MemberStats {
                member_id: member.id.clone(),
                name: member.name.clone(),
                total_assigned,
                completed,
                completion_rate,
            }
        })
        .collect()
}

fn owned_by<'a>(snapshot: &'a Snapshot, member_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
    snapshot
        .tasks
        .iter()
        .filter(move |task| task.owners.iter().any(|owner| owner == member_id))
}

/// Highest count first, ties by key
fn ranked(counts: BTreeMap<String, usize>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(key, count)| CountEntry { key, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries
}

/// Activity log manager
#[derive(Debug, Clone)]
pub struct ActivityLog {
    storage: Storage,
    path: PathBuf,
}

impl ActivityLog {
    pub fn for_storage(storage: &Storage) -> Self {
        Self {
            storage: storage.clone(),
            path: storage.activity_file(),
        }
    }

    pub fn append(&self, record: &ActivityRecord) -> Result<()> {
        self.storage.append_jsonl(&self.path, record)
    }

    pub fn read_all(&self) -> Result<Vec<ActivityRecord>> {
        self.storage.read_jsonl(&self.path)
    }

    pub fn stats(&self, window: &StatsWindow) -> Result<ActivityStats> {
        Ok(ActivityStats::from_records(&self.read_all()?, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{self, TaskDraft};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn week() -> StatsWindow {
        StatsWindow::last_days(DEFAULT_STATS_DAYS, now())
    }

    #[test]
    fn stats_rank_by_count_then_key() {
        let temp = tempfile::tempdir().unwrap();
        let log = ActivityLog::for_storage(&Storage::new(temp.path()));
        let now = now();

        for (actor, action) in [("mom", "create"), ("dad", "accept"), ("dad", "complete"), ("mom", "create")] {
            log.append(&ActivityRecord::task_action("t1", Some(actor), action, now))
                .unwrap();
        }
        log.append(&ActivityRecord::reminder("t1", "dad", ReminderType::Overdue, now))
            .unwrap();
        log.append(&ActivityRecord::reminder("t2", "dad", ReminderType::Remind2h, now))
            .unwrap();

        let stats = log.stats(&week()).unwrap();
        assert_eq!(stats.days, 7);
        assert_eq!(stats.total_actions, 4);
        assert_eq!(stats.total_reminders, 2);
        assert_eq!(
            stats.by_action,
            vec![
                CountEntry { key: "create".into(), count: 2 },
                CountEntry { key: "accept".into(), count: 1 },
                CountEntry { key: "complete".into(), count: 1 },
            ]
        );
        assert_eq!(stats.by_actor[0], CountEntry { key: "dad".into(), count: 2 });
        assert_eq!(stats.by_actor[1], CountEntry { key: "mom".into(), count: 2 });
        assert_eq!(stats.by_reminder_type[0].key, "overdue");
        assert_eq!(stats.by_member, vec![CountEntry { key: "dad".into(), count: 2 }]);
        assert_eq!(
            stats.by_task,
            vec![
                CountEntry { key: "t1".into(), count: 1 },
                CountEntry { key: "t2".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn records_before_the_window_are_ignored() {
        let records = vec![
            ActivityRecord::task_action("t1", Some("mom"), "create", now() - Duration::days(8)),
            ActivityRecord::reminder("t1", "dad", ReminderType::Overdue, now() - Duration::days(8)),
            ActivityRecord::task_action("t1", Some("dad"), "accept", now() - Duration::days(7)),
            ActivityRecord::reminder("t1", "dad", ReminderType::Overdue, now() - Duration::hours(1)),
        ];

        let stats = ActivityStats::from_records(&records, &week());
        assert_eq!(stats.total_actions, 1);
        assert_eq!(stats.by_action, vec![CountEntry { key: "accept".into(), count: 1 }]);
        assert_eq!(stats.total_reminders, 1);

        let wide = ActivityStats::from_records(&records, &StatsWindow::last_days(30, now()));
        assert_eq!(wide.total_actions, 2);
        assert_eq!(wide.total_reminders, 2);
    }

    #[test]
    fn trend_groups_reminders_by_day_and_type() {
        let day_one = Utc.with_ymd_and_hms(2024, 5, 18, 9, 0, 0).unwrap();
        let day_two = Utc.with_ymd_and_hms(2024, 5, 19, 23, 30, 0).unwrap();
        let records = vec![
            ActivityRecord::reminder("t1", "dad", ReminderType::Overdue, day_two),
            ActivityRecord::reminder("t1", "mom", ReminderType::Remind24h, day_one),
            ActivityRecord::reminder("t2", "dad", ReminderType::Remind24h, day_one),
            ActivityRecord::task_action("t1", Some("dad"), "start", day_one),
        ];

        let stats = ActivityStats::from_records(&records, &week());
        assert_eq!(
            stats.reminder_trend,
            vec![
                TrendEntry { day: "2024-05-18".into(), reminder_type: "remind24h".into(), count: 2 },
                TrendEntry { day: "2024-05-19".into(), reminder_type: "overdue".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn window_is_clamped_to_at_least_a_day() {
        let window = StatsWindow::last_days(0, now());
        assert_eq!(window.days, 1);
        assert_eq!(window.since, now() - Duration::days(1));
        assert_eq!(StatsWindow::last_days(u32::MAX, now()).days, 3650);
    }

    #[test]
    fn member_completion_counts_owned_tasks_in_window() {
        let dad = factory::create_member("Dad");
        let mom = factory::create_member("Mom");
        let owned_task = |content: &str, owners: Vec<String>, at: DateTime<Utc>| {
            let mut draft = TaskDraft::new(content, mom.id.clone());
            draft.owners = owners;
            factory::create_task(draft, at)
        };

        let mut done = owned_task("Bins", vec![dad.id.clone()], now() - Duration::days(2));
        done.state = TaskState::Completed;
        let open = owned_task("Dishes", vec![dad.id.clone(), mom.id.clone()], now() - Duration::days(1));
        let stale = owned_task("Gutters", vec![dad.id.clone()], now() - Duration::days(30));
        let snapshot = Snapshot {
            members: vec![dad.clone(), mom.clone()],
            tasks: vec![done, open, stale],
        };

        let stats = member_stats(&snapshot, &week());
        assert_eq!(stats[0].member_id, dad.id);
        assert_eq!(stats[0].total_assigned, 2);
        assert_eq!(stats[0].completed, 1);
        assert_eq!(stats[0].completion_rate, 0.5);
        assert_eq!(stats[1].name, "Mom");
        assert_eq!(stats[1].total_assigned, 1);
        assert_eq!(stats[1].completed, 0);
        assert_eq!(stats[1].completion_rate, 0.0);
    }

    #[test]
    fn records_round_trip_through_jsonl() {
        let temp = tempfile::tempdir().unwrap();
        let log = ActivityLog::for_storage(&Storage::new(temp.path()));
        let record = ActivityRecord::reminder("t9", "mom", ReminderType::Remind24h, now());
        log.append(&record).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records, vec![record]);
        assert!(log.stats(&week()).unwrap().by_actor.is_empty());
    }

    #[test]
    fn missing_log_has_empty_stats() {
        let temp = tempfile::tempdir().unwrap();
        let log = ActivityLog::for_storage(&Storage::new(temp.path()));
        assert_eq!(log.stats(&week()).unwrap(), ActivityStats::empty(&week()));
    }
}
