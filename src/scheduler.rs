//! Reminder scheduler
//!
//! Periodically scans active tasks with a due date and pushes reminders to
//! their owners: one early reminder, one late reminder, then overdue
//! reminders on a fixed cadence. A reminder counts as sent even when no
//! owner currently wants it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::activity::ActivityRecord;
use crate::config::ReminderConfig;
use crate::error::Result;
use crate::events::{Event, ReminderPayload, ReminderType};
use crate::household::Household;
use crate::model::{Member, ReminderPrefs, Task};

/// One reminder fired for one task
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FiredReminder {
    pub task_id: String,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    /// Owners the reminder was pushed to
    pub recipients: Vec<String>,
}

/// Summary of one scan
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub scanned: usize,
    pub fired: Vec<FiredReminder>,
    pub snoozes_cleared: usize,
    pub saved: bool,
}

fn prefs_allow(prefs: &ReminderPrefs, reminder_type: ReminderType) -> bool {
    prefs.enabled
        && match reminder_type {
            ReminderType::Remind24h => prefs.remind_24h,
            ReminderType::Remind2h => prefs.remind_2h,
            ReminderType::Overdue => prefs.overdue,
        }
}

pub struct ReminderScheduler {
    household: Arc<Household>,
    config: ReminderConfig,
}

impl ReminderScheduler {
    pub fn new(household: Arc<Household>, config: ReminderConfig) -> Self {
        Self { household, config }
    }

    pub fn tick(&self) -> TickReport {
        self.tick_at(Utc::now())
    }

    /// Scan every task once as of `now`, persisting once if anything changed.
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let mut dirty = false;
        let mut pending: Vec<(String, ReminderType)> = Vec::new();

        let mut guard = self.household.store().lock();
        let snapshot = &mut *guard;

        for task in snapshot.tasks.iter_mut() {
            if task.is_deleted() || task.is_archived() || !task.state.is_active() {
                continue;
            }
            let Some(due) = task.due_at else {
                continue;
            };
            report.scanned += 1;

            if let Some(snooze_until) = task.reminders.snooze_until {
                if now < snooze_until {
                    continue;
                }
                task.reminders.snooze_until = None;
                report.snoozes_cleared += 1;
                dirty = true;
            }

            let due_types = self.due_reminders(task, due, now);
            dirty |= !due_types.is_empty();
            pending.extend(due_types.into_iter().map(|kind| (task.id.clone(), kind)));
        }

        for (task_id, reminder_type) in pending {
            let Some(task) = snapshot.tasks.iter().find(|task| task.id == task_id) else {
                continue;
            };
            match self.deliver(task, reminder_type, &snapshot.members, now) {
                Ok(fired) => report.fired.push(fired),
                Err(err) => {
                    warn!(task = %task_id, reminder = %reminder_type, error = %err, "reminder delivery failed")
                }
            }
        }

        if dirty {
            match guard.save() {
                Ok(()) => report.saved = true,
                Err(err) => warn!(error = %err, "could not persist reminder state"),
            }
        }

        debug!(
            scanned = report.scanned,
            fired = report.fired.len(),
            saved = report.saved,
            "reminder scan finished"
        );
        report
    }

    /// Mark and return the reminders `task` is owed right now.
    fn due_reminders(&self, task: &mut Task, due: DateTime<Utc>, now: DateTime<Utc>) -> Vec<ReminderType> {
        let remaining = due - now;
        let mut fired = Vec::new();

        if remaining <= Duration::hours(self.config.remind_24h_hours) && !task.reminders.remind_24h_sent {
            task.reminders.remind_24h_sent = true;
            fired.push(ReminderType::Remind24h);
        }
        if remaining <= Duration::hours(self.config.remind_2h_hours) && !task.reminders.remind_2h_sent {
            task.reminders.remind_2h_sent = true;
            fired.push(ReminderType::Remind2h);
        }
        if remaining <= Duration::zero() {
            let repeat = Duration::hours(self.config.overdue_repeat_hours);
            let owed = task
                .reminders
                .last_overdue_at
                .map_or(true, |last| now - last >= repeat);
            if owed {
                task.reminders.last_overdue_at = Some(now);
                fired.push(ReminderType::Overdue);
            }
        }
        fired
    }

    fn deliver(
        &self,
        task: &Task,
        reminder_type: ReminderType,
        members: &[Member],
        now: DateTime<Utc>,
    ) -> Result<FiredReminder> {
        let event = Event::reminder(&ReminderPayload {
            task_id: task.id.clone(),
            reminder_type,
        })?;

        let mut recipients = Vec::new();
        for owner in &task.owners {
            let Some(member) = members.iter().find(|member| &member.id == owner) else {
                continue;
            };
            if !prefs_allow(&member.reminder_prefs, reminder_type) {
                continue;
            }
            self.household.hub().send_to_member(owner, event.clone());
            self.household
                .record(ActivityRecord::reminder(&task.id, owner, reminder_type, now));
            recipients.push(owner.clone());
        }

        Ok(FiredReminder {
            task_id: task.id.clone(),
            reminder_type,
            recipients,
        })
    }

    /// Tick every `tick_secs` until `shutdown` flips to true or its sender
    /// goes away. A tick in progress always completes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = std::time::Duration::from_secs(self.config.tick_secs);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = self.config.tick_secs, "reminder scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick();
                    if !report.fired.is_empty() {
                        info!(fired = report.fired.len(), "reminders sent");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reminder scheduler stopped");
    }
}
