//! chorehub activity stats

use std::path::PathBuf;

use crate::activity::CountEntry;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::Workspace;

/// Options for `chorehub activity stats`
pub struct StatsOptions {
    pub data_dir: Option<PathBuf>,
    pub days: u32,
    pub output: OutputOptions,
}

fn push_counts(human: &mut HumanOutput, label: &str, entries: &[CountEntry]) {
    for entry in entries {
        human.push_detail(format!("{label} {}: {}", entry.key, entry.count));
    }
}

pub fn run_stats(options: StatsOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let stats = household.activity_stats(options.days)?;

    let mut human = HumanOutput::new("activity stats");
    human.push_summary("window", format!("last {} days", stats.days));
    human.push_summary("actions", stats.total_actions.to_string());
    human.push_summary("reminders", stats.total_reminders.to_string());
    push_counts(&mut human, "action", &stats.by_action);
    push_counts(&mut human, "actor", &stats.by_actor);
    push_counts(&mut human, "reminder", &stats.by_reminder_type);
    push_counts(&mut human, "member", &stats.by_member);
    push_counts(&mut human, "task", &stats.by_task);
    for entry in &stats.reminder_trend {
        human.push_detail(format!("{} {}: {}", entry.day, entry.reminder_type, entry.count));
    }
    for member in &stats.members {
        human.push_detail(format!(
            "{}: {}/{} completed ({:.0}%)",
            member.name,
            member.completed,
            member.total_assigned,
            member.completion_rate * 100.0
        ));
    }
    emit_success(options.output, "activity stats", &stats, Some(&human))
}
