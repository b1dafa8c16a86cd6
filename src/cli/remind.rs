//! chorehub remind tick

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::scheduler::ReminderScheduler;

use super::Workspace;

/// Options for `chorehub remind tick`
pub struct TickOptions {
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Run a single scan against the data directory. Nothing is subscribed
/// here, so reminders are only marked sent and logged as activity.
pub fn run_tick(options: TickOptions) -> Result<()> {
    let workspace = Workspace::open(options.data_dir.as_deref())?;
    let household = Arc::new(workspace.household());
    let scheduler = ReminderScheduler::new(household, workspace.config.reminders.clone());
    let report = scheduler.tick();

    let mut human = HumanOutput::new(format!("{} reminder(s) fired", report.fired.len()));
    human.push_summary("scanned", report.scanned.to_string());
    human.push_summary("snoozes cleared", report.snoozes_cleared.to_string());
    for fired in &report.fired {
        let recipients = if fired.recipients.is_empty() {
            "nobody".to_string()
        } else {
            fired.recipients.join(", ")
        };
        human.push_detail(format!(
            "{} {} -> {}",
            fired.reminder_type, fired.task_id, recipients
        ));
    }
    if !report.fired.is_empty() && !report.saved {
        human.push_warning("reminder flags could not be saved; they may fire again");
    }
    emit_success(options.output, "remind tick", &report, Some(&human))
}
