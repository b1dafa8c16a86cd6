//! chorehub member commands

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::household::{MemberPatch, PrefsUpdate};
use crate::model::{Member, ReminderPrefs};
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::Workspace;

/// Options for `chorehub member add`
pub struct AddOptions {
    pub name: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub member list`
pub struct ListOptions {
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub member prefs`
pub struct PrefsOptions {
    pub id: String,
    pub enabled: Option<bool>,
    pub remind_24h: Option<bool>,
    pub remind_2h: Option<bool>,
    pub overdue: Option<bool>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub member rename`
pub struct RenameOptions {
    pub id: String,
    pub name: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn describe_prefs(prefs: &ReminderPrefs) -> String {
    format!(
        "enabled {}, 24h {}, 2h {}, overdue {}",
        on_off(prefs.enabled),
        on_off(prefs.remind_24h),
        on_off(prefs.remind_2h),
        on_off(prefs.overdue)
    )
}

fn member_output(header: String, member: &Member) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    human.push_summary("id", member.id.clone());
    human.push_summary("name", member.name.clone());
    human.push_summary("reminders", describe_prefs(&member.reminder_prefs));
    human
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let member = household.create_member(&options.name)?;

    let mut human = member_output(format!("member added: {}", member.name), &member);
    human.push_next_step(format!(
        "chorehub task add \"...\" --by {} --owner <member>",
        member.id
    ));
    emit_success(options.output, "member add", &member, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let members = household.snapshot().members;

    let mut human = HumanOutput::new(format!("{} member(s)", members.len()));
    for member in &members {
        human.push_detail(format!(
            "{}  {}  ({})",
            member.id,
            member.name,
            describe_prefs(&member.reminder_prefs)
        ));
    }
    emit_success(options.output, "member list", &members, Some(&human))
}

pub fn run_prefs(options: PrefsOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let current = household
        .snapshot()
        .member(&options.id)
        .map(|member| member.reminder_prefs)
        .ok_or_else(|| Error::MemberNotFound(options.id.clone()))?;

    let patch = MemberPatch {
        name: None,
        reminder_prefs: Some(PrefsUpdate {
            enabled: options.enabled.unwrap_or(current.enabled),
            remind_24h: options.remind_24h.unwrap_or(current.remind_24h),
            remind_2h: options.remind_2h.unwrap_or(current.remind_2h),
            overdue: options.overdue.unwrap_or(current.overdue),
        }),
    };
    let member = household.update_member(&options.id, &patch)?;

    let human = member_output(format!("reminder preferences updated: {}", member.name), &member);
    emit_success(options.output, "member prefs", &member, Some(&human))
}

pub fn run_rename(options: RenameOptions) -> Result<()> {
    if options.name.trim().is_empty() {
        return Err(Error::InvalidArgument("name cannot be empty".to_string()));
    }
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let patch = MemberPatch {
        name: Some(options.name),
        reminder_prefs: None,
    };
    let member = household.update_member(&options.id, &patch)?;

    let human = member_output(format!("member renamed: {}", member.name), &member);
    emit_success(options.output, "member rename", &member, Some(&human))
}
