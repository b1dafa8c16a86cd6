//! chorehub task commands

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::household::{ActionResult, NewTask};
use crate::lifecycle::TaskAction;
use crate::model::{Snapshot, Task};
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::Workspace;

/// Options for `chorehub state`
pub struct StateOptions {
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub task add`
pub struct AddOptions {
    pub content: String,
    pub created_by: String,
    pub owners: Vec<String>,
    pub due: Option<String>,
    pub repeat: Option<String>,
    pub require_confirm: bool,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub task list`
pub struct ListOptions {
    pub all: bool,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub task act`
pub struct ActOptions {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub content: Option<String>,
    pub subtask: Option<String>,
    pub minutes: Option<i64>,
    pub due: Option<String>,
    pub repeat: Option<String>,
    pub owners: Vec<String>,
    pub require_confirm: Option<bool>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Options for `chorehub task rm`
pub struct RmOptions {
    pub id: String,
    pub actor: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

fn task_line(task: &Task, snapshot: &Snapshot) -> String {
    let owners: Vec<&str> = task
        .owners
        .iter()
        .map(|id| {
            snapshot
                .member(id)
                .map(|member| member.name.as_str())
                .unwrap_or(id.as_str())
        })
        .collect();

    let mut line = format!("{}  [{}] {}", task.id, task.state, task.content);
    if let Some(due) = task.due_at {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d %H:%M")));
    }
    if task.repeat.is_recurring() {
        line.push_str(&format!("  ({} #{})", task.repeat.kind, task.occurrence));
    }
    line.push_str(&format!("  -> {}", owners.join(", ")));
    if task.is_archived() {
        line.push_str("  [archived]");
    }
    if task.is_deleted() {
        line.push_str("  [deleted]");
    }
    line
}

fn task_output(header: String, task: &Task) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    human.push_summary("id", task.id.clone());
    human.push_summary("state", task.state.to_string());
    if let Some(due) = task.due_at {
        human.push_summary("due", due.to_rfc3339());
    }
    if task.repeat.is_recurring() {
        human.push_summary("repeat", task.repeat.kind.to_string());
        human.push_summary("occurrence", task.occurrence.to_string());
    }
    human
}

pub fn run_state(options: StateOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let snapshot = household.snapshot();

    let mut human = HumanOutput::new("household state");
    human.push_summary("members", snapshot.members.len().to_string());
    human.push_summary("tasks", snapshot.tasks.len().to_string());
    for task in &snapshot.tasks {
        human.push_detail(task_line(task, &snapshot));
    }
    emit_success(options.output, "state", &snapshot, Some(&human))
}

pub fn run_add(options: AddOptions) -> Result<()> {
    if let Some(raw) = options.due.as_deref() {
        if crate::model::parse_timestamp(raw).is_none() {
            return Err(Error::InvalidArgument(format!(
                "--due must be an RFC 3339 timestamp, got '{raw}'"
            )));
        }
    }

    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let request = NewTask {
        content: options.content,
        owners: options.owners,
        due_at: options.due,
        repeat: options.repeat.map(Value::String),
        require_confirm: options.require_confirm,
        created_by: options.created_by,
    };
    let task = household.create_task(&request)?;

    let mut human = task_output(format!("task created: {}", task.content), &task);
    human.push_next_step(format!(
        "chorehub task act {} --actor {} accept",
        task.id,
        task.owners.first().map(String::as_str).unwrap_or("<owner>")
    ));
    emit_success(options.output, "task add", &task, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let snapshot = household.snapshot();
    let tasks: Vec<&Task> = snapshot
        .tasks
        .iter()
        .filter(|task| options.all || (!task.is_archived() && !task.is_deleted()))
        .collect();

    let mut human = HumanOutput::new(format!("{} task(s)", tasks.len()));
    for task in &tasks {
        human.push_detail(task_line(task, &snapshot));
    }
    emit_success(options.output, "task list", &tasks, Some(&human))
}

/// Assemble the same body an HTTP client would send, then parse it.
fn build_action(options: &ActOptions) -> Result<TaskAction> {
    let mut body = Map::new();
    body.insert("action".to_string(), json!(options.action.trim()));
    if let Some(content) = &options.content {
        body.insert("content".to_string(), json!(content));
    }
    if let Some(subtask) = &options.subtask {
        body.insert("subtaskId".to_string(), json!(subtask));
    }
    if let Some(minutes) = options.minutes {
        body.insert("minutes".to_string(), json!(minutes));
    }
    if let Some(due) = &options.due {
        let value = if due.trim().is_empty() {
            Value::Null
        } else {
            json!(due)
        };
        body.insert("dueAt".to_string(), value);
    }
    if let Some(repeat) = &options.repeat {
        body.insert("repeat".to_string(), json!(repeat));
    }
    if !options.owners.is_empty() {
        body.insert("owners".to_string(), json!(options.owners));
    }
    if let Some(require_confirm) = options.require_confirm {
        body.insert("requireConfirm".to_string(), json!(require_confirm));
    }

    serde_json::from_value(Value::Object(body))
        .map_err(|err| Error::InvalidArgument(format!("action '{}': {err}", options.action)))
}

pub fn run_act(options: ActOptions) -> Result<()> {
    let action = build_action(&options)?;
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let result = household.apply_action(
        &options.id,
        &crate::lifecycle::ActionRequest {
            actor_id: options.actor.clone(),
            action,
        },
    )?;

    match &result {
        ActionResult::Updated { task, spawned } => {
            let mut human = task_output(
                format!("task {}: {}", options.action.trim(), task.content),
                task,
            );
            if let Some(next) = spawned {
                human.push_summary("spawned", next.id.clone());
                if let Some(due) = next.due_at {
                    human.push_detail(format!("next occurrence due {}", due.to_rfc3339()));
                }
            }
            let data = json!({ "task": task, "spawned": spawned });
            emit_success(options.output, "task act", &data, Some(&human))
        }
        ActionResult::Purged { task_id } => {
            let mut human = HumanOutput::new(format!("task purged: {task_id}"));
            human.push_summary("id", task_id.clone());
            let data = json!({ "ok": true, "taskId": task_id });
            emit_success(options.output, "task act", &data, Some(&human))
        }
    }
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let household = Workspace::open(options.data_dir.as_deref())?.household();
    let task = household.delete_task(&options.id, &options.actor)?;

    let mut human = task_output(format!("task moved to recycle bin: {}", task.content), &task);
    human.push_next_step(format!(
        "chorehub task act {} --actor {} restore",
        task.id, options.actor
    ));
    emit_success(options.output, "task rm", &task, Some(&human))
}
