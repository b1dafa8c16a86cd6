//! Command-line interface for chorehub
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::activity::DEFAULT_STATS_DAYS;
use crate::config::Config;
use crate::error::Result;
use crate::household::Household;
use crate::output::OutputOptions;
use crate::storage::{Storage, DATA_DIR_ENV};

mod activity;
mod member;
mod remind;
mod serve;
mod task;

/// chorehub - shared household chores
///
/// Members create and hand out chores with due dates and recurrence,
/// confirm finished work, and get live reminders and mentions.
#[derive(Parser, Debug)]
#[command(name = "chorehub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding state.json and chorehub.toml
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API and push stream, and run the reminder scheduler
    Serve {
        /// Address to bind (overrides [server].bind)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides [server].port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the whole household snapshot
    State,

    /// Household members
    #[command(subcommand)]
    Member(MemberCommands),

    /// Chores
    #[command(subcommand)]
    Task(TaskCommands),

    /// Reminder maintenance
    #[command(subcommand)]
    Remind(RemindCommands),

    /// Activity log
    #[command(subcommand)]
    Activity(ActivityCommands),
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Add a member
    Add {
        /// Display name
        name: String,
    },

    /// List members
    List,

    /// Change a member's reminder preferences; omitted flags keep their value
    Prefs {
        /// Member ID
        id: String,

        #[arg(long)]
        enabled: Option<bool>,

        #[arg(long = "remind-24h")]
        remind_24h: Option<bool>,

        #[arg(long = "remind-2h")]
        remind_2h: Option<bool>,

        #[arg(long)]
        overdue: Option<bool>,
    },

    /// Rename a member
    Rename {
        /// Member ID
        id: String,

        /// New display name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Add {
        /// What needs doing
        content: String,

        /// Creating member ID
        #[arg(long = "by")]
        created_by: String,

        /// Owner member ID (repeatable; defaults to the creator)
        #[arg(long = "owner")]
        owners: Vec<String>,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Recurrence: none, daily, weekly, monthly
        #[arg(long)]
        repeat: Option<String>,

        /// Completion needs the creator's confirmation
        #[arg(long)]
        require_confirm: bool,
    },

    /// List tasks
    List {
        /// Include archived and deleted tasks
        #[arg(long)]
        all: bool,
    },

    /// Apply an action to a task
    Act {
        /// Task ID
        id: String,

        /// Acting member ID
        #[arg(long)]
        actor: String,

        /// accept, start, complete, confirm, snooze, archive, unarchive,
        /// restore, purge, subtask_add, subtask_toggle, subtask_delete,
        /// comment, update
        action: String,

        /// Text for subtask_add, comment and update
        #[arg(long)]
        content: Option<String>,

        /// Subtask ID for subtask_toggle and subtask_delete
        #[arg(long)]
        subtask: Option<String>,

        /// Snooze length in minutes
        #[arg(long)]
        minutes: Option<i64>,

        /// New due date for update (RFC 3339; empty clears it)
        #[arg(long)]
        due: Option<String>,

        /// New recurrence for update
        #[arg(long)]
        repeat: Option<String>,

        /// New owner list for update (repeatable)
        #[arg(long = "owner")]
        owners: Vec<String>,

        /// New confirmation requirement for update
        #[arg(long)]
        require_confirm: Option<bool>,
    },

    /// Move a task to the recycle bin
    Rm {
        /// Task ID
        id: String,

        /// Acting member ID
        #[arg(long)]
        actor: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RemindCommands {
    /// Run one reminder scan now
    Tick,
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// Counts by action, actor, reminder type and member completion
    Stats {
        /// Trailing window in days
        #[arg(long, default_value_t = DEFAULT_STATS_DAYS)]
        days: u32,
    },
}

/// Storage, configuration and household for one command invocation
pub(crate) struct Workspace {
    pub storage: Storage,
    pub config: Config,
}

impl Workspace {
    pub fn open(data_dir: Option<&Path>) -> Result<Self> {
        let storage = Storage::resolve(data_dir);
        storage.init()?;
        let config_path = storage.config_file();
        let config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };
        Ok(Self { storage, config })
    }

    pub fn household(&self) -> Household {
        Household::open(self.storage.clone(), &self.config)
    }
}

impl Cli {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Whether this invocation runs the long-lived server
    pub fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = self.output();
        let data_dir = self.data_dir;

        match self.command {
            Commands::Serve { bind, port } => serve::run(serve::ServeOptions {
                bind,
                port,
                data_dir,
                output,
            }),
            Commands::State => task::run_state(task::StateOptions { data_dir, output }),
            Commands::Member(cmd) => match cmd {
                MemberCommands::Add { name } => member::run_add(member::AddOptions {
                    name,
                    data_dir,
                    output,
                }),
                MemberCommands::List => member::run_list(member::ListOptions { data_dir, output }),
                MemberCommands::Prefs {
                    id,
                    enabled,
                    remind_24h,
                    remind_2h,
                    overdue,
                } => member::run_prefs(member::PrefsOptions {
                    id,
                    enabled,
                    remind_24h,
                    remind_2h,
                    overdue,
                    data_dir,
                    output,
                }),
                MemberCommands::Rename { id, name } => member::run_rename(member::RenameOptions {
                    id,
                    name,
                    data_dir,
                    output,
                }),
            },
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    content,
                    created_by,
                    owners,
                    due,
                    repeat,
                    require_confirm,
                } => task::run_add(task::AddOptions {
                    content,
                    created_by,
                    owners,
                    due,
                    repeat,
                    require_confirm,
                    data_dir,
                    output,
                }),
                TaskCommands::List { all } => task::run_list(task::ListOptions {
                    all,
                    data_dir,
                    output,
                }),
                TaskCommands::Act {
                    id,
                    actor,
                    action,
                    content,
                    subtask,
                    minutes,
                    due,
                    repeat,
                    owners,
                    require_confirm,
                } => task::run_act(task::ActOptions {
                    id,
                    actor,
                    action,
                    content,
                    subtask,
                    minutes,
                    due,
                    repeat,
                    owners,
                    require_confirm,
                    data_dir,
                    output,
                }),
                TaskCommands::Rm { id, actor } => task::run_rm(task::RmOptions {
                    id,
                    actor,
                    data_dir,
                    output,
                }),
            },
            Commands::Remind(RemindCommands::Tick) => {
                remind::run_tick(remind::TickOptions { data_dir, output })
            }
            Commands::Activity(ActivityCommands::Stats { days }) => {
                activity::run_stats(activity::StatsOptions {
                    data_dir,
                    days,
                    output,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_act_with_flags() {
        let cli = Cli::try_parse_from([
            "chorehub", "--json", "task", "act", "t1", "--actor", "dad", "snooze", "--minutes", "30",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Task(TaskCommands::Act {
                id, actor, action, minutes, ..
            }) => {
                assert_eq!(id, "t1");
                assert_eq!(actor, "dad");
                assert_eq!(action, "snooze");
                assert_eq!(minutes, Some(30));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn activity_stats_defaults_to_a_week() {
        let cli = Cli::try_parse_from(["chorehub", "activity", "stats"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Activity(ActivityCommands::Stats { days: 7 })
        ));
        let cli = Cli::try_parse_from(["chorehub", "activity", "stats", "--days", "30"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Activity(ActivityCommands::Stats { days: 30 })
        ));
    }

    #[test]
    fn serve_is_detected() {
        let cli = Cli::try_parse_from(["chorehub", "serve", "--port", "8080"]).unwrap();
        assert!(cli.is_serve());
    }

    #[test]
    fn repeated_owner_flags_collect() {
        let cli = Cli::try_parse_from([
            "chorehub", "task", "add", "Dishes", "--by", "mom", "--owner", "dad", "--owner", "gran",
        ])
        .unwrap();
        match cli.command {
            Commands::Task(TaskCommands::Add { owners, .. }) => {
                assert_eq!(owners, vec!["dad".to_string(), "gran".to_string()])
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
