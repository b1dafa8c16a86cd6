//! chorehub - shared household chores
//!
//! A small household service: members create chores, hand them to one
//! another, confirm finished work and get reminded before things are due.
//!
//! # Core Concepts
//!
//! - **Snapshot**: the whole household (members and tasks) as one JSON document
//! - **Lifecycle**: role-checked actions moving a task through its states
//! - **Recurrence**: finishing a recurring task spawns the next occurrence
//! - **Reminders**: 24h, 2h and repeating overdue pushes to owners
//! - **Event hub**: per-member push queues behind a server-sent event stream
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `chorehub.toml`
//! - `error`: Error types and result aliases
//! - `model`: Snapshot, member and task records
//! - `factory`: Record construction and mention extraction
//! - `recurrence`: Repeat kinds and next due dates
//! - `lifecycle`: Task actions and their rules
//! - `store`: In-memory snapshot with atomic persistence
//! - `household`: Operations tying store, hub and activity log together
//! - `hub` / `events`: Push subscriptions and their messages
//! - `scheduler`: Reminder scans
//! - `server`: axum HTTP layer
//! - `activity`: Append-only activity log and statistics
//! - `storage` / `lock`: Data directory layout, file locking and atomic writes

pub mod activity;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod household;
pub mod hub;
pub mod lifecycle;
pub mod lock;
pub mod model;
pub mod output;
pub mod recurrence;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod store;

pub use error::{Error, Result};
