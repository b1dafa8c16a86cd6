//! Storage layer for chorehub
//!
//! Everything lives in one data directory:
//!
//! ```text
//! <data-dir>/
//!   chorehub.toml        # Optional configuration
//!   state.json           # Whole snapshot: members + tasks
//!   state.json.lock      # Advisory lock guarding state.json
//!   activity.jsonl       # Append-only task/reminder activity
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::CONFIG_FILE;
use crate::error::Result;
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "CHOREHUB_DATA_DIR";

const STATE_FILE: &str = "state.json";
const ACTIVITY_FILE: &str = "activity.jsonl";

/// Storage manager for chorehub state
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory: explicit path, `CHOREHUB_DATA_DIR`,
    /// the platform data directory, then `./.chorehub`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }
        if let Ok(raw) = std::env::var(DATA_DIR_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Self::new(trimmed);
            }
        }
        if let Some(dirs) = directories::ProjectDirs::from("", "", "chorehub") {
            return Self::new(dirs.data_dir());
        }
        Self::new(".chorehub")
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the snapshot document
    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    /// Path to the activity log (JSONL)
    pub fn activity_file(&self) -> PathBuf {
        self.data_dir.join(ACTIVITY_FILE)
    }

    /// Path to the configuration file
    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Serialize and write atomically under the file's lock
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic_locked(path, json.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    /// Read and parse a JSON document under the file's lock
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let raw = lock::read_locked(path, DEFAULT_LOCK_TIMEOUT_MS)?;
        let data: T = serde_json::from_slice(&raw)?;
        Ok(data)
    }

    /// Append one record to a JSONL file.
    ///
    /// Not atomic with respect to other appenders; callers serialize
    /// through the snapshot lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all records from a JSONL file, skipping blank lines
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }
}
