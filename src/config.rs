//! Configuration loading and management
//!
//! Handles parsing of `chorehub.toml` inside the data directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the configuration inside the data directory
pub const CONFIG_FILE: &str = "chorehub.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Reminder scheduler configuration
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Event hub configuration
    #[serde(default)]
    pub hub: HubConfig,

    /// Household defaults
    #[serde(default)]
    pub household: HouseholdConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5173
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Reminder scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Run the background scheduler when serving
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scans
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Hours before due for the early reminder
    #[serde(default = "default_remind_24h_hours")]
    pub remind_24h_hours: i64,

    /// Hours before due for the late reminder
    #[serde(default = "default_remind_2h_hours")]
    pub remind_2h_hours: i64,

    /// Hours between repeated overdue reminders
    #[serde(default = "default_overdue_repeat_hours")]
    pub overdue_repeat_hours: i64,
}

fn default_true() -> bool {
    true
}

fn default_tick_secs() -> u64 {
    60
}

fn default_remind_24h_hours() -> i64 {
    24
}

fn default_remind_2h_hours() -> i64 {
    2
}

fn default_overdue_repeat_hours() -> i64 {
    6
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: default_tick_secs(),
            remind_24h_hours: default_remind_24h_hours(),
            remind_2h_hours: default_remind_2h_hours(),
            overdue_repeat_hours: default_overdue_repeat_hours(),
        }
    }
}

/// Event hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Per-subscriber queue capacity; a full queue drops new messages
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds between keep-alive comments on idle push streams
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_keep_alive_secs() -> u64 {
    25
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Household defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdConfig {
    /// Members seeded when no usable state file exists
    #[serde(default = "default_members")]
    pub default_members: Vec<String>,

    /// Shortest snooze accepted
    #[serde(default = "default_min_snooze_minutes")]
    pub min_snooze_minutes: i64,

    /// Snooze length when none is requested
    #[serde(default = "default_snooze_minutes")]
    pub default_snooze_minutes: i64,
}

fn default_members() -> Vec<String> {
    ["Dad", "Mom", "Grandpa", "Grandma"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn default_min_snooze_minutes() -> i64 {
    5
}

fn default_snooze_minutes() -> i64 {
    60
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            default_members: default_members(),
            min_snooze_minutes: default_min_snooze_minutes(),
            default_snooze_minutes: default_snooze_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from a `chorehub.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.reminders.validate()?;
        self.hub.validate()?;
        self.household.validate()?;
        Ok(())
    }
}

impl ReminderConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.tick_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "reminders.tick_secs must be > 0".to_string(),
            ));
        }
        if self.remind_2h_hours <= 0 {
            return Err(crate::error::Error::InvalidConfig(
                "reminders.remind_2h_hours must be > 0".to_string(),
            ));
        }
        if self.remind_24h_hours <= self.remind_2h_hours {
            return Err(crate::error::Error::InvalidConfig(
                "reminders.remind_24h_hours must be greater than reminders.remind_2h_hours"
                    .to_string(),
            ));
        }
        if self.overdue_repeat_hours <= 0 {
            return Err(crate::error::Error::InvalidConfig(
                "reminders.overdue_repeat_hours must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl HubConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.queue_capacity == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "hub.queue_capacity must be > 0".to_string(),
            ));
        }
        if self.keep_alive_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "hub.keep_alive_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl HouseholdConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self
            .default_members
            .iter()
            .any(|name| name.trim().is_empty())
        {
            return Err(crate::error::Error::InvalidConfig(
                "household.default_members cannot include empty names".to_string(),
            ));
        }
        if self.min_snooze_minutes <= 0 {
            return Err(crate::error::Error::InvalidConfig(
                "household.min_snooze_minutes must be > 0".to_string(),
            ));
        }
        if self.default_snooze_minutes < self.min_snooze_minutes {
            return Err(crate::error::Error::InvalidConfig(format!(
                "household.default_snooze_minutes must be >= {}",
                self.min_snooze_minutes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 5173);
        assert!(cfg.reminders.enabled);
        assert_eq!(cfg.reminders.tick_secs, 60);
        assert_eq!(cfg.reminders.remind_24h_hours, 24);
        assert_eq!(cfg.reminders.remind_2h_hours, 2);
        assert_eq!(cfg.reminders.overdue_repeat_hours, 6);
        assert_eq!(cfg.hub.queue_capacity, 100);
        assert_eq!(cfg.hub.keep_alive_secs, 25);
        assert_eq!(cfg.household.default_members.len(), 4);
        assert_eq!(cfg.household.min_snooze_minutes, 5);
        assert_eq!(cfg.household.default_snooze_minutes, 60);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[server]
bind = "127.0.0.1"
port = 8080

[reminders]
enabled = false
tick_secs = 30
overdue_repeat_hours = 12

[hub]
queue_capacity = 16

[household]
default_members = ["Ana", "Ben"]
default_snooze_minutes = 15
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 8080);
        assert!(!cfg.reminders.enabled);
        assert_eq!(cfg.reminders.tick_secs, 30);
        assert_eq!(cfg.reminders.remind_24h_hours, 24);
        assert_eq!(cfg.reminders.overdue_repeat_hours, 12);
        assert_eq!(cfg.hub.queue_capacity, 16);
        assert_eq!(cfg.hub.keep_alive_secs, 25);
        assert_eq!(
            cfg.household.default_members,
            vec!["Ana".to_string(), "Ben".to_string()]
        );
        assert_eq!(cfg.household.default_snooze_minutes, 15);
    }

    #[test]
    fn inverted_reminder_windows_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[reminders]
remind_24h_hours = 1
remind_2h_hours = 2
"#;
        fs::write(&path, content.trim()).expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[hub]\nqueue_capacity = 0\n").expect("write config");

        assert!(matches!(
            Config::load(&path),
            Err(crate::error::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let cfg = Config::default();
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("port = 5173"));
    }
}
