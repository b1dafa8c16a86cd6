#![allow(dead_code)]

use std::sync::Arc;

use chorehub::config::{Config, HouseholdConfig};
use chorehub::household::{Household, NewTask};
use chorehub::hub::EventHub;
use chorehub::model::{Snapshot, Task};
use chorehub::storage::Storage;
use chorehub::store::SnapshotStore;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

/// Fixed clock for deterministic scenarios
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
}

/// Household backed by a temporary data directory
pub struct TestHousehold {
    pub dir: TempDir,
    pub household: Arc<Household>,
}

impl TestHousehold {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let household = Arc::new(Household::open(Storage::new(dir.path()), &Config::default()));
        Self { dir, household }
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.dir.path())
    }

    /// Member id for a seeded display name
    pub fn member(&self, name: &str) -> String {
        member_id(&self.household, name)
    }

    pub fn task(&self, id: &str) -> Task {
        task(&self.household, id)
    }

    /// Load the data directory again from disk
    pub fn reopen(&self) -> Household {
        Household::open(self.storage(), &Config::default())
    }
}

pub fn member_id(household: &Household, name: &str) -> String {
    household
        .snapshot()
        .members
        .iter()
        .find(|member| member.name == name)
        .map(|member| member.id.clone())
        .unwrap_or_else(|| panic!("no member named {name}"))
}

pub fn task(household: &Household, id: &str) -> Task {
    household
        .snapshot()
        .task(id)
        .cloned()
        .unwrap_or_else(|| panic!("no task {id}"))
}

/// Disk-free household with the given member names
pub fn memory_household(names: &[&str]) -> Arc<Household> {
    let mut snapshot = Snapshot::default();
    for name in names {
        snapshot.members.push(chorehub::factory::create_member(*name));
    }
    Arc::new(Household::new(
        SnapshotStore::in_memory(snapshot),
        Arc::new(EventHub::new(100)),
        HouseholdConfig::default(),
    ))
}

pub fn new_task(content: &str, created_by: &str, owners: &[&str]) -> NewTask {
    NewTask {
        content: content.to_string(),
        owners: owners.iter().map(|owner| owner.to_string()).collect(),
        created_by: created_by.to_string(),
        ..NewTask::default()
    }
}
