//! Snapshot store: the one lock around all household state.
//!
//! Every action takes [`SnapshotStore::lock`] for its whole
//! validate → mutate → persist → broadcast span. Two ways to write:
//! - [`StoreGuard::commit`] swaps in a fully built next snapshot, but only
//!   after it has been saved, so a failed save changes nothing
//! - in-place mutation through `DerefMut` followed by [`StoreGuard::save`],
//!   used by the reminder scan whose flags must stick even if the save fails

use std::collections::BTreeSet;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::factory;
use crate::model::Snapshot;
use crate::storage::Storage;

/// Member names seeded by the first release; a file holding exactly these
/// and no tasks is replaced with the current defaults.
const LEGACY_SEED_NAMES: [&str; 4] = ["爸爸", "妈妈", "我", "外婆"];

pub struct SnapshotStore {
    storage: Option<Storage>,
    state: Mutex<Snapshot>,
}

impl SnapshotStore {
    /// Load the persisted snapshot, seeding `default_members` when the file
    /// is missing, unreadable or corrupt. Never fails: a broken file costs
    /// the household its data, not its service.
    pub fn open(storage: Storage, default_members: &[String]) -> Self {
        let snapshot = load(&storage, default_members);
        Self {
            storage: Some(storage),
            state: Mutex::new(snapshot),
        }
    }

    /// A store that never touches disk
    pub fn in_memory(snapshot: Snapshot) -> Self {
        Self {
            storage: None,
            state: Mutex::new(snapshot),
        }
    }

    pub fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    pub fn lock(&self) -> StoreGuard<'_> {
        StoreGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
            storage: self.storage.as_ref(),
        }
    }

    /// Run `f` against the current snapshot under the lock
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.lock())
    }

    /// Clone of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.read(Snapshot::clone)
    }
}

/// Exclusive access to the snapshot; dropping it releases the lock.
pub struct StoreGuard<'a> {
    state: MutexGuard<'a, Snapshot>,
    storage: Option<&'a Storage>,
}

impl StoreGuard<'_> {
    /// Persist the snapshot as it currently stands
    pub fn save(&self) -> Result<()> {
        persist(self.storage, &self.state)
    }

    /// Persist `next`, then make it the current snapshot
    pub fn commit(&mut self, next: Snapshot) -> Result<()> {
        persist(self.storage, &next)?;
        *self.state = next;
        Ok(())
    }
}

impl Deref for StoreGuard<'_> {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.state
    }
}

impl DerefMut for StoreGuard<'_> {
    fn deref_mut(&mut self) -> &mut Snapshot {
        &mut self.state
    }
}

fn persist(storage: Option<&Storage>, snapshot: &Snapshot) -> Result<()> {
    match storage {
        Some(storage) => {
            storage.write_json(&storage.state_file(), snapshot)?;
            debug!(
                members = snapshot.members.len(),
                tasks = snapshot.tasks.len(),
                "snapshot saved"
            );
            Ok(())
        }
        None => Ok(()),
    }
}

fn seed(default_members: &[String]) -> Snapshot {
    Snapshot {
        members: default_members
            .iter()
            .map(|name| factory::create_member(name.trim()))
            .collect(),
        tasks: Vec::new(),
    }
}

fn is_legacy_seed(snapshot: &Snapshot) -> bool {
    if !snapshot.tasks.is_empty() {
        return false;
    }
    let names: BTreeSet<&str> = snapshot
        .members
        .iter()
        .map(|member| member.name.as_str())
        .collect();
    let legacy: BTreeSet<&str> = LEGACY_SEED_NAMES.into_iter().collect();
    names == legacy
}

fn quarantine(path: &Path) {
    let target = PathBuf::from(format!("{}.corrupt", path.display()));
    match fs::rename(path, &target) {
        Ok(()) => warn!(path = %target.display(), "kept unreadable snapshot aside"),
        Err(err) => warn!(error = %err, "could not move unreadable snapshot aside"),
    }
}

fn load(storage: &Storage, default_members: &[String]) -> Snapshot {
    let path = storage.state_file();

    let (snapshot, dirty) = if !path.exists() {
        info!(path = %path.display(), "no snapshot found; seeding default members");
        (seed(default_members), true)
    } else {
        match storage.read_json::<Snapshot>(&path) {
            Ok(mut snapshot) => {
                if is_legacy_seed(&snapshot) {
                    info!("replacing legacy default members");
                    (seed(default_members), true)
                } else {
                    let upgraded = snapshot.upgrade();
                    if upgraded {
                        info!("upgraded legacy task records");
                    }
                    (snapshot, upgraded)
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "snapshot unreadable; seeding default members");
                quarantine(&path);
                (seed(default_members), true)
            }
        }
    };

    if dirty {
        if let Err(err) = storage.init().and_then(|_| persist(Some(storage), &snapshot)) {
            warn!(error = %err, "could not persist loaded snapshot");
        }
    }
    snapshot
}
