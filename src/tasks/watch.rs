use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::tasks::{detector::WatchState, seen_store::SeenStore};

/// Watch-state summary for the /status command.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchSnapshot {
    pub tracked: usize,
    pub warmed_up: bool,
}

/// Shared ownership of the in-memory watch state and its durable mirror.
///
/// The poller drives it every tick; the admin surface pokes it when mailboxes
/// are removed, so a stale fingerprint cannot swallow the first notification
/// after a re-add. The mutex is held across in-memory work and the blocking
/// state save, never across an await.
pub struct WatchHandle {
    state: Mutex<WatchState>,
    store: SeenStore,
    degraded: AtomicBool,
}

impl WatchHandle {
    pub fn new(store: SeenStore) -> Self {
        let seen = store.load();
        if !seen.is_empty() {
            tracing::info!(
                target: "state",
                entries = seen.len(),
                path = %store.path().display(),
                "restored seen state"
            );
        }
        Self {
            state: Mutex::new(WatchState::new(seen)),
            store,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> WatchSnapshot {
        let state = self.state.lock();
        WatchSnapshot {
            tracked: state.tracked(),
            warmed_up: state.is_warmed_up(),
        }
    }

    /// Flushes the current seen map to disk. A failing medium is loud but
    /// not fatal: live notifications keep flowing, restart-safety is lost.
    ///
    /// The save runs under the state lock so concurrent flushes commit in
    /// mutation order. Releasing between snapshot and rename would let an
    /// older snapshot land on disk after a newer one, resurrecting a removed
    /// mailbox's fingerprint across a restart.
    pub fn persist(&self) {
        let state = self.state.lock();
        let result = self.store.save(&state.snapshot_seen());
        drop(state);
        if let Err(err) = result {
            tracing::error!(
                target: "state",
                error = %err,
                path = %self.store.path().display(),
                "failed to persist seen state"
            );
            if !self.degraded.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    target: "state",
                    "seen state is now in-memory only; duplicate notifications are possible after a restart"
                );
            }
        }
    }

    /// Clears state for removed mailboxes and persists the shrunken map.
    pub fn forget<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        let removed = {
            let mut state = self.state.lock();
            names.into_iter().filter(|name| state.forget(name)).count()
        };
        if removed > 0 {
            self.persist();
            tracing::info!(target: "state", removed, "dropped seen state for removed mailboxes");
        }
    }

    pub fn clear(&self) {
        {
            self.state.lock().clear();
        }
        self.persist();
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::Path};

    use super::*;

    fn seeded_handle(dir: &Path, entries: usize) -> WatchHandle {
        let store = SeenStore::new(dir.join("seen.json"));
        let mut seen = HashMap::new();
        for i in 0..entries {
            seen.insert(format!("box{i}@x.com"), format!("{i:064x}"));
        }
        store.save(&seen).unwrap();
        WatchHandle::new(store)
    }

    #[test]
    fn forget_drops_entry_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let handle = seeded_handle(dir.path(), 2);

        handle.forget(["box0@x.com"]);

        let on_disk = SeenStore::new(dir.path().join("seen.json")).load();
        assert!(!on_disk.contains_key("box0@x.com"));
        assert!(on_disk.contains_key("box1@x.com"));
    }

    #[test]
    fn clear_empties_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let handle = seeded_handle(dir.path(), 3);

        handle.clear();

        assert!(SeenStore::new(dir.path().join("seen.json")).load().is_empty());
    }

    // A removed mailbox must never be resurrected on disk by a flush racing
    // the removal: whatever rename lands last has to reflect every prior
    // removal, or a restart reloads the stale fingerprint and the re-added
    // mailbox stays silent.
    #[test]
    fn contended_saves_commit_in_mutation_order() {
        let dir = tempfile::tempdir().unwrap();
        let handle = seeded_handle(dir.path(), 64);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    handle.persist();
                }
            });
            scope.spawn(|| {
                for i in 0..64 {
                    let name = format!("box{i}@x.com");
                    handle.forget([name.as_str()]);
                }
            });
        });

        let on_disk = SeenStore::new(dir.path().join("seen.json")).load();
        let in_memory = handle.state().snapshot_seen();
        assert!(in_memory.is_empty());
        assert_eq!(on_disk, in_memory);
    }
}
