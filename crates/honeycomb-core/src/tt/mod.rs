//! Concurrent transposition table with depth-preferred replacement and
//! crash-safe binary persistence.
//!
//! The map is sharded: each shard is an `RwLock<HashMap>`, so probes and
//! stores from search threads never contend with persistence IO, which
//! runs on its own single-threaded worker.

mod entry;
mod persistence;

pub use entry::{TTEntry, TTFlag};
pub use persistence::{PersistenceError, PersistenceHandle, PersistenceStatus};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use persistence::{run_io_worker, IoJob, IoJobKind};

const SHARD_COUNT: usize = 16;

/// Report of a single `put`: what was there before, what is stored now,
/// and whether the stored entry changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateEvent {
    pub key: u64,
    pub stored: TTEntry,
    pub previous: Option<TTEntry>,
    pub replaced: bool,
    pub size_after: usize,
}

pub(crate) struct TableInner {
    shards: [RwLock<HashMap<u64, TTEntry>>; SHARD_COUNT],
    last_update: Mutex<Option<UpdateEvent>>,
    status: Mutex<PersistenceStatus>,
    listeners: Mutex<Vec<Sender<PersistenceStatus>>>,
    load_in_flight: Mutex<Option<PersistenceHandle>>,
    storage_path: PathBuf,
}

impl TableInner {
    #[inline]
    fn shard_for(&self, key: u64) -> &RwLock<HashMap<u64, TTEntry>> {
        // Fibonacci hashing spreads canonical keys across shards.
        let index = (key.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 60) as usize;
        &self.shards[index % SHARD_COUNT]
    }

    pub(crate) fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub(crate) fn snapshot(&self) -> Vec<(u64, TTEntry)> {
        let mut entries = Vec::with_capacity(self.len());
        for shard in &self.shards {
            let guard = shard.read();
            entries.extend(guard.iter().map(|(&k, &v)| (k, v)));
        }
        entries
    }

    /// Raw insert used by the loader; bypasses replacement and reporting.
    pub(crate) fn insert_raw(&self, key: u64, entry: TTEntry) {
        self.shard_for(key).write().insert(key, entry);
    }

    pub(crate) fn clear_entries(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
        self.last_update.lock().take();
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub(crate) fn set_status(&self, status: PersistenceStatus) {
        *self.status.lock() = status;
        self.listeners
            .lock()
            .retain(|listener| listener.send(status).is_ok());
    }

    pub(crate) fn finish_load(&self, handle: &PersistenceHandle) {
        let mut slot = self.load_in_flight.lock();
        if slot.as_ref().is_some_and(|h| h.same_as(handle)) {
            slot.take();
        }
    }
}

/// Thread-safe transposition table keyed by symmetry-canonical position
/// keys. `get`/`put` are safe from any thread and never blocked by IO.
pub struct TranspositionTable {
    inner: Arc<TableInner>,
    jobs: Sender<IoJob>,
}

impl TranspositionTable {
    /// Table persisted at the default location
    /// (`~/.honeycomb/transposition-table.bin`).
    pub fn new() -> TranspositionTable {
        TranspositionTable::with_path(persistence::default_storage_path())
    }

    /// Table persisted at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> TranspositionTable {
        let inner = Arc::new(TableInner {
            shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
            last_update: Mutex::new(None),
            status: Mutex::new(PersistenceStatus::NotLoaded),
            listeners: Mutex::new(Vec::new()),
            load_in_flight: Mutex::new(None),
            storage_path: path.into(),
        });
        let (jobs, receiver): (Sender<IoJob>, Receiver<IoJob>) = unbounded();
        let worker_view: Weak<TableInner> = Arc::downgrade(&inner);
        thread::Builder::new()
            .name("transposition-table-io".into())
            .spawn(move || run_io_worker(worker_view, receiver))
            .expect("failed to spawn transposition table IO worker");
        TranspositionTable { inner, jobs }
    }

    /// Looks up the entry stored for `key`.
    #[inline]
    pub fn get(&self, key: u64) -> Option<TTEntry> {
        self.inner.shard_for(key).read().get(&key).copied()
    }

    /// Stores `entry` under `key` with depth-preferred replacement: an
    /// existing entry of greater or equal depth is kept. Atomic per key;
    /// the outcome is observable through [`TranspositionTable::last_update`].
    pub fn put(&self, key: u64, entry: TTEntry) {
        let (previous, stored, replaced) = {
            let mut shard = self.inner.shard_for(key).write();
            match shard.entry(key) {
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(entry);
                    (None, entry, true)
                }
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    let existing = *slot.get();
                    if existing.depth >= entry.depth {
                        (Some(existing), existing, false)
                    } else {
                        slot.insert(entry);
                        (Some(existing), entry, true)
                    }
                }
            }
        };
        let event = UpdateEvent {
            key,
            stored,
            previous,
            replaced,
            size_after: self.inner.len(),
        };
        *self.inner.last_update.lock() = Some(event);
    }

    /// Removes every entry and forgets the last update.
    pub fn clear(&self) {
        self.inner.clear_entries();
    }

    /// Number of stored entries.
    pub fn size(&self) -> usize {
        self.inner.len()
    }

    /// The most recent `put` outcome, if any since the last clear.
    pub fn last_update(&self) -> Option<UpdateEvent> {
        *self.inner.last_update.lock()
    }

    /// Current persistence status.
    pub fn status(&self) -> PersistenceStatus {
        *self.inner.status.lock()
    }

    /// Registers a persistence-status listener; every transition is
    /// broadcast to the returned channel.
    pub fn subscribe(&self) -> Receiver<PersistenceStatus> {
        let (sender, receiver) = unbounded();
        self.inner.listeners.lock().push(sender);
        receiver
    }

    /// Starts an asynchronous load from the storage path. Concurrent
    /// calls while a load is in flight coalesce onto the same handle; a
    /// table already in `Ready` state completes immediately.
    pub fn load_async(&self) -> PersistenceHandle {
        let mut slot = self.inner.load_in_flight.lock();
        if let Some(in_flight) = slot.as_ref() {
            return in_flight.clone();
        }
        if *self.inner.status.lock() == PersistenceStatus::Ready {
            return PersistenceHandle::completed();
        }
        let handle = PersistenceHandle::pending();
        *slot = Some(handle.clone());
        self.submit(IoJobKind::Load, handle.clone());
        handle
    }

    /// Starts an asynchronous save to the storage path.
    pub fn save_async(&self) -> PersistenceHandle {
        let handle = PersistenceHandle::pending();
        self.submit(IoJobKind::Save, handle.clone());
        handle
    }

    /// Loads synchronously, blocking until the IO worker finishes.
    pub fn load(&self) -> Result<(), PersistenceError> {
        self.load_async().wait()
    }

    /// Saves synchronously, blocking until the IO worker finishes.
    pub fn save(&self) -> Result<(), PersistenceError> {
        self.save_async().wait()
    }

    fn submit(&self, kind: IoJobKind, handle: PersistenceHandle) {
        if self
            .jobs
            .send(IoJob {
                kind,
                handle: handle.clone(),
            })
            .is_err()
        {
            handle.complete(Err(PersistenceError::new("IO worker is gone")));
        }
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        TranspositionTable::new()
    }
}
