//! Asynchronous binary persistence for the transposition table.
//!
//! All disk IO runs on one dedicated worker thread; callers receive a
//! cloneable handle that completes when the job finishes. Status moves
//! NOT_LOADED -> LOADING -> READY on load and READY -> SAVING -> READY on
//! save, reverting to NOT_LOADED when a job fails.

use std::env;
use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crossbeam_channel::Receiver;
use log::{info, warn};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::entry::{TTEntry, TTFlag};
use super::TableInner;

const FILE_NAME: &str = "transposition-table.bin";
/// Bytes per record without the best-move field (legacy layout).
const RECORD_LEGACY: u64 = 8 + 4 + 4 + 1;
/// Bytes per record in the current layout.
const RECORD_CURRENT: u64 = RECORD_LEGACY + 4;
const HEADER: u64 = 4;

/// Lifecycle of the on-disk table copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistenceStatus {
    NotLoaded,
    Loading,
    Saving,
    Ready,
}

/// Failure of a persistence job. Cloneable so every waiter on a coalesced
/// load observes the same error.
#[derive(Clone, Debug, Error)]
#[error("transposition table persistence failed: {message}")]
pub struct PersistenceError {
    message: Arc<str>,
}

impl PersistenceError {
    pub(crate) fn new(message: impl Into<String>) -> PersistenceError {
        PersistenceError {
            message: message.into().into(),
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> PersistenceError {
        PersistenceError::new(err.to_string())
    }
}

struct HandleState {
    result: Mutex<Option<Result<(), PersistenceError>>>,
    done: Condvar,
}

/// Completion handle for an asynchronous load or save. Clones share one
/// underlying future; concurrent loads coalesce onto the same handle.
#[derive(Clone)]
pub struct PersistenceHandle {
    state: Arc<HandleState>,
}

impl PersistenceHandle {
    pub(crate) fn pending() -> PersistenceHandle {
        PersistenceHandle {
            state: Arc::new(HandleState {
                result: Mutex::new(None),
                done: Condvar::new(),
            }),
        }
    }

    pub(crate) fn completed() -> PersistenceHandle {
        let handle = PersistenceHandle::pending();
        handle.complete(Ok(()));
        handle
    }

    pub(crate) fn complete(&self, result: Result<(), PersistenceError>) {
        let mut slot = self.state.result.lock();
        if slot.is_none() {
            *slot = Some(result);
            self.state.done.notify_all();
        }
    }

    /// Blocks until the job finishes and returns its outcome.
    pub fn wait(&self) -> Result<(), PersistenceError> {
        let mut slot = self.state.result.lock();
        while slot.is_none() {
            self.state.done.wait(&mut slot);
        }
        slot.as_ref().expect("completed above").clone()
    }

    /// The outcome, if the job already finished.
    pub fn try_result(&self) -> Option<Result<(), PersistenceError>> {
        self.state.result.lock().clone()
    }

    /// Whether two handles share the same underlying job.
    pub fn same_as(&self, other: &PersistenceHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

#[derive(Clone, Copy)]
pub(crate) enum IoJobKind {
    Load,
    Save,
}

pub(crate) struct IoJob {
    pub(crate) kind: IoJobKind,
    pub(crate) handle: PersistenceHandle,
}

/// Default table location under the user's home directory.
pub(crate) fn default_storage_path() -> PathBuf {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".honeycomb").join(FILE_NAME)
}

/// IO worker loop. Exits when the owning table is dropped.
pub(crate) fn run_io_worker(table: Weak<TableInner>, jobs: Receiver<IoJob>) {
    for job in jobs.iter() {
        let Some(table) = table.upgrade() else {
            job.handle
                .complete(Err(PersistenceError::new("table was dropped")));
            break;
        };
        let running = match job.kind {
            IoJobKind::Load => PersistenceStatus::Loading,
            IoJobKind::Save => PersistenceStatus::Saving,
        };
        table.set_status(running);
        let result = match job.kind {
            IoJobKind::Load => load_into(&table),
            IoJobKind::Save => save_from(&table),
        };
        match &result {
            Ok(()) => table.set_status(PersistenceStatus::Ready),
            Err(err) => {
                warn!(
                    "transposition table persistence failed at {}: {err}",
                    table.storage_path().display()
                );
                table.set_status(PersistenceStatus::NotLoaded);
            }
        }
        if matches!(job.kind, IoJobKind::Load) {
            table.finish_load(&job.handle);
        }
        job.handle.complete(result);
    }
}

fn load_into(table: &TableInner) -> Result<(), PersistenceError> {
    let path = table.storage_path();
    let file = match fs::File::open(path) {
        Ok(file) => file,
        // A missing file is a valid empty table.
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let count = reader.read_i32::<LittleEndian>()?;
    if count < 0 {
        return Err(PersistenceError::new(format!(
            "corrupt table file: negative entry count {count}"
        )));
    }
    let expected_current = HEADER + count as u64 * RECORD_CURRENT;
    let expected_legacy = HEADER + count as u64 * RECORD_LEGACY;
    let has_best_move = file_size == expected_current;
    if !has_best_move && file_size != expected_legacy {
        warn!("unexpected transposition table size: {file_size} bytes");
    }

    table.clear_entries();
    for _ in 0..count {
        let key = reader.read_i64::<LittleEndian>()? as u64;
        let value = reader.read_i32::<LittleEndian>()?;
        let depth = reader.read_i32::<LittleEndian>()?;
        let ordinal = reader.read_i8()? as u8;
        let flag = TTFlag::from_ordinal(ordinal).ok_or_else(|| {
            PersistenceError::new(format!("corrupt table file: flag ordinal {ordinal}"))
        })?;
        let best_move = if has_best_move {
            reader.read_i32::<LittleEndian>()?
        } else {
            -1
        };
        table.insert_raw(key, TTEntry::new(value, depth, flag, best_move));
    }
    info!(
        "loaded {count} transposition entries from {}",
        path.display()
    );
    Ok(())
}

fn save_from(table: &TableInner) -> Result<(), PersistenceError> {
    let path = table.storage_path();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let entries = table.snapshot();

    // Write to a sibling temp file, then rename: readers never observe a
    // half-written table.
    let temp_path = temp_path_for(path);
    {
        let mut writer = BufWriter::new(fs::File::create(&temp_path)?);
        writer.write_i32::<LittleEndian>(entries.len() as i32)?;
        for (key, entry) in &entries {
            writer.write_i64::<LittleEndian>(*key as i64)?;
            writer.write_i32::<LittleEndian>(entry.value)?;
            writer.write_i32::<LittleEndian>(entry.depth)?;
            writer.write_i8(entry.flag.ordinal() as i8)?;
            writer.write_i32::<LittleEndian>(entry.best_move)?;
        }
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;
    info!(
        "saved {} transposition entries to {}",
        entries.len(),
        path.display()
    );
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}
