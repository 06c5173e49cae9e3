// ABOUTME: Durable state store: one JSON record file per address.
// ABOUTME: Commits are write-ahead, atomic renames durable before returning.

use crate::types::Address;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::StateError;
use super::lock::StateLock;
use super::record::StateRecord;

const RECORD_EXTENSION: &str = "json";

/// Store of last-applied state, one record file per address.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Handle to the store at the given directory. Nothing is created
    /// on disk until a transaction begins, so dry runs stay dry.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every persisted record. Empty on first run; a record that
    /// fails to parse is a hard error rather than silent data loss.
    pub fn load(&self) -> Result<BTreeMap<Address, StateRecord>, StateError> {
        let mut records = BTreeMap::new();

        if !self.dir.exists() {
            return Ok(records);
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| StateError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StateError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| StateError::io(&path, e))?;
            let record: StateRecord = serde_json::from_str(&content)
                .map_err(|source| StateError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            records.insert(record.address.clone(), record);
        }

        Ok(records)
    }

    /// Begin an exclusive apply transaction over this store.
    pub fn begin(&self, project: &str, force: bool) -> Result<Transaction, StateError> {
        fs::create_dir_all(&self.dir).map_err(|e| StateError::io(&self.dir, e))?;
        let lock = StateLock::acquire(&self.dir, project, force)?;
        let records = self.load()?;
        Ok(Transaction {
            dir: self.dir.clone(),
            records: Mutex::new(records),
            _lock: lock,
        })
    }

    fn record_path(dir: &Path, address: &Address) -> PathBuf {
        dir.join(format!("{address}.{RECORD_EXTENSION}"))
    }
}

/// Exclusive handle over the state for the duration of one apply.
///
/// Workers share the transaction behind an `Arc`; the record table is
/// lock-guarded, and the scheduler guarantees at most one worker per
/// address, so per-address writes never race.
#[derive(Debug)]
pub struct Transaction {
    dir: PathBuf,
    records: Mutex<BTreeMap<Address, StateRecord>>,
    _lock: StateLock,
}

impl Transaction {
    /// Snapshot of the current records, used by the planner.
    pub fn snapshot(&self) -> BTreeMap<Address, StateRecord> {
        self.records.lock().clone()
    }

    pub fn get(&self, address: &Address) -> Option<StateRecord> {
        self.records.lock().get(address).cloned()
    }

    /// Durably persist a record, then publish it to the in-memory table.
    ///
    /// The write goes to a temp file which is fsynced and renamed into
    /// place, so a crash leaves either the old record or the new one,
    /// never a torn file. The record is on disk before the next
    /// resource operation can begin.
    pub fn commit(&self, record: StateRecord) -> Result<(), StateError> {
        let path = StateStore::record_path(&self.dir, &record.address);
        let tmp = self.dir.join(format!(".{}.tmp", record.address));

        let json = serde_json::to_string_pretty(&record)
            .map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let mut file = File::create(&tmp).map_err(|e| StateError::io(&tmp, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| StateError::io(&tmp, e))?;
        file.sync_all().map_err(|e| StateError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StateError::io(&path, e))?;

        self.records.lock().insert(record.address.clone(), record);
        Ok(())
    }

    /// Remove a record after its resource has been destroyed.
    pub fn remove(&self, address: &Address) -> Result<(), StateError> {
        let path = StateStore::record_path(&self.dir, address);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StateError::io(&path, e)),
        }

        self.records.lock().remove(address);
        Ok(())
    }

    /// Finish the transaction, releasing the apply lock.
    pub fn finish(self) {
        // Lock releases on drop; records are already durable.
    }
}
