use super::record::{self, Record};
use super::FLAT_FILE_HANDLER;
use crate::errors::{DbaError, DbaResult, ErrorKind};
use crate::store::{DbaSessionProvider, OpenMode};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

struct LogState {
    /// Append handle, `None` for read-only or closed sessions.
    file: Option<File>,
    index: IndexMap<Vec<u8>, Vec<u8>>,
    cursor: Option<usize>,
    /// Records in the log that no longer describe a live pair.
    dead_records: usize,
}

/// Session on a single append-only log file.
///
/// The whole log is replayed into an insertion-ordered index on open. Writes
/// append a record and update the index; `optimize` rewrites the log with only
/// the live pairs once deletes have left dead records behind.
pub(crate) struct FlatFileSession {
    path: String,
    mode: OpenMode,
    state: Mutex<LogState>,
    closed: AtomicBool,
}

impl FlatFileSession {
    pub(crate) fn open(path: &str, mode: OpenMode) -> DbaResult<FlatFileSession> {
        Self::load(path, mode).map_err(|err| {
            log::error!("Failed to open flat-file store {}: {}", path, err);
            DbaError::new_with_cause(
                &format!("Failed to open flat-file store {}", path),
                ErrorKind::BackendOpenError,
                err,
            )
        })
    }

    fn load(path: &str, mode: OpenMode) -> DbaResult<FlatFileSession> {
        let file_path = Path::new(path);
        if mode.requires_existing() && !file_path.is_file() {
            return Err(DbaError::new(
                &format!("Store file {} does not exist", path),
                ErrorKind::FileNotFound,
            ));
        }

        if mode.truncates() {
            File::create(file_path)?;
        }

        let mut file = if mode.is_read_only() {
            OpenOptions::new().read(true).open(file_path)?
        } else {
            OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(file_path)?
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        let replay = record::replay(&buffer)?;
        if replay.torn_tail {
            log::warn!(
                "Ignoring incomplete record at offset {} of {}",
                replay.valid_len,
                path
            );
            // at most one partial frame follows valid_len
            if !mode.is_read_only() {
                file.set_len(replay.valid_len as u64)?;
            }
        }

        let total = replay.records.len();
        let mut index = IndexMap::new();
        for record in replay.records {
            match record {
                Record::Put { key, value } => {
                    index.insert(key, value);
                }
                Record::Delete { key } => {
                    index.shift_remove(&key);
                }
            }
        }
        let dead_records = total - index.len();

        log::debug!(
            "Opened flat-file store {} with mode {} ({} live, {} dead records)",
            path,
            mode,
            index.len(),
            dead_records
        );

        Ok(FlatFileSession {
            path: path.to_string(),
            mode,
            state: Mutex::new(LogState {
                file: if mode.is_read_only() { None } else { Some(file) },
                index,
                cursor: None,
                dead_records,
            }),
            closed: AtomicBool::new(false),
        })
    }

    fn check_opened(&self) -> DbaResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Flat-file store {} is closed", self.path);
            return Err(DbaError::new(
                &format!("Flat-file store {} is closed", self.path),
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn check_writable(&self) -> DbaResult<()> {
        self.check_opened()?;
        if self.mode.is_read_only() {
            log::error!("Flat-file store {} is opened read-only", self.path);
            return Err(DbaError::new(
                &format!("Flat-file store {} is opened read-only", self.path),
                ErrorKind::ReadOnlyStore,
            ));
        }
        Ok(())
    }

    fn append(&self, state: &mut LogState, record: &Record) -> DbaResult<()> {
        let frame = record.to_frame()?;
        let file = match state.file.as_mut() {
            Some(file) => file,
            None => {
                return Err(DbaError::new(
                    &format!("Flat-file store {} has no writable log", self.path),
                    ErrorKind::InternalError,
                ))
            }
        };

        file.write_all(&frame).map_err(|err| {
            log::error!("Failed to append to {}: {}", self.path, err);
            DbaError::new_with_cause(
                &format!("Failed to append to {}", self.path),
                ErrorKind::BackendOperationError,
                err.into(),
            )
        })
    }

    fn compact(&self, state: &mut LogState) -> DbaResult<()> {
        let compact_path = format!("{}.compact", self.path);

        let mut buffer = Vec::new();
        for (key, value) in &state.index {
            let record = Record::Put {
                key: key.clone(),
                value: value.clone(),
            };
            buffer.extend(record.to_frame()?);
        }

        let mut compact = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&compact_path)?;
        compact.write_all(&buffer)?;
        compact.sync_all()?;
        drop(compact);

        if let Err(err) = fs::rename(&compact_path, &self.path) {
            let _ = fs::remove_file(&compact_path);
            return Err(err.into());
        }

        state.file = Some(OpenOptions::new().read(true).append(true).open(&self.path)?);
        log::debug!(
            "Compacted {} and dropped {} dead records",
            self.path,
            state.dead_records
        );
        state.dead_records = 0;
        Ok(())
    }
}

impl DbaSessionProvider for FlatFileSession {
    fn fetch(&self, key: &[u8]) -> DbaResult<Option<Vec<u8>>> {
        self.check_opened()?;
        Ok(self.state.lock().index.get(key).cloned())
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> DbaResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if state.index.contains_key(key) {
            return Ok(false);
        }

        let record = Record::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        self.append(&mut state, &record)?;
        state.index.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn delete(&self, key: &[u8]) -> DbaResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if !state.index.contains_key(key) {
            return Err(DbaError::new(
                &format!("Key not found in {}", self.path),
                ErrorKind::KeyNotFound,
            ));
        }

        let record = Record::Delete { key: key.to_vec() };
        self.append(&mut state, &record)?;
        state.index.shift_remove(key);
        // the put and its tombstone
        state.dead_records += 2;
        Ok(true)
    }

    fn exists(&self, key: &[u8]) -> DbaResult<bool> {
        self.check_opened()?;
        Ok(self.state.lock().index.contains_key(key))
    }

    fn first_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.check_opened()?;
        let mut state = self.state.lock();
        let first = state.index.get_index(0).map(|(key, _)| key.clone());
        state.cursor = first.as_ref().map(|_| 0);
        Ok(first)
    }

    fn next_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.check_opened()?;
        let mut state = self.state.lock();
        let next = match state.cursor {
            Some(position) => position + 1,
            None => return Ok(None),
        };

        match state.index.get_index(next).map(|(key, _)| key.clone()) {
            Some(key) => {
                state.cursor = Some(next);
                Ok(Some(key))
            }
            None => {
                state.cursor = Some(state.index.len());
                Ok(None)
            }
        }
    }

    fn optimize(&self) -> DbaResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if state.dead_records == 0 {
            return Ok(true);
        }

        self.compact(&mut state).map_err(|err| {
            log::error!("Failed to compact {}: {}", self.path, err);
            DbaError::new_with_cause(
                &format!("Failed to compact {}", self.path),
                ErrorKind::BackendOperationError,
                err,
            )
        })?;
        Ok(true)
    }

    fn sync(&self) -> DbaResult<bool> {
        self.check_opened()?;
        let state = self.state.lock();
        if let Some(file) = state.file.as_ref() {
            file.sync_all().map_err(|err| {
                log::error!("Failed to sync {}: {}", self.path, err);
                DbaError::new_with_cause(
                    &format!("Failed to sync {}", self.path),
                    ErrorKind::BackendOperationError,
                    err.into(),
                )
            })?;
        }
        Ok(true)
    }

    fn close(&self) -> DbaResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.file = None;
        state.cursor = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn handler_name(&self) -> &str {
        FLAT_FILE_HANDLER
    }
}
