use crate::errors::{DbaError, DbaResult, ErrorKind};
use crate::store::{DbaHandlerProvider, DbaSession, DbaSessionProvider, OpenMode, SessionPool};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::str::FromStr;

pub const IN_MEMORY_HANDLER: &str = "inmemory";

type Table = Arc<RwLock<IndexMap<Vec<u8>, Vec<u8>>>>;

/// Process-local handler keeping one table per full path.
///
/// # Purpose
/// `InMemoryHandler` backs stores with insertion-ordered in-memory tables. A
/// table outlives the sessions opened on it, so close and reopen behave like a
/// persistent store for as long as the handler instance lives.
///
/// # Characteristics
/// - **No Persistence**: data is lost with the handler
/// - **Ordered**: keys iterate in first-insertion order
/// - **Compaction-free**: `optimize` and `sync` are no-ops that succeed
pub struct InMemoryHandler {
    tables: DashMap<String, Table>,
    pool: SessionPool,
}

impl InMemoryHandler {
    pub fn new() -> InMemoryHandler {
        InMemoryHandler {
            tables: DashMap::new(),
            pool: SessionPool::new(),
        }
    }

    fn table(&self, path: &str, mode: OpenMode) -> DbaResult<Table> {
        if mode.requires_existing() {
            return match self.tables.get(path) {
                Some(table) => Ok(table.clone()),
                None => {
                    log::error!("No in-memory store exists at {}", path);
                    Err(DbaError::new(
                        &format!("No in-memory store exists at {}", path),
                        ErrorKind::BackendOpenError,
                    ))
                }
            };
        }

        let table = self
            .tables
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(IndexMap::new())))
            .clone();

        if mode.truncates() {
            table.write().clear();
        }
        Ok(table)
    }
}

impl Default for InMemoryHandler {
    fn default() -> Self {
        InMemoryHandler::new()
    }
}

impl DbaHandlerProvider for InMemoryHandler {
    fn name(&self) -> &str {
        IN_MEMORY_HANDLER
    }

    fn version(&self) -> DbaResult<String> {
        Ok(format!("InMemory/{}", env!("CARGO_PKG_VERSION")))
    }

    fn open(&self, path: &str, mode: &str) -> DbaResult<DbaSession> {
        let mode = OpenMode::from_str(mode)?;
        let table = self.table(path, mode)?;
        log::debug!("Opened in-memory store at {} with mode {}", path, mode);
        Ok(DbaSession::new(InMemorySession {
            path: path.to_string(),
            mode,
            table,
            cursor: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }

    fn session_pool(&self) -> &SessionPool {
        &self.pool
    }
}

struct InMemorySession {
    path: String,
    mode: OpenMode,
    table: Table,
    cursor: Mutex<Option<usize>>,
    closed: AtomicBool,
}

impl InMemorySession {
    fn check_opened(&self) -> DbaResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store {} is closed", self.path);
            return Err(DbaError::new(
                &format!("In-memory store {} is closed", self.path),
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn check_writable(&self) -> DbaResult<()> {
        self.check_opened()?;
        if self.mode.is_read_only() {
            log::error!("In-memory store {} is opened read-only", self.path);
            return Err(DbaError::new(
                &format!("In-memory store {} is opened read-only", self.path),
                ErrorKind::ReadOnlyStore,
            ));
        }
        Ok(())
    }
}

impl DbaSessionProvider for InMemorySession {
    fn fetch(&self, key: &[u8]) -> DbaResult<Option<Vec<u8>>> {
        self.check_opened()?;
        Ok(self.table.read().get(key).cloned())
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> DbaResult<bool> {
        self.check_writable()?;
        let mut table = self.table.write();
        if table.contains_key(key) {
            return Ok(false);
        }
        table.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn delete(&self, key: &[u8]) -> DbaResult<bool> {
        self.check_writable()?;
        Ok(self.table.write().shift_remove(key).is_some())
    }

    fn exists(&self, key: &[u8]) -> DbaResult<bool> {
        self.check_opened()?;
        Ok(self.table.read().contains_key(key))
    }

    fn first_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.check_opened()?;
        let table = self.table.read();
        let mut cursor = self.cursor.lock();
        match table.get_index(0) {
            Some((key, _)) => {
                *cursor = Some(0);
                Ok(Some(key.clone()))
            }
            None => {
                *cursor = None;
                Ok(None)
            }
        }
    }

    fn next_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.check_opened()?;
        let table = self.table.read();
        let mut cursor = self.cursor.lock();
        let next = match *cursor {
            Some(position) => position + 1,
            None => return Ok(None),
        };

        match table.get_index(next) {
            Some((key, _)) => {
                *cursor = Some(next);
                Ok(Some(key.clone()))
            }
            None => {
                *cursor = Some(table.len());
                Ok(None)
            }
        }
    }

    fn optimize(&self) -> DbaResult<bool> {
        self.check_writable()?;
        Ok(true)
    }

    fn sync(&self) -> DbaResult<bool> {
        self.check_opened()?;
        Ok(true)
    }

    fn close(&self) -> DbaResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        *self.cursor.lock() = None;
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
        IN_MEMORY_HANDLER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(handler: &InMemoryHandler, mode: &str) -> DbaSession {
        handler.open("/mem/store", mode).unwrap()
    }

    #[test]
    fn test_insert_does_not_overwrite() {
        let handler = InMemoryHandler::new();
        let session = open(&handler, "n");
        assert!(session.insert(b"k", b"v1").unwrap());
        assert!(!session.insert(b"k", b"v2").unwrap());
        assert_eq!(session.fetch(b"k").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn test_delete_missing_key_returns_false() {
        let handler = InMemoryHandler::new();
        let session = open(&handler, "n");
        assert!(!session.delete(b"missing").unwrap());
        session.insert(b"k", b"v").unwrap();
        assert!(session.delete(b"k").unwrap());
        assert!(!session.delete(b"k").unwrap());
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let handler = InMemoryHandler::new();
        let session = open(&handler, "n");
        assert_eq!(session.next_key().unwrap(), None);
        assert_eq!(session.first_key().unwrap(), None);

        session.insert(b"b", b"1").unwrap();
        session.insert(b"a", b"2").unwrap();
        session.insert(b"c", b"3").unwrap();

        assert_eq!(session.first_key().unwrap(), Some(b"b".to_vec()));
        assert_eq!(session.next_key().unwrap(), Some(b"a".to_vec()));
        assert_eq!(session.next_key().unwrap(), Some(b"c".to_vec()));
        assert_eq!(session.next_key().unwrap(), None);
        assert_eq!(session.next_key().unwrap(), None);
        assert_eq!(session.first_key().unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_data_survives_reopen() {
        let handler = InMemoryHandler::new();
        let session = open(&handler, "n");
        session.insert(b"123", b"hello world").unwrap();
        session.close().unwrap();

        let session = open(&handler, "c");
        assert_eq!(session.fetch(b"123").unwrap(), Some(b"hello world".to_vec()));

        let session = open(&handler, "n");
        assert_eq!(session.fetch(b"123").unwrap(), None);
    }

    #[test]
    fn test_existing_modes_require_table() {
        let handler = InMemoryHandler::new();
        let err = handler.open("/mem/none", "w").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::BackendOpenError);
        let err = handler.open("/mem/none", "r").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::BackendOpenError);
    }

    #[test]
    fn test_read_only_session_rejects_writes() {
        let handler = InMemoryHandler::new();
        open(&handler, "n").insert(b"k", b"v").unwrap();

        let session = open(&handler, "r");
        assert_eq!(session.fetch(b"k").unwrap(), Some(b"v".to_vec()));
        let err = session.insert(b"x", b"y").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ReadOnlyStore);
        let err = session.delete(b"k").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ReadOnlyStore);
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let handler = InMemoryHandler::new();
        let session = open(&handler, "n");
        session.close().unwrap();
        assert!(session.is_closed());
        let err = session.fetch(b"k").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
    }

    #[test]
    fn test_open_persistent_reuses_session() {
        let handler = InMemoryHandler::new();
        let first = handler.open_persistent("/mem/p", "n").unwrap();
        let second = handler.open_persistent("/mem/p", "n").unwrap();
        assert!(first.same_session(&second));
        assert!(first.is_persistent());

        first.release().unwrap();
        assert!(!second.is_closed());

        handler.close_persistent().unwrap();
        assert!(second.is_closed());
        let third = handler.open_persistent("/mem/p", "c").unwrap();
        assert!(!third.same_session(&second));
    }
}
