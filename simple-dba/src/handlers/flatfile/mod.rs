//! Single-file handler built on an append-only record log.
//!
//! Every insert and delete appends a length-prefixed record to the file at the
//! store's full path:
//!
//! ```text
//! +--------------+-----------------+------------------+---------------------------+
//! | len: u32 LE  | crc32(len) LE   | crc32(payload) LE| bincode Record::Put/Delete |
//! +--------------+-----------------+------------------+---------------------------+
//! ```
//!
//! The log is replayed on open. An interrupted append leaves at most one
//! incomplete frame at the end; it is dropped with a warning. A header or
//! payload that fails its checksum, or a payload that does not decode, fails
//! the open as `FileCorrupted` and leaves the file untouched.

mod record;
mod session;

use crate::errors::DbaResult;
use crate::store::{DbaHandlerProvider, DbaSession, OpenMode, SessionPool};
use std::str::FromStr;
pub use record::RecordError;
use session::FlatFileSession;

pub const FLAT_FILE_HANDLER: &str = "flatfile";

/// Handler storing each store as one append-only file.
///
/// Deleting a missing key is reported as `KeyNotFound`, which the facade folds
/// into `false`.
pub struct FlatFileHandler {
    pool: SessionPool,
}

impl FlatFileHandler {
    pub fn new() -> FlatFileHandler {
        FlatFileHandler {
            pool: SessionPool::new(),
        }
    }
}

impl Default for FlatFileHandler {
    fn default() -> Self {
        FlatFileHandler::new()
    }
}

impl DbaHandlerProvider for FlatFileHandler {
    fn name(&self) -> &str {
        FLAT_FILE_HANDLER
    }

    fn version(&self) -> DbaResult<String> {
        Ok(format!("FlatFile/{}", env!("CARGO_PKG_VERSION")))
    }

    fn open(&self, path: &str, mode: &str) -> DbaResult<DbaSession> {
        let mode = OpenMode::from_str(mode)?;
        FlatFileSession::open(path, mode).map(DbaSession::new)
    }

    fn session_pool(&self) -> &SessionPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_identity() {
        let handler = FlatFileHandler::new();
        assert_eq!(handler.name(), "flatfile");
        assert!(handler.aliases().is_empty());
        assert!(handler.version().unwrap().starts_with("FlatFile/"));
    }

    #[test]
    fn test_open_returns_session_for_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat").to_string_lossy().to_string();
        let handler = FlatFileHandler::new();

        let session = handler.open(&path, "n").unwrap();
        assert_eq!(session.path(), path);
        assert_eq!(session.handler_name(), FLAT_FILE_HANDLER);
        assert_eq!(session.mode(), OpenMode::Create);
        assert!(!session.is_persistent());
    }

    #[test]
    fn test_persistent_session_survives_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat").to_string_lossy().to_string();
        let handler = FlatFileHandler::new();

        let session = handler.open_persistent(&path, "n").unwrap();
        session.insert(b"k", b"v").unwrap();
        session.release().unwrap();

        let again = handler
            .open_persistent(&path, "c")
            .unwrap();
        assert!(again.same_session(&session));
        assert_eq!(again.fetch(b"k").unwrap(), Some(b"v".to_vec()));

        handler.close_persistent().unwrap();
        assert!(again.is_closed());
    }
}
