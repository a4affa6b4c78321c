use crate::config::FjallConfig;
use crate::error::to_dba_error;
use crate::handler::FJALL_HANDLER;
use fjall::{GarbageCollection, Keyspace, PartitionHandle, PersistMode};
use parking_lot::{Mutex, RwLock};
use simple_dba::errors::{DbaError, DbaResult, ErrorKind};
use simple_dba::store::{DbaSessionProvider, OpenMode};
use std::collections::Bound::{Excluded, Unbounded};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Name of the partition holding the pairs of a store.
pub(crate) const DATA_PARTITION: &str = "dba";

enum Cursor {
    Unprimed,
    At(Vec<u8>),
    Exhausted,
}

struct OpenKeyspace {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

/// Session on a fjall keyspace rooted at the store's full path.
///
/// Pairs live in a single partition, so iteration follows byte order of the
/// keys. The cursor remembers the last key returned and resumes after it.
pub(crate) struct FjallSession {
    path: String,
    mode: OpenMode,
    config: FjallConfig,
    state: RwLock<Option<OpenKeyspace>>,
    cursor: Mutex<Cursor>,
}

impl FjallSession {
    pub(crate) fn open(path: &str, mode: OpenMode, config: FjallConfig) -> DbaResult<FjallSession> {
        Self::open_keyspace(path, mode, &config)
            .map(|open| FjallSession {
                path: path.to_string(),
                mode,
                config,
                state: RwLock::new(Some(open)),
                cursor: Mutex::new(Cursor::Unprimed),
            })
            .map_err(|err| {
                log::error!("Failed to open fjall store {}: {}", path, err);
                DbaError::new_with_cause(
                    &format!("Failed to open fjall store {}", path),
                    ErrorKind::BackendOpenError,
                    err,
                )
            })
    }

    fn open_keyspace(path: &str, mode: OpenMode, config: &FjallConfig) -> DbaResult<OpenKeyspace> {
        let root = Path::new(path);
        if mode.requires_existing() && !root.is_dir() {
            return Err(DbaError::new(
                &format!("Keyspace {} does not exist", path),
                ErrorKind::FileNotFound,
            ));
        }

        if mode.truncates() {
            remove_existing(root)?;
        }

        let keyspace = Keyspace::open(config.keyspace_config(root)).map_err(to_dba_error)?;
        let partition = keyspace
            .open_partition(DATA_PARTITION, config.partition_config())
            .map_err(to_dba_error)?;

        log::debug!("Opened fjall store {} with mode {}", path, mode);
        Ok(OpenKeyspace {
            keyspace,
            partition,
        })
    }

    fn check_writable(&self) -> DbaResult<()> {
        if self.mode.is_read_only() {
            log::error!("Fjall store {} is opened read-only", self.path);
            return Err(DbaError::new(
                &format!("Fjall store {} is opened read-only", self.path),
                ErrorKind::ReadOnlyStore,
            ));
        }
        Ok(())
    }

    fn with_open<R>(&self, op: impl FnOnce(&OpenKeyspace) -> DbaResult<R>) -> DbaResult<R> {
        let state = self.state.read();
        match state.as_ref() {
            Some(open) => op(open),
            None => {
                log::error!("Fjall store {} is closed", self.path);
                Err(DbaError::new(
                    &format!("Fjall store {} is closed", self.path),
                    ErrorKind::StoreAlreadyClosed,
                ))
            }
        }
    }

    fn failed(&self, action: &str, err: fjall::Error) -> DbaError {
        log::error!("Failed to {} in {}: {}", action, self.path, err);
        DbaError::new_with_cause(
            &format!("Failed to {} in {}", action, self.path),
            ErrorKind::BackendOperationError,
            to_dba_error(err),
        )
    }

    fn collect_garbage(&self, partition: &PartitionHandle) -> Result<(), fjall::Error> {
        partition.gc_scan()?;
        partition.gc_with_space_amp_target(self.config.space_amp_factor())?;
        partition.gc_with_staleness_threshold(self.config.staleness_threshold())?;
        Ok(())
    }
}

/// Clears whatever occupies `root` so a fresh keyspace can be created there.
fn remove_existing(root: &Path) -> DbaResult<()> {
    if root.is_dir() {
        // background workers of a just-closed keyspace may still hold files
        let mut retry = 0;
        while let Err(err) = fs::remove_dir_all(root) {
            if retry >= 2 {
                return Err(err.into());
            }
            thread::sleep(Duration::from_millis(100));
            retry += 1;
        }
    } else if root.exists() {
        fs::remove_file(root)?;
    }
    Ok(())
}

impl DbaSessionProvider for FjallSession {
    fn fetch(&self, key: &[u8]) -> DbaResult<Option<Vec<u8>>> {
        self.with_open(|open| match open.partition.get(key) {
            Ok(value) => Ok(value.map(|v| v.to_vec())),
            Err(err) => Err(self.failed("fetch key", err)),
        })
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> DbaResult<bool> {
        self.check_writable()?;
        self.with_open(|open| {
            match open.partition.get(key) {
                Ok(Some(_)) => return Ok(false),
                Ok(None) => {}
                Err(err) => return Err(self.failed("look up key", err)),
            }

            open.partition
                .insert(key, value)
                .map_err(|err| self.failed("insert key", err))?;
            Ok(true)
        })
    }

    fn delete(&self, key: &[u8]) -> DbaResult<bool> {
        self.check_writable()?;
        self.with_open(|open| {
            match open.partition.contains_key(key) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(err) => return Err(self.failed("look up key", err)),
            }

            open.partition
                .remove(key)
                .map_err(|err| self.failed("delete key", err))?;
            Ok(true)
        })
    }

    fn exists(&self, key: &[u8]) -> DbaResult<bool> {
        self.with_open(|open| {
            open.partition
                .contains_key(key)
                .map_err(|err| self.failed("look up key", err))
        })
    }

    fn first_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.with_open(|open| {
            let first = open
                .partition
                .first_key_value()
                .map_err(|err| self.failed("read first key", err))?
                .map(|(key, _)| key.to_vec());

            *self.cursor.lock() = match &first {
                Some(key) => Cursor::At(key.clone()),
                None => Cursor::Exhausted,
            };
            Ok(first)
        })
    }

    fn next_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.with_open(|open| {
            let mut cursor = self.cursor.lock();
            let last = match &*cursor {
                Cursor::At(key) => key.clone(),
                Cursor::Unprimed | Cursor::Exhausted => return Ok(None),
            };

            let next = match open.partition.range((Excluded(last), Unbounded)).next() {
                Some(Ok((key, _))) => Some(key.to_vec()),
                Some(Err(err)) => return Err(self.failed("read next key", err)),
                None => None,
            };

            *cursor = match &next {
                Some(key) => Cursor::At(key.clone()),
                None => Cursor::Exhausted,
            };
            Ok(next)
        })
    }

    fn optimize(&self) -> DbaResult<bool> {
        self.check_writable()?;
        self.with_open(|open| {
            if !self.config.kv_separated() {
                return Ok(true);
            }
            self.collect_garbage(&open.partition)
                .map_err(|err| self.failed("collect garbage", err))?;
            Ok(true)
        })
    }

    fn sync(&self) -> DbaResult<bool> {
        self.with_open(|open| {
            open.keyspace
                .persist(PersistMode::SyncAll)
                .map_err(|err| self.failed("persist journal", err))?;
            Ok(true)
        })
    }

    fn close(&self) -> DbaResult<()> {
        let open = match self.state.write().take() {
            Some(open) => open,
            None => return Ok(()),
        };
        *self.cursor.lock() = Cursor::Unprimed;

        if self.config.commit_before_close() && !self.mode.is_read_only() {
            if let Err(err) = open.keyspace.persist(PersistMode::SyncAll) {
                return Err(self.failed("persist journal on close", err));
            }
        }
        log::debug!("Closed fjall store {}", self.path);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.read().is_none()
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn handler_name(&self) -> &str {
        FJALL_HANDLER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{run_test, Context};

    fn open(ctx: &Context, mode: OpenMode) -> FjallSession {
        FjallSession::open(&ctx.path(), mode, FjallConfig::new()).unwrap()
    }

    #[test]
    fn test_insert_fetch_exists() {
        run_test(
            Context::new,
            |ctx| {
                let session = open(&ctx, OpenMode::Create);
                assert!(session.insert(b"123", b"hello world").unwrap());
                assert!(!session.insert(b"123", b"other").unwrap());
                assert_eq!(
                    session.fetch(b"123").unwrap(),
                    Some(b"hello world".to_vec())
                );
                assert!(session.exists(b"123").unwrap());
                assert_eq!(session.fetch(b"456").unwrap(), None);
                assert!(!session.exists(b"456").unwrap());
            },
            |_| {},
        )
    }

    #[test]
    fn test_delete_missing_key_returns_false() {
        run_test(
            Context::new,
            |ctx| {
                let session = open(&ctx, OpenMode::Create);
                assert!(!session.delete(b"missing").unwrap());
                session.insert(b"k", b"v").unwrap();
                assert!(session.delete(b"k").unwrap());
                assert!(!session.delete(b"k").unwrap());
            },
            |_| {},
        )
    }

    #[test]
    fn test_keys_iterate_in_byte_order() {
        run_test(
            Context::new,
            |ctx| {
                let session = open(&ctx, OpenMode::Create);
                assert_eq!(session.next_key().unwrap(), None);
                assert_eq!(session.first_key().unwrap(), None);
                assert_eq!(session.next_key().unwrap(), None);

                session.insert(b"b", b"2").unwrap();
                session.insert(b"c", b"3").unwrap();
                session.insert(b"a", b"1").unwrap();

                assert_eq!(session.first_key().unwrap(), Some(b"a".to_vec()));
                assert_eq!(session.next_key().unwrap(), Some(b"b".to_vec()));
                assert_eq!(session.next_key().unwrap(), Some(b"c".to_vec()));
                assert_eq!(session.next_key().unwrap(), None);
                assert_eq!(session.next_key().unwrap(), None);
            },
            |_| {},
        )
    }

    #[test]
    fn test_reopen_and_truncate() {
        run_test(
            Context::new,
            |ctx| {
                let session = open(&ctx, OpenMode::Create);
                session.insert(b"k", b"v").unwrap();
                assert!(session.sync().unwrap());
                session.close().unwrap();
                drop(session);

                let session = open(&ctx, OpenMode::ReadWrite);
                assert_eq!(session.fetch(b"k").unwrap(), Some(b"v".to_vec()));
                session.close().unwrap();
                drop(session);

                let session = open(&ctx, OpenMode::Create);
                assert_eq!(session.fetch(b"k").unwrap(), None);
            },
            |_| {},
        )
    }

    #[test]
    fn test_existing_modes_require_keyspace() {
        run_test(
            Context::new,
            |ctx| {
                for mode in [OpenMode::ReadOnly, OpenMode::ReadWrite] {
                    let err = FjallSession::open(&ctx.path(), mode, FjallConfig::new())
                        .err()
                        .unwrap();
                    assert_eq!(err.kind(), &ErrorKind::BackendOpenError);
                    assert!(err.is_kind(&ErrorKind::FileNotFound));
                }
            },
            |_| {},
        )
    }

    #[test]
    fn test_read_only_rejects_writes() {
        run_test(
            Context::new,
            |ctx| {
                let session = open(&ctx, OpenMode::Create);
                session.insert(b"k", b"v").unwrap();
                session.close().unwrap();
                drop(session);

                let session = open(&ctx, OpenMode::ReadOnly);
                assert_eq!(session.fetch(b"k").unwrap(), Some(b"v".to_vec()));
                assert_eq!(
                    session.insert(b"x", b"y").unwrap_err().kind(),
                    &ErrorKind::ReadOnlyStore
                );
                assert_eq!(
                    session.delete(b"k").unwrap_err().kind(),
                    &ErrorKind::ReadOnlyStore
                );
            },
            |_| {},
        )
    }

    #[test]
    fn test_optimize_with_kv_separation() {
        run_test(
            Context::new,
            |ctx| {
                let config = FjallConfig::new();
                config.set_kv_separated(true);
                let session = FjallSession::open(&ctx.path(), OpenMode::Create, config).unwrap();

                let value = vec![7u8; 8 * 1024];
                for i in 0..16u8 {
                    session.insert(&[i], &value).unwrap();
                }
                for i in 0..8u8 {
                    session.delete(&[i]).unwrap();
                }
                assert!(session.optimize().unwrap());
                assert_eq!(session.fetch(&[9]).unwrap(), Some(value));
            },
            |_| {},
        )
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        run_test(
            Context::new,
            |ctx| {
                let session = open(&ctx, OpenMode::Create);
                session.close().unwrap();
                session.close().unwrap();
                assert!(session.is_closed());
                assert_eq!(
                    session.fetch(b"k").unwrap_err().kind(),
                    &ErrorKind::StoreAlreadyClosed
                );
                assert_eq!(
                    session.first_key().unwrap_err().kind(),
                    &ErrorKind::StoreAlreadyClosed
                );
            },
            |_| {},
        )
    }
}
