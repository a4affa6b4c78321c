//! The store facade.

use crate::dba_builder::DbaBuilder;
use crate::dba_config::DbaConfig;
use crate::errors::{DbaError, DbaResult, ErrorKind};
use crate::path::ensure_path_ready;
use crate::store::DbaSession;
use std::path::Path;

/// A key-value store bound to one directory, one store name and one handler.
///
/// `Dba` provisions its base directory, opens a session through the bound
/// handler and forwards key-value operations to it. It adds three behaviours
/// on top of the handler primitives:
///
/// - `delete` folds a handler's "key not found" error into `false`
/// - `insert` and `delete` run `optimise` after the write (configurable)
/// - `replace` is emulated as delete-then-insert and is not atomic
///
/// The facade owns its session exclusively. It is released by `close`, by a
/// later `open`, or when the facade is dropped.
///
/// # Examples
///
/// ```rust
/// use simple_dba::Dba;
///
/// # fn main() -> simple_dba::errors::DbaResult<()> {
/// let base = std::env::temp_dir().join("simple_dba_doc_example");
/// let mut dba = Dba::new(&base.to_string_lossy(), "mystore", "flatfile");
/// dba.open("c")?;
/// dba.replace("123", "hello world")?;
/// assert_eq!(dba.fetch_string("123")?, Some("hello world".to_string()));
/// dba.close()?;
/// # std::fs::remove_dir_all(base).ok();
/// # Ok(())
/// # }
/// ```
pub struct Dba {
    path: String,
    store_name: String,
    full_path: String,
    handler_name: String,
    mode: Option<String>,
    session: Option<DbaSession>,
    config: DbaConfig,
}

impl Dba {
    /// Creates a closed facade using the default configuration. No IO happens
    /// until `open`.
    pub fn new(path: &str, store_name: &str, handler_name: &str) -> Dba {
        Dba::with_config(path, store_name, handler_name, DbaConfig::new())
    }

    /// Creates a closed facade using `config`.
    pub fn with_config(path: &str, store_name: &str, handler_name: &str, config: DbaConfig) -> Dba {
        Dba {
            path: path.to_string(),
            store_name: store_name.to_string(),
            full_path: full_path(path, store_name),
            handler_name: handler_name.to_string(),
            mode: None,
            session: None,
            config,
        }
    }

    pub fn builder() -> DbaBuilder {
        DbaBuilder::new()
    }

    /// Base directory of the store.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Base directory joined with the store name; the location handlers open.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    /// Mode of the last open, `None` before the first one.
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn session(&self) -> Option<&DbaSession> {
        self.session.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> &DbaConfig {
        &self.config
    }

    /// Changes the base directory. Takes effect on the next open.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` while a session is open.
    pub fn set_path(&mut self, path: &str) -> DbaResult<()> {
        self.ensure_closed("path")?;
        self.path = path.to_string();
        self.full_path = full_path(&self.path, &self.store_name);
        Ok(())
    }

    /// Changes the store name. Takes effect on the next open.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` while a session is open.
    pub fn set_store_name(&mut self, store_name: &str) -> DbaResult<()> {
        self.ensure_closed("store name")?;
        self.store_name = store_name.to_string();
        self.full_path = full_path(&self.path, &self.store_name);
        Ok(())
    }

    /// Provisions the base directory, see [`ensure_path_ready`].
    pub fn ensure_path_ready(&self) -> DbaResult<bool> {
        ensure_path_ready(&self.path, self.config.dir_permissions())
    }

    /// Opens the store with `mode`, passed verbatim to the handler.
    ///
    /// A session held from an earlier open is released first.
    ///
    /// # Errors
    ///
    /// `PathProvisioningError` when the base directory cannot be provisioned,
    /// `BackendOpenError` for everything else (unknown handler, invalid mode,
    /// missing or corrupt store). The underlying failure is kept as the cause.
    pub fn open(&mut self, mode: &str) -> DbaResult<&DbaSession> {
        self.open_session(mode, false)
    }

    /// Opens the store with the configured default mode (`n` unless changed).
    pub fn open_default(&mut self) -> DbaResult<&DbaSession> {
        let mode = self.config.default_mode();
        self.open_session(&mode, false)
    }

    /// Opens a session the handler keeps for reuse.
    ///
    /// Later persistent opens of the same full path through the same handler
    /// get the same session back. Closing the facade only detaches it.
    pub fn open_persistent(&mut self, mode: &str) -> DbaResult<&DbaSession> {
        self.open_session(mode, true)
    }

    /// Releases the session. Closing a closed facade is a no-op.
    ///
    /// The facade is closed afterwards even when the release reports an error.
    pub fn close(&mut self) -> DbaResult<()> {
        self.release_session().map_err(|err| {
            log::error!("Failed to close store {}: {}", self.full_path, err);
            err
        })
    }

    pub fn exists<K: AsRef<[u8]>>(&self, key: K) -> DbaResult<bool> {
        self.current_session()?.exists(key.as_ref())
    }

    /// Value stored under `key`; a missing key is `Ok(None)`.
    pub fn fetch<K: AsRef<[u8]>>(&self, key: K) -> DbaResult<Option<Vec<u8>>> {
        self.current_session()?.fetch(key.as_ref())
    }

    /// `fetch` decoded as UTF-8.
    pub fn fetch_string<K: AsRef<[u8]>>(&self, key: K) -> DbaResult<Option<String>> {
        match self.fetch(key)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts `value` under `key` unless the key is present. Never overwrites.
    ///
    /// `optimise` runs afterwards whatever the outcome of the insert, unless
    /// disabled in the config. Its failure is logged and does not change the
    /// result.
    pub fn insert<K: AsRef<[u8]>, V: AsRef<[u8]>>(&self, key: K, value: V) -> DbaResult<bool> {
        let session = self.current_session()?;
        let result = session.insert(key.as_ref(), value.as_ref());
        self.optimise_after_write(session);
        result
    }

    /// Removes `key`. Returns `false` when there was nothing to remove, also
    /// for handlers that report a missing key as an error.
    pub fn delete<K: AsRef<[u8]>>(&self, key: K) -> DbaResult<bool> {
        let session = self.current_session()?;
        let result = match session.delete(key.as_ref()) {
            Err(err) if err.is_kind(&ErrorKind::KeyNotFound) => {
                log::debug!("Delete of a missing key in {}", self.full_path);
                Ok(false)
            }
            other => other,
        };
        self.optimise_after_write(session);
        result
    }

    /// Stores `value` under `key`, removing any previous value first.
    ///
    /// Not atomic: the key is absent between the delete and the insert.
    pub fn replace<K: AsRef<[u8]>, V: AsRef<[u8]>>(&self, key: K, value: V) -> DbaResult<bool> {
        let key = key.as_ref();
        if self.exists(key)? {
            self.delete(key)?;
        }
        self.insert(key, value)
    }

    /// Resets the handler's cursor and returns the first key.
    pub fn first_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.current_session()?.first_key()
    }

    /// Advances the handler's cursor. `None` when exhausted or never primed.
    pub fn next_key(&self) -> DbaResult<Option<Vec<u8>>> {
        self.current_session()?.next_key()
    }

    /// All keys in handler order, walked with `first_key` / `next_key`.
    pub fn keys(&self) -> DbaResult<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        let mut next = self.first_key()?;
        while let Some(key) = next {
            keys.push(key);
            next = self.next_key()?;
        }
        Ok(keys)
    }

    /// Runs the handler's compaction.
    pub fn optimise(&self) -> DbaResult<bool> {
        self.current_session()?.optimize()
    }

    /// Flushes the store to durable storage.
    pub fn sync(&self) -> DbaResult<bool> {
        self.current_session()?.sync()
    }

    /// Engine and version of the bound handler.
    pub fn handler_version(&self) -> DbaResult<String> {
        self.config.find_handler(&self.handler_name)?.version()
    }

    fn open_session(&mut self, mode: &str, persistent: bool) -> DbaResult<&DbaSession> {
        if let Err(err) = self.release_session() {
            log::warn!(
                "Failed to release the previous session of {}: {}",
                self.full_path,
                err
            );
        }

        self.ensure_path_ready()?;
        self.mode = Some(mode.to_string());

        let session = self.connect(mode, persistent).map_err(|err| {
            if err.kind() == &ErrorKind::BackendOpenError {
                return err;
            }
            log::error!(
                "Failed to open {} store at {}: {}",
                self.handler_name,
                self.full_path,
                err
            );
            DbaError::new_with_cause(
                &format!(
                    "Failed to open {} store at {}",
                    self.handler_name, self.full_path
                ),
                ErrorKind::BackendOpenError,
                err,
            )
        })?;

        log::debug!(
            "Opened {} store at {} with mode {}",
            self.handler_name,
            self.full_path,
            mode
        );
        Ok(&*self.session.insert(session))
    }

    fn connect(&self, mode: &str, persistent: bool) -> DbaResult<DbaSession> {
        let handler = self.config.find_handler(&self.handler_name)?;
        if persistent {
            handler.open_persistent(&self.full_path, mode)
        } else {
            handler.open(&self.full_path, mode)
        }
    }

    fn release_session(&mut self) -> DbaResult<()> {
        match self.session.take() {
            Some(session) => session.release(),
            None => Ok(()),
        }
    }

    fn ensure_closed(&self, setting: &str) -> DbaResult<()> {
        if self.is_open() {
            log::error!(
                "Cannot change the {} of {} while it is open",
                setting,
                self.full_path
            );
            return Err(DbaError::new(
                &format!(
                    "Cannot change the {} of {} while it is open",
                    setting, self.full_path
                ),
                ErrorKind::InvalidConfiguration,
            ));
        }
        Ok(())
    }

    fn current_session(&self) -> DbaResult<&DbaSession> {
        match self.session.as_ref() {
            Some(session) => Ok(session),
            None => {
                log::error!("Store {} is not open", self.full_path);
                Err(DbaError::new(
                    &format!("Store {} is not open", self.full_path),
                    ErrorKind::StoreNotOpen,
                ))
            }
        }
    }

    fn optimise_after_write(&self, session: &DbaSession) {
        if !self.config.optimise_after_write() {
            return;
        }
        if let Err(err) = session.optimize() {
            log::warn!("Optimise after write failed for {}: {}", self.full_path, err);
        }
    }
}

impl Drop for Dba {
    fn drop(&mut self) {
        if let Err(err) = self.release_session() {
            log::warn!("Failed to release store {} on drop: {}", self.full_path, err);
        }
    }
}

fn full_path(path: &str, store_name: &str) -> String {
    Path::new(path).join(store_name).to_string_lossy().into_owned()
}
