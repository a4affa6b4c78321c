use crate::errors::DbaResult;
use crate::store::{DbaSession, SessionPool};
use std::ops::Deref;
use std::sync::Arc;

/// Interface of a backend engine, one per storage format.
///
/// # Purpose
/// A handler turns a full path and a mode into an open `DbaSession`. It is
/// addressed by its name (and optional aliases) through `DbaHandlers`.
///
/// # Implementations
/// - `FlatFileHandler` (`flatfile`): append-only record log in a single file
/// - `InMemoryHandler` (`inmemory`): process-local tables, for tests
/// - `FjallHandler` (`fjall`, `lmdb`): ordered LSM storage in the fjall adapter crate
///
/// # Thread Safety
/// Implementers must be `Send + Sync` so a registry can be shared.
pub trait DbaHandlerProvider: Send + Sync {
    /// Identifier used to select this handler.
    fn name(&self) -> &str;

    /// Additional identifiers this handler answers to.
    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }

    /// Engine name and version, e.g. `Fjall/2.6.3`.
    fn version(&self) -> DbaResult<String>;

    /// Opens a new session on the store at `path`.
    ///
    /// `mode` is the caller's mode string as given to the facade; handlers
    /// parse it themselves, usually with `OpenMode::from_str`.
    ///
    /// # Errors
    /// `InvalidMode` when `mode` is not understood, `BackendOpenError` when the
    /// store cannot be opened in the requested mode.
    fn open(&self, path: &str, mode: &str) -> DbaResult<DbaSession>;

    /// Pool of sessions opened through `open_persistent`.
    fn session_pool(&self) -> &SessionPool;

    /// Opens a session that is shared across callers asking for the same path.
    ///
    /// Returns the pooled session for `path` when one is still open; the mode
    /// of a reused session is the one it was first opened with.
    fn open_persistent(&self, path: &str, mode: &str) -> DbaResult<DbaSession> {
        let pool = self.session_pool();
        if let Some(session) = pool.get_open(path) {
            log::debug!("Reusing persistent {} session at {}", self.name(), path);
            return Ok(session);
        }

        let session = self.open(path, mode)?;
        session.mark_persistent();
        pool.insert(path, session.clone());
        Ok(session)
    }

    /// Closes every persistent session this handler still holds.
    fn close_persistent(&self) -> DbaResult<()> {
        self.session_pool().close_all()
    }
}

/// Cloneable handle to a registered handler.
///
/// Wraps a `DbaHandlerProvider` in an `Arc`; cloning only bumps the reference
/// count, so one handler instance (and its session pool) is shared by every
/// facade built from the same registry.
#[derive(Clone)]
pub struct DbaHandler {
    inner: Arc<dyn DbaHandlerProvider>,
}

impl DbaHandler {
    pub fn new<T: DbaHandlerProvider + 'static>(inner: T) -> Self {
        DbaHandler {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for DbaHandler {
    type Target = Arc<dyn DbaHandlerProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
