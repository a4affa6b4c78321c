use crate::errors::DbaResult;
use crate::store::OpenMode;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Low-level interface to one open store of a backend engine.
///
/// # Purpose
/// Defines the primitives a handler exposes for an opened store. The facade
/// delegates to these one-to-one; none of them is composed from the others.
///
/// # Contract
/// - Missing keys are a normal outcome: `fetch`, `first_key` and `next_key`
///   return `Ok(None)`, `exists` returns `Ok(false)`.
/// - `insert` is insert-if-absent and never overwrites.
/// - `delete` returns `Ok(true)` when a pair was removed. A handler may signal a
///   missing key either as `Ok(false)` or as an error of kind `KeyNotFound`.
/// - The iteration cursor lives in the session. `first_key` resets it,
///   `next_key` advances it and returns `Ok(None)` when it was never primed or
///   is exhausted. Key order is handler-defined.
/// - Every operation after `close` fails with `StoreAlreadyClosed`; writes on a
///   read-only session fail with `ReadOnlyStore`.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`; methods take `&self` and use interior
/// mutability.
pub trait DbaSessionProvider: Send + Sync {
    /// Returns the value stored under `key`, or `None` when absent.
    fn fetch(&self, key: &[u8]) -> DbaResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` only if `key` is absent.
    fn insert(&self, key: &[u8], value: &[u8]) -> DbaResult<bool>;

    /// Removes the pair stored under `key`.
    fn delete(&self, key: &[u8]) -> DbaResult<bool>;

    /// Checks whether `key` is present.
    fn exists(&self, key: &[u8]) -> DbaResult<bool>;

    /// Resets the cursor and returns the first key.
    fn first_key(&self) -> DbaResult<Option<Vec<u8>>>;

    /// Advances the cursor and returns the next key.
    fn next_key(&self) -> DbaResult<Option<Vec<u8>>>;

    /// Reclaims space left behind by deletes.
    fn optimize(&self) -> DbaResult<bool>;

    /// Flushes the store to durable storage.
    fn sync(&self) -> DbaResult<bool>;

    /// Releases the resources held by the session.
    fn close(&self) -> DbaResult<()>;

    fn is_closed(&self) -> bool;

    fn mode(&self) -> OpenMode;

    /// Full path of the opened store.
    fn path(&self) -> &str;

    /// Identifier of the handler that opened this session.
    fn handler_name(&self) -> &str;
}

/// Handle to an open backend session.
///
/// # Purpose
/// Wraps a concrete `DbaSessionProvider` in an `Arc` so handlers can pool
/// persistent sessions while the facade holds the same session. A session
/// opened through `open_persistent` is flagged persistent: releasing it from
/// the facade only detaches it, and it stays open in the handler's pool.
///
/// # Characteristics
/// - **Cheap to clone**: only bumps the reference count
/// - **Provider-agnostic**: works with any `DbaSessionProvider`
/// - **Ergonomic**: implements `Deref` to the provider
#[derive(Clone)]
pub struct DbaSession {
    inner: Arc<dyn DbaSessionProvider>,
    persistent: Arc<AtomicBool>,
}

impl DbaSession {
    pub fn new<T: DbaSessionProvider + 'static>(inner: T) -> Self {
        DbaSession {
            inner: Arc::new(inner),
            persistent: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_persistent(&self) {
        self.persistent.store(true, Ordering::Relaxed)
    }

    /// Gives up the caller's use of this session.
    ///
    /// Closes a regular session. A persistent session is left open for reuse.
    pub fn release(&self) -> DbaResult<()> {
        if self.is_persistent() {
            log::debug!(
                "Detaching persistent {} session at {}",
                self.handler_name(),
                self.path()
            );
            Ok(())
        } else {
            self.inner.close()
        }
    }

    /// Returns `true` if both handles point at the same underlying session.
    pub fn same_session(&self, other: &DbaSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Deref for DbaSession {
    type Target = Arc<dyn DbaSessionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for DbaSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbaSession")
            .field("handler", &self.inner.handler_name())
            .field("path", &self.inner.path())
            .field("mode", &self.inner.mode())
            .field("persistent", &self.is_persistent())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}
