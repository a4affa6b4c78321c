use crate::errors::DbaResult;
use crate::store::DbaSession;
use dashmap::DashMap;
use std::sync::Arc;

/// Persistent sessions of one handler, keyed by full path.
///
/// A pooled session is handed out again by `open_persistent` for as long as it
/// stays open. Closed sessions are evicted lazily on the next lookup.
#[derive(Clone, Default)]
pub struct SessionPool {
    sessions: Arc<DashMap<String, DbaSession>>,
}

impl SessionPool {
    pub fn new() -> SessionPool {
        SessionPool::default()
    }

    /// Returns the pooled session for `path` if it is still open.
    pub fn get_open(&self, path: &str) -> Option<DbaSession> {
        let mut stale = false;
        if let Some(session) = self.sessions.get(path) {
            if !session.is_closed() {
                return Some(session.clone());
            }
            // can't remove while holding the shard guard
            stale = true;
        }

        if stale {
            self.sessions.remove(path);
        }
        None
    }

    pub fn insert(&self, path: &str, session: DbaSession) {
        self.sessions.insert(path.to_string(), session);
    }

    pub fn remove(&self, path: &str) -> Option<DbaSession> {
        self.sessions.remove(path).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes and evicts every pooled session.
    ///
    /// All sessions are attempted; the first failure is returned.
    pub fn close_all(&self) -> DbaResult<()> {
        let paths: Vec<String> = self.sessions.iter().map(|it| it.key().clone()).collect();
        let mut first_error = None;

        for path in paths {
            if let Some((_, session)) = self.sessions.remove(&path) {
                if session.is_closed() {
                    continue;
                }
                if let Err(err) = session.close() {
                    log::error!("Failed to close pooled session at {}: {}", path, err);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
