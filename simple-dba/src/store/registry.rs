use crate::errors::{DbaError, DbaResult, ErrorKind};
use crate::handlers::{FlatFileHandler, InMemoryHandler};
use crate::store::DbaHandler;
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};

static SHARED_HANDLERS: LazyLock<DbaHandlers> = LazyLock::new(DbaHandlers::with_defaults);

/// Registry of handlers addressable by identifier.
///
/// Every handler is registered under its name and each of its aliases. The
/// registry is cheap to clone and clones share the same handler instances.
#[derive(Clone, Default)]
pub struct DbaHandlers {
    handlers: Arc<DashMap<String, DbaHandler>>,
}

impl DbaHandlers {
    /// Creates an empty registry.
    pub fn new() -> DbaHandlers {
        DbaHandlers::default()
    }

    /// Creates a registry holding the built-in `flatfile` and `inmemory` handlers.
    pub fn with_defaults() -> DbaHandlers {
        let handlers = DbaHandlers::new();
        handlers.register(DbaHandler::new(FlatFileHandler::new()));
        handlers.register(DbaHandler::new(InMemoryHandler::new()));
        handlers
    }

    /// Process-wide registry used by `DbaConfig::new`.
    ///
    /// Facades built without an explicit registry share these handlers, so
    /// persistent sessions and in-memory tables are visible across them.
    pub fn shared() -> DbaHandlers {
        SHARED_HANDLERS.clone()
    }

    /// Registers `handler` under its name and aliases, replacing earlier entries.
    pub fn register(&self, handler: DbaHandler) {
        let mut names = handler.aliases();
        names.push(handler.name().to_string());

        for name in names {
            if self.handlers.insert(name.clone(), handler.clone()).is_some() {
                log::warn!("Handler '{}' replaced an earlier registration", name);
            }
        }
    }

    /// Finds the handler registered under `name`.
    pub fn find(&self, name: &str) -> DbaResult<DbaHandler> {
        match self.handlers.get(name) {
            Some(handler) => Ok(handler.clone()),
            None => {
                log::error!("No handler registered as '{}'", name);
                Err(DbaError::new(
                    &format!("No handler registered as '{}'", name),
                    ErrorKind::HandlerNotFound,
                ))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered identifiers, aliases included, in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|it| it.key().clone()).collect();
        names.sort();
        names
    }

    /// Closes the persistent sessions of every registered handler.
    pub fn close_persistent(&self) -> DbaResult<()> {
        let handlers: Vec<DbaHandler> = self.handlers.iter().map(|it| it.value().clone()).collect();
        for handler in handlers {
            handler.close_persistent()?;
        }
        Ok(())
    }
}
