//! Configuration shared by facades.

use crate::errors::{DbaError, DbaResult, ErrorKind};
use crate::path::DEFAULT_DIR_PERMISSIONS;
use crate::store::{DbaHandler, DbaHandlers, DbaModule, DEFAULT_MODE};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Settings of a `Dba` facade.
///
/// Cloning is cheap and clones share the same settings, so one config can
/// back several facades.
///
/// # Examples
///
/// ```rust
/// use simple_dba::DbaConfig;
///
/// let config = DbaConfig::new();
/// assert_eq!(config.default_mode(), "n");
/// assert_eq!(config.dir_permissions(), 0o755);
/// assert!(config.optimise_after_write());
/// ```
#[derive(Clone)]
pub struct DbaConfig {
    inner: Arc<DbaConfigInner>,
}

impl Default for DbaConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DbaConfig {
    /// Creates a configuration with default values and the shared handler registry.
    pub fn new() -> Self {
        DbaConfig {
            inner: Arc::new(DbaConfigInner::new(DbaHandlers::shared())),
        }
    }

    /// Creates a configuration with default values and the given registry.
    pub fn with_handlers(handlers: DbaHandlers) -> Self {
        DbaConfig {
            inner: Arc::new(DbaConfigInner::new(handlers)),
        }
    }

    /// Mode used by `Dba::open_default`.
    pub fn default_mode(&self) -> String {
        self.inner.default_mode.read().clone()
    }

    /// Sets the mode used by `Dba::open_default`.
    ///
    /// The mode is passed to the handler verbatim; only empty modes are rejected.
    pub fn set_default_mode(&self, mode: &str) -> DbaResult<()> {
        if mode.is_empty() {
            log::error!("Default mode cannot be empty");
            return Err(DbaError::new(
                "Default mode cannot be empty",
                ErrorKind::InvalidConfiguration,
            ));
        }
        *self.inner.default_mode.write() = mode.to_string();
        Ok(())
    }

    /// Unix permissions of directories created for a base path.
    pub fn dir_permissions(&self) -> u32 {
        self.inner.dir_permissions.load(Ordering::Relaxed)
    }

    pub fn set_dir_permissions(&self, permissions: u32) -> DbaResult<()> {
        if permissions > 0o7777 {
            log::error!("Invalid directory permissions {:o}", permissions);
            return Err(DbaError::new(
                &format!("Invalid directory permissions {:o}", permissions),
                ErrorKind::InvalidConfiguration,
            ));
        }
        self.inner
            .dir_permissions
            .store(permissions, Ordering::Relaxed);
        Ok(())
    }

    /// Whether `insert` and `delete` run `optimise` after the write.
    pub fn optimise_after_write(&self) -> bool {
        self.inner.optimise_after_write.load(Ordering::Relaxed)
    }

    pub fn set_optimise_after_write(&self, enabled: bool) {
        self.inner
            .optimise_after_write
            .store(enabled, Ordering::Relaxed)
    }

    /// Registry handlers are looked up in.
    pub fn handlers(&self) -> DbaHandlers {
        self.inner.handlers.read().clone()
    }

    /// Replaces the registry handlers are looked up in.
    pub fn set_handlers(&self, handlers: DbaHandlers) {
        *self.inner.handlers.write() = handlers;
    }

    /// Registers the handlers of `module` in the current registry.
    pub fn load_module<T: DbaModule + 'static>(&self, module: T) -> DbaResult<()> {
        module.load(&self.handlers())
    }

    /// Finds the handler registered under `name`.
    pub fn find_handler(&self, name: &str) -> DbaResult<DbaHandler> {
        self.handlers().find(name)
    }
}

struct DbaConfigInner {
    default_mode: RwLock<String>,
    dir_permissions: AtomicU32,
    optimise_after_write: AtomicBool,
    handlers: RwLock<DbaHandlers>,
}

impl DbaConfigInner {
    fn new(handlers: DbaHandlers) -> Self {
        DbaConfigInner {
            default_mode: RwLock::new(DEFAULT_MODE.to_string()),
            dir_permissions: AtomicU32::new(DEFAULT_DIR_PERMISSIONS),
            optimise_after_write: AtomicBool::new(true),
            handlers: RwLock::new(handlers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::InMemoryHandler;

    #[test]
    fn test_defaults() {
        let config = DbaConfig::new();
        assert_eq!(config.default_mode(), "n");
        assert_eq!(config.dir_permissions(), 0o755);
        assert!(config.optimise_after_write());
        assert!(config.find_handler("flatfile").is_ok());
        assert!(config.find_handler("inmemory").is_ok());
    }

    #[test]
    fn test_clones_share_settings() {
        let config = DbaConfig::new();
        let clone = config.clone();
        clone.set_default_mode("c").unwrap();
        clone.set_optimise_after_write(false);
        assert_eq!(config.default_mode(), "c");
        assert!(!config.optimise_after_write());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = DbaConfig::new();
        let err = config.set_default_mode("").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidConfiguration);
        let err = config.set_dir_permissions(0o17777).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidConfiguration);
        assert_eq!(config.dir_permissions(), 0o755);
    }

    #[test]
    fn test_custom_registry() {
        let config = DbaConfig::with_handlers(DbaHandlers::new());
        assert_eq!(
            config.find_handler("flatfile").err().map(|e| e.kind().clone()),
            Some(ErrorKind::HandlerNotFound)
        );

        let registry = DbaHandlers::new();
        registry.register(DbaHandler::new(InMemoryHandler::new()));
        config.set_handlers(registry);
        assert!(config.find_handler("inmemory").is_ok());
    }
}
