use crate::dba::Dba;
use crate::dba_config::DbaConfig;
use crate::errors::{DbaError, DbaResult, ErrorKind};
use crate::handlers::FLAT_FILE_HANDLER;
use crate::store::{DbaHandlers, DbaModule};

/// Builder for configuring a `Dba` facade.
///
/// Errors raised while configuring are captured and returned by `build`, so a
/// builder chain never needs intermediate `?`.
///
/// # Examples
///
/// ```rust
/// use simple_dba::Dba;
///
/// # fn main() -> simple_dba::errors::DbaResult<()> {
/// let dba = Dba::builder()
///     .path("/var/www/storage")
///     .store_name("mystore")
///     .handler("inmemory")
///     .default_mode("c")
///     .optimise_after_write(false)
///     .build()?;
///
/// assert_eq!(dba.full_path(), "/var/www/storage/mystore");
/// assert!(!dba.is_open());
/// # Ok(())
/// # }
/// ```
pub struct DbaBuilder {
    error: Option<DbaError>,
    path: Option<String>,
    store_name: Option<String>,
    handler: String,
    config: DbaConfig,
}

impl Default for DbaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DbaBuilder {
    /// Creates a builder bound to the `flatfile` handler and the shared registry.
    pub fn new() -> Self {
        DbaBuilder {
            error: None,
            path: None,
            store_name: None,
            handler: FLAT_FILE_HANDLER.to_string(),
            config: DbaConfig::new(),
        }
    }

    /// Base directory of the store. Required.
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Name of the store inside the base directory. Required.
    pub fn store_name(mut self, store_name: &str) -> Self {
        self.store_name = Some(store_name.to_string());
        self
    }

    /// Identifier of the handler to open the store with.
    pub fn handler(mut self, handler: &str) -> Self {
        self.handler = handler.to_string();
        self
    }

    /// Mode used by `Dba::open_default`.
    pub fn default_mode(mut self, mode: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_default_mode(mode) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Permissions of directories created for the base path.
    pub fn dir_permissions(mut self, permissions: u32) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_dir_permissions(permissions) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Whether `insert` and `delete` run `optimise` afterwards. On by default.
    pub fn optimise_after_write(self, enabled: bool) -> Self {
        self.config.set_optimise_after_write(enabled);
        self
    }

    /// Uses `handlers` instead of the shared registry.
    ///
    /// Modules loaded afterwards register into `handlers`.
    pub fn handlers(self, handlers: DbaHandlers) -> Self {
        self.config.set_handlers(handlers);
        self
    }

    /// Registers the handlers of `module`.
    pub fn load_module<T: DbaModule + 'static>(mut self, module: T) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.load_module(module) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Builds a closed facade.
    ///
    /// # Errors
    ///
    /// The first error captured while configuring, or `InvalidConfiguration`
    /// when the path or store name is missing.
    pub fn build(self) -> DbaResult<Dba> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let path = required(self.path, "path")?;
        let store_name = required(self.store_name, "store name")?;
        Ok(Dba::with_config(
            &path,
            &store_name,
            &self.handler,
            self.config,
        ))
    }
}

fn required(value: Option<String>, name: &str) -> DbaResult<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => {
            log::error!("A {} is required to build a store", name);
            Err(DbaError::new(
                &format!("A {} is required to build a store", name),
                ErrorKind::InvalidConfiguration,
            ))
        }
    }
}
