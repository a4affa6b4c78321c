use crate::errors::DbaResult;
use crate::store::{DbaHandler, DbaHandlers};

/// A bundle of handlers that can be loaded into a registry.
///
/// Handler crates expose their engines through a module so callers only need
/// `DbaBuilder::load_module`.
///
/// # Examples
///
/// ```rust,ignore
/// use simple_dba::Dba;
/// use simple_dba_fjall_adapter::FjallModule;
///
/// let dba = Dba::builder()
///     .path("/var/www/storage")
///     .store_name("lmdb_store")
///     .handler("lmdb")
///     .load_module(FjallModule::with_config().low_memory_preset().build())
///     .build()?;
/// ```
pub trait DbaModule: Send + Sync {
    /// Handlers provided by this module.
    fn handlers(&self) -> DbaResult<Vec<DbaHandler>>;

    /// Registers every handler of this module.
    fn load(&self, registry: &DbaHandlers) -> DbaResult<()> {
        for handler in self.handlers()? {
            registry.register(handler);
        }
        Ok(())
    }
}
