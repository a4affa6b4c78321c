//! Built-in handlers registered by `DbaHandlers::with_defaults`.

mod flatfile;
mod memory;

pub use flatfile::{FlatFileHandler, RecordError, FLAT_FILE_HANDLER};
pub use memory::{InMemoryHandler, IN_MEMORY_HANDLER};
