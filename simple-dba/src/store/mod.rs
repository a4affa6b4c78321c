//! Backend engine abstractions.
//!
//! A backend engine is split in two:
//!
//! - **Handlers** (`DbaHandlerProvider`) know one storage format and open
//!   stores by full path and mode. They are registered by identifier in
//!   `DbaHandlers`, either directly or through a `DbaModule`.
//! - **Sessions** (`DbaSessionProvider`) are open stores and expose the
//!   key-value primitives the facade delegates to.
//!
//! Mode strings are parsed by handlers into `OpenMode`; the facade never
//! interprets them.

mod handler;
mod mode;
mod module;
mod pool;
mod registry;
mod session;

pub use handler::*;
pub use mode::*;
pub use module::*;
pub use pool::*;
pub use registry::*;
pub use session::*;
