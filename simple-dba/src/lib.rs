//! # simple_dba - a consistent key-value facade over embedded stores
//!
//! `simple_dba` binds a base directory, a store name and a handler identifier
//! into one [`Dba`] facade. The facade provisions the directory, opens a
//! session through the selected handler and exposes a small, uniform surface:
//! `exists`, `fetch`, `insert`, `delete`, `replace`, `first_key` / `next_key`,
//! `optimise` and `sync`.
//!
//! ## Quick Start
//!
//! ```rust
//! use simple_dba::Dba;
//!
//! # fn main() -> simple_dba::errors::DbaResult<()> {
//! let base = std::env::temp_dir().join("simple_dba_quick_start");
//! let mut dba = Dba::new(&base.to_string_lossy(), "mystore", "flatfile");
//!
//! dba.open("n")?;
//! assert!(dba.insert("123", "hello world")?);
//! assert!(!dba.insert("123", "ignored")?);
//! assert!(dba.replace("123", "hello Mauritius")?);
//! assert!(!dba.delete("missing")?);
//! dba.close()?;
//! # std::fs::remove_dir_all(base).ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Handlers
//!
//! - `flatfile`: append-only record log in a single file, compacted by `optimise`
//! - `inmemory`: process-local tables
//! - `fjall` / `lmdb`: ordered LSM storage, from the `simple_dba_fjall_adapter` crate
//!
//! Handlers are looked up in a [`store::DbaHandlers`] registry. Additional
//! engines plug in through [`store::DbaModule`].
//!
//! ## Module Organization
//!
//! - [`dba`] - The store facade
//! - [`dba_builder`] - Facade builder
//! - [`dba_config`] - Facade configuration
//! - [`errors`] - Error types and result definitions
//! - [`handlers`] - Built-in handlers
//! - [`path`] - Base directory provisioning
//! - [`store`] - Handler and session abstractions

pub mod dba;
pub mod dba_builder;
pub mod dba_config;
pub mod errors;
pub mod handlers;
pub mod path;
pub mod store;

pub use dba::Dba;
pub use dba_builder::DbaBuilder;
pub use dba_config::DbaConfig;
