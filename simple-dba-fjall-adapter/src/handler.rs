use crate::config::FjallConfig;
use crate::session::FjallSession;
use crate::version::fjall_version;
use simple_dba::errors::{DbaError, DbaResult, ErrorKind};
use simple_dba::store::{DbaHandlerProvider, DbaSession, OpenMode, SessionPool};
use std::str::FromStr;

pub const FJALL_HANDLER: &str = "fjall";

/// Identifier kept for stores that were configured for an LMDB handler.
pub const LMDB_ALIAS: &str = "lmdb";

/// Handler keeping each store in its own fjall keyspace.
///
/// The full path of a store is the keyspace directory. Keys iterate in byte
/// order and a missing key on delete is reported as `Ok(false)`.
pub struct FjallHandler {
    config: FjallConfig,
    pool: SessionPool,
}

impl FjallHandler {
    pub fn new(config: FjallConfig) -> FjallHandler {
        FjallHandler {
            config,
            pool: SessionPool::new(),
        }
    }

    pub fn config(&self) -> &FjallConfig {
        &self.config
    }
}

impl DbaHandlerProvider for FjallHandler {
    fn name(&self) -> &str {
        FJALL_HANDLER
    }

    fn aliases(&self) -> Vec<String> {
        vec![LMDB_ALIAS.to_string()]
    }

    fn version(&self) -> DbaResult<String> {
        match fjall_version() {
            Ok(version) => Ok(format!("Fjall/{}", version)),
            Err(e) => {
                log::error!("Failed to determine Fjall version: {}", e);
                Err(DbaError::new(
                    &format!("Failed to determine Fjall version: {}", e),
                    ErrorKind::InternalError,
                ))
            }
        }
    }

    fn open(&self, path: &str, mode: &str) -> DbaResult<DbaSession> {
        let mode = OpenMode::from_str(mode)?;
        FjallSession::open(path, mode, self.config.clone()).map(DbaSession::new)
    }

    fn session_pool(&self) -> &SessionPool {
        &self.pool
    }
}
