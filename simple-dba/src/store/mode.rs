use crate::errors::{DbaError, DbaResult, ErrorKind};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Mode used when a caller does not pick one: create, truncate, read-write.
pub const DEFAULT_MODE: &str = "n";

/// How a backend should open a store.
///
/// The facade passes mode strings through verbatim; handlers parse them with
/// `OpenMode::from_str`. Only the first character selects the mode. Trailing
/// lock and flag characters (`l`, `d`, `-`, `t`) are accepted and ignored
/// because the handlers in this crate manage their own locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `n`: create the store, truncating any existing content, read-write.
    Create,
    /// `c`: create the store if missing, read-write.
    CreateIfMissing,
    /// `r`: open an existing store read-only.
    ReadOnly,
    /// `w`: open an existing store read-write.
    ReadWrite,
}

impl OpenMode {
    #[inline]
    pub fn is_read_only(&self) -> bool {
        matches!(self, OpenMode::ReadOnly)
    }

    /// Whether the store must already exist for the open to succeed.
    #[inline]
    pub fn requires_existing(&self) -> bool {
        matches!(self, OpenMode::ReadOnly | OpenMode::ReadWrite)
    }

    #[inline]
    pub fn truncates(&self) -> bool {
        matches!(self, OpenMode::Create)
    }

    #[inline]
    pub fn as_char(&self) -> char {
        match self {
            OpenMode::Create => 'n',
            OpenMode::CreateIfMissing => 'c',
            OpenMode::ReadOnly => 'r',
            OpenMode::ReadWrite => 'w',
        }
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        OpenMode::Create
    }
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for OpenMode {
    type Err = DbaError;

    fn from_str(mode: &str) -> DbaResult<Self> {
        let mut chars = mode.chars();
        let open_mode = match chars.next() {
            Some('n') => OpenMode::Create,
            Some('c') => OpenMode::CreateIfMissing,
            Some('r') => OpenMode::ReadOnly,
            Some('w') => OpenMode::ReadWrite,
            _ => {
                log::error!("Invalid open mode '{}'", mode);
                return Err(DbaError::new(
                    &format!("Invalid open mode '{}'", mode),
                    ErrorKind::InvalidMode,
                ));
            }
        };

        if let Some(flag) = chars.find(|c| !matches!(c, 'l' | 'd' | '-' | 't')) {
            log::error!("Invalid flag '{}' in open mode '{}'", flag, mode);
            return Err(DbaError::new(
                &format!("Invalid flag '{}' in open mode '{}'", flag, mode),
                ErrorKind::InvalidMode,
            ));
        }

        Ok(open_mode)
    }
}
