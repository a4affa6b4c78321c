use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for dba operations.
///
/// Each kind names one category of failure so callers can decide whether a
/// failure is fatal (path provisioning, backend open) or an expected outcome
/// that the facade folds into a plain `bool` (a missing key on delete).
///
/// # Examples
///
/// ```rust
/// use simple_dba::errors::{DbaError, DbaResult, ErrorKind};
///
/// fn example() -> DbaResult<()> {
///     Err(DbaError::new("handler 'gdbm' is not registered", ErrorKind::HandlerNotFound))
/// }
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::HandlerNotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Lifecycle errors - fatal to open / open_persistent
    /// The base directory could not be created or a blocking file could not be removed
    PathProvisioningError,
    /// The backend refused to open the store
    BackendOpenError,
    /// No handler is registered under the requested identifier
    HandlerNotFound,
    /// The mode string is not understood by the backend
    InvalidMode,
    /// A facade or handler setting is missing or malformed
    InvalidConfiguration,

    // Per-key and session errors
    /// A backend operation failed
    BackendOperationError,
    /// The key is not present (raised by backends that signal absence as an error)
    KeyNotFound,
    /// A write was attempted on a session opened read-only
    ReadOnlyStore,
    /// The facade holds no open session
    StoreNotOpen,
    /// The session has already been closed
    StoreAlreadyClosed,

    // IO errors
    /// Generic IO error
    IOError,
    /// The file was not found
    FileNotFound,
    /// Permission denied for file operation
    PermissionDenied,
    /// File data is corrupted
    FileCorrupted,

    /// Error encoding or decoding data
    EncodingError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::PathProvisioningError => write!(f, "Path provisioning error"),
            ErrorKind::BackendOpenError => write!(f, "Backend open error"),
            ErrorKind::HandlerNotFound => write!(f, "Handler not found"),
            ErrorKind::InvalidMode => write!(f, "Invalid mode"),
            ErrorKind::InvalidConfiguration => write!(f, "Invalid configuration"),
            ErrorKind::BackendOperationError => write!(f, "Backend operation error"),
            ErrorKind::KeyNotFound => write!(f, "Key not found"),
            ErrorKind::ReadOnlyStore => write!(f, "Read-only store"),
            ErrorKind::StoreNotOpen => write!(f, "Store not open"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::FileNotFound => write!(f, "File not found"),
            ErrorKind::PermissionDenied => write!(f, "Permission denied"),
            ErrorKind::FileCorrupted => write!(f, "File corrupted"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom dba error type.
///
/// `DbaError` carries a message, a kind and an optional cause. The backtrace is
/// captured unresolved and only symbolized when the error is debug-printed, so
/// errors that are normalized away (a missing key on delete) stay cheap.
///
/// # Examples
///
/// ```rust
/// use simple_dba::errors::{DbaError, ErrorKind};
///
/// let cause = DbaError::new("permission denied", ErrorKind::PermissionDenied);
/// let err = DbaError::new_with_cause(
///     "Failed to provision /srv/store",
///     ErrorKind::PathProvisioningError,
///     cause,
/// );
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DbaError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DbaError>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl DbaError {
    /// Creates a new `DbaError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DbaError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `DbaError` chained to the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DbaError) -> Self {
        DbaError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DbaError> {
        self.cause.as_deref()
    }

    /// Returns `true` if this error, or any error in its cause chain, has the given kind.
    pub fn is_kind(&self, kind: &ErrorKind) -> bool {
        if &self.error_kind == kind {
            return true;
        }
        match &self.cause {
            Some(cause) => cause.is_kind(kind),
            None => false,
        }
    }
}

impl Display for DbaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DbaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, *backtrace)
            }
        }
    }
}

impl Error for DbaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for dba operations.
pub type DbaResult<T> = Result<T, DbaError>;

impl From<std::io::Error> for DbaError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                ErrorKind::FileCorrupted
            }
            _ => ErrorKind::IOError,
        };
        DbaError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<std::string::FromUtf8Error> for DbaError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DbaError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<String> for DbaError {
    fn from(msg: String) -> Self {
        DbaError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DbaError {
    fn from(msg: &str) -> Self {
        DbaError::new(msg, ErrorKind::InternalError)
    }
}
