use simple_dba::errors::{DbaError, ErrorKind};
use std::error::Error;

/// Maps a fjall error to a `DbaError`, picking the kind from the message.
pub(crate) fn to_dba_error(error: impl Error) -> DbaError {
    let error_msg = error.to_string();
    let lower = error_msg.to_lowercase();
    let error_kind = if lower.contains("closed") {
        ErrorKind::StoreAlreadyClosed
    } else if lower.contains("corrupt") || lower.contains("decode") {
        ErrorKind::FileCorrupted
    } else if lower.contains("permission") {
        ErrorKind::PermissionDenied
    } else if lower.contains("no such file") || lower.contains("not found") {
        ErrorKind::FileNotFound
    } else {
        ErrorKind::BackendOperationError
    };
    DbaError::new(&format!("Fjall Error: {}", error_msg), error_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_maps_messages_to_kinds() {
        let cases = [
            ("keyspace is closed", ErrorKind::StoreAlreadyClosed),
            ("Corrupt block header", ErrorKind::FileCorrupted),
            ("Permission denied (os error 13)", ErrorKind::PermissionDenied),
            ("No such file or directory (os error 2)", ErrorKind::FileNotFound),
            ("something else", ErrorKind::BackendOperationError),
        ];

        for (message, kind) in cases {
            let err = to_dba_error(io::Error::new(io::ErrorKind::Other, message));
            assert_eq!(err.kind(), &kind, "{}", message);
            assert!(err.message().starts_with("Fjall Error: "));
        }
    }
}
