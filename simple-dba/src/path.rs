//! Base directory provisioning.

use crate::errors::{DbaError, DbaResult, ErrorKind};
use std::fs::{self, DirBuilder};
use std::path::Path;

/// Permissions given to directories created for a store base path (`rwxr-xr-x`).
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o755;

/// Makes sure `path` is a directory that stores can be created in.
///
/// - an existing directory is left untouched
/// - an existing regular file is removed and replaced by a directory
/// - a missing path is created, parents included
///
/// `permissions` applies to created directories on unix and is ignored
/// elsewhere.
///
/// # Errors
///
/// `PathProvisioningError` (caused by the underlying IO error) when the file
/// cannot be removed or the directory cannot be created.
pub fn ensure_path_ready(path: &str, permissions: u32) -> DbaResult<bool> {
    let base = Path::new(path);

    if let Ok(metadata) = fs::metadata(base) {
        if metadata.is_dir() {
            return Ok(true);
        }

        log::debug!("Removing file {} in place of the store directory", path);
        fs::remove_file(base).map_err(|err| provisioning_error(path, "remove file at", err))?;
    }

    create_dir(base, permissions).map_err(|err| provisioning_error(path, "create", err))?;
    log::debug!("Created store directory {}", path);
    Ok(true)
}

fn create_dir(path: &Path, permissions: u32) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(permissions);
    }
    #[cfg(not(unix))]
    let _ = permissions;

    builder.create(path)
}

fn provisioning_error(path: &str, action: &str, err: std::io::Error) -> DbaError {
    log::error!("Failed to {} {}: {}", action, path, err);
    DbaError::new_with_cause(
        &format!("Failed to {} {}", action, path),
        ErrorKind::PathProvisioningError,
        err.into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_directory_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        fs::write(&marker, b"x").unwrap();

        let path = dir.path().to_string_lossy().to_string();
        assert!(ensure_path_ready(&path, DEFAULT_DIR_PERMISSIONS).unwrap());
        assert!(marker.exists());
    }

    #[test]
    fn test_file_is_replaced_by_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocking = dir.path().join("storage");
        fs::write(&blocking, b"not a directory").unwrap();

        let path = blocking.to_string_lossy().to_string();
        assert!(ensure_path_ready(&path, DEFAULT_DIR_PERMISSIONS).unwrap());
        assert!(blocking.is_dir());
    }

    #[test]
    fn test_missing_path_is_created_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");

        let path = nested.to_string_lossy().to_string();
        assert!(ensure_path_ready(&path, DEFAULT_DIR_PERMISSIONS).unwrap());
        assert!(nested.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_created_directory_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let created = dir.path().join("perm");
        let path = created.to_string_lossy().to_string();
        ensure_path_ready(&path, 0o700).unwrap();

        let mode = fs::metadata(&created).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_path_below_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();

        let path = file.join("child").to_string_lossy().to_string();
        let err = ensure_path_ready(&path, DEFAULT_DIR_PERMISSIONS).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::PathProvisioningError);
        assert!(err.cause().is_some());
    }
}
