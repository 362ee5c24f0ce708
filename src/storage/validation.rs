//! Path validation
//!
//! Confines client-supplied names to a user's storage root.

use std::path::{Component, Path};

use crate::error::StorageError;

/// Accepts a name only if it is a single normal path component.
///
/// Rejects empty names, `.`/`..`, absolute paths, separators and NUL, so a
/// resolved path can never leave the directory it is joined to.
pub fn sanitize_filename(name: &str) -> Result<&str, StorageError> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidPath(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(StorageError::InvalidPath(name.to_string())),
    }
}
