use std::path::{Path, PathBuf};

use crate::error::ControlError;

/// File name used when no control path is configured.
pub const DEFAULT_CONTROL_FILE: &str = ".alsaequal.bin";

/// Resolves a configured control path. Relative paths live in the user's home
/// directory; absolute paths are used as given.
pub fn resolve_control_path(path: impl AsRef<Path>) -> Result<PathBuf, ControlError> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    dirs::home_dir()
        .map(|home| home.join(path))
        .ok_or_else(|| ControlError::NoHomeDirectory {
            path: path.to_path_buf(),
        })
}
