//! Reads of the on-disk documents that feed the prompt.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::DriverError;

/// Read a document the run cannot start without.
pub fn read_required(label: &'static str, path: &Path) -> Result<String, DriverError> {
    fs::read_to_string(path).map_err(|source| DriverError::RequiredFile {
        label,
        path: path.to_path_buf(),
        source,
    })
}

/// Read the progress log. A missing file is a fresh run and reads as empty.
pub fn read_progress(path: &Path) -> Result<String, DriverError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "progress log not found, using empty progress");
            Ok(String::new())
        }
        Err(source) => Err(DriverError::ProgressRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}
