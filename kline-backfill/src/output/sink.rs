//! Output file preparation.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::SinkError;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "out";

/// Default output file name.
pub const DEFAULT_FILE_NAME: &str = "historical_data.csv";

/// Resolve `<dir>/<file_name>`.
pub fn output_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(file_name)
}

/// Create the output directory if needed, then open the file for writing,
/// creating it if missing and truncating any previous content.
pub fn open_truncated(path: &Path) -> Result<File, SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    debug!(path = %path.display(), "opened output file");
    Ok(file)
}
