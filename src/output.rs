//! Output path resolution and atomic artifact writes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::ReportError;

/// Returns `requested`, or a fresh unique name inside `reports_dir`.
///
/// Generated names look like `report-20240131-093000-1a2b3c4d.pdf`; the random
/// suffix keeps concurrent calls within the same second apart.
pub fn resolve_output_path(
    requested: Option<&Path>,
    reports_dir: &Path,
    now: DateTime<Local>,
) -> PathBuf {
    match requested {
        Some(path) => path.to_path_buf(),
        None => {
            let suffix = Uuid::new_v4().simple().to_string();
            reports_dir.join(format!(
                "report-{}-{}.pdf",
                now.format("%Y%m%d-%H%M%S"),
                &suffix[..8]
            ))
        }
    }
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
///
/// Readers never observe a partially written file, and nothing is left behind
/// when any step fails.  Returns the absolute path of the artifact.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|err| ReportError::io(path, err))?;

    let mut file = NamedTempFile::new_in(&parent).map_err(|err| ReportError::io(path, err))?;
    file.write_all(bytes)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|err| ReportError::io(path, err))?;
    file.persist(path)
        .map_err(|err| ReportError::io(path, err.error))?;

    let written = fs::canonicalize(path).map_err(|err| ReportError::io(path, err))?;
    debug!("persisted {} byte(s) to {}", bytes.len(), written.display());
    Ok(written)
}
