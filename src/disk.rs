//! Disk primitives
//!
//! Thin wrappers over `std::fs` used by every store. Errors are mapped so that
//! callers can tell "already there" and "not there" apart from real I/O
//! failures:
//!
//! | operation          | path exists        | path missing       |
//! |--------------------|--------------------|--------------------|
//! | `create_*`         | `AlreadyExists`    | ok / `Io` (parent) |
//! | `read_*`, `delete_*` | ok               | `NotFound`         |
//! | `write_*`          | ok (atomic swap)   | `NotFound`         |

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ShelfError};

/// Suffix of the scratch file used by `write_file`
pub(crate) const TMP_SUFFIX: &str = ".tmp";

// =============================================================================
// Directories
// =============================================================================

/// Create a single directory; the parent must already exist
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir(path).map_err(|e| on_create(e, path))
}

/// Remove a directory and everything below it
pub fn delete_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| on_lookup(e, path))
}

/// List entry names in a directory, sorted
///
/// Scratch files left behind by an interrupted `write_file` are skipped.
pub fn list_dir(path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| on_lookup(e, path))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.ends_with(TMP_SUFFIX) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

// =============================================================================
// Files
// =============================================================================

/// Create a new file holding `data`; fails if the file exists
pub fn create_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| on_create(e, path))?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

/// Read a whole file
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| on_lookup(e, path))
}

/// Replace the content of an existing file
///
/// The new bytes go to a sibling scratch file which is then renamed over the
/// target, so readers see either the old or the new content.
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if !path.is_file() {
        return Err(ShelfError::NotFound(path.display().to_string()));
    }

    let tmp = scratch_path(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Delete a file
pub fn delete_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| on_lookup(e, path))
}

// =============================================================================
// JSON helpers
// =============================================================================

/// Create a new file holding `value` as JSON
pub fn create_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    create_file(path, &serde_json::to_vec(value)?)
}

/// Read a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_file(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Replace the content of an existing JSON file
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_file(path, &serde_json::to_vec(value)?)
}

// =============================================================================
// Private Helpers
// =============================================================================

fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

fn on_create(e: std::io::Error, path: &Path) -> ShelfError {
    match e.kind() {
        ErrorKind::AlreadyExists => ShelfError::AlreadyExists(path.display().to_string()),
        _ => ShelfError::Io(e),
    }
}

fn on_lookup(e: std::io::Error, path: &Path) -> ShelfError {
    match e.kind() {
        ErrorKind::NotFound => ShelfError::NotFound(path.display().to_string()),
        _ => ShelfError::Io(e),
    }
}
