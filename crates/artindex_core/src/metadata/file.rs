//! Metadata documents on disk.

use super::ArtifactMetadata;
use crate::error::{CoreError, CoreResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// File name of the metadata document inside an artifact directory.
pub const METADATA_FILE_NAME: &str = "artifact-metadata.json";

/// Temporary file used for atomic replacement.
const METADATA_TEMP: &str = ".artifact-metadata.json.tmp";

/// Reads the metadata document of the artifact directory `dir`.
///
/// # Errors
///
/// Returns an I/O error if the file exists but cannot be read, or a
/// serialization error if it is not a metadata document.
pub fn read_metadata(dir: &Path) -> CoreResult<Option<ArtifactMetadata>> {
    let data = match fs::read(dir.join(METADATA_FILE_NAME)) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| CoreError::serialization(format!("{}: {e}", dir.display())))
}

/// Writes `metadata` into the artifact directory `dir`.
///
/// The document is written to a temporary file and renamed over the old one.
/// Returns `false` without writing when the stored document is identical.
///
/// # Errors
///
/// Returns an I/O error if the document cannot be written.
pub fn write_metadata(dir: &Path, metadata: &ArtifactMetadata) -> CoreResult<bool> {
    let mut data = serde_json::to_vec_pretty(metadata)
        .map_err(|e| CoreError::serialization(e.to_string()))?;
    data.push(b'\n');

    let path = dir.join(METADATA_FILE_NAME);
    if fs::read(&path).is_ok_and(|existing| existing == data) {
        return Ok(false);
    }

    fs::create_dir_all(dir)?;
    let temp_path = dir.join(METADATA_TEMP);
    let mut file = File::create(&temp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, &path)?;
    Ok(true)
}

/// Removes the metadata document of `dir`. Returns whether one existed.
///
/// # Errors
///
/// Returns an I/O error if the document exists but cannot be removed.
pub fn remove_metadata(dir: &Path) -> CoreResult<bool> {
    match fs::remove_file(dir.join(METADATA_FILE_NAME)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Writes `metadata`, or removes the document when no version remains.
/// Returns whether the file changed.
///
/// # Errors
///
/// Returns an I/O error if the document cannot be written or removed.
pub fn store_metadata(dir: &Path, metadata: &ArtifactMetadata) -> CoreResult<bool> {
    if metadata.is_empty() {
        remove_metadata(dir)
    } else {
        write_metadata(dir, metadata)
    }
}
