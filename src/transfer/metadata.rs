//! Per-file and per-group transfer records, and the sidecar file they are stored in.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::print_warning;
use crate::transfer::TransferError;
use crate::transfer::checksum::{Checksums, calculate_checksums};
use crate::transfer::types::{OperationKind, TransferGroup};

/// Reserved sidecar file name written into every group destination directory.
pub const METADATA_FILE_NAME: &str = ".media_transfer.json";

/// Result of transferring one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Everything that was transferred for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub category: String,
    pub is_series: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    pub files: BTreeMap<String, FileRecord>,
    pub created_at: DateTime<Utc>,
    pub operation: OperationKind,
}

impl FileRecord {
    /// Build a record from the file's current size and modification time,
    /// optionally computing checksums.
    pub fn from_path(file_name: &str, path: &Path, with_checksums: bool) -> Result<Self, TransferError> {
        let checksums = if with_checksums {
            Some(calculate_checksums(path)?)
        } else {
            None
        };
        Self::with_checksums(file_name, path, checksums)
    }

    /// Build a record from the file's metadata using already known checksums.
    pub fn with_checksums(file_name: &str, path: &Path, checksums: Option<Checksums>) -> Result<Self, TransferError> {
        let metadata = fs::metadata(path).map_err(|e| TransferError::io(path, e))?;
        let modified = metadata.modified().map_err(|e| TransferError::io(path, e))?;
        let (md5, sha256) = checksums.map_or((None, None), |c| (Some(c.md5), Some(c.sha256)));
        Ok(Self {
            file_name: file_name.to_string(),
            size_bytes: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
            md5,
            sha256,
        })
    }

    #[must_use]
    pub const fn has_checksums(&self) -> bool {
        self.md5.is_some() || self.sha256.is_some()
    }
}

impl GroupRecord {
    /// New record for a finished group, timestamped now.
    #[must_use]
    pub fn new(group: &TransferGroup, operation: OperationKind, files: BTreeMap<String, FileRecord>) -> Self {
        Self {
            name: group.name.clone(),
            category: group.category.clone(),
            is_series: group.is_series(),
            partition: group.partition.clone(),
            files,
            created_at: Utc::now(),
            operation,
        }
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|record| record.size_bytes).sum()
    }
}

/// Path of the sidecar file inside `directory`.
#[must_use]
pub fn metadata_path(directory: &Path) -> PathBuf {
    directory.join(METADATA_FILE_NAME)
}

/// Write the record as the sidecar file in `directory`, replacing any existing one.
///
/// The JSON goes to a temporary file first and is renamed into place.
pub fn save_metadata(record: &GroupRecord, directory: &Path) -> Result<PathBuf, TransferError> {
    let path = metadata_path(directory);
    let metadata_error = |reason: String| TransferError::Metadata {
        path: path.clone(),
        reason,
    };

    fs::create_dir_all(directory).map_err(|e| metadata_error(e.to_string()))?;
    let json = serde_json::to_string_pretty(record).map_err(|e| metadata_error(e.to_string()))?;

    let temp_path = directory.join(format!("{METADATA_FILE_NAME}.tmp"));
    let write_result = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    });
    if let Err(error) = write_result.and_then(|()| fs::rename(&temp_path, &path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(metadata_error(error.to_string()));
    }

    Ok(path)
}

/// Read the sidecar file from `directory`.
///
/// Returns `None` when the file is missing or cannot be parsed.
#[must_use]
pub fn load_metadata(directory: &Path) -> Option<GroupRecord> {
    let path = metadata_path(directory);
    if !path.is_file() {
        return None;
    }
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) => {
            print_warning!("Failed to read metadata file {}: {error}", path.display());
            return None;
        }
    };
    match serde_json::from_str::<GroupRecord>(&content) {
        Ok(record) => Some(record),
        Err(error) => {
            print_warning!("Ignoring malformed metadata file {}: {error}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod metadata_tests {
    use super::*;

    use tempfile::tempdir;

    fn sample_record() -> GroupRecord {
        let group = TransferGroup::new("Alpha", "Anime", vec![]).with_partition("Alpha Season 1");
        let mut files = BTreeMap::new();
        files.insert(
            "Alpha_S01_E01.mkv".to_string(),
            FileRecord {
                file_name: "Alpha_S01_E01.mkv".to_string(),
                size_bytes: 1_234_567,
                modified: Utc::now(),
                md5: Some("5eb63bbbe01eeed093cb22bb8f5acdc3".to_string()),
                sha256: Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9".to_string()),
            },
        );
        files.insert(
            "Alpha_S01_E02.mkv".to_string(),
            FileRecord {
                file_name: "Alpha_S01_E02.mkv".to_string(),
                size_bytes: 42,
                modified: Utc::now(),
                md5: None,
                sha256: None,
            },
        );
        GroupRecord::new(&group, OperationKind::Move, files)
    }

    #[test]
    fn save_then_load_reproduces_record() {
        let dir = tempdir().unwrap();
        let record = sample_record();

        let path = save_metadata(&record, dir.path()).unwrap();
        assert_eq!(path, dir.path().join(METADATA_FILE_NAME));

        let loaded = load_metadata(dir.path()).expect("metadata should load");
        assert_eq!(loaded, record);
        assert!(loaded.is_series);
        assert_eq!(loaded.total_bytes(), 1_234_567 + 42);
    }

    #[test]
    fn save_overwrites_existing_sidecar() {
        let dir = tempdir().unwrap();
        let mut record = sample_record();
        save_metadata(&record, dir.path()).unwrap();

        record.operation = OperationKind::Copy;
        record.files.remove("Alpha_S01_E02.mkv");
        save_metadata(&record, dir.path()).unwrap();

        let loaded = load_metadata(dir.path()).unwrap();
        assert_eq!(loaded.operation, OperationKind::Copy);
        assert_eq!(loaded.files.len(), 1);
        assert!(!dir.path().join(format!("{METADATA_FILE_NAME}.tmp")).exists());
    }

    #[test]
    fn sidecar_is_human_readable_json() {
        let dir = tempdir().unwrap();
        save_metadata(&sample_record(), dir.path()).unwrap();
        let content = fs::read_to_string(metadata_path(dir.path())).unwrap();
        assert!(content.contains("\"name\": \"Alpha\""));
        assert!(content.contains("\"category\": \"Anime\""));
        assert!(content.contains("\"operation\": \"move\""));
        assert!(content.contains("\"sha256\""));
    }

    #[test]
    fn load_missing_sidecar_returns_none() {
        let dir = tempdir().unwrap();
        assert!(load_metadata(dir.path()).is_none());
    }

    #[test]
    fn load_malformed_sidecar_returns_none() {
        let dir = tempdir().unwrap();
        fs::write(metadata_path(dir.path()), "{ this is not json").unwrap();
        assert!(load_metadata(dir.path()).is_none());

        fs::write(metadata_path(dir.path()), r#"{"name": "Alpha"}"#).unwrap();
        assert!(load_metadata(dir.path()).is_none());
    }

    #[test]
    fn save_into_unwritable_location_is_metadata_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"file").unwrap();

        let result = save_metadata(&sample_record(), &blocker);
        assert!(matches!(result, Err(TransferError::Metadata { .. })));
    }

    #[test]
    fn file_record_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("movie.mp4");
        fs::write(&path, b"hello world").unwrap();

        let record = FileRecord::from_path("movie.mp4", &path, true).unwrap();
        assert_eq!(record.size_bytes, 11);
        assert_eq!(record.md5.as_deref(), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert!(record.has_checksums());

        let record = FileRecord::from_path("movie.mp4", &path, false).unwrap();
        assert!(!record.has_checksums());
    }
}
