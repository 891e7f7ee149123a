use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::transfer::TransferError;
use crate::transfer::checksum::{Checksums, calculate_checksums};
use crate::transfer::metadata::{FileRecord, METADATA_FILE_NAME, load_metadata};

/// Outcome of comparing a file against an expected [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Missing,
    SizeMismatch { expected: u64, actual: u64 },
    Md5Mismatch { expected: String, actual: String },
    Sha256Mismatch { expected: String, actual: String },
    /// The file could not be read during an audit.
    Unreadable(String),
}

/// Result of checking one group directory against its sidecar.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub directory: PathBuf,
    pub group_name: String,
    pub verified: Vec<String>,
    pub problems: Vec<(String, Verification)>,
}

impl Verification {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Missing => write!(f, "file is missing"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected} bytes, found {actual} bytes")
            }
            Self::Md5Mismatch { expected, actual } => {
                write!(f, "MD5 mismatch: expected {expected}, found {actual}")
            }
            Self::Sha256Mismatch { expected, actual } => {
                write!(f, "SHA-256 mismatch: expected {expected}, found {actual}")
            }
            Self::Unreadable(reason) => write!(f, "unreadable: {reason}"),
        }
    }
}

impl AuditReport {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Compare a file on disk against previously captured size and digests.
///
/// Digests are only computed when the expected record has at least one,
/// and only after the size already matches. Never modifies the file.
pub fn verify_file_integrity(path: &Path, expected: &FileRecord) -> Result<Verification, TransferError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Ok(Verification::Missing),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Verification::Missing),
        Err(error) => return Err(TransferError::io(path, error)),
    };

    if metadata.len() != expected.size_bytes {
        return Ok(Verification::SizeMismatch {
            expected: expected.size_bytes,
            actual: metadata.len(),
        });
    }

    if !expected.has_checksums() {
        return Ok(Verification::Verified);
    }

    let actual = calculate_checksums(path)?;
    Ok(compare_checksums(expected, &actual))
}

/// Compare computed digests against the ones a record carries.
fn compare_checksums(expected: &FileRecord, actual: &Checksums) -> Verification {
    if let Some(md5) = &expected.md5
        && *md5 != actual.md5
    {
        return Verification::Md5Mismatch {
            expected: md5.clone(),
            actual: actual.md5.clone(),
        };
    }
    if let Some(sha256) = &expected.sha256
        && *sha256 != actual.sha256
    {
        return Verification::Sha256Mismatch {
            expected: sha256.clone(),
            actual: actual.sha256.clone(),
        };
    }
    Verification::Verified
}

/// Verify every file listed in the sidecar of `directory`.
///
/// Returns `None` if the directory has no readable sidecar.
/// A file that cannot be read is recorded as [`Verification::Unreadable`].
#[must_use]
pub fn audit_directory(directory: &Path) -> Option<AuditReport> {
    let record = load_metadata(directory)?;

    let mut verified = Vec::new();
    let mut problems = Vec::new();
    for (file_name, file_record) in &record.files {
        match verify_file_integrity(&directory.join(file_name), file_record) {
            Ok(Verification::Verified) => verified.push(file_name.clone()),
            Ok(problem) => problems.push((file_name.clone(), problem)),
            Err(error) => problems.push((file_name.clone(), Verification::Unreadable(error.to_string()))),
        }
    }

    Some(AuditReport {
        directory: directory.to_path_buf(),
        group_name: record.name,
        verified,
        problems,
    })
}

/// Audit every directory under `root` that contains a sidecar file.
#[must_use]
pub fn audit_tree(root: &Path) -> Vec<AuditReport> {
    let mut directories: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == METADATA_FILE_NAME)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();
    directories.sort();

    directories
        .iter()
        .filter_map(|directory| audit_directory(directory))
        .collect()
}
