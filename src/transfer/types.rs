use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::transfer::TransferError;
use crate::transfer::metadata::METADATA_FILE_NAME;

/// Whether the source file is kept or removed after transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Copy,
    Move,
}

/// A named unit of work: files that end up in one destination directory.
///
/// The destination is `root/category/name`, with an extra `partition`
/// directory level for series seasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferGroup {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// Source file names relative to the source root, in plan order.
    #[serde(default)]
    pub files: Vec<String>,
}

/// A single file copy or move handed to a worker.
#[derive(Debug, Clone)]
pub struct TransferTask {
    /// File name as listed in the plan, used as the record key.
    pub(crate) file_name: String,
    pub(crate) source: PathBuf,
    pub(crate) destination: PathBuf,
    pub(crate) operation: OperationKind,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }

    /// Present participle for progress labels and summaries.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Copy => "Copying",
            Self::Move => "Moving",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            other => anyhow::bail!("Unknown operation '{other}', expected 'copy' or 'move'"),
        }
    }
}

impl TransferGroup {
    pub fn new(name: impl Into<String>, category: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            partition: None,
            files,
        }
    }

    /// Set the partition (season) directory for this group.
    #[must_use]
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    #[must_use]
    pub const fn is_series(&self) -> bool {
        self.partition.is_some()
    }

    /// Group root without the partition level: `root/category/name`.
    #[must_use]
    pub fn group_root(&self, destination_root: &Path) -> PathBuf {
        destination_root.join(&self.category).join(&self.name)
    }

    /// Directory the group's files and sidecar are written to.
    #[must_use]
    pub fn destination_dir(&self, destination_root: &Path) -> PathBuf {
        let root = self.group_root(destination_root);
        match &self.partition {
            Some(partition) => root.join(partition),
            None => root,
        }
    }

    /// Label used for progress bars and log lines.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.partition {
            Some(partition) => format!("{} / {partition}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for TransferGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ({} files)", self.label(), self.category, self.files.len())
    }
}

impl TransferTask {
    #[must_use]
    pub fn new(file_name: &str, source_root: &Path, destination_dir: &Path, operation: OperationKind) -> Self {
        Self {
            file_name: file_name.to_string(),
            source: source_root.join(file_name),
            destination: destination_dir.join(file_name),
            operation,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Check that a plan file name stays inside the source and destination roots.
pub fn validate_file_name(file_name: &str) -> Result<(), TransferError> {
    let path = Path::new(file_name);
    if file_name.trim().is_empty() || path.file_name().is_none() {
        return Err(TransferError::InvalidPath(file_name.to_string()));
    }
    let escapes = path
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes || path.file_name().is_some_and(|name| name == METADATA_FILE_NAME) {
        return Err(TransferError::InvalidPath(file_name.to_string()));
    }
    Ok(())
}

/// Check that group name, category and partition are each one plain directory name.
pub fn validate_group(group: &TransferGroup) -> Result<(), TransferError> {
    match invalid_group_field(group) {
        Some(value) => Err(TransferError::InvalidPath(value.to_string())),
        None => Ok(()),
    }
}

/// First of category, name and partition that is not a single normal path component.
pub(crate) fn invalid_group_field(group: &TransferGroup) -> Option<&str> {
    [Some(group.category.as_str()), Some(group.name.as_str()), group.partition.as_deref()]
        .into_iter()
        .flatten()
        .find(|value| !is_single_component(value))
}

fn is_single_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.trim().is_empty()
}

/// Split tasks into those with a destination of their own and later ones
/// that would overwrite an earlier task's destination.
pub(crate) fn split_duplicate_destinations(tasks: Vec<TransferTask>) -> (Vec<TransferTask>, Vec<TransferTask>) {
    let mut claimed: HashSet<PathBuf> = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .partition(|task| claimed.insert(task.destination.clone()))
}
