use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::transfer::TransferError;
use crate::transfer::chunked::transfer_file;
use crate::transfer::metadata::{FileRecord, GroupRecord, save_metadata};
use crate::transfer::progress::GroupProgress;
use crate::transfer::types::{
    OperationKind, TransferGroup, TransferTask, invalid_group_field, split_duplicate_destinations, validate_file_name,
};

/// Default number of parallel file transfers.
pub const DEFAULT_WORKERS: usize = 4;

/// Callback invoked whenever a group changes state.
pub type StateListener = Box<dyn Fn(&TransferGroup, GroupState) + Send + Sync>;

/// Callback invoked from a worker after each file finishes, with the error if it failed.
pub type FileListener = Box<dyn Fn(&TransferGroup, &str, Option<&TransferError>) + Send + Sync>;

/// Settings fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker pool size, must be at least one.
    pub workers: usize,
    /// Checksum files and verify moves before deleting sources.
    pub verify_integrity: bool,
    /// Render a byte progress bar per group.
    pub show_progress: bool,
    pub verbose: bool,
}

/// Processing state of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    InProgress,
    Completed,
    PartiallyFailed,
}

/// A file that could not be transferred.
#[derive(Debug)]
pub struct TransferFailure {
    pub file_name: String,
    pub group_name: String,
    pub error: TransferError,
}

/// Final state and byte counts for one group of the plan.
#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub name: String,
    pub partition: Option<String>,
    pub destination: PathBuf,
    pub state: GroupState,
    pub file_count: usize,
    pub succeeded: usize,
    pub total_bytes: u64,
    pub completed_bytes: u64,
    /// Sidecar written for this group, if any.
    pub metadata_file: Option<PathBuf>,
}

/// Everything one `transfer` call produced.
///
/// Every file of every group is either in one of the `records` or in `failures`.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub operation: OperationKind,
    pub records: Vec<GroupRecord>,
    pub failures: Vec<TransferFailure>,
    /// Sidecar write failures. The files themselves were transferred.
    pub metadata_errors: Vec<TransferError>,
    pub groups: Vec<GroupSummary>,
    pub cancelled: bool,
}

/// Bounded-parallel copy/move engine.
///
/// Groups are processed one after another in plan order. The files of a
/// group are spread over a fixed-size worker pool and the engine waits for
/// all of them before writing the group's sidecar and moving on.
pub struct TransferEngine {
    config: EngineConfig,
    pool: ThreadPool,
    cancel_flag: Arc<AtomicBool>,
    state_listener: Option<StateListener>,
    file_listener: Option<FileListener>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            verify_integrity: true,
            show_progress: false,
            verbose: false,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub const fn with_verify_integrity(mut self, verify_integrity: bool) -> Self {
        self.verify_integrity = verify_integrity;
        self
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially failed",
        };
        write!(f, "{state}")
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}: {}", self.group_name, self.file_name, self.error)
    }
}

impl GroupSummary {
    /// True when the group had files and none of them made it.
    #[must_use]
    pub const fn all_failed(&self) -> bool {
        self.file_count > 0 && self.succeeded == 0
    }
}

impl TransferReport {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.records.iter().map(|record| record.files.len()).sum()
    }

    #[must_use]
    pub const fn failed_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn transferred_bytes(&self) -> u64 {
        self.records.iter().map(GroupRecord::total_bytes).sum()
    }

    /// Some files failed or a sidecar could not be written.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        !self.failures.is_empty() || !self.metadata_errors.is_empty()
    }

    /// At least one group with files ended up with nothing transferred.
    #[must_use]
    pub fn has_fully_failed_group(&self) -> bool {
        self.groups.iter().any(GroupSummary::all_failed)
    }

    /// Failures belonging to the named group.
    pub fn failures_for<'a>(&'a self, group_name: &'a str) -> impl Iterator<Item = &'a TransferFailure> + 'a {
        self.failures
            .iter()
            .filter(move |failure| failure.group_name == group_name)
    }
}

impl TransferEngine {
    /// Create an engine with its own worker pool.
    pub fn new(config: EngineConfig) -> Result<Self, TransferError> {
        let workers = config.workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("transfer-worker-{index}"))
            .build()?;
        Ok(Self {
            config: EngineConfig { workers, ..config },
            pool,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            state_listener: None,
            file_listener: None,
        })
    }

    /// Register a callback for group state changes.
    #[must_use]
    pub fn with_state_listener(mut self, listener: StateListener) -> Self {
        self.state_listener = Some(listener);
        self
    }

    /// Register a callback for finished files.
    #[must_use]
    pub fn with_file_listener(mut self, listener: FileListener) -> Self {
        self.file_listener = Some(listener);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared flag that stops dispatching new files once set.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Request cancellation. Files already being transferred finish normally.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Copy or move every group of the plan from `source_root` into `destination_root`.
    ///
    /// Per-file errors end up in the report. Only a destination root that
    /// cannot be created or written aborts the whole run.
    pub fn transfer(
        &self,
        plan: &[TransferGroup],
        source_root: &Path,
        destination_root: &Path,
        operation: OperationKind,
    ) -> Result<TransferReport, TransferError> {
        ensure_writable_root(destination_root)?;

        let mut report = TransferReport {
            operation,
            ..TransferReport::default()
        };

        for group in plan {
            self.notify(group, GroupState::Pending);
        }

        for group in plan {
            if self.is_cancelled() {
                report.cancelled = true;
                self.skip_group(group, source_root, destination_root, &mut report);
                continue;
            }
            self.transfer_group(group, source_root, destination_root, operation, &mut report);
        }

        report.cancelled |= self.is_cancelled();
        Ok(report)
    }

    /// Run all tasks of one group on the worker pool and persist its record.
    fn transfer_group(
        &self,
        group: &TransferGroup,
        source_root: &Path,
        destination_root: &Path,
        operation: OperationKind,
        report: &mut TransferReport,
    ) {
        let destination = group.destination_dir(destination_root);
        let file_names: Vec<&String> = group.files.iter().unique().collect();

        if let Some(invalid) = invalid_group_field(group) {
            self.reject_group(group, &file_names, invalid, destination, report);
            return;
        }

        let mut tasks = Vec::with_capacity(file_names.len());
        for file_name in &file_names {
            match validate_file_name(file_name) {
                Ok(()) => tasks.push(TransferTask::new(file_name, source_root, &destination, operation)),
                Err(error) => report.failures.push(TransferFailure {
                    file_name: (*file_name).clone(),
                    group_name: group.name.clone(),
                    error,
                }),
            }
        }

        let (tasks, duplicates) = split_duplicate_destinations(tasks);
        for task in duplicates {
            report.failures.push(TransferFailure {
                file_name: task.file_name,
                group_name: group.name.clone(),
                error: TransferError::DuplicateDestination(task.destination),
            });
        }

        let total_bytes: u64 = tasks
            .iter()
            .filter_map(|task| fs::metadata(task.source()).ok())
            .filter(fs::Metadata::is_file)
            .map(|metadata| metadata.len())
            .sum();

        if self.config.verbose {
            println!(
                "{} {} ({}) -> {}",
                operation.verb(),
                group.label(),
                crate::format_size(total_bytes),
                destination.display()
            );
        }

        let progress = GroupProgress::new(&group.label(), total_bytes, self.config.show_progress);
        if !tasks.is_empty() {
            self.notify(group, GroupState::InProgress);
        }

        let verify_integrity = self.config.verify_integrity;
        let cancel_flag = &self.cancel_flag;
        let results: Vec<(String, Result<FileRecord, TransferError>)> = self.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let result = if cancel_flag.load(Ordering::SeqCst) {
                        Err(TransferError::Cancelled(task.source().to_path_buf()))
                    } else {
                        let result = transfer_file(task, verify_integrity, &progress);
                        self.notify_file(group, task.file_name(), result.as_ref().err());
                        result
                    };
                    (task.file_name().to_string(), result)
                })
                .collect()
        });
        progress.finish();

        let mut files = BTreeMap::new();
        for (file_name, result) in results {
            match result {
                Ok(record) => {
                    files.insert(file_name, record);
                }
                Err(error) => {
                    if self.config.verbose {
                        crate::print_error!("{}: {error}", group.label());
                    }
                    report.failures.push(TransferFailure {
                        file_name,
                        group_name: group.name.clone(),
                        error,
                    });
                }
            }
        }

        let succeeded = files.len();
        let state = if succeeded == file_names.len() {
            GroupState::Completed
        } else {
            GroupState::PartiallyFailed
        };

        let mut metadata_file = None;
        if !files.is_empty() {
            let record = GroupRecord::new(group, operation, files);
            match save_metadata(&record, &destination) {
                Ok(path) => metadata_file = Some(path),
                Err(error) => {
                    crate::print_warning!("{error}");
                    report.metadata_errors.push(error);
                }
            }
            report.records.push(record);
        }

        self.notify(group, state);
        report.groups.push(GroupSummary {
            name: group.name.clone(),
            partition: group.partition.clone(),
            destination,
            state,
            file_count: file_names.len(),
            succeeded,
            total_bytes,
            completed_bytes: progress.completed_bytes(),
            metadata_file,
        });
    }

    /// Run `op` inside the engine's worker pool.
    pub(crate) fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    fn notify(&self, group: &TransferGroup, state: GroupState) {
        if let Some(listener) = &self.state_listener {
            listener(group, state);
        }
    }

    fn notify_file(&self, group: &TransferGroup, file_name: &str, error: Option<&TransferError>) {
        if let Some(listener) = &self.file_listener {
            listener(group, file_name, error);
        }
    }

    /// Fail every file of a group whose directory fields are not usable.
    fn reject_group(
        &self,
        group: &TransferGroup,
        file_names: &[&String],
        invalid: &str,
        destination: PathBuf,
        report: &mut TransferReport,
    ) {
        crate::print_error!("Skipping group {}: invalid directory name '{invalid}'", group.label());
        for file_name in file_names {
            report.failures.push(TransferFailure {
                file_name: (*file_name).clone(),
                group_name: group.name.clone(),
                error: TransferError::InvalidPath(invalid.to_string()),
            });
        }
        self.notify(group, GroupState::PartiallyFailed);
        report.groups.push(GroupSummary {
            name: group.name.clone(),
            partition: group.partition.clone(),
            destination,
            state: GroupState::PartiallyFailed,
            file_count: file_names.len(),
            succeeded: 0,
            total_bytes: 0,
            completed_bytes: 0,
            metadata_file: None,
        });
    }

    /// Record every file of a group that was never started as cancelled.
    fn skip_group(
        &self,
        group: &TransferGroup,
        source_root: &Path,
        destination_root: &Path,
        report: &mut TransferReport,
    ) {
        let file_names: Vec<&String> = group.files.iter().unique().collect();
        for file_name in &file_names {
            report.failures.push(TransferFailure {
                file_name: (*file_name).clone(),
                group_name: group.name.clone(),
                error: TransferError::Cancelled(source_root.join(file_name)),
            });
        }
        if self.config.verbose {
            crate::print_warning!("Skipped {}: cancelled", group.label());
        }
        report.groups.push(GroupSummary {
            name: group.name.clone(),
            partition: group.partition.clone(),
            destination: group.destination_dir(destination_root),
            state: GroupState::Pending,
            file_count: file_names.len(),
            succeeded: 0,
            total_bytes: 0,
            completed_bytes: 0,
            metadata_file: None,
        });
    }
}

/// Make sure the destination root exists and accepts new entries.
fn ensure_writable_root(destination_root: &Path) -> Result<(), TransferError> {
    let unavailable = |source: std::io::Error| TransferError::DestinationUnavailable {
        path: destination_root.to_path_buf(),
        source,
    };

    fs::create_dir_all(destination_root).map_err(unavailable)?;
    let metadata = fs::metadata(destination_root).map_err(unavailable)?;
    if !metadata.is_dir() {
        return Err(unavailable(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    if metadata.permissions().readonly() {
        return Err(unavailable(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )));
    }
    Ok(())
}
