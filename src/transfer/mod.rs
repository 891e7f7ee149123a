//! Verified, bounded-parallel copy and move of grouped media files.
//!
//! A plan is a list of [`TransferGroup`]s. The [`TransferEngine`] copies or
//! moves each group into `destination/category/name[/partition]`, checksums
//! the results, and writes a JSON sidecar describing what was transferred.

mod checksum;
mod chunked;
mod engine;
mod error;
mod metadata;
mod progress;
mod subtitles;
mod types;
mod verify;

pub use checksum::{CHECKSUM_BLOCK_SIZE, Checksums, calculate_checksums};
pub use chunked::{TRANSFER_CHUNK_SIZE, copy_file_chunked, transfer_file};
pub use engine::{
    DEFAULT_WORKERS, EngineConfig, FileListener, GroupState, GroupSummary, StateListener, TransferEngine,
    TransferFailure, TransferReport,
};
pub use error::TransferError;
pub use metadata::{FileRecord, GroupRecord, METADATA_FILE_NAME, load_metadata, metadata_path, save_metadata};
pub use progress::{GroupProgress, NoProgress, ProgressSink};
pub use subtitles::{SUBTITLES_DIR_NAME, SubtitleReport};
pub use types::{OperationKind, TransferGroup, TransferTask, validate_file_name, validate_group};
pub use verify::{AuditReport, Verification, audit_directory, audit_tree, verify_file_integrity};
