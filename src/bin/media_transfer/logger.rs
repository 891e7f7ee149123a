use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use media_transfer::transfer::{GroupState, SubtitleReport, TransferGroup, TransferReport};

use crate::config::Config;
use crate::stats::RunStats;

/// Buffered log file for one transfer run
pub struct FileLogger {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileLogger {
    /// Create a new file logger, writing to ~/logs/media-transfer/transfer_<timestamp>.log
    pub(crate) fn new() -> Result<Self> {
        let log_dir = media_transfer::config::LOG_DIR
            .as_deref()
            .context("Failed to get home directory")?;
        Self::in_directory(log_dir)
    }

    pub(crate) fn in_directory(log_dir: &Path) -> Result<Self> {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }

        let log_path = log_dir.join(format!("transfer_{}.log", Local::now().format("%Y-%m-%d_%H-%M-%S")));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: log_path,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log the resolved run settings
    pub(crate) fn log_init(&mut self, config: &Config, source: &Path, destination: &Path, group_count: usize) {
        let _ = writeln!(
            self.writer,
            "[{}] INIT {} \"{}\" -> \"{}\"",
            Self::timestamp(),
            config.operation.as_str().to_uppercase(),
            source.display(),
            destination.display()
        );
        if let Some(plan) = &config.plan {
            let _ = writeln!(self.writer, "  plan: {}", plan.display());
        }
        let _ = writeln!(self.writer, "  groups: {group_count}");
        let _ = writeln!(self.writer, "  workers: {}", config.workers);
        let _ = writeln!(self.writer, "  verify: {}", config.verify);
        let _ = writeln!(self.writer, "  verbose: {}", config.verbose);
        let _ = self.writer.flush();
    }

    /// Log a group state change reported by the engine
    pub(crate) fn log_group_state(&mut self, group: &TransferGroup, state: GroupState) {
        if state == GroupState::Pending {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[{}] GROUP   {state} - \"{}\" [{}] ({} files)",
            Self::timestamp(),
            group.label(),
            group.category,
            group.files.len()
        );
        let _ = self.writer.flush();
    }

    /// Log every transferred file, failure, and sidecar problem
    pub(crate) fn log_report(&mut self, report: &TransferReport) {
        let operation = report.operation.as_str().to_uppercase();
        for record in &report.records {
            for file in record.files.values() {
                let _ = writeln!(
                    self.writer,
                    "[{}] SUCCESS {operation} - \"{}\" | {} | {}",
                    Self::timestamp(),
                    file.file_name,
                    record.name,
                    media_transfer::format_size(file.size_bytes)
                );
            }
        }
        for failure in &report.failures {
            let _ = writeln!(
                self.writer,
                "[{}] ERROR   {operation} - \"{}\" | {} | {}: {}",
                Self::timestamp(),
                failure.file_name,
                failure.group_name,
                failure.error.kind(),
                failure.error
            );
        }
        for error in &report.metadata_errors {
            let _ = writeln!(self.writer, "[{}] METADATA {error}", Self::timestamp());
        }
        let _ = self.writer.flush();
    }

    /// Log subtitle transfer results
    pub(crate) fn log_subtitles(&mut self, report: &SubtitleReport) {
        for file in &report.transferred {
            let _ = writeln!(
                self.writer,
                "[{}] SUCCESS SUBTITLE - \"{}\" | {}",
                Self::timestamp(),
                file.file_name,
                media_transfer::format_size(file.size_bytes)
            );
        }
        for failure in &report.failures {
            let _ = writeln!(
                self.writer,
                "[{}] ERROR   SUBTITLE - \"{}\" | {} | {}: {}",
                Self::timestamp(),
                failure.file_name,
                failure.group_name,
                failure.error.kind(),
                failure.error
            );
        }
        let _ = self.writer.flush();
    }

    /// Log final statistics
    pub(crate) fn log_stats(&mut self, stats: &RunStats) {
        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Groups completed: {}", stats.groups_completed);
        let _ = writeln!(self.writer, "  Groups partial:   {}", stats.groups_partial);
        let _ = writeln!(self.writer, "  Groups skipped:   {}", stats.groups_skipped);
        let _ = writeln!(self.writer, "  Files transferred: {}", stats.files_transferred);
        let _ = writeln!(self.writer, "  Files failed:      {}", stats.files_failed);
        if stats.subtitles_transferred + stats.subtitles_failed > 0 {
            let _ = writeln!(
                self.writer,
                "  Subtitles: {} transferred, {} failed",
                stats.subtitles_transferred, stats.subtitles_failed
            );
        }
        let _ = writeln!(
            self.writer,
            "  Total size: {}",
            media_transfer::format_size(stats.bytes_transferred)
        );
        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            media_transfer::format_duration(stats.duration)
        );
        if stats.cancelled {
            let _ = writeln!(self.writer, "  Cancelled by user");
        }
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod logger_tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::time::Duration;

    use chrono::Utc;
    use tempfile::tempdir;

    use media_transfer::transfer::{
        FileRecord, GroupRecord, OperationKind, TransferError, TransferFailure, TransferGroup,
    };

    fn sample_report() -> TransferReport {
        let group = TransferGroup::new("Alpha", "Anime", vec!["Alpha_E01.mkv".to_string(), "Alpha_E02.mkv".to_string()]);
        let mut files = BTreeMap::new();
        files.insert(
            "Alpha_E01.mkv".to_string(),
            FileRecord {
                file_name: "Alpha_E01.mkv".to_string(),
                size_bytes: 2048,
                modified: Utc::now(),
                md5: None,
                sha256: None,
            },
        );
        TransferReport {
            operation: OperationKind::Copy,
            records: vec![GroupRecord::new(&group, OperationKind::Copy, files)],
            failures: vec![TransferFailure {
                file_name: "Alpha_E02.mkv".to_string(),
                group_name: "Alpha".to_string(),
                error: TransferError::NotFound(PathBuf::from("/downloads/Alpha_E02.mkv")),
            }],
            ..TransferReport::default()
        }
    }

    #[test]
    fn writes_report_and_statistics() {
        let dir = tempdir().unwrap();
        let mut logger = FileLogger::in_directory(&dir.path().join("logs")).unwrap();
        let report = sample_report();
        logger.log_group_state(&TransferGroup::new("Alpha", "Anime", vec![]), GroupState::InProgress);
        logger.log_report(&report);
        let stats = RunStats::new(&report, None, Duration::from_secs(3));
        logger.log_stats(&stats);

        let content = fs::read_to_string(logger.path()).unwrap();
        assert!(content.contains("GROUP   in progress - \"Alpha\""));
        assert!(content.contains("SUCCESS COPY - \"Alpha_E01.mkv\" | Alpha | 2.00 KB"));
        assert!(content.contains("ERROR   COPY - \"Alpha_E02.mkv\" | Alpha | not found: "));
        assert!(content.contains("Files transferred: 1"));
        assert!(content.contains("Files failed:      1"));
        assert!(content.trim_end().ends_with("END"));
    }

    #[test]
    fn pending_state_is_not_logged() {
        let dir = tempdir().unwrap();
        let mut logger = FileLogger::in_directory(dir.path()).unwrap();
        logger.log_group_state(&TransferGroup::new("Alpha", "Anime", vec![]), GroupState::Pending);
        assert!(fs::read_to_string(logger.path()).unwrap().is_empty());
    }
}
