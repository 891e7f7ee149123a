use std::time::Duration;

use colored::Colorize;

use media_transfer::transfer::{GroupState, SubtitleReport, TransferReport};

/// Statistics for one transfer run
#[derive(Debug, Default)]
pub struct RunStats {
    pub(crate) groups_completed: usize,
    pub(crate) groups_partial: usize,
    pub(crate) groups_skipped: usize,
    pub(crate) groups_failed: usize,
    pub(crate) files_transferred: usize,
    pub(crate) files_failed: usize,
    pub(crate) subtitles_transferred: usize,
    pub(crate) subtitles_failed: usize,
    pub(crate) metadata_errors: usize,
    pub(crate) bytes_transferred: u64,
    pub(crate) duration: Duration,
    pub(crate) cancelled: bool,
}

impl RunStats {
    pub(crate) fn new(report: &TransferReport, subtitles: Option<&SubtitleReport>, duration: Duration) -> Self {
        let mut stats = Self {
            files_transferred: report.succeeded_count(),
            files_failed: report.failed_count(),
            metadata_errors: report.metadata_errors.len(),
            bytes_transferred: report.transferred_bytes(),
            duration,
            cancelled: report.cancelled,
            ..Self::default()
        };
        for group in &report.groups {
            match group.state {
                GroupState::Completed => stats.groups_completed += 1,
                GroupState::PartiallyFailed => stats.groups_partial += 1,
                GroupState::Pending | GroupState::InProgress => stats.groups_skipped += 1,
            }
            if group.all_failed() {
                stats.groups_failed += 1;
            }
        }
        if let Some(subtitles) = subtitles {
            stats.subtitles_transferred = subtitles.transferred.len();
            stats.subtitles_failed = subtitles.failures.len();
            stats.bytes_transferred += subtitles.transferred.iter().map(|file| file.size_bytes).sum::<u64>();
        }
        stats
    }

    /// Average throughput in bytes per second.
    pub(crate) fn throughput(&self) -> Option<u64> {
        let seconds = self.duration.as_secs_f64();
        (seconds > 0.0 && self.bytes_transferred > 0).then(|| (self.bytes_transferred as f64 / seconds) as u64)
    }

    pub(crate) fn print_summary(&self) {
        println!("{}", "\n--- Transfer Summary ---".bold().magenta());
        println!("Groups completed:       {}", self.groups_completed);
        println!(
            "Groups partial:         {}",
            if self.groups_partial > 0 {
                self.groups_partial.to_string().yellow()
            } else {
                "0".normal()
            }
        );
        if self.groups_failed > 0 {
            println!("  - Nothing transferred: {}", self.groups_failed.to_string().red());
        }
        if self.groups_skipped > 0 {
            println!("Groups skipped:         {}", self.groups_skipped);
        }
        println!("Files transferred:      {}", self.files_transferred);
        println!(
            "Files failed:           {}",
            if self.files_failed > 0 {
                self.files_failed.to_string().red()
            } else {
                "0".normal()
            }
        );
        if self.subtitles_transferred + self.subtitles_failed > 0 {
            println!(
                "Subtitles:              {} transferred, {} failed",
                self.subtitles_transferred, self.subtitles_failed
            );
        }
        if self.metadata_errors > 0 {
            println!("Metadata errors:        {}", self.metadata_errors.to_string().red());
        }
        println!();
        println!(
            "Total size:             {}",
            media_transfer::format_size(self.bytes_transferred)
        );
        if let Some(throughput) = self.throughput() {
            println!("Throughput:             {}/s", media_transfer::format_size(throughput));
        }
        println!(
            "Total time:             {}",
            media_transfer::format_duration(self.duration)
        );
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;

    use std::path::PathBuf;

    use media_transfer::transfer::{GroupSummary, OperationKind, TransferError, TransferFailure};

    fn summary(name: &str, state: GroupState, file_count: usize, succeeded: usize) -> GroupSummary {
        GroupSummary {
            name: name.to_string(),
            partition: None,
            destination: PathBuf::from("/media").join(name),
            state,
            file_count,
            succeeded,
            total_bytes: 0,
            completed_bytes: 0,
            metadata_file: None,
        }
    }

    #[test]
    fn counts_group_states() {
        let report = TransferReport {
            operation: OperationKind::Move,
            groups: vec![
                summary("Alpha", GroupState::Completed, 2, 2),
                summary("Beta", GroupState::PartiallyFailed, 2, 1),
                summary("Gamma", GroupState::PartiallyFailed, 1, 0),
                summary("Delta", GroupState::Pending, 3, 0),
            ],
            failures: vec![TransferFailure {
                file_name: "Beta_E02.mkv".to_string(),
                group_name: "Beta".to_string(),
                error: TransferError::NotFound(PathBuf::from("Beta_E02.mkv")),
            }],
            cancelled: true,
            ..TransferReport::default()
        };
        let stats = RunStats::new(&report, None, Duration::from_secs(1));
        assert_eq!(stats.groups_completed, 1);
        assert_eq!(stats.groups_partial, 2);
        assert_eq!(stats.groups_skipped, 1);
        assert_eq!(stats.groups_failed, 2);
        assert_eq!(stats.files_failed, 1);
        assert!(stats.cancelled);
    }

    #[test]
    fn throughput_needs_bytes_and_time() {
        let stats = RunStats {
            bytes_transferred: 4096,
            duration: Duration::from_secs(2),
            ..RunStats::default()
        };
        assert_eq!(stats.throughput(), Some(2048));
        assert_eq!(RunStats::default().throughput(), None);
    }
}
