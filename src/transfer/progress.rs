use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::ProgressBar;
#[cfg(not(test))]
use indicatif::ProgressStyle;

#[cfg(not(test))]
const PROGRESS_BAR_CHARS: &str = "=>-";
#[cfg(not(test))]
const PROGRESS_BAR_TEMPLATE: &str =
    "{msg:30.bold} [{elapsed_precise}] {bar:50.magenta/blue} {bytes}/{total_bytes} {bytes_per_sec}";

/// Receives the number of bytes written after every block.
///
/// Implementations must tolerate concurrent calls from several workers.
pub trait ProgressSink: Send + Sync {
    fn advance(&self, bytes: u64);
}

/// Sink that discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _bytes: u64) {}
}

impl ProgressSink for AtomicU64 {
    fn advance(&self, bytes: u64) {
        self.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl ProgressSink for ProgressBar {
    fn advance(&self, bytes: u64) {
        self.inc(bytes);
    }
}

/// Byte progress for one group, shared by all of that group's workers.
#[derive(Debug)]
pub struct GroupProgress {
    completed_bytes: AtomicU64,
    progress_bar: ProgressBar,
}

impl GroupProgress {
    /// Create progress tracking for a group with the given expected byte total.
    #[must_use]
    pub fn new(label: &str, total_bytes: u64, show_progress: bool) -> Self {
        let progress_bar = if show_progress {
            Self::create_progress_bar(total_bytes)
        } else {
            ProgressBar::hidden()
        };
        progress_bar.set_message(label.to_string());
        Self {
            completed_bytes: AtomicU64::new(0),
            progress_bar,
        }
    }

    #[must_use]
    pub fn completed_bytes(&self) -> u64 {
        self.completed_bytes.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }

    /// Create a byte progress bar that is hidden during tests.
    fn create_progress_bar(len: u64) -> ProgressBar {
        #[cfg(test)]
        {
            let _ = len;
            ProgressBar::hidden()
        }
        #[cfg(not(test))]
        {
            let progress_bar = ProgressBar::new(len);
            progress_bar.set_style(
                ProgressStyle::default_bar()
                    .template(PROGRESS_BAR_TEMPLATE)
                    .expect("Failed to set progress bar template")
                    .progress_chars(PROGRESS_BAR_CHARS),
            );
            progress_bar
        }
    }
}

impl ProgressSink for GroupProgress {
    fn advance(&self, bytes: u64) {
        self.completed_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.progress_bar.inc(bytes);
    }
}
