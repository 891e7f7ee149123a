use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use rayon::prelude::*;

use crate::print_warning;
use crate::transfer::chunked::transfer_file;
use crate::transfer::TransferError;
use crate::transfer::engine::{TransferEngine, TransferFailure};
use crate::transfer::metadata::FileRecord;
use crate::transfer::progress::GroupProgress;
use crate::transfer::types::{
    OperationKind, TransferGroup, TransferTask, invalid_group_field, split_duplicate_destinations,
};

/// Directory name used for subtitles inside a group root.
pub const SUBTITLES_DIR_NAME: &str = "subtitles";

/// Outcome of transferring subtitle folders.
#[derive(Debug, Default)]
pub struct SubtitleReport {
    pub transferred: Vec<FileRecord>,
    pub failures: Vec<TransferFailure>,
}

impl SubtitleReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.transferred.is_empty() && self.failures.is_empty()
    }
}

impl TransferEngine {
    /// Transfer subtitle folders that belong to the plan's groups.
    ///
    /// Every directory directly under `subtitle_root` whose name starts with
    /// a group name is treated as that group's subtitle folder. Its files go
    /// to `root/category/name/subtitles`, once per group name even when the
    /// plan splits a series into several partitions. When two folders hold a
    /// file with the same name, the first folder in sorted order wins and the
    /// others are reported as [`TransferError::DuplicateDestination`].
    #[must_use]
    pub fn transfer_subtitles(
        &self,
        plan: &[TransferGroup],
        subtitle_root: &Path,
        destination_root: &Path,
        operation: OperationKind,
    ) -> SubtitleReport {
        let mut report = SubtitleReport::default();
        if !subtitle_root.is_dir() {
            print_warning!("Subtitle source does not exist: {}", subtitle_root.display());
            return report;
        }

        let folders = subtitle_folders(subtitle_root);
        let groups = plan
            .iter()
            .unique_by(|group| (group.category.as_str(), group.name.as_str()));

        for group in groups {
            if self.is_cancelled() {
                break;
            }
            if invalid_group_field(group).is_some() {
                continue;
            }
            let destination = group.group_root(destination_root).join(SUBTITLES_DIR_NAME);
            let tasks: Vec<TransferTask> = folders
                .iter()
                .filter(|folder| crate::path_to_filename_string(folder).starts_with(&group.name))
                .flat_map(|folder| subtitle_files(folder))
                .map(|(root, file_name)| TransferTask::new(&file_name, &root, &destination, operation))
                .collect();
            if tasks.is_empty() {
                continue;
            }

            let (tasks, duplicates) = split_duplicate_destinations(tasks);
            for task in duplicates {
                report.failures.push(TransferFailure {
                    file_name: task.file_name,
                    group_name: group.name.clone(),
                    error: TransferError::DuplicateDestination(task.destination),
                });
            }

            let total_bytes = tasks
                .iter()
                .filter_map(|task| fs::metadata(task.source()).ok())
                .map(|metadata| metadata.len())
                .sum();
            let progress = GroupProgress::new(
                &format!("{} subtitles", group.name),
                total_bytes,
                self.config().show_progress,
            );
            let verify_integrity = self.config().verify_integrity;
            let results: Vec<_> = self.install(|| {
                tasks
                    .par_iter()
                    .map(|task| (task.file_name().to_string(), transfer_file(task, verify_integrity, &progress)))
                    .collect()
            });
            progress.finish();

            for (file_name, result) in results {
                match result {
                    Ok(record) => report.transferred.push(record),
                    Err(error) => report.failures.push(TransferFailure {
                        file_name,
                        group_name: group.name.clone(),
                        error,
                    }),
                }
            }
        }

        report
    }
}

/// Sorted list of directories directly under `root`.
fn subtitle_folders(root: &Path) -> Vec<PathBuf> {
    fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .sorted()
                .collect()
        })
        .unwrap_or_default()
}

/// Regular files in a subtitle folder as (folder, file name) pairs.
fn subtitle_files(folder: &Path) -> Vec<(PathBuf, String)> {
    fs::read_dir(folder)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_file()))
                .map(|entry| (folder.to_path_buf(), crate::os_str_to_string(&entry.file_name())))
                .sorted()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod subtitles_tests {
    use super::*;

    use tempfile::tempdir;

    use crate::transfer::engine::EngineConfig;

    #[test]
    fn subtitles_go_to_group_root() {
        let dir = tempdir().unwrap();
        let subtitles = dir.path().join("subs");
        let destination = dir.path().join("media");
        fs::create_dir_all(subtitles.join("Alpha_subs")).unwrap();
        fs::create_dir_all(subtitles.join("Other")).unwrap();
        fs::write(subtitles.join("Alpha_subs").join("Alpha_E01.srt"), "1\n00:00:01,000 --> 00:00:02,000\nHi").unwrap();
        fs::write(subtitles.join("Other").join("Other.srt"), "nope").unwrap();

        let plan = vec![
            TransferGroup::new("Alpha", "Anime", vec![]).with_partition("Alpha Season 1"),
            TransferGroup::new("Alpha", "Anime", vec![]).with_partition("Alpha Season 2"),
        ];
        let engine = TransferEngine::new(EngineConfig::default()).unwrap();
        let report = engine.transfer_subtitles(&plan, &subtitles, &destination, OperationKind::Copy);

        assert_eq!(report.transferred.len(), 1);
        assert!(report.failures.is_empty());
        assert!(
            destination
                .join("Anime")
                .join("Alpha")
                .join(SUBTITLES_DIR_NAME)
                .join("Alpha_E01.srt")
                .is_file()
        );
        assert!(!destination.join("Anime").join("Other").exists());
    }

    #[test]
    fn move_subtitles_removes_sources() {
        let dir = tempdir().unwrap();
        let subtitles = dir.path().join("subs");
        fs::create_dir_all(subtitles.join("Beta")).unwrap();
        let source = subtitles.join("Beta").join("Beta.srt");
        fs::write(&source, "subtitle").unwrap();

        let plan = vec![TransferGroup::new("Beta", "American archive", vec![])];
        let engine = TransferEngine::new(EngineConfig::default()).unwrap();
        let report = engine.transfer_subtitles(&plan, &subtitles, &dir.path().join("media"), OperationKind::Move);

        assert_eq!(report.transferred.len(), 1);
        assert!(!source.exists());
    }

    #[test]
    fn same_file_name_in_two_folders_is_moved_once() {
        let dir = tempdir().unwrap();
        let subtitles = dir.path().join("subs");
        let destination = dir.path().join("media");
        fs::create_dir_all(subtitles.join("Alpha_a")).unwrap();
        fs::create_dir_all(subtitles.join("Alpha_b")).unwrap();
        fs::write(subtitles.join("Alpha_a").join("E01.srt"), "AAAA english").unwrap();
        fs::write(subtitles.join("Alpha_b").join("E01.srt"), "BBBB french!").unwrap();

        let plan = vec![TransferGroup::new("Alpha", "Anime", vec![])];
        let engine = TransferEngine::new(EngineConfig::default().with_workers(1)).unwrap();
        let report = engine.transfer_subtitles(&plan, &subtitles, &destination, OperationKind::Move);

        assert_eq!(report.transferred.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, TransferError::DuplicateDestination(_)));
        assert!(!subtitles.join("Alpha_a").join("E01.srt").exists());
        assert!(subtitles.join("Alpha_b").join("E01.srt").exists());

        let moved = destination.join("Anime").join("Alpha").join(SUBTITLES_DIR_NAME).join("E01.srt");
        assert_eq!(fs::read_to_string(moved).unwrap(), "AAAA english");
    }

    #[test]
    fn missing_subtitle_root_is_empty_report() {
        let dir = tempdir().unwrap();
        let plan = vec![TransferGroup::new("Alpha", "Anime", vec![])];
        let engine = TransferEngine::new(EngineConfig::default()).unwrap();
        let report = engine.transfer_subtitles(&plan, &dir.path().join("missing"), dir.path(), OperationKind::Copy);
        assert!(report.is_empty());
    }
}
