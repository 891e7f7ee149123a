use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;

use media_transfer::transfer::{
    FileListener, GroupState, StateListener, SubtitleReport, TransferEngine, TransferReport, audit_tree, validate_file_name,
};
use media_transfer::{print_bold, print_error, print_warning};

use crate::MediaTransferArgs;
use crate::config::Config;
use crate::logger::FileLogger;
use crate::plan::TransferPlan;
use crate::stats::RunStats;

/// Runs one `mtransfer` invocation.
#[derive(Debug)]
pub struct MediaTransfer {
    config: Config,
}

type SharedLogger = Arc<Mutex<FileLogger>>;

impl MediaTransfer {
    pub fn new(args: MediaTransferArgs) -> Result<Self> {
        let config = Config::from_args(args);
        if config.debug {
            println!("{config:#?}");
        }
        Ok(Self { config })
    }

    pub fn run(&self) -> Result<()> {
        if let Some(directory) = &self.config.audit {
            return Self::audit(directory);
        }

        let plan_path = self
            .config
            .plan
            .as_deref()
            .context("No transfer plan given. Pass a plan file or use --audit <DIR>")?;
        let plan_path = media_transfer::resolve_input_path(Some(plan_path))?;
        let plan = TransferPlan::from_file(&plan_path)?;

        let roots = self
            .config
            .roots
            .clone()
            .or(plan.roots())
            .or(self.config.default_roots.clone());
        let source = roots
            .source
            .as_deref()
            .context("No source directory. Use --source or set it in the plan")?;
        let source = media_transfer::resolve_input_path(Some(source))?;
        let destination = roots
            .destination
            .as_deref()
            .context("No destination directory. Use --dest or set it in the plan")?;
        let destination = media_transfer::resolve_output_path(destination)?;

        if plan.groups.is_empty() {
            print_warning!("Plan contains no groups: {}", plan_path.display());
            return Ok(());
        }

        if self.config.dryrun {
            self.print_plan(&plan, &destination, roots.subtitles.as_deref());
            return Ok(());
        }

        self.transfer(&plan, &source, &destination, roots.subtitles)
    }

    fn transfer(
        &self,
        plan: &TransferPlan,
        source: &Path,
        destination: &Path,
        subtitles: Option<PathBuf>,
    ) -> Result<()> {
        let logger = self.create_logger(source, destination, plan.groups.len());
        let mut engine = TransferEngine::new(self.config.engine_config())?.with_state_listener(Self::state_listener(
            logger.clone(),
            self.config.verbose,
        ));
        if self.config.verbose {
            engine = engine.with_file_listener(Self::file_listener());
        }

        let cancel_flag = engine.cancel_flag();
        ctrlc::set_handler(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                // Second Ctrl+C
                std::process::exit(130);
            }
            println!(
                "\n{}",
                "Received Ctrl+C, finishing files in progress...".yellow().bold()
            );
            cancel_flag.store(true, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl+C handler")?;

        print_bold!(
            "{} {} files in {} groups to {}",
            self.config.operation.verb(),
            plan.file_count(),
            plan.groups.len(),
            media_transfer::path_to_string_relative(destination)
        );

        let start = Instant::now();
        let report = engine.transfer(&plan.groups, source, destination, self.config.operation)?;

        let subtitle_report = match subtitles {
            Some(subtitle_root) if !report.cancelled => {
                let report = engine.transfer_subtitles(&plan.groups, &subtitle_root, destination, self.config.operation);
                Some(report)
            }
            _ => None,
        };

        let stats = RunStats::new(&report, subtitle_report.as_ref(), start.elapsed());

        Self::print_failures(&report, subtitle_report.as_ref());
        if let Some(logger) = &logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_report(&report);
            if let Some(subtitle_report) = &subtitle_report {
                logger.log_subtitles(subtitle_report);
            }
            logger.log_stats(&stats);
            if self.config.verbose {
                println!("Log file: {}", logger.path().display());
            }
        }

        if report.cancelled {
            println!("\n{}", "Aborted by user".bold().red());
        }
        stats.print_summary();

        if report.has_fully_failed_group() {
            anyhow::bail!("{} group(s) had no files transferred", stats.groups_failed);
        }
        Ok(())
    }

    fn create_logger(&self, source: &Path, destination: &Path, group_count: usize) -> Option<SharedLogger> {
        if !self.config.log {
            return None;
        }
        match FileLogger::new() {
            Ok(mut logger) => {
                logger.log_init(&self.config, source, destination, group_count);
                Some(Arc::new(Mutex::new(logger)))
            }
            Err(error) => {
                print_warning!("Failed to create log file: {error}");
                None
            }
        }
    }

    fn state_listener(logger: Option<SharedLogger>, verbose: bool) -> StateListener {
        Box::new(move |group, state| {
            if verbose && state != GroupState::Pending {
                println!("{}: {state}", group.label().cyan());
            }
            if let Some(logger) = &logger
                && let Ok(mut logger) = logger.lock()
            {
                logger.log_group_state(group, state);
            }
        })
    }

    fn file_listener() -> FileListener {
        Box::new(|group, file_name, error| {
            if error.is_none() {
                println!("  {} {file_name}", group.label().dimmed());
            }
        })
    }

    fn print_failures(report: &TransferReport, subtitles: Option<&SubtitleReport>) {
        let subtitle_failures = subtitles.map(|report| report.failures.as_slice()).unwrap_or_default();
        for failure in report.failures.iter().chain(subtitle_failures) {
            print_error!("{failure}");
        }
        for error in &report.metadata_errors {
            print_warning!("{error}");
        }
    }

    /// List destinations and files without touching the filesystem.
    fn print_plan(&self, plan: &TransferPlan, destination: &Path, subtitles: Option<&Path>) {
        print_bold!(
            "{} {} files in {} groups (dry run)",
            self.config.operation.verb(),
            plan.file_count(),
            plan.groups.len()
        );
        for group in &plan.groups {
            println!("\n{}", group.to_string().bold());
            println!(
                "  {}",
                media_transfer::path_to_string_relative(&group.destination_dir(destination)).cyan()
            );
            for file_name in &group.files {
                match validate_file_name(file_name) {
                    Ok(()) => println!("    {file_name}"),
                    Err(error) => println!("    {}", error.to_string().red()),
                }
            }
        }
        if let Some(subtitles) = subtitles {
            println!("\nSubtitles from {}", media_transfer::path_to_string_relative(subtitles));
        }
    }

    /// Verify every recorded file under `directory` against its sidecar.
    fn audit(directory: &Path) -> Result<()> {
        let directory = media_transfer::resolve_input_path(Some(directory))?;
        let reports = audit_tree(&directory);
        if reports.is_empty() {
            print_warning!("No transfer records found under {}", directory.display());
            return Ok(());
        }

        let mut problem_count = 0;
        for report in &reports {
            let path = media_transfer::path_to_string_relative(&report.directory);
            if report.is_clean() {
                println!("{} {} ({} files)", "OK".green().bold(), path, report.verified.len());
            } else {
                println!("{} {}", "FAIL".red().bold(), path);
                for (file_name, verification) in &report.problems {
                    println!("  {file_name}: {}", verification.to_string().red());
                }
                problem_count += report.problems.len();
            }
        }

        if problem_count > 0 {
            anyhow::bail!("{problem_count} file(s) failed verification");
        }
        println!("{}", format!("All {} records verified", reports.len()).green());
        Ok(())
    }
}
