mod config;
mod logger;
mod mtransfer;
mod plan;
mod stats;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::mtransfer::MediaTransfer;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Copy or move grouped media files with checksum verification"
)]
pub(crate) struct MediaTransferArgs {
    /// Transfer plan file (TOML, or JSON with a .json extension)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    plan: Option<PathBuf>,

    /// Source root directory the plan file names are relative to
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    source: Option<PathBuf>,

    /// Destination root directory
    #[arg(short, long = "dest", value_hint = clap::ValueHint::DirPath)]
    destination: Option<PathBuf>,

    /// Directory containing subtitle folders to transfer after the plan
    #[arg(short = 'u', long, value_hint = clap::ValueHint::DirPath)]
    subtitles: Option<PathBuf>,

    /// Verify transfer records under the given directory instead of transferring
    #[arg(short, long, name = "DIR", value_hint = clap::ValueHint::DirPath)]
    audit: Option<PathBuf>,

    /// Move files instead of copying
    #[arg(short, long = "move")]
    move_files: bool,

    /// Number of parallel transfer workers
    #[arg(short, long, name = "COUNT")]
    workers: Option<usize>,

    /// Skip checksums and move verification
    #[arg(short = 'n', long)]
    no_verify: bool,

    /// Do not write a log file
    #[arg(long)]
    no_log: bool,

    /// Hide progress bars
    #[arg(short = 'q', long)]
    no_progress: bool,

    /// Only print the plan without transferring files
    #[arg(short, long)]
    print: bool,

    /// Print debug information
    #[arg(short = 'D', long)]
    debug: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = MediaTransferArgs::parse();
    if let Some(ref shell) = args.completion {
        media_transfer::generate_shell_completion(*shell, MediaTransferArgs::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        MediaTransfer::new(args)?.run()
    }
}
