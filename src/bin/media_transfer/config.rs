use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

use media_transfer::transfer::{DEFAULT_WORKERS, EngineConfig, OperationKind};
use media_transfer::{print_error, print_warning};

use crate::MediaTransferArgs;

/// Source, destination and subtitle roots from one configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roots {
    pub(crate) source: Option<PathBuf>,
    pub(crate) destination: Option<PathBuf>,
    pub(crate) subtitles: Option<PathBuf>,
}

/// Final config combined from CLI arguments and user config file.
#[derive(Debug)]
pub struct Config {
    pub(crate) audit: Option<PathBuf>,
    pub(crate) debug: bool,
    pub(crate) dryrun: bool,
    pub(crate) log: bool,
    pub(crate) operation: OperationKind,
    pub(crate) plan: Option<PathBuf>,
    pub(crate) progress: bool,
    /// Roots given on the command line.
    pub(crate) roots: Roots,
    /// Fallback roots from the user config file.
    pub(crate) default_roots: Roots,
    pub(crate) verbose: bool,
    pub(crate) verify: bool,
    pub(crate) workers: usize,
}

/// Config from the user config file
#[derive(Debug, Default, Deserialize)]
struct MediaTransferConfig {
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    log: Option<bool>,
    #[serde(default)]
    operation: Option<OperationKind>,
    #[serde(default)]
    progress: Option<bool>,
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    destination: Option<PathBuf>,
    #[serde(default)]
    subtitles: Option<PathBuf>,
    #[serde(default)]
    verbose: bool,
    #[serde(default)]
    verify: Option<bool>,
    #[serde(default)]
    workers: Option<usize>,
}

/// Wrapper needed for parsing the user config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    mtransfer: MediaTransferConfig,
}

impl Roots {
    /// Fill missing roots from a lower priority layer.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            source: self.source.or(fallback.source),
            destination: self.destination.or(fallback.destination),
            subtitles: self.subtitles.or(fallback.subtitles),
        }
    }
}

impl MediaTransferConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    fn get_user_config() -> Self {
        media_transfer::config::CONFIG_PATH
            .as_deref()
            .filter(|path| path.exists())
            .and_then(|path| {
                fs::read_to_string(path)
                    .map_err(|e| {
                        print_error!("Error reading config file {}: {e}", path.display());
                    })
                    .ok()
            })
            .and_then(|config_string| {
                Self::from_toml_str(&config_string)
                    .map_err(|e| print_error!("{e}"))
                    .ok()
            })
            .unwrap_or_default()
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.mtransfer)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {e}"))
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    pub fn from_args(args: MediaTransferArgs) -> Self {
        let user_config = MediaTransferConfig::get_user_config();
        Self::from_parts(args, user_config)
    }

    fn from_parts(args: MediaTransferArgs, user_config: MediaTransferConfig) -> Self {
        let operation = if args.move_files {
            OperationKind::Move
        } else {
            user_config.operation.unwrap_or_default()
        };

        let mut workers = args.workers.or(user_config.workers).unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            print_warning!("Worker count must be positive, using 1");
            workers = 1;
        }

        Self {
            audit: args.audit,
            debug: args.debug || user_config.debug,
            dryrun: args.print,
            log: !args.no_log && user_config.log.unwrap_or(true),
            operation,
            plan: args.plan,
            progress: !args.no_progress && user_config.progress.unwrap_or(true),
            roots: Roots {
                source: args.source,
                destination: args.destination,
                subtitles: args.subtitles,
            },
            default_roots: Roots {
                source: user_config.source,
                destination: user_config.destination,
                subtitles: user_config.subtitles,
            },
            verbose: args.verbose || args.debug || user_config.verbose || user_config.debug,
            verify: !args.no_verify && user_config.verify.unwrap_or(true),
            workers,
        }
    }

    /// Engine settings derived from this config.
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.workers,
            verify_integrity: self.verify,
            show_progress: self.progress,
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod mtransfer_config_tests {
    use super::*;

    use clap::Parser;

    fn args(cli: &[&str]) -> MediaTransferArgs {
        MediaTransferArgs::parse_from(std::iter::once("mtransfer").chain(cli.iter().copied()))
    }

    #[test]
    fn from_toml_str_parses_empty_config() {
        let config = MediaTransferConfig::from_toml_str("").expect("should parse empty config");
        assert!(!config.debug);
        assert!(!config.verbose);
        assert!(config.log.is_none());
        assert!(config.operation.is_none());
        assert!(config.workers.is_none());
        assert!(config.source.is_none());
        assert!(config.destination.is_none());
    }

    #[test]
    fn from_toml_str_parses_mtransfer_section() {
        let toml = r#"
[mtransfer]
workers = 8
verify = false
operation = "move"
log = false
progress = false
verbose = true
source = "/downloads"
destination = "/media"
subtitles = "/downloads/subs"
"#;
        let config = MediaTransferConfig::from_toml_str(toml).expect("should parse config");
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.verify, Some(false));
        assert_eq!(config.operation, Some(OperationKind::Move));
        assert_eq!(config.log, Some(false));
        assert_eq!(config.progress, Some(false));
        assert!(config.verbose);
        assert_eq!(config.source, Some(PathBuf::from("/downloads")));
        assert_eq!(config.destination, Some(PathBuf::from("/media")));
        assert_eq!(config.subtitles, Some(PathBuf::from("/downloads/subs")));
    }

    #[test]
    fn from_toml_str_ignores_other_sections() {
        let toml = r"
[dirmove]
auto = true

[mtransfer]
workers = 2
";
        let config = MediaTransferConfig::from_toml_str(toml).expect("should parse config");
        assert_eq!(config.workers, Some(2));
    }

    #[test]
    fn from_toml_str_rejects_unknown_operation() {
        let toml = r#"
[mtransfer]
operation = "delete"
"#;
        assert!(MediaTransferConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn defaults_without_user_config() {
        let config = Config::from_parts(args(&["plan.toml"]), MediaTransferConfig::default());
        assert_eq!(config.operation, OperationKind::Copy);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert!(config.verify);
        assert!(config.log);
        assert!(config.progress);
        assert!(!config.dryrun);
        assert_eq!(config.plan, Some(PathBuf::from("plan.toml")));
    }

    #[test]
    fn cli_overrides_user_config() {
        let user_config = MediaTransferConfig::from_toml_str(
            r#"
[mtransfer]
workers = 8
operation = "copy"
destination = "/media"
"#,
        )
        .unwrap();
        let config = Config::from_parts(
            args(&["plan.toml", "--move", "-w", "2", "--dest", "/archive", "--no-verify"]),
            user_config,
        );
        assert_eq!(config.operation, OperationKind::Move);
        assert_eq!(config.workers, 2);
        assert!(!config.verify);
        assert_eq!(config.roots.destination, Some(PathBuf::from("/archive")));
        assert_eq!(config.default_roots.destination, Some(PathBuf::from("/media")));
    }

    #[test]
    fn user_config_disables_log_and_progress() {
        let user_config = MediaTransferConfig::from_toml_str("[mtransfer]\nlog = false\nprogress = false\n").unwrap();
        let config = Config::from_parts(args(&["plan.toml"]), user_config);
        assert!(!config.log);
        assert!(!config.progress);
        assert!(!config.engine_config().show_progress);
    }

    #[test]
    fn zero_workers_falls_back_to_one() {
        let config = Config::from_parts(args(&["plan.toml", "--workers", "0"]), MediaTransferConfig::default());
        assert_eq!(config.workers, 1);
        assert_eq!(config.engine_config().workers, 1);
    }

    #[test]
    fn roots_fill_from_fallback() {
        let cli = Roots {
            source: Some(PathBuf::from("/cli/source")),
            ..Roots::default()
        };
        let plan = Roots {
            source: Some(PathBuf::from("/plan/source")),
            destination: Some(PathBuf::from("/plan/media")),
            subtitles: None,
        };
        let merged = cli.or(plan);
        assert_eq!(merged.source, Some(PathBuf::from("/cli/source")));
        assert_eq!(merged.destination, Some(PathBuf::from("/plan/media")));
        assert!(merged.subtitles.is_none());
    }
}
