//! Per-user file locations.

use std::path::PathBuf;
use std::sync::LazyLock;

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

/// User config file: `$HOME/.config/media-transfer.toml`
///
/// `None` if the home directory cannot be determined.
pub static CONFIG_PATH: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| dirs::home_dir().map(|home| home.join(".config").join(format!("{PROJECT_NAME}.toml"))));

/// Directory for run logs: `$HOME/logs/media-transfer`
pub static LOG_DIR: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| dirs::home_dir().map(|home| home.join("logs").join(PROJECT_NAME)));
