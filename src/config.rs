//! Runtime configuration.
//!
//! Resolves the data directory holding the state file and the daemon socket,
//! and collects the refresh periods used by the daemon and the display
//! poller.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::time::Duration;

/// Environment variable overriding the data directory.
pub const HOME_ENV_VAR: &str = "TIMEKEEPER_HOME";

/// Data directory name under the user's home directory.
const DATA_DIR_NAME: &str = ".timekeeper";

/// State file name inside the data directory.
const STATE_FILE_NAME: &str = "state.json";

/// Socket file name inside the data directory.
const SOCKET_FILE_NAME: &str = "timekeeper.sock";

/// Recompute period for the countdown timer.
pub const TIMER_REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// Recompute period for the stopwatch.
pub const STOPWATCH_REFRESH_PERIOD: Duration = Duration::from_millis(10);

/// Recompute period for the Pomodoro session.
pub const POMODORO_REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// Re-read period for the display poller.
pub const POLL_PERIOD: Duration = Duration::from_millis(100);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ホームディレクトリが見つかりません。--data-dir か {HOME_ENV_VAR} を指定してください")]
    HomeDirectoryNotFound,
}

/// Resolved paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    data_dir: PathBuf,
}

impl Config {
    /// Creates a configuration rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves the data directory.
    ///
    /// Precedence: explicit flag, then `TIMEKEEPER_HOME`, then
    /// `~/.timekeeper`.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is given and no home directory exists.
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::resolve_with(data_dir, std::env::var_os(HOME_ENV_VAR).map(PathBuf::from))
    }

    fn resolve_with(flag: Option<PathBuf>, env: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(dir) = flag.or(env).filter(|dir| !dir.as_os_str().is_empty()) {
            return Ok(Self::new(dir));
        }

        let home = dirs::home_dir().ok_or(ConfigError::HomeDirectoryNotFound)?;
        Ok(Self::new(home.join(DATA_DIR_NAME)))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the JSON state store.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE_NAME)
    }

    /// Path of the daemon's Unix socket.
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join(SOCKET_FILE_NAME)
    }
}
