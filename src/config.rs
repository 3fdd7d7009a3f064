//! Runtime configuration
//!
//! Paths default to the OS-standard data directory (via `directories`):
//! - Linux: `$XDG_DATA_HOME/gaple/` or `~/.local/share/gaple/`
//! - macOS: `~/Library/Application Support/gaple/`
//!
//! Environment overrides:
//! - `GAPLE_DATA_DIR`: data directory
//! - `GAPLE_DB`: database file (`:memory:` for a throwaway session)
//! - `GAPLE_LOG`: log filter, `env_logger` syntax (default `info`)

use directories::ProjectDirs;
use std::fs::OpenOptions;
use std::path::PathBuf;
use thiserror::Error;

/// Default log filter
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine data directory")]
    NoDataDirectory,
    #[error("failed to create data directory: {0}")]
    CreateDirFailed(#[source] std::io::Error),
    #[error("failed to open log file: {0}")]
    LogFile(#[source] std::io::Error),
    #[error("failed to install logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Resolve configuration from the environment and create the data directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::resolve(|key| std::env::var(key).ok())?;
        std::fs::create_dir_all(&config.data_dir).map_err(ConfigError::CreateDirFailed)?;
        Ok(config)
    }

    /// Resolve configuration from an arbitrary variable lookup.
    fn resolve<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let data_dir = match non_empty("GAPLE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => Self::default_data_dir()?,
        };
        let db_path = non_empty("GAPLE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("gaple.db"));
        let log_path = data_dir.join("gaple.log");
        let log_filter = non_empty("GAPLE_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Config {
            data_dir,
            db_path,
            log_path,
            log_filter,
        })
    }

    /// Get the OS-standard data directory for gaple
    pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", "gaple")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(ConfigError::NoDataDirectory)
    }

    /// Send `log` output to the log file.
    ///
    /// The terminal belongs to the UI, so nothing is written to stderr.
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(ConfigError::LogFile)?;

        env_logger::Builder::new()
            .parse_filters(&self.log_filter)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .try_init()?;
        Ok(())
    }
}
