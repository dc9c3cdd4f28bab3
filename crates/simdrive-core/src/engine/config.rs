use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Whether an accessor should wait for the running process to finish before
/// reading its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockMode {
    Block,
    NonBlock,
    /// Use the process's configured default.
    #[default]
    FollowProcessDefault,
}

impl BlockMode {
    pub fn resolve(self, process_default: bool) -> bool {
        match self {
            Self::Block => true,
            Self::NonBlock => false,
            Self::FollowProcessDefault => process_default,
        }
    }
}

/// Settings shared by every engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// Base name for every file the process reads or writes.
    pub name: String,
    pub work_dir: PathBuf,
    /// Explicit engine executable; when absent the engine's usual names are
    /// looked up on `PATH`.
    pub executable: Option<PathBuf>,
    pub seed: Option<u64>,
    /// Default for [`BlockMode::FollowProcessDefault`].
    pub blocking: bool,
    /// Upper bound on blocking waits; `None` waits indefinitely.
    pub wait_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl ProcessConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
}

#[derive(Default)]
pub struct ProcessConfigBuilder {
    name: Option<String>,
    work_dir: Option<PathBuf>,
    executable: Option<PathBuf>,
    seed: Option<u64>,
    blocking: Option<bool>,
    wait_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
}

impl ProcessConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = Some(blocking);
        self
    }
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<ProcessConfig, ConfigError> {
        let name = self.name.ok_or(ConfigError::MissingParameter("name"))?;
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                parameter: "name",
                reason: format!("'{}' is not usable as a file name", name),
            });
        }
        let poll_interval = self
            .poll_interval
            .unwrap_or(ProcessConfig::DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                parameter: "poll_interval",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(ProcessConfig {
            name,
            work_dir: self
                .work_dir
                .ok_or(ConfigError::MissingParameter("work_dir"))?,
            executable: self.executable,
            seed: self.seed,
            blocking: self.blocking.unwrap_or(true),
            wait_timeout: self.wait_timeout,
            poll_interval,
        })
    }
}
