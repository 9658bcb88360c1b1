use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_WAIT_TIMEOUT_MS: &str = "AGENT_DISPATCH_WAIT_TIMEOUT_MS";
pub const ENV_MAX_READ_BATCH: &str = "AGENT_DISPATCH_MAX_READ_BATCH";
pub const ENV_CLEANUP_EVERY_CYCLES: &str = "AGENT_DISPATCH_CLEANUP_EVERY_CYCLES";
pub const ENV_COMPLETED_RETENTION_MS: &str = "AGENT_DISPATCH_COMPLETED_RETENTION_MS";
pub const ENV_TIMED_OUT_RETENTION_MS: &str = "AGENT_DISPATCH_TIMED_OUT_RETENTION_MS";
pub const ENV_SESSION_ACTIVE_WINDOW_MS: &str = "AGENT_DISPATCH_SESSION_ACTIVE_WINDOW_MS";
pub const ENV_ACTIVITY_LOG_CAPACITY: &str = "AGENT_DISPATCH_ACTIVITY_LOG_CAPACITY";
pub const ENV_TICK_INTERVAL_MS: &str = "AGENT_DISPATCH_TICK_INTERVAL_MS";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "agent_dispatch.toml";
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_READ_BATCH: usize = 5;
pub const DEFAULT_CLEANUP_EVERY_CYCLES: u64 = 100;
pub const DEFAULT_COMPLETED_RETENTION_MS: u64 = 60_000;
pub const DEFAULT_TIMED_OUT_RETENTION_MS: u64 = 30_000;
pub const DEFAULT_SESSION_ACTIVE_WINDOW_MS: u64 = 300_000;
pub const DEFAULT_ACTIVITY_LOG_CAPACITY: usize = 100;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Default deadline for `submit_and_wait`.
    pub wait_timeout: Duration,
    pub max_read_batch: usize,
    /// Cleanup runs on every Nth dispatch cycle.
    pub cleanup_every_cycles: u64,
    pub completed_retention: Duration,
    pub timed_out_retention: Duration,
    pub session_active_window: Duration,
    pub activity_log_capacity: usize,
    /// Cadence of the bundled `DispatchDriver`. The scheduler itself ignores it.
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            max_read_batch: DEFAULT_MAX_READ_BATCH,
            cleanup_every_cycles: DEFAULT_CLEANUP_EVERY_CYCLES,
            completed_retention: Duration::from_millis(DEFAULT_COMPLETED_RETENTION_MS),
            timed_out_retention: Duration::from_millis(DEFAULT_TIMED_OUT_RETENTION_MS),
            session_active_window: Duration::from_millis(DEFAULT_SESSION_ACTIVE_WINDOW_MS),
            activity_log_capacity: DEFAULT_ACTIVITY_LOG_CAPACITY,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

impl SchedulerConfig {
    /// Uses `agent_dispatch.toml` from the working directory when present,
    /// otherwise the `AGENT_DISPATCH_*` environment alone. In both cases a
    /// key nobody sets keeps its scheduler default.
    pub fn from_default_sources() -> Result<Self, ConfigError> {
        let config_path = Path::new(DEFAULT_CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::from_config_file(config_path);
        }
        Self::from_env()
    }

    /// Loads a TOML table keyed by the `AGENT_DISPATCH_*` names. Keys absent
    /// from the file fall back to the environment, then to defaults.
    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let value: toml::Value =
            toml::from_str(&content).map_err(|err| ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
        let table = value
            .as_table()
            .ok_or_else(|| ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message: "root is not a TOML table".to_string(),
            })?;

        Self::from_env_with(|key| {
            table
                .get(key)
                .and_then(toml_value_to_string)
                .or_else(|| std::env::var(key).ok())
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    fn from_env_with<F>(mut getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let config = Self {
            wait_timeout: Duration::from_millis(parse_or(
                &mut getter,
                ENV_WAIT_TIMEOUT_MS,
                DEFAULT_WAIT_TIMEOUT_MS,
            )?),
            max_read_batch: parse_or(&mut getter, ENV_MAX_READ_BATCH, DEFAULT_MAX_READ_BATCH)?,
            cleanup_every_cycles: parse_or(
                &mut getter,
                ENV_CLEANUP_EVERY_CYCLES,
                DEFAULT_CLEANUP_EVERY_CYCLES,
            )?,
            completed_retention: Duration::from_millis(parse_or(
                &mut getter,
                ENV_COMPLETED_RETENTION_MS,
                DEFAULT_COMPLETED_RETENTION_MS,
            )?),
            timed_out_retention: Duration::from_millis(parse_or(
                &mut getter,
                ENV_TIMED_OUT_RETENTION_MS,
                DEFAULT_TIMED_OUT_RETENTION_MS,
            )?),
            session_active_window: Duration::from_millis(parse_or(
                &mut getter,
                ENV_SESSION_ACTIVE_WINDOW_MS,
                DEFAULT_SESSION_ACTIVE_WINDOW_MS,
            )?),
            activity_log_capacity: parse_or(
                &mut getter,
                ENV_ACTIVITY_LOG_CAPACITY,
                DEFAULT_ACTIVITY_LOG_CAPACITY,
            )?,
            tick_interval: Duration::from_millis(parse_or(
                &mut getter,
                ENV_TICK_INTERVAL_MS,
                DEFAULT_TICK_INTERVAL_MS,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_read_batch == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_MAX_READ_BATCH,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cleanup_every_cycles == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_CLEANUP_EVERY_CYCLES,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.activity_log_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_ACTIVITY_LOG_CAPACITY,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: ENV_TICK_INTERVAL_MS,
                reason: "must be at least 1ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn with_max_read_batch(mut self, max_read_batch: usize) -> Self {
        self.max_read_batch = max_read_batch;
        self
    }

    pub fn with_cleanup_every_cycles(mut self, cycles: u64) -> Self {
        self.cleanup_every_cycles = cycles;
        self
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

fn parse_or<F, T>(getter: &mut F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match getter(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                key,
                reason: format!("cannot parse {value:?}"),
            }),
        None => Ok(default),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config value {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("read config file failed ({path}): {message}")]
    ReadConfigFile { path: String, message: String },
    #[error("parse config file failed ({path}): {message}")]
    ParseConfigFile { path: String, message: String },
}
