//! Configuration data types.

use crate::config::ConfigError;
use crate::shutdown::TriggerPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Shutdown behavior
    #[serde(default)]
    pub shutdown: ShutdownOptions,

    /// Supervised child process settings
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Commands to run as cleanup tasks
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Shutdown options.
///
/// Triggers override `auto_exit` and `exit_code` according to their
/// [`TriggerPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShutdownOptions {
    /// Exit the process with `exit_code` once cleanup succeeded (default: false)
    #[serde(default)]
    pub auto_exit: bool,

    /// Exit code when no failure overrides it (default: 0)
    #[serde(default)]
    pub exit_code: i32,

    /// Deadline for the whole cleanup phase (default: 30s)
    #[serde(default = "default_max_shutdown_time", with = "humantime_serde")]
    pub max_shutdown_time: Duration,

    /// Exit code used when the deadline is exceeded (default: 1)
    #[serde(default = "default_watchdog_exit_code")]
    pub watchdog_exit_code: i32,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            auto_exit: false,
            exit_code: 0,
            max_shutdown_time: default_max_shutdown_time(),
            watchdog_exit_code: default_watchdog_exit_code(),
        }
    }
}

impl ShutdownOptions {
    /// Create validated options.
    pub fn new(
        auto_exit: bool,
        exit_code: i32,
        max_shutdown_time: Duration,
    ) -> Result<Self, ConfigError> {
        let options = Self {
            auto_exit,
            exit_code,
            max_shutdown_time,
            ..Self::default()
        };
        let errors = options.validate();
        if errors.is_empty() {
            Ok(options)
        } else {
            Err(ConfigError::ValidationError(errors.join("; ")))
        }
    }

    /// Options with a trigger's overrides applied.
    pub fn with_policy(&self, policy: TriggerPolicy) -> Self {
        Self {
            auto_exit: policy.force_exit_on_success,
            exit_code: policy
                .default_exit_code_on_failure
                .unwrap_or(self.exit_code),
            ..*self
        }
    }

    /// Problems with these options; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(0..=255).contains(&self.exit_code) {
            errors.push(format!(
                "exit_code {} out of range (must be 0-255)",
                self.exit_code
            ));
        }

        if !(0..=255).contains(&self.watchdog_exit_code) {
            errors.push(format!(
                "watchdog_exit_code {} out of range (must be 0-255)",
                self.watchdog_exit_code
            ));
        }

        if self.max_shutdown_time.is_zero() {
            errors.push("max_shutdown_time must be greater than zero".to_string());
        }

        errors
    }
}

/// Settings for the command run under `gracestop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SupervisorConfig {
    /// Time between SIGTERM and SIGKILL when stopping the child (default: 10s)
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
        }
    }
}

/// A command run as a cleanup task.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HookConfig {
    /// Unique name for this hook
    pub name: String,

    /// Program to execute
    pub command: String,

    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,

    /// Kill the command if it runs longer than this
    #[serde(default, with = "option_humantime_serde")]
    pub timeout: Option<Duration>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_max_shutdown_time() -> Duration {
    Duration::from_secs(30)
}

fn default_watchdog_exit_code() -> i32 {
    1
}

fn default_grace_period() -> Duration {
    Duration::from_secs(10)
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Custom serde module for optional humantime durations.
mod option_humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                let s = humantime::format_duration(*d).to_string();
                serializer.serialize_some(&s)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
