use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CliqueError;

/// Timeout used when the caller's context has no deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Period of the time ticks fed to the state machine.
pub const DEFAULT_TIME_TICK: Duration = Duration::from_secs(1);

pub const ENV_DEFAULT_TIMEOUT: &str = "GPA_CLIQUE_DEFAULT_TIMEOUT";
pub const ENV_TIME_TICK: &str = "GPA_CLIQUE_TIME_TICK";

/// Configuration for a [`Clique`](crate::Clique) runtime.
///
/// ```rust
/// use std::time::Duration;
/// use gpa_clique::CliqueConfig;
///
/// let config = CliqueConfig::new()
///     .default_timeout(Duration::from_secs(10))
///     .time_tick(Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliqueConfig {
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub time_tick: Duration,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CliqueConfig {
    pub fn new() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            time_tick: DEFAULT_TIME_TICK,
        }
    }

    /// Defaults, overridden by `GPA_CLIQUE_DEFAULT_TIMEOUT` and
    /// `GPA_CLIQUE_TIME_TICK` when set (humantime syntax, e.g. `750ms`).
    pub fn from_env() -> Result<Self, CliqueError> {
        let mut config = Self::new();
        if let Some(d) = env_duration(ENV_DEFAULT_TIMEOUT)? {
            config.default_timeout = d;
        }
        if let Some(d) = env_duration(ENV_TIME_TICK)? {
            config.time_tick = d;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn time_tick(mut self, tick: Duration) -> Self {
        self.time_tick = tick;
        self
    }

    pub fn validate(&self) -> Result<(), CliqueError> {
        if self.time_tick.is_zero() {
            return Err(CliqueError::Config("time_tick must be positive".into()));
        }
        if self.default_timeout.is_zero() {
            return Err(CliqueError::Config(
                "default_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_duration(var: &'static str) -> Result<Option<Duration>, CliqueError> {
    match std::env::var(var) {
        Ok(s) => humantime::parse_duration(s.trim())
            .map(Some)
            .map_err(|e| CliqueError::EnvDuration {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
