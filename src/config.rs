//! Scheduler configuration.
//!
//! The host loop decides how many timers may be outstanding at once. A
//! capacity-limited build (`bounded` feature) defaults to
//! [`DEFAULT_MAX_OUTSTANDING_TIMERS`]; otherwise the default is unbounded.

use std::env::VarError;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cap applied by default in capacity-limited builds.
pub const DEFAULT_MAX_OUTSTANDING_TIMERS: usize = 100_000;

/// Environment variable read by [`SchedulerConfig::from_env`].
pub const MAX_TIMERS_ENV: &str = "REACTOR_TIMERS_MAX_TIMERS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Maximum number of concurrently pending timers; `None` is unbounded.
    pub max_outstanding_timers: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_outstanding_timers: default_max_outstanding(),
        }
    }
}

#[cfg(feature = "bounded")]
const fn default_max_outstanding() -> Option<usize> {
    Some(DEFAULT_MAX_OUTSTANDING_TIMERS)
}

#[cfg(not(feature = "bounded"))]
const fn default_max_outstanding() -> Option<usize> {
    None
}

impl SchedulerConfig {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_outstanding_timers: None,
        }
    }

    #[must_use]
    pub const fn with_max_timers(max: usize) -> Self {
        Self {
            max_outstanding_timers: Some(max),
        }
    }

    /// Defaults, overridden by `REACTOR_TIMERS_MAX_TIMERS` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_env_var(std::env::var(MAX_TIMERS_ENV))
    }

    fn from_env_var(var: std::result::Result<String, VarError>) -> Result<Self> {
        match var {
            Ok(raw) => Ok(Self {
                max_outstanding_timers: parse_max_timers(&raw)?,
            }),
            Err(VarError::NotPresent) => Ok(Self::default()),
            Err(err) => Err(Error::config(format!("{MAX_TIMERS_ENV}: {err}"))),
        }
    }

    /// A cap of zero is invalid everywhere a cap is accepted; `None` is the
    /// only spelling of unbounded.
    pub fn validate(&self) -> Result<()> {
        if self.max_outstanding_timers == Some(0) {
            return Err(Error::config(
                "max_outstanding_timers must be > 0; use null for unbounded",
            ));
        }
        Ok(())
    }
}

/// Parse a max-timers override. `unbounded`, `unlimited`, `none` and the
/// empty string mean "no limit"; `0` is rejected like a zero cap in config.
pub fn parse_max_timers(value: &str) -> Result<Option<usize>> {
    let value = value.trim();
    let max = match value.to_ascii_lowercase().as_str() {
        "" | "none" | "unbounded" | "unlimited" => None,
        other => Some(other.parse::<usize>().map_err(|err| {
            Error::config(format!("{MAX_TIMERS_ENV}={value:?} is not a timer count: {err}"))
        })?),
    };
    SchedulerConfig {
        max_outstanding_timers: max,
    }
    .validate()?;
    Ok(max)
}
