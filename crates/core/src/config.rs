//! Engine runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the engine as an `Arc<EngineConfig>`. Rule functions never read environment
//! variables; the host resolves values (for example from `.env`) using the `*_from_env_value`
//! helpers below and hands the result in.

use crate::constants::{
    DEFAULT_DAILY_BOUNDARY_HOUR, DEFAULT_DOSE_GRACE_MINUTES, DEFAULT_LAB_LOOKBACK_HOURS,
    DEFAULT_SWEEP_BATCH_SIZE, DEFAULT_SWEEP_PAUSE_MILLIS, DEFAULT_VITALS_LOOKBACK_HOURS,
};
use crate::{EngineError, EngineResult};
use chrono::Duration;
use chrono_tz::Tz;
use std::str::FromStr;

/// Engine configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    timezone: Tz,
    daily_boundary_hour: u32,
    lab_lookback: Duration,
    vitals_lookback: Duration,
    dose_grace: Duration,
    sweep_batch_size: usize,
    sweep_pause: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            daily_boundary_hour: DEFAULT_DAILY_BOUNDARY_HOUR,
            lab_lookback: Duration::hours(DEFAULT_LAB_LOOKBACK_HOURS),
            vitals_lookback: Duration::hours(DEFAULT_VITALS_LOOKBACK_HOURS),
            dose_grace: Duration::minutes(DEFAULT_DOSE_GRACE_MINUTES),
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            sweep_pause: std::time::Duration::from_millis(DEFAULT_SWEEP_PAUSE_MILLIS),
        }
    }
}

impl EngineConfig {
    /// Create a new `EngineConfig` for a site in `timezone` whose assessment day starts at
    /// `daily_boundary_hour` local time. Remaining settings take their defaults.
    pub fn new(timezone: Tz, daily_boundary_hour: u32) -> EngineResult<Self> {
        if daily_boundary_hour > 23 {
            return Err(EngineError::InvalidConfig(format!(
                "daily boundary hour must be 0-23, got {daily_boundary_hour}"
            )));
        }

        Ok(Self {
            timezone,
            daily_boundary_hour,
            ..Self::default()
        })
    }

    pub fn with_lookbacks(self, lab: Duration, vitals: Duration) -> EngineResult<Self> {
        if lab <= Duration::zero() || vitals <= Duration::zero() {
            return Err(EngineError::InvalidConfig(
                "lookback windows must be positive".into(),
            ));
        }
        Ok(Self {
            lab_lookback: lab,
            vitals_lookback: vitals,
            ..self
        })
    }

    pub fn with_dose_grace(self, grace: Duration) -> EngineResult<Self> {
        if grace < Duration::zero() {
            return Err(EngineError::InvalidConfig(
                "dose grace period cannot be negative".into(),
            ));
        }
        Ok(Self {
            dose_grace: grace,
            ..self
        })
    }

    pub fn with_sweep(self, batch_size: usize, pause: std::time::Duration) -> EngineResult<Self> {
        if batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "sweep batch size must be positive".into(),
            ));
        }
        Ok(Self {
            sweep_batch_size: batch_size,
            sweep_pause: pause,
            ..self
        })
    }

    /// Site timezone; local boundaries follow its daylight saving rules.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn daily_boundary_hour(&self) -> u32 {
        self.daily_boundary_hour
    }

    pub fn lab_lookback(&self) -> Duration {
        self.lab_lookback
    }

    pub fn vitals_lookback(&self) -> Duration {
        self.vitals_lookback
    }

    pub fn dose_grace(&self) -> Duration {
        self.dose_grace
    }

    pub fn sweep_batch_size(&self) -> usize {
        self.sweep_batch_size
    }

    pub fn sweep_pause(&self) -> std::time::Duration {
        self.sweep_pause
    }
}

/// Parse the site timezone from an optional IANA name such as `Europe/London`.
///
/// If `value` is `None` or empty/whitespace, returns UTC.
pub fn timezone_from_env_value(value: Option<String>) -> EngineResult<Tz> {
    let Some(raw) = non_blank(value) else {
        return Ok(Tz::UTC);
    };
    raw.parse::<Tz>()
        .map_err(|_| EngineError::InvalidConfig(format!("unknown timezone '{raw}'")))
}

/// Parse a numeric setting named `name` from an optional string value, falling back to `default`
/// when the value is absent or blank.
pub fn number_from_env_value<T: FromStr>(
    name: &str,
    value: Option<String>,
    default: T,
) -> EngineResult<T> {
    match non_blank(value) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| EngineError::InvalidConfig(format!("{name} must be a number, got '{raw}'"))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
