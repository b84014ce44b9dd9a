//! Runtime configuration for the allocation core.
//!
//! Every knob has a production default; values may be overridden through
//! `ERRAND_*` environment variables. Durations are configured in seconds
//! (days for the notification retention) and exposed as [`TimeDelta`]s.

use std::env;
use std::str::FromStr;

use chrono::TimeDelta;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Error raised when an environment override cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {variable}: {message}")]
pub struct ConfigError {
    /// The offending environment variable.
    pub variable: String,
    /// Why the value was rejected.
    pub message: String,
}

/// Tunable parameters of the allocation core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Factor splitting gross payment into net + commission.
    pub commission_rate: Decimal,
    /// Minimum interval between first application and winner selection.
    pub auction_window_secs: i64,
    /// Minimum `priority_level` for which the push path runs.
    pub push_priority_threshold: u8,
    /// How long an applicant-less task waits before push fires.
    pub push_staleness_secs: i64,
    /// Time after deadline before unallocated tasks are auto-deleted.
    pub grace_period_secs: i64,
    /// Completed-task count below which a doer is a newbie.
    pub newbie_threshold: u32,
    /// Ranking bonus added for newbies in auction resolution.
    pub newbie_bonus: Decimal,
    /// Smallest admissible task price.
    pub minimum_price: Decimal,
    /// Age beyond which notifications are pruned.
    pub notification_retention_days: i64,
    /// Network timeout for payment-gateway calls, in seconds.
    pub gateway_timeout_secs: u64,
    /// Upper bound on reconciliation attempts per payment.
    pub reconcile_max_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.10),
            auction_window_secs: 3 * 60,
            push_priority_threshold: 4,
            push_staleness_secs: 10 * 60,
            grace_period_secs: 24 * 60 * 60,
            newbie_threshold: 3,
            newbie_bonus: dec!(15),
            minimum_price: dec!(10),
            notification_retention_days: 30,
            gateway_timeout_secs: 10,
            reconcile_max_attempts: 5,
        }
    }
}

impl CoreConfig {
    /// Load configuration from `ERRAND_*` environment variables.
    ///
    /// Absent variables keep their defaults; present but malformed values
    /// fail loading with a [`ConfigError`] naming the variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        read_env("ERRAND_COMMISSION_RATE", &mut config.commission_rate)?;
        read_env("ERRAND_AUCTION_WINDOW_SECS", &mut config.auction_window_secs)?;
        read_env(
            "ERRAND_PUSH_PRIORITY_THRESHOLD",
            &mut config.push_priority_threshold,
        )?;
        read_env("ERRAND_PUSH_STALENESS_SECS", &mut config.push_staleness_secs)?;
        read_env("ERRAND_GRACE_PERIOD_SECS", &mut config.grace_period_secs)?;
        read_env("ERRAND_NEWBIE_THRESHOLD", &mut config.newbie_threshold)?;
        read_env("ERRAND_NEWBIE_BONUS", &mut config.newbie_bonus)?;
        read_env("ERRAND_MINIMUM_PRICE", &mut config.minimum_price)?;
        read_env(
            "ERRAND_NOTIFICATION_RETENTION_DAYS",
            &mut config.notification_retention_days,
        )?;
        read_env("ERRAND_GATEWAY_TIMEOUT_SECS", &mut config.gateway_timeout_secs)?;
        read_env(
            "ERRAND_RECONCILE_MAX_ATTEMPTS",
            &mut config.reconcile_max_attempts,
        )?;
        Ok(config)
    }

    /// Auction window as a time delta.
    pub fn auction_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.auction_window_secs)
    }

    /// Push staleness as a time delta.
    pub fn push_staleness(&self) -> TimeDelta {
        TimeDelta::seconds(self.push_staleness_secs)
    }

    /// Grace period as a time delta.
    pub fn grace_period(&self) -> TimeDelta {
        TimeDelta::seconds(self.grace_period_secs)
    }

    /// Notification retention as a time delta.
    pub fn notification_retention(&self) -> TimeDelta {
        TimeDelta::days(self.notification_retention_days)
    }

    /// Gateway timeout as a std duration for HTTP clients.
    pub fn gateway_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gateway_timeout_secs)
    }
}

fn read_env<T>(variable: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(variable) {
        Ok(raw) => {
            *slot = raw.parse().map_err(|err: T::Err| ConfigError {
                variable: variable.to_owned(),
                message: err.to_string(),
            })?;
            Ok(())
        }
        Err(env::VarError::NotPresent) => Ok(()),
        Err(err) => Err(ConfigError {
            variable: variable.to_owned(),
            message: err.to_string(),
        }),
    }
}
