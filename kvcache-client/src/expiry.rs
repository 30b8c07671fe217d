//! Expiry units and the default expiry policy applied by the cache client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::config::parse_number;
use crate::error::ConfigError;

/// Unit in which an expiry amount is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryUnit {
    #[serde(alias = "ms")]
    Milliseconds,
    #[serde(alias = "s")]
    Seconds,
    #[serde(alias = "m")]
    Minutes,
    #[serde(alias = "h")]
    Hours,
    #[serde(alias = "d")]
    Days,
}

impl ExpiryUnit {
    /// Converts `amount` of this unit into a `Duration`.
    ///
    /// Returns `None` on overflow.
    pub fn to_duration(self, amount: u64) -> Option<Duration> {
        let secs_per_unit = match self {
            ExpiryUnit::Milliseconds => return Some(Duration::from_millis(amount)),
            ExpiryUnit::Seconds => 1,
            ExpiryUnit::Minutes => 60,
            ExpiryUnit::Hours => 60 * 60,
            ExpiryUnit::Days => 24 * 60 * 60,
        };
        amount.checked_mul(secs_per_unit).map(Duration::from_secs)
    }
}

impl fmt::Display for ExpiryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpiryUnit::Milliseconds => "milliseconds",
            ExpiryUnit::Seconds => "seconds",
            ExpiryUnit::Minutes => "minutes",
            ExpiryUnit::Hours => "hours",
            ExpiryUnit::Days => "days",
        };
        f.write_str(name)
    }
}

impl FromStr for ExpiryUnit {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ms" | "milliseconds" => Ok(ExpiryUnit::Milliseconds),
            "s" | "seconds" => Ok(ExpiryUnit::Seconds),
            "m" | "minutes" => Ok(ExpiryUnit::Minutes),
            "h" | "hours" => Ok(ExpiryUnit::Hours),
            "d" | "days" => Ok(ExpiryUnit::Days),
            _ => Err(()),
        }
    }
}

/// Expiry applied by the `*_with_default_expiry` operations.
///
/// Immutable once handed to a client; use
/// `KeyValueCacheClient::with_default_expiry` to derive a client with a
/// different policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExpiryPolicy {
    /// Amount of `unit`; must be positive to be usable.
    pub duration: u64,
    pub unit: ExpiryUnit,
}

impl Default for ExpiryPolicy {
    /// Ten minutes.
    fn default() -> Self {
        ExpiryPolicy::new(10, ExpiryUnit::Minutes)
    }
}

impl ExpiryPolicy {
    pub const fn new(duration: u64, unit: ExpiryUnit) -> Self {
        ExpiryPolicy { duration, unit }
    }

    /// Returns the policy as a `Duration`, or `None` on overflow.
    pub fn as_duration(&self) -> Option<Duration> {
        self.unit.to_duration(self.duration)
    }

    /// Loads the policy from `KVCACHE_DEFAULT_EXPIRY` (positive integer) and
    /// `KVCACHE_DEFAULT_EXPIRY_UNIT` (`ms`, `s`, `m`, `h`, `d` or full names).
    /// Unset variables keep the ten-minute default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut policy = ExpiryPolicy::default();
        if let Some(raw) = lookup("KVCACHE_DEFAULT_EXPIRY") {
            let duration: u64 = parse_number("KVCACHE_DEFAULT_EXPIRY", raw.clone())?;
            if duration == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "KVCACHE_DEFAULT_EXPIRY",
                    value: raw,
                });
            }
            policy.duration = duration;
        }
        if let Some(raw) = lookup("KVCACHE_DEFAULT_EXPIRY_UNIT") {
            policy.unit = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "KVCACHE_DEFAULT_EXPIRY_UNIT",
                value: raw.clone(),
            })?;
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_ten_minutes() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.unit, ExpiryUnit::Minutes);
        assert_eq!(policy.as_duration(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn converts_units() {
        assert_eq!(ExpiryUnit::Milliseconds.to_duration(1500), Some(Duration::from_millis(1500)));
        assert_eq!(ExpiryUnit::Hours.to_duration(2), Some(Duration::from_secs(7200)));
        assert_eq!(ExpiryUnit::Days.to_duration(1), Some(Duration::from_secs(86_400)));
        assert_eq!(ExpiryUnit::Days.to_duration(u64::MAX), None);
    }

    #[test]
    fn parses_unit_names() {
        assert_eq!("ms".parse::<ExpiryUnit>(), Ok(ExpiryUnit::Milliseconds));
        assert_eq!("Hours".parse::<ExpiryUnit>(), Ok(ExpiryUnit::Hours));
        assert!("fortnights".parse::<ExpiryUnit>().is_err());
    }

    #[test]
    fn loads_policy_from_lookup() {
        let policy = ExpiryPolicy::from_lookup(|name| match name {
            "KVCACHE_DEFAULT_EXPIRY" => Some("30".to_string()),
            "KVCACHE_DEFAULT_EXPIRY_UNIT" => Some("s".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(policy, ExpiryPolicy::new(30, ExpiryUnit::Seconds));
    }

    #[test]
    fn rejects_zero_default_expiry() {
        let err = ExpiryPolicy::from_lookup(|name| {
            (name == "KVCACHE_DEFAULT_EXPIRY").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("KVCACHE_DEFAULT_EXPIRY"));
    }

    #[test]
    fn deserializes_with_aliases() {
        let policy: ExpiryPolicy = serde_json::from_str(r#"{"duration":5,"unit":"h"}"#).unwrap();
        assert_eq!(policy, ExpiryPolicy::new(5, ExpiryUnit::Hours));
    }
}
