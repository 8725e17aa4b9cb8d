//! Configuration structures for lrmap.

use crate::error::{LrMapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling schedule used while a flush waits for readers to vacate an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the second polling round.
    pub initial_delay: Duration,
    /// Upper bound for the delay between polling rounds.
    pub max_delay: Duration,
    /// Factor applied to the delay after each round.
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_micros(1),
            max_delay: Duration::from_secs(5),
            multiplier: 10,
        }
    }
}

impl BackoffConfig {
    /// Returns the delay that follows `current`, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current
            .checked_mul(self.multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Checks that the schedule makes progress and stays bounded.
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(invalid("backoff.initial_delay", self.initial_delay));
        }
        if self.max_delay < self.initial_delay {
            return Err(invalid("backoff.max_delay", self.max_delay));
        }
        if self.multiplier < 2 {
            return Err(LrMapError::InvalidParameter {
                name: "backoff.multiplier".to_string(),
                value: self.multiplier.to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for a left-right map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapConfig {
    /// Capacity reserved in each of the two arenas up front.
    pub initial_capacity: usize,
    /// Quiescence wait schedule.
    pub backoff: BackoffConfig,
}

impl MapConfig {
    /// Returns a config with the given arena capacity and default backoff.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Default::default()
        }
    }

    /// Validates all nested settings.
    pub fn validate(&self) -> Result<()> {
        self.backoff.validate()
    }
}

fn invalid(name: &str, value: Duration) -> LrMapError {
    LrMapError::InvalidParameter {
        name: name.to_string(),
        value: format!("{:?}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_defaults() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_delay, Duration::from_micros(1));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert_eq!(config.multiplier, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_next_delay_grows_then_caps() {
        let config = BackoffConfig::default();
        let mut delay = config.initial_delay;
        let mut seen = vec![delay];
        for _ in 0..9 {
            delay = config.next_delay(delay);
            seen.push(delay);
        }

        assert_eq!(seen[1], Duration::from_micros(10));
        assert_eq!(seen[2], Duration::from_micros(100));
        assert_eq!(seen[6], Duration::from_secs(1));
        assert_eq!(seen[7], Duration::from_secs(5));
        assert_eq!(seen[9], Duration::from_secs(5));
    }

    #[test]
    fn test_next_delay_overflow_saturates() {
        let config = BackoffConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::MAX,
            multiplier: u32::MAX,
        };
        assert_eq!(config.next_delay(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_backoff_rejects_zero_initial_delay() {
        let config = BackoffConfig {
            initial_delay: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LrMapError::InvalidParameter { ref name, .. } if name == "backoff.initial_delay"
        ));
    }

    #[test]
    fn test_backoff_rejects_inverted_bounds() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(1),
            multiplier: 2,
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LrMapError::InvalidParameter { ref name, .. } if name == "backoff.max_delay"
        ));
    }

    #[test]
    fn test_backoff_rejects_flat_multiplier() {
        let config = BackoffConfig {
            multiplier: 1,
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Invalid parameter: backoff.multiplier = 1"
        );
    }

    #[test]
    fn test_map_config_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.initial_capacity, 0);
        assert_eq!(config.backoff, BackoffConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_map_config_with_capacity() {
        let config = MapConfig::with_capacity(4096);
        assert_eq!(config.initial_capacity, 4096);
        assert_eq!(config.backoff, BackoffConfig::default());
    }

    #[test]
    fn test_map_config_serde_roundtrip() {
        let original = MapConfig {
            initial_capacity: 128,
            backoff: BackoffConfig {
                initial_delay: Duration::from_micros(50),
                max_delay: Duration::from_millis(250),
                multiplier: 4,
            },
        };
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: MapConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
