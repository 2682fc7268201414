//! # Configuration Module
//!
//! Defines the per-crawl configuration, its validation rules, and the
//! per-spider override layer.
//!
//! ## Overview
//!
//! A `CrawlConfig` is resolved once per crawl launch: the caller's global
//! configuration is merged with the spider's `ConfigOverrides`, validated, and
//! then handed to the manager by value. Nothing in the engine reads settings
//! from a shared mutable table afterwards.
//!
//! Stop thresholds are modeled by `Threshold`, which accepts either a literal
//! integer or a string form (`"500"`, `"disabled"`, `"off"`) from external
//! settings sources. Malformed values are rejected when the configuration is
//! loaded, never at control-loop time.

use crate::error::EngineError;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// An optional stop limit: disabled, or an integer ceiling/floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threshold {
    /// The policy never fires.
    #[default]
    Disabled,
    /// The policy fires relative to this limit.
    Limit(u64),
}

impl Threshold {
    /// The configured limit, or `None` when disabled.
    #[inline]
    pub fn limit(&self) -> Option<u64> {
        match self {
            Threshold::Disabled => None,
            Threshold::Limit(limit) => Some(*limit),
        }
    }

    /// Whether the policy is switched off.
    #[inline]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Threshold::Disabled)
    }
}

impl From<u64> for Threshold {
    fn from(limit: u64) -> Self {
        Threshold::Limit(limit)
    }
}

impl FromStr for Threshold {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "disabled" | "off" => Ok(Threshold::Disabled),
            _ => normalized.parse::<u64>().map(Threshold::Limit).map_err(|_| {
                EngineError::Configuration(format!(
                    "invalid threshold '{}', expected a non-negative integer or 'disabled'",
                    value
                ))
            }),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Disabled => write!(f, "disabled"),
            Threshold::Limit(limit) => write!(f, "{}", limit),
        }
    }
}

impl Serialize for Threshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Threshold::Disabled => serializer.serialize_str("disabled"),
            Threshold::Limit(limit) => serializer.serialize_u64(*limit),
        }
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ThresholdVisitor;

        impl<'de> de::Visitor<'de> for ThresholdVisitor {
            type Value = Threshold;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer, an integer string, or \"disabled\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Threshold, E> {
                Ok(Threshold::Limit(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Threshold, E> {
                u64::try_from(value)
                    .map(Threshold::Limit)
                    .map_err(|_| E::custom("threshold cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Threshold, E> {
                value.parse::<Threshold>().map_err(E::custom)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Threshold, E> {
                Ok(Threshold::Disabled)
            }

            fn visit_none<E: de::Error>(self) -> Result<Threshold, E> {
                Ok(Threshold::Disabled)
            }
        }

        deserializer.deserialize_any(ThresholdVisitor)
    }
}

/// Configuration for one crawl, resolved at launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Number of workers launched at startup.
    pub concurrent_workers: usize,
    /// Control loop period in milliseconds.
    pub control_loop_interval_ms: u64,
    /// Stop once the item store holds at least this many items.
    pub closespider_itemcount: Threshold,
    /// Stop once the per-interval item delta falls to or below this value.
    /// The comparison is against the raw delta, not a normalized rate, so
    /// changing the interval changes the effective velocity floor.
    pub closespider_timeout: Threshold,
    /// How many seed requests are enqueued before startup returns; the rest
    /// are enqueued by a detached background task.
    pub seed_sync_limit: usize,
    /// Pause after a failed fetch or parse before a worker dequeues again,
    /// in milliseconds.
    pub worker_backoff_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            concurrent_workers: 4,
            control_loop_interval_ms: 60_000,
            closespider_itemcount: Threshold::Disabled,
            closespider_timeout: Threshold::Disabled,
            seed_sync_limit: 50,
            worker_backoff_ms: 250,
        }
    }
}

impl CrawlConfig {
    /// Creates a configuration with the documented defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers launched at startup.
    pub fn concurrent_workers(mut self, count: usize) -> Self {
        self.concurrent_workers = count;
        self
    }

    /// Sets the control loop period in milliseconds.
    pub fn control_loop_interval_ms(mut self, interval_ms: u64) -> Self {
        self.control_loop_interval_ms = interval_ms;
        self
    }

    /// Sets the item-count stop ceiling.
    pub fn closespider_itemcount(mut self, threshold: impl Into<Threshold>) -> Self {
        self.closespider_itemcount = threshold.into();
        self
    }

    /// Sets the stagnation stop floor.
    pub fn closespider_timeout(mut self, threshold: impl Into<Threshold>) -> Self {
        self.closespider_timeout = threshold.into();
        self
    }

    /// Sets how many seed requests are enqueued synchronously at startup.
    pub fn seed_sync_limit(mut self, limit: usize) -> Self {
        self.seed_sync_limit = limit;
        self
    }

    /// The control loop period as a `Duration`.
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.control_loop_interval_ms)
    }

    /// The worker error backoff as a `Duration`.
    #[inline]
    pub fn worker_backoff(&self) -> Duration {
        Duration::from_millis(self.worker_backoff_ms)
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.concurrent_workers == 0 {
            return Err(EngineError::Configuration(
                "concurrent_workers must be greater than 0.".to_string(),
            ));
        }
        if self.control_loop_interval_ms == 0 {
            return Err(EngineError::Configuration(
                "control_loop_interval_ms must be greater than 0.".to_string(),
            ));
        }
        if self.seed_sync_limit == 0 {
            return Err(EngineError::Configuration(
                "seed_sync_limit must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }

    /// Layers per-spider overrides on top of this configuration.
    pub fn merge(&self, overrides: &ConfigOverrides) -> CrawlConfig {
        let mut merged = self.clone();
        if let Some(count) = overrides.concurrent_workers {
            merged.concurrent_workers = count;
        }
        if let Some(interval_ms) = overrides.control_loop_interval_ms {
            merged.control_loop_interval_ms = interval_ms;
        }
        if let Some(threshold) = overrides.closespider_itemcount {
            merged.closespider_itemcount = threshold;
        }
        if let Some(threshold) = overrides.closespider_timeout {
            merged.closespider_timeout = threshold;
        }
        merged
    }
}

/// Per-spider settings layered over the global configuration at launch.
///
/// `None` fields leave the corresponding global value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub concurrent_workers: Option<usize>,
    pub control_loop_interval_ms: Option<u64>,
    pub closespider_itemcount: Option<Threshold>,
    pub closespider_timeout: Option<Threshold>,
}

impl ConfigOverrides {
    /// Creates an override set that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the number of workers launched at startup.
    pub fn concurrent_workers(mut self, count: usize) -> Self {
        self.concurrent_workers = Some(count);
        self
    }

    /// Overrides the control loop period in milliseconds.
    pub fn control_loop_interval_ms(mut self, interval_ms: u64) -> Self {
        self.control_loop_interval_ms = Some(interval_ms);
        self
    }

    /// Overrides the item-count stop ceiling.
    pub fn closespider_itemcount(mut self, threshold: impl Into<Threshold>) -> Self {
        self.closespider_itemcount = Some(threshold.into());
        self
    }

    /// Overrides the stagnation stop floor.
    pub fn closespider_timeout(mut self, threshold: impl Into<Threshold>) -> Self {
        self.closespider_timeout = Some(threshold.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CrawlConfig::default();
        assert_eq!(config.concurrent_workers, 4);
        assert_eq!(config.control_loop_interval_ms, 60_000);
        assert_eq!(config.closespider_itemcount, Threshold::Disabled);
        assert_eq!(config.closespider_timeout, Threshold::Disabled);
        assert_eq!(config.seed_sync_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fluent_setters_apply() {
        let config = CrawlConfig::new()
            .concurrent_workers(8)
            .control_loop_interval_ms(1_000)
            .closespider_itemcount(100u64)
            .closespider_timeout(5u64);
        assert_eq!(config.concurrent_workers, 8);
        assert_eq!(config.tick_interval(), Duration::from_millis(1_000));
        assert_eq!(config.closespider_itemcount, Threshold::Limit(100));
        assert_eq!(config.closespider_timeout, Threshold::Limit(5));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let err = CrawlConfig::new()
            .concurrent_workers(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("concurrent_workers"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let err = CrawlConfig::new()
            .control_loop_interval_ms(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("control_loop_interval_ms"));
    }

    #[test]
    fn validate_rejects_zero_seed_limit() {
        let err = CrawlConfig::new().seed_sync_limit(0).validate().unwrap_err();
        assert!(err.to_string().contains("seed_sync_limit"));
    }

    #[test]
    fn threshold_parses_integers_and_disabled_forms() {
        assert_eq!("500".parse::<Threshold>().unwrap(), Threshold::Limit(500));
        assert_eq!(" 42 ".parse::<Threshold>().unwrap(), Threshold::Limit(42));
        assert_eq!("disabled".parse::<Threshold>().unwrap(), Threshold::Disabled);
        assert_eq!("OFF".parse::<Threshold>().unwrap(), Threshold::Disabled);
        assert_eq!("".parse::<Threshold>().unwrap(), Threshold::Disabled);
    }

    #[test]
    fn threshold_rejects_malformed_strings() {
        let err = "10 items".parse::<Threshold>().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("10 items"));
        assert!("-3".parse::<Threshold>().is_err());
    }

    #[test]
    fn threshold_deserializes_from_integer_or_string() {
        let config: CrawlConfig =
            serde_json::from_str(r#"{"closespider_itemcount": 500, "closespider_timeout": "25"}"#)
                .unwrap();
        assert_eq!(config.closespider_itemcount, Threshold::Limit(500));
        assert_eq!(config.closespider_timeout, Threshold::Limit(25));
    }

    #[test]
    fn threshold_deserializes_null_as_disabled() {
        let config: CrawlConfig =
            serde_json::from_str(r#"{"closespider_itemcount": null}"#).unwrap();
        assert_eq!(config.closespider_itemcount, Threshold::Disabled);
    }

    #[test]
    fn threshold_rejects_malformed_settings_at_load() {
        let malformed: Result<CrawlConfig, _> =
            serde_json::from_str(r#"{"closespider_itemcount": "oops"}"#);
        assert!(malformed.is_err());
        let negative: Result<CrawlConfig, _> =
            serde_json::from_str(r#"{"closespider_timeout": -5}"#);
        assert!(negative.is_err());
    }

    #[test]
    fn merge_layers_overrides_over_globals() {
        let config = CrawlConfig::new().concurrent_workers(4).closespider_itemcount(100u64);
        let overrides = ConfigOverrides::new()
            .concurrent_workers(2)
            .closespider_timeout(10u64);
        let merged = config.merge(&overrides);
        assert_eq!(merged.concurrent_workers, 2);
        assert_eq!(merged.closespider_itemcount, Threshold::Limit(100));
        assert_eq!(merged.closespider_timeout, Threshold::Limit(10));
        assert_eq!(merged.control_loop_interval_ms, 60_000);
    }
}
