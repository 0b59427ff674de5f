use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid engine config: {0}")]
pub struct ConfigError(String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of the check-in idempotency bucket. Retries inside one bucket
    /// collapse onto the same event.
    pub check_in_bucket_secs: u64,
    /// Deadline for each trip-sheet or channel-host call.
    pub upstream_timeout_ms: u64,
    pub max_zone_radius_meters: f64,
    /// Fixes reporting worse accuracy need an override. `None` disables the check.
    pub max_accuracy_meters: Option<f64>,
    /// Longest silence between tracked fixes that still counts as one
    /// continuous stay inside a zone.
    pub dwell_max_gap_secs: u32,
    /// Recipient groups every check-in notification is addressed to. The first
    /// one is the default for queries and read receipts.
    pub recipient_groups: Vec<String>,
    pub auto_create_channels: bool,
    pub event_bus_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_in_bucket_secs: 1800,
            upstream_timeout_ms: 5000,
            max_zone_radius_meters: 1000.0,
            max_accuracy_meters: Some(50.0),
            dwell_max_gap_secs: 120,
            recipient_groups: vec!["shipping-office".to_string()],
            auto_create_channels: false,
            event_bus_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|err| ConfigError(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_in_bucket_secs == 0 {
            return Err(ConfigError("check_in_bucket_secs must be positive".to_string()));
        }
        if self.dwell_max_gap_secs == 0 {
            return Err(ConfigError("dwell_max_gap_secs must be positive".to_string()));
        }
        if !(self.max_zone_radius_meters.is_finite() && self.max_zone_radius_meters > 0.0) {
            return Err(ConfigError("max_zone_radius_meters must be positive".to_string()));
        }
        if self.recipient_groups.iter().any(|group| group.trim().is_empty()) {
            return Err(ConfigError("recipient group names cannot be blank".to_string()));
        }
        if self.recipient_groups.is_empty() {
            return Err(ConfigError("at least one recipient group is required".to_string()));
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn dwell_max_gap(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.dwell_max_gap_secs))
    }

    pub fn is_recipient_group(&self, group: &str) -> bool {
        self.recipient_groups.iter().any(|known| known == group)
    }

    pub fn primary_recipient_group(&self) -> &str {
        self.recipient_groups
            .first()
            .map_or("shipping-office", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.check_in_bucket_secs, 1800);
        assert_eq!(config.primary_recipient_group(), "shipping-office");
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            upstream_timeout_ms = 250
            recipient_groups = ["dock-a", "dock-b"]
            auto_create_channels = true
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream_timeout(), Duration::from_millis(250));
        assert_eq!(config.primary_recipient_group(), "dock-a");
        assert!(config.auto_create_channels);
        assert_eq!(config.max_accuracy_meters, Some(50.0));
    }

    #[test]
    fn zero_bucket_is_rejected() {
        assert!(EngineConfig::from_toml_str("check_in_bucket_secs = 0").is_err());
    }

    #[test]
    fn dwell_gap_must_be_positive() {
        assert!(EngineConfig::from_toml_str("dwell_max_gap_secs = 0").is_err());
        let config = EngineConfig::from_toml_str("dwell_max_gap_secs = 90").unwrap();
        assert_eq!(config.dwell_max_gap(), chrono::Duration::seconds(90));
    }
}
