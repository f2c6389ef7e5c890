//! Engine configuration.
//!
//! Every field has a serde default, so a partial (or empty) TOML file
//! yields a complete configuration:
//!
//! ```toml
//! location_enabled = true
//! max_distance_meters = 2500.0
//! lookup_timeout_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::context::{MAX_ENERGY, MIN_ENERGY};
use crate::error::ConfigError;

/// Upper bound for `calendar_buffer_minutes` (one day).
pub const MAX_CALENDAR_BUFFER_MINUTES: i64 = 24 * 60;

/// Configuration passed to [`crate::FilterEngine`] at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub location_enabled: bool,
    #[serde(default = "default_true")]
    pub time_enabled: bool,
    #[serde(default = "default_true")]
    pub dependency_enabled: bool,
    #[serde(default = "default_true")]
    pub priority_enabled: bool,
    /// Proximity threshold for locations without their own radius.
    #[serde(default = "default_max_distance")]
    pub max_distance_meters: f64,
    /// Floor applied to the energy a task is considered to require.
    #[serde(default = "default_min_energy")]
    pub min_energy_level: u8,
    /// Multiplier on the priority term of the score.
    #[serde(default = "default_priority_weight")]
    pub default_priority_weight: f64,
    /// Budget for each collaborator call.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Tasks evaluated at the same time by `filter_tasks`.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Padding around a task's prospective window for calendar checks.
    #[serde(default = "default_calendar_buffer")]
    pub calendar_buffer_minutes: i64,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_max_distance() -> f64 {
    5000.0
}
fn default_min_energy() -> u8 {
    1
}
fn default_priority_weight() -> f64 {
    1.0
}
fn default_lookup_timeout_ms() -> u64 {
    2000
}
fn default_max_concurrency() -> usize {
    8
}
fn default_calendar_buffer() -> i64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            location_enabled: true,
            time_enabled: true,
            dependency_enabled: true,
            priority_enabled: true,
            max_distance_meters: default_max_distance(),
            min_energy_level: default_min_energy(),
            default_priority_weight: default_priority_weight(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            calendar_buffer_minutes: default_calendar_buffer(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, cannot be parsed,
    /// or holds out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Check that every tunable is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_distance_meters.is_finite() && self.max_distance_meters > 0.0) {
            return Err(invalid(
                "max_distance_meters",
                format!("must be a positive number, got {}", self.max_distance_meters),
            ));
        }
        if !(MIN_ENERGY..=MAX_ENERGY).contains(&self.min_energy_level) {
            return Err(invalid(
                "min_energy_level",
                format!(
                    "must be in [{MIN_ENERGY}, {MAX_ENERGY}], got {}",
                    self.min_energy_level
                ),
            ));
        }
        if !(self.default_priority_weight.is_finite() && self.default_priority_weight >= 0.0) {
            return Err(invalid(
                "default_priority_weight",
                format!("must be >= 0, got {}", self.default_priority_weight),
            ));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(invalid("lookup_timeout_ms", "must be > 0".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be > 0".to_string()));
        }
        if !(0..=MAX_CALENDAR_BUFFER_MINUTES).contains(&self.calendar_buffer_minutes) {
            return Err(invalid(
                "calendar_buffer_minutes",
                format!(
                    "must be in [0, {MAX_CALENDAR_BUFFER_MINUTES}], got {}",
                    self.calendar_buffer_minutes
                ),
            ));
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Get a config value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.location_enabled && cfg.time_enabled);
        assert!(cfg.dependency_enabled && cfg.priority_enabled);
        assert_eq!(cfg.max_distance_meters, 5000.0);
        assert_eq!(cfg.min_energy_level, 1);
        assert_eq!(cfg.default_priority_weight, 1.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let cfg = EngineConfig::from_toml_str(
            "time_enabled = false\nmax_distance_meters = 250.0\n",
        )
        .unwrap();
        assert!(!cfg.time_enabled);
        assert!(cfg.location_enabled);
        assert_eq!(cfg.max_distance_meters, 250.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("min_energy_level = 7").unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "min_energy_level")
        );

        let err = EngineConfig::from_toml_str("max_distance_meters = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = EngineConfig::from_toml_str("max_concurrency = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_calendar_buffer_bounds() {
        let err =
            EngineConfig::from_toml_str("calendar_buffer_minutes = 9000000000000").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "calendar_buffer_minutes"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(EngineConfig::from_toml_str("calendar_buffer_minutes = -1").is_err());

        let cfg = EngineConfig::from_toml_str("calendar_buffer_minutes = 1440").unwrap();
        assert_eq!(cfg.calendar_buffer_minutes, MAX_CALENDAR_BUFFER_MINUTES);
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("location_enabled = \"maybe\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "priority_enabled = false").unwrap();
        writeln!(file, "lookup_timeout_ms = 150").unwrap();

        let cfg = EngineConfig::load(file.path()).unwrap();
        assert!(!cfg.priority_enabled);
        assert_eq!(cfg.lookup_timeout(), Duration::from_millis(150));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed { .. }));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut cfg = EngineConfig::default();
        cfg.max_concurrency = 3;
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn test_get_by_key() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.get("location_enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("max_concurrency").as_deref(), Some("8"));
        assert_eq!(cfg.get("nope"), None);
    }
}
