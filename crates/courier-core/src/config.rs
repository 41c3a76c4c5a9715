//! courier.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::DispatchStrategy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub dispatch: DispatchConfig,
    pub scoring: ScoringConfig,
    pub sla: SlaConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Strategy used by plain `assign` and by batch auto-assignment.
    pub strategy: DispatchStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Cost per kilometre between driver and pickup.
    pub distance_weight: f64,
    /// Cost per order the driver is already carrying.
    pub workload_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.6,
            workload_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Delivery-time target in minutes.
    pub target_minutes: f64,
    /// Average travel speed used for ETA estimation.
    pub speed_kmh: f64,
    pub rating_weight: f64,
    pub distance_weight: f64,
    /// Trip length at which the proximity term reaches zero.
    pub max_expected_km: f64,
    /// Commit the best driver even when its ETA misses the target.
    /// The violation is still reported on the result.
    pub allow_violations: bool,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            target_minutes: 10.0,
            speed_kmh: 20.0,
            rating_weight: 0.4,
            distance_weight: 0.6,
            max_expected_km: 8.0,
            allow_violations: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite and non-negative, got {value}")]
    NegativeWeight { field: &'static str, value: f64 },
    #[error("{field} must be finite and greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

impl CourierConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CourierConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config with every default spelled out.
    pub fn scaffold(strategy: DispatchStrategy) -> Self {
        CourierConfig {
            dispatch: DispatchConfig { strategy },
            ..CourierConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("scoring.distance_weight", self.scoring.distance_weight)?;
        non_negative("scoring.workload_weight", self.scoring.workload_weight)?;
        non_negative("sla.rating_weight", self.sla.rating_weight)?;
        non_negative("sla.distance_weight", self.sla.distance_weight)?;
        positive("sla.target_minutes", self.sla.target_minutes)?;
        positive("sla.speed_kmh", self.sla.speed_kmh)?;
        positive("sla.max_expected_km", self.sla.max_expected_km)?;
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeWeight { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}
