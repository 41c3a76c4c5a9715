//! Shared types used across Courier crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a driver.
pub type DriverId = String;

/// Unique identifier for an order.
pub type OrderId = String;

/// Delivery priority of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[serde(alias = "High")]
    High,
    #[serde(alias = "Medium")]
    Medium,
    #[default]
    #[serde(alias = "Low")]
    Low,
}

impl Priority {
    /// Divisor applied to a weighted dispatch cost. Higher priority shrinks
    /// the cost, so urgent orders win closer ties.
    pub fn multiplier(&self) -> f64 {
        match self {
            Priority::High => 3.0,
            Priority::Medium => 2.0,
            Priority::Low => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which driver-selection policy the coordinator runs.
///
/// `WeightedScore` minimizes a cost, `SlaGreedy` maximizes a quality score.
/// They are kept as distinct variants so the two score directions never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Fairness-only rotation through the driver pool.
    RoundRobin,
    /// Lowest combined distance/workload cost, scaled by priority.
    #[default]
    WeightedScore,
    /// Highest rating/proximity score against a delivery-time target.
    SlaGreedy,
}

impl DispatchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchStrategy::RoundRobin => "round_robin",
            DispatchStrategy::WeightedScore => "weighted_score",
            DispatchStrategy::SlaGreedy => "sla_greedy",
        }
    }
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DispatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "round-robin" => Ok(DispatchStrategy::RoundRobin),
            "weighted_score" | "weighted-score" => Ok(DispatchStrategy::WeightedScore),
            "sla_greedy" | "sla-greedy" => Ok(DispatchStrategy::SlaGreedy),
            other => Err(format!("unknown dispatch strategy: {other}")),
        }
    }
}
