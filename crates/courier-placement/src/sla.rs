//! Greedy driver selection against a delivery-time target.
//!
//! Each candidate is scored on rating and trip length:
//!
//! ```text
//! to_pickup_km   = haversine(driver, pickup)
//! to_delivery_km = haversine(pickup, delivery)
//! total_km       = to_pickup_km + to_delivery_km
//! eta_minutes    = total_km / speed_kmh * 60
//! score          = rating_weight * rating / 5
//!                + distance_weight * clamp(1 - total_km / max_expected_km, 0, 1)
//! ```
//!
//! Higher score wins, the opposite direction from `scorer`. The winner's
//! ETA is reported as computed; if it misses the target the selector
//! returns [`PlacementError::SlaViolation`] carrying the winner.

use std::fmt;

use courier_core::{DriverId, GeoPoint, haversine_km};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PlacementError;
use crate::scorer::DriverCandidate;

/// Constants for SLA-driven selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaParams {
    pub target_minutes: f64,
    pub speed_kmh: f64,
    pub rating_weight: f64,
    pub distance_weight: f64,
    pub max_expected_km: f64,
}

impl Default for SlaParams {
    fn default() -> Self {
        Self {
            target_minutes: 10.0,
            speed_kmh: 20.0,
            rating_weight: 0.4,
            distance_weight: 0.6,
            max_expected_km: 8.0,
        }
    }
}

impl SlaParams {
    /// Travel time in minutes for `km` at the configured speed.
    pub fn eta_minutes(&self, km: f64) -> f64 {
        km / self.speed_kmh * 60.0
    }
}

/// Scored result for a single candidate (higher = better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaScore {
    pub driver_id: DriverId,
    pub score: f64,
    pub rating: f64,
    pub to_pickup_km: f64,
    pub to_delivery_km: f64,
    pub total_km: f64,
    pub estimated_minutes: f64,
}

/// The best available driver cannot make the delivery-time target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaViolation {
    pub best: SlaScore,
    pub target_minutes: f64,
}

impl fmt::Display for SlaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "best driver {} needs {:.1} min, target is {:.1} min",
            self.best.driver_id, self.best.estimated_minutes, self.target_minutes
        )
    }
}

/// Picks the driver with the highest rating/proximity score.
#[derive(Debug, Clone, Default)]
pub struct SlaSelector {
    params: SlaParams,
}

impl SlaSelector {
    pub fn new(params: SlaParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SlaParams {
        &self.params
    }

    /// Score one candidate for a pickup/delivery pair.
    pub fn score(&self, candidate: &DriverCandidate, pickup: &GeoPoint, delivery: &GeoPoint) -> SlaScore {
        let p = &self.params;
        let to_pickup_km = haversine_km(&candidate.location, pickup);
        let to_delivery_km = haversine_km(pickup, delivery);
        let total_km = to_pickup_km + to_delivery_km;
        let proximity = (1.0 - total_km / p.max_expected_km).clamp(0.0, 1.0);

        SlaScore {
            driver_id: candidate.driver_id.clone(),
            score: p.rating_weight * (candidate.rating / 5.0) + p.distance_weight * proximity,
            rating: candidate.rating,
            to_pickup_km,
            to_delivery_km,
            total_km,
            estimated_minutes: p.eta_minutes(total_km),
        }
    }

    /// All candidates, best first (highest score, ties by lowest id).
    pub fn rank(&self, candidates: &[DriverCandidate], pickup: &GeoPoint, delivery: &GeoPoint) -> Vec<SlaScore> {
        let mut scores: Vec<SlaScore> = candidates
            .iter()
            .map(|c| self.score(c, pickup, delivery))
            .collect();
        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.driver_id.cmp(&b.driver_id))
        });
        scores
    }

    /// Return the best candidate if it meets the target.
    ///
    /// Fails with `NoCandidates` on an empty slice and with `SlaViolation`
    /// when the winner's estimate exceeds `target_minutes`.
    pub fn select(
        &self,
        candidates: &[DriverCandidate],
        pickup: &GeoPoint,
        delivery: &GeoPoint,
    ) -> Result<SlaScore, PlacementError> {
        let best = self
            .rank(candidates, pickup, delivery)
            .into_iter()
            .next()
            .ok_or(PlacementError::NoCandidates)?;

        if best.estimated_minutes > self.params.target_minutes {
            warn!(
                driver = %best.driver_id,
                estimated_minutes = best.estimated_minutes,
                target_minutes = self.params.target_minutes,
                "best driver misses delivery-time target"
            );
            return Err(PlacementError::SlaViolation(SlaViolation {
                best,
                target_minutes: self.params.target_minutes,
            }));
        }

        debug!(
            driver = %best.driver_id,
            score = best.score,
            estimated_minutes = best.estimated_minutes,
            "sla greedy selected driver"
        );
        Ok(best)
    }
}
