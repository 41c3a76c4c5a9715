//! Weighted driver scoring for dispatch decisions.
//!
//! Each candidate gets a cost built from:
//! - **Distance**: great-circle kilometres from the driver to the pickup
//! - **Workload**: orders the driver is already carrying
//!
//! The sum is divided by the order's priority multiplier. Lower cost wins;
//! equal costs fall back to the lowest driver id so results are reproducible.

use std::cmp::Ordering;

use courier_core::{DriverId, GeoPoint, Priority, haversine_km};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlacementError;

/// What the selectors need to know about a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverCandidate {
    pub driver_id: DriverId,
    pub location: GeoPoint,
    /// Current workload, including any in-flight reservations.
    pub active_orders: u32,
    /// Customer rating, 0.0..=5.0.
    pub rating: f64,
}

/// Scored result for a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverScore {
    pub driver_id: DriverId,
    /// Combined cost (lower = better).
    pub score: f64,
    pub distance_km: f64,
    pub workload: u32,
    /// Breakdown of score components.
    pub breakdown: ScoreBreakdown,
}

/// Individual score components for debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub workload: f64,
    pub priority_multiplier: f64,
}

/// Weights for the scoring components.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub distance: f64,
    pub workload: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.6,
            workload: 0.4,
        }
    }
}

/// Score a single candidate against an order's pickup point and priority.
pub fn score_candidate(
    candidate: &DriverCandidate,
    pickup: &GeoPoint,
    priority: Priority,
    weights: &ScoringWeights,
) -> DriverScore {
    let distance_km = haversine_km(&candidate.location, pickup);
    let distance = distance_km * weights.distance;
    let workload = f64::from(candidate.active_orders) * weights.workload;
    let priority_multiplier = priority.multiplier();

    DriverScore {
        driver_id: candidate.driver_id.clone(),
        score: (distance + workload) / priority_multiplier,
        distance_km,
        workload: candidate.active_orders,
        breakdown: ScoreBreakdown {
            distance,
            workload,
            priority_multiplier,
        },
    }
}

/// Score all candidates and return them cheapest first.
pub fn rank_candidates(
    candidates: &[DriverCandidate],
    pickup: &GeoPoint,
    priority: Priority,
    weights: &ScoringWeights,
) -> Vec<DriverScore> {
    let mut scores: Vec<DriverScore> = candidates
        .iter()
        .map(|c| score_candidate(c, pickup, priority, weights))
        .collect();

    scores.sort_by(by_cost);
    scores
}

/// Picks the driver with the lowest weighted cost.
#[derive(Debug, Clone, Default)]
pub struct ScoringAssigner {
    weights: ScoringWeights,
}

impl ScoringAssigner {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Return the cheapest candidate, or `NoCandidates` if there are none.
    pub fn select(
        &self,
        candidates: &[DriverCandidate],
        pickup: &GeoPoint,
        priority: Priority,
    ) -> Result<DriverScore, PlacementError> {
        let best = rank_candidates(candidates, pickup, priority, &self.weights)
            .into_iter()
            .next()
            .ok_or(PlacementError::NoCandidates)?;

        debug!(
            driver = %best.driver_id,
            score = best.score,
            distance_km = best.distance_km,
            workload = best.workload,
            candidates = candidates.len(),
            "weighted score selected driver"
        );
        Ok(best)
    }
}

/// Lower cost first, then lowest driver id.
fn by_cost(a: &DriverScore, b: &DriverScore) -> Ordering {
    a.score.total_cmp(&b.score).then_with(|| a.driver_id.cmp(&b.driver_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn candidate(id: &str, lat: f64, lon: f64, active: u32) -> DriverCandidate {
        DriverCandidate {
            driver_id: id.to_string(),
            location: point(lat, lon),
            active_orders: active,
            rating: 4.5,
        }
    }

    #[test]
    fn formula_matches_components() {
        let pickup = point(12.97, 77.59);
        let c = candidate("d1", 12.98, 77.59, 2);
        let s = score_candidate(&c, &pickup, Priority::Medium, &ScoringWeights::default());

        let expected_km = haversine_km(&c.location, &pickup);
        assert!((s.distance_km - expected_km).abs() < 1e-12);
        assert!((s.breakdown.distance - expected_km * 0.6).abs() < 1e-12);
        assert!((s.breakdown.workload - 0.8).abs() < 1e-12);
        assert!((s.score - (expected_km * 0.6 + 0.8) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn lower_workload_wins_at_equal_distance() {
        let pickup = point(12.97, 77.59);
        let candidates = vec![
            candidate("d2", 12.97, 77.59, 1),
            candidate("d1", 12.97, 77.59, 0),
        ];
        let assigner = ScoringAssigner::default();

        let best = assigner.select(&candidates, &pickup, Priority::High).unwrap();
        assert_eq!(best.driver_id, "d1");
        assert_eq!(best.score, 0.0);
    }

    #[test]
    fn closer_driver_wins_at_equal_workload() {
        let pickup = point(12.97, 77.59);
        let candidates = vec![
            candidate("far", 13.10, 77.59, 0),
            candidate("near", 12.975, 77.59, 0),
        ];
        let best = ScoringAssigner::default()
            .select(&candidates, &pickup, Priority::Low)
            .unwrap();
        assert_eq!(best.driver_id, "near");
    }

    #[test]
    fn high_priority_lowers_cost() {
        let pickup = point(12.97, 77.59);
        let c = candidate("d1", 13.00, 77.60, 1);
        let weights = ScoringWeights::default();

        let high = score_candidate(&c, &pickup, Priority::High, &weights);
        let medium = score_candidate(&c, &pickup, Priority::Medium, &weights);
        let low = score_candidate(&c, &pickup, Priority::Low, &weights);

        assert!(high.score < medium.score);
        assert!(medium.score < low.score);
        assert!((low.score - 3.0 * high.score).abs() < 1e-9);
    }

    #[test]
    fn ties_break_by_lowest_id() {
        let pickup = point(12.97, 77.59);
        let candidates = vec![
            candidate("d3", 12.98, 77.59, 1),
            candidate("d1", 12.98, 77.59, 1),
            candidate("d2", 12.98, 77.59, 1),
        ];

        let ranked = rank_candidates(&candidates, &pickup, Priority::Low, &ScoringWeights::default());
        let ids: Vec<&str> = ranked.iter().map(|s| s.driver_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn rank_is_ascending() {
        let pickup = point(12.97, 77.59);
        let candidates = vec![
            candidate("a", 13.05, 77.59, 0),
            candidate("b", 12.97, 77.59, 3),
            candidate("c", 12.99, 77.59, 1),
        ];
        let ranked = rank_candidates(&candidates, &pickup, Priority::Low, &ScoringWeights::default());
        assert!(ranked.windows(2).all(|w| by_cost(&w[0], &w[1]) != Ordering::Greater));
    }

    #[test]
    fn empty_candidates_fail() {
        let result = ScoringAssigner::default().select(&[], &point(0.0, 0.0), Priority::High);
        assert_eq!(result, Err(PlacementError::NoCandidates));
    }

    #[test]
    fn custom_weights_can_ignore_workload() {
        let pickup = point(12.97, 77.59);
        let candidates = vec![
            candidate("busy-near", 12.971, 77.59, 5),
            candidate("idle-far", 13.05, 77.59, 0),
        ];
        let assigner = ScoringAssigner::new(ScoringWeights {
            distance: 1.0,
            workload: 0.0,
        });
        let best = assigner.select(&candidates, &pickup, Priority::Low).unwrap();
        assert_eq!(best.driver_id, "busy-near");
    }
}
