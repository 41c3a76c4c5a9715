//! Type conversions between state records, config, and placement types.
//!
//! Bridges `courier_state::Driver` and `courier_core::config` sections to the
//! selectors' `DriverCandidate`, `ScoringWeights`, and `SlaParams`.

use courier_core::config::{ScoringConfig, SlaConfig};
use courier_state::Driver;

use crate::scorer::{DriverCandidate, ScoringWeights};
use crate::sla::SlaParams;

/// Convert a [`Driver`] to a [`DriverCandidate`].
///
/// `reserved` is added to the driver's persisted workload; it counts orders
/// that have been promised to the driver but not yet committed.
pub fn driver_to_candidate(driver: &Driver, reserved: u32) -> DriverCandidate {
    DriverCandidate {
        driver_id: driver.id().to_string(),
        location: driver.location(),
        active_orders: driver.active_orders().saturating_add(reserved),
        rating: driver.rating(),
    }
}

/// Candidates for every driver that is available and still has room once
/// `reserved(driver_id)` in-flight orders are counted.
pub fn eligible_candidates<F>(drivers: &[Driver], reserved: F) -> Vec<DriverCandidate>
where
    F: Fn(&str) -> u32,
{
    drivers
        .iter()
        .filter(|d| d.is_available())
        .filter_map(|d| {
            let held = reserved(d.id());
            (d.active_orders().saturating_add(held) < d.max_workload())
                .then(|| driver_to_candidate(d, held))
        })
        .collect()
}

/// Convert a [`ScoringConfig`] section to [`ScoringWeights`].
pub fn scoring_weights(config: &ScoringConfig) -> ScoringWeights {
    ScoringWeights {
        distance: config.distance_weight,
        workload: config.workload_weight,
    }
}

/// Convert an [`SlaConfig`] section to [`SlaParams`].
pub fn sla_params(config: &SlaConfig) -> SlaParams {
    SlaParams {
        target_minutes: config.target_minutes,
        speed_kmh: config.speed_kmh,
        rating_weight: config.rating_weight,
        distance_weight: config.distance_weight,
        max_expected_km: config.max_expected_km,
    }
}
