//! Courier driver selection — weighted scoring and SLA-driven greedy selection.
//!
//! This crate only ranks candidates. It does not read or write the state
//! store and does not track workload reservations (that's
//! `courier-scheduler`). Given a set of candidate drivers and an order's
//! locations it returns the winning driver and the numbers behind the choice.
//!
//! # Components
//!
//! - **`scorer`** — `ScoringAssigner`: minimum distance/workload cost, scaled by priority
//! - **`sla`** — `SlaSelector`: maximum rating/proximity score against a delivery-time target
//! - **`convert`** — Conversions from state records and config sections

pub mod convert;
pub mod error;
pub mod scorer;
pub mod sla;

pub use convert::{driver_to_candidate, eligible_candidates, scoring_weights, sla_params};
pub use error::PlacementError;
pub use scorer::{DriverCandidate, DriverScore, ScoreBreakdown, ScoringAssigner, ScoringWeights, rank_candidates, score_candidate};
pub use sla::{SlaParams, SlaScore, SlaSelector, SlaViolation};
