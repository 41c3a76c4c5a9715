//! Placement error types.

use thiserror::Error;

use crate::sla::SlaViolation;

/// Errors that can occur while selecting a driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("no candidate drivers")]
    NoCandidates,

    /// The best candidate cannot meet the delivery-time target. The
    /// candidate is carried so the caller may still decide to use it.
    #[error("{0}")]
    SlaViolation(SlaViolation),
}
