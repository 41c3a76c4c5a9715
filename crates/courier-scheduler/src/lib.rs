//! courier-scheduler — driver pool, workload bookkeeping, and assignment
//! coordination.
//!
//! # Components
//!
//! - **`driver_pool`** — `DriverPool`: round-robin rotation over driver ids
//! - **`inflight`** — `OrderClaims` and `WorkloadLedger`: per-order exclusion
//!   and reserved-but-uncommitted workload
//! - **`registry`** — `DispatchRegistry`: the storage operations the
//!   coordinator needs, implemented for `StateStore`
//! - **`coordinator`** — `AssignmentCoordinator`: runs a strategy, commits
//!   the winner, and drives the order lifecycle afterwards

pub mod coordinator;
pub mod driver_pool;
pub mod error;
pub mod inflight;
pub mod registry;

pub use coordinator::{
    AssignmentCoordinator, AssignmentResult, BatchDetail, BatchReport, DispatchAnalytics,
    DriverLoad, SELECTION_ATTEMPTS,
};
pub use driver_pool::{DriverPool, PoolState};
pub use error::{SchedulerError, SchedulerResult};
pub use inflight::{OrderClaim, OrderClaims, Reservation, WorkloadLedger};
pub use registry::DispatchRegistry;
