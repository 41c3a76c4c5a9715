//! Error types for the Courier state store and record validation.

use courier_core::GeoError;
use thiserror::Error;

use crate::types::OrderStatus;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("order {order_id} is {status}, expected pending")]
    OrderNotPending {
        order_id: String,
        status: OrderStatus,
    },

    #[error("driver {0} is unavailable")]
    DriverUnavailable(String),

    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors raised while constructing or mutating a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} id must not be empty")]
    EmptyId(&'static str),

    #[error("max workload must be greater than zero")]
    ZeroMaxWorkload,

    #[error("driver {driver_id} at capacity ({active}/{max})")]
    WorkloadExceeded {
        driver_id: String,
        active: u32,
        max: u32,
    },

    #[error("rating must be within 0..=5, got {0}")]
    Rating(f64),

    #[error("invalid location: {0}")]
    Location(#[from] GeoError),

    #[error("order cannot move from {from} to {to}")]
    Transition { from: OrderStatus, to: OrderStatus },

    #[error("order in {0} state must carry an assigned driver")]
    MissingDriver(OrderStatus),

    #[error("pending order must not carry an assigned driver")]
    UnexpectedDriver,
}
