//! Scheduler error types.

use courier_placement::SlaViolation;
use courier_state::{OrderStatus, StateError};
use thiserror::Error;

/// Errors that can occur during dispatch operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("driver not found: {0}")]
    DriverNotFound(String),

    #[error("driver already registered: {0}")]
    DriverAlreadyRegistered(String),

    #[error("order {order_id} is {status}, only pending orders can be assigned")]
    OrderNotPending {
        order_id: String,
        status: OrderStatus,
    },

    /// No eligible driver; the order stays pending and may be retried.
    #[error("no available driver for order: {0}")]
    NoAvailableDriver(String),

    #[error("driver pool is empty")]
    EmptyPool,

    #[error("sla violation for order {order_id}: {violation}")]
    SlaViolation {
        order_id: String,
        violation: SlaViolation,
    },

    /// Another attempt holds the order or committed it first.
    #[error("concurrent assignment conflict on order: {0}")]
    ConcurrentAssignmentConflict(String),

    #[error("driver {driver_id} cannot take orders: {reason}")]
    DriverIneligible { driver_id: String, reason: String },

    #[error("invalid transition for order {order_id}: {reason}")]
    InvalidTransition { order_id: String, reason: String },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
