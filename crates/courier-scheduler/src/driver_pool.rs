//! Round-robin driver pool.
//!
//! Hands out drivers in insertion order, one per call, wrapping at the end.
//! Load and distance are ignored: this is the fairness-first fallback.
//!
//! The pool is a plain owned value with `&mut self` operations. Callers that
//! share it across threads wrap it in a single `Mutex` so each rotation step
//! is atomic.

use courier_core::DriverId;
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

/// Read-only snapshot of a [`DriverPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub drivers: Vec<DriverId>,
    pub cursor: usize,
    /// Driver the next call to `next` will return.
    pub next_driver: Option<DriverId>,
}

/// Ordered set of driver ids with a rotating cursor.
///
/// With no mutation between calls, `len()` consecutive `next()` calls return
/// every driver exactly once in insertion order. Removing a driver while a
/// rotation is under way may make the remaining drivers of that rotation
/// skip or repeat once: when the cursor falls off the end it restarts at 0.
#[derive(Debug, Clone, Default)]
pub struct DriverPool {
    drivers: Vec<DriverId>,
    cursor: usize,
}

impl DriverPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a driver. Returns false if it was already present.
    pub fn add(&mut self, driver_id: impl Into<DriverId>) -> bool {
        let driver_id = driver_id.into();
        if self.contains(&driver_id) {
            return false;
        }
        self.drivers.push(driver_id);
        true
    }

    /// Remove a driver. Returns false if it was not present.
    ///
    /// Resets the cursor to 0 if it no longer points inside the pool.
    pub fn remove(&mut self, driver_id: &str) -> bool {
        let Some(index) = self.drivers.iter().position(|d| d == driver_id) else {
            return false;
        };
        self.drivers.remove(index);
        if self.cursor >= self.drivers.len() {
            self.cursor = 0;
        }
        true
    }

    /// Return the driver at the cursor and advance it.
    pub fn next(&mut self) -> SchedulerResult<DriverId> {
        if self.drivers.is_empty() {
            return Err(SchedulerError::EmptyPool);
        }
        let driver = self.drivers[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.drivers.len();
        Ok(driver)
    }

    /// Move the cursor onto `driver_id` so the next call returns it.
    /// Returns false, leaving the cursor alone, if the driver is not pooled.
    pub fn seek(&mut self, driver_id: &str) -> bool {
        match self.drivers.iter().position(|d| d == driver_id) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> PoolState {
        PoolState {
            drivers: self.drivers.clone(),
            cursor: self.cursor,
            next_driver: self.drivers.get(self.cursor).cloned(),
        }
    }

    pub fn contains(&self, driver_id: &str) -> bool {
        self.drivers.iter().any(|d| d == driver_id)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
