//! In-memory bookkeeping for assignments that are selected but not yet
//! committed.
//!
//! Two guards keep concurrent attempts from trampling each other:
//!
//! - [`OrderClaims`] lets only one attempt work on an order at a time.
//! - [`WorkloadLedger`] counts orders promised to a driver ahead of the
//!   store commit, so parallel selections see the driver's true load.
//!
//! Both hand out RAII guards. Dropping a [`Reservation`] without calling
//! [`Reservation::confirm`] rolls the promised slot back.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use courier_core::{DriverId, OrderId};
use courier_state::Driver;
use tracing::debug;

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section here leaves its map consistent, so a poisoned
/// lock still guards valid data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Order claims ──────────────────────────────────────────────────

/// Orders currently being worked on.
#[derive(Debug, Default)]
pub struct OrderClaims {
    inflight: Mutex<HashSet<OrderId>>,
}

impl OrderClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an order. Returns `None` if another attempt holds it.
    pub fn claim(&self, order_id: &str) -> Option<OrderClaim<'_>> {
        if !lock(&self.inflight).insert(order_id.to_string()) {
            return None;
        }
        Some(OrderClaim {
            claims: self,
            order_id: order_id.to_string(),
        })
    }

    pub fn is_claimed(&self, order_id: &str) -> bool {
        lock(&self.inflight).contains(order_id)
    }
}

/// Held while an order is being worked on. Released on drop.
#[derive(Debug)]
pub struct OrderClaim<'a> {
    claims: &'a OrderClaims,
    order_id: OrderId,
}

impl OrderClaim<'_> {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }
}

impl Drop for OrderClaim<'_> {
    fn drop(&mut self) {
        lock(&self.claims.inflight).remove(&self.order_id);
    }
}

// ── Workload ledger ───────────────────────────────────────────────

/// Per-driver count of reserved, uncommitted orders.
#[derive(Debug, Default)]
pub struct WorkloadLedger {
    reserved: Mutex<HashMap<DriverId, u32>>,
}

impl WorkloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders currently reserved for `driver_id`.
    pub fn reserved(&self, driver_id: &str) -> u32 {
        lock(&self.reserved).get(driver_id).copied().unwrap_or(0)
    }

    /// Reservations per driver, for diagnostics.
    pub fn snapshot(&self) -> BTreeMap<DriverId, u32> {
        lock(&self.reserved)
            .iter()
            .map(|(id, n)| (id.clone(), *n))
            .collect()
    }

    /// Reserve one slot on `driver`.
    ///
    /// Checks availability and `active + reserved < max` under the ledger
    /// lock. Returns `None` if the driver has no room left.
    pub fn reserve(&self, driver: &Driver) -> Option<Reservation<'_>> {
        if !driver.is_available() {
            return None;
        }
        let mut reserved = lock(&self.reserved);
        let held = reserved.entry(driver.id().to_string()).or_insert(0);
        if driver.active_orders().saturating_add(*held) >= driver.max_workload() {
            if *held == 0 {
                reserved.remove(driver.id());
            }
            return None;
        }
        *held += 1;
        Some(Reservation {
            ledger: self,
            driver_id: driver.id().to_string(),
            confirmed: false,
        })
    }

    fn release(&self, driver_id: &str) {
        let mut reserved = lock(&self.reserved);
        if let Some(held) = reserved.get_mut(driver_id) {
            *held = held.saturating_sub(1);
            if *held == 0 {
                reserved.remove(driver_id);
            }
        }
    }
}

/// One slot promised to a driver.
///
/// On [`confirm`](Reservation::confirm) the slot is handed over to the
/// persisted workload. On drop without confirmation it is rolled back.
#[derive(Debug)]
pub struct Reservation<'a> {
    ledger: &'a WorkloadLedger,
    driver_id: DriverId,
    confirmed: bool,
}

impl Reservation<'_> {
    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    /// The store now carries this slot; stop counting it here.
    pub fn confirm(mut self) {
        self.confirmed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.ledger.release(&self.driver_id);
        if !self.confirmed {
            debug!(driver = %self.driver_id, "workload reservation rolled back");
        }
    }
}
