//! Assignment coordinator — turns pending orders into committed assignments.
//!
//! For each order the coordinator:
//! - claims the order so no other attempt can work on it concurrently
//! - loads the drivers from the registry and filters to eligible ones
//! - runs the requested strategy (weighted score, SLA greedy, round robin)
//! - reserves a workload slot on the winner in the in-memory ledger
//! - commits driver workload, order status and assignment record in one
//!   registry transaction
//!
//! A failed commit drops the reservation, which rolls the slot back. If the
//! commit failed because the chosen driver changed after the snapshot was
//! read, drivers are reloaded and selection runs again, up to
//! [`SELECTION_ATTEMPTS`] times. After a commit, completing or cancelling the
//! order releases the slot in the store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use courier_core::{
    CourierConfig, DispatchStrategy, DriverId, GeoPoint, OrderId, epoch_secs, haversine_km,
};
use courier_placement::{
    PlacementError, ScoringAssigner, SlaSelector, SlaViolation, eligible_candidates,
    scoring_weights, sla_params,
};
use courier_state::{Assignment, Driver, Order, OrderStatus, StateError, StateStore, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver_pool::{DriverPool, PoolState};
use crate::error::{SchedulerError, SchedulerResult};
use crate::inflight::{OrderClaims, Reservation, WorkloadLedger, lock};
use crate::registry::DispatchRegistry;

/// Snapshot-select-commit rounds per order before a stale driver is reported.
pub const SELECTION_ATTEMPTS: usize = 3;

/// Outcome of a successful assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    /// The order as committed (`Assigned`).
    pub order: Order,
    /// The driver as committed, workload already incremented.
    pub driver: Driver,
    /// `None` for a manual override.
    pub strategy: Option<DispatchStrategy>,
    pub score: f64,
    /// Driver to pickup distance.
    pub distance_km: f64,
    /// Active orders the driver carried when it was selected.
    pub workload: u32,
    pub estimated_minutes: f64,
    /// Set when the SLA target was missed and violations are allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_warning: Option<SlaViolation>,
}

/// Summary of an [`AssignmentCoordinator::auto_assign_pending`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_orders: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub details: Vec<BatchDetail>,
}

/// Per-order line of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDetail {
    pub order_id: OrderId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Workload snapshot for one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverLoad {
    pub driver_id: DriverId,
    pub available: bool,
    pub active_orders: u32,
    /// Slots held by in-flight assignments.
    pub reserved: u32,
    pub max_workload: u32,
    /// `active_orders / max_workload`.
    pub utilization: f64,
}

/// Fleet-wide dispatch summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAnalytics {
    pub drivers: Vec<DriverLoad>,
    /// Order count keyed by status label.
    pub orders_by_status: BTreeMap<String, usize>,
    pub live_assignments: usize,
    pub pool: PoolState,
}

/// A chosen driver with its reserved slot, waiting to be committed.
struct Selection<'a> {
    driver: Driver,
    score: f64,
    distance_km: f64,
    estimated_minutes: f64,
    reservation: Reservation<'a>,
    sla_warning: Option<SlaViolation>,
}

/// Orchestrates driver selection and assignment commits.
///
/// All operations take `&self`; the coordinator can be shared across
/// threads behind an `Arc`.
pub struct AssignmentCoordinator<R = StateStore> {
    registry: R,
    config: CourierConfig,
    scoring: ScoringAssigner,
    sla: SlaSelector,
    /// Round-robin rotation over available drivers.
    pool: Mutex<DriverPool>,
    ledger: WorkloadLedger,
    claims: OrderClaims,
}

impl<R: DispatchRegistry> AssignmentCoordinator<R> {
    /// Create a coordinator. The round-robin pool is seeded with every
    /// available driver, in id order, and resumes at the saved cursor.
    pub fn new(registry: R, config: CourierConfig) -> SchedulerResult<Self> {
        let mut drivers = registry.list_drivers()?;
        drivers.sort_by(|a, b| a.id().cmp(b.id()));

        let mut pool = DriverPool::new();
        for driver in drivers.iter().filter(|d| d.is_available()) {
            pool.add(driver.id());
        }
        if let Some(next) = registry.pool_cursor()? {
            if !pool.seek(&next) {
                debug!(driver = %next, "saved pool cursor no longer pooled, starting at head");
            }
        }

        info!(
            pool = pool.len(),
            next = ?pool.state().next_driver,
            strategy = %config.dispatch.strategy,
            "assignment coordinator ready"
        );

        Ok(Self {
            scoring: ScoringAssigner::new(scoring_weights(&config.scoring)),
            sla: SlaSelector::new(sla_params(&config.sla)),
            registry,
            config,
            pool: Mutex::new(pool),
            ledger: WorkloadLedger::new(),
            claims: OrderClaims::new(),
        })
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn ledger(&self) -> &WorkloadLedger {
        &self.ledger
    }

    // ── Assignment ─────────────────────────────────────────────────

    /// Assign an order with the configured default strategy.
    pub fn assign_order(&self, order_id: &str) -> SchedulerResult<AssignmentResult> {
        self.assign_order_with(order_id, self.config.dispatch.strategy)
    }

    /// Assign an order with an explicit strategy.
    pub fn assign_order_with(
        &self,
        order_id: &str,
        strategy: DispatchStrategy,
    ) -> SchedulerResult<AssignmentResult> {
        self.assign(order_id, Some(strategy), |order, drivers| match strategy {
            DispatchStrategy::WeightedScore => self.select_weighted(order, drivers),
            DispatchStrategy::SlaGreedy => self.select_sla(order, drivers),
            DispatchStrategy::RoundRobin => self.select_round_robin(order, drivers),
        })
    }

    /// Assign an order to the next eligible driver in the rotation.
    pub fn assign_order_round_robin(&self, order_id: &str) -> SchedulerResult<AssignmentResult> {
        self.assign_order_with(order_id, DispatchStrategy::RoundRobin)
    }

    /// Assign an order to a specific driver, bypassing selection.
    ///
    /// The order must be pending and the driver available with room left.
    pub fn manual_assign(&self, order_id: &str, driver_id: &str) -> SchedulerResult<AssignmentResult> {
        self.assign(order_id, None, |order, drivers| {
            let driver = drivers
                .iter()
                .find(|d| d.id() == driver_id)
                .ok_or_else(|| SchedulerError::DriverNotFound(driver_id.to_string()))?;
            if !driver.is_available() {
                return Err(SchedulerError::DriverIneligible {
                    driver_id: driver_id.to_string(),
                    reason: "unavailable".into(),
                });
            }
            let reservation = self.ledger.reserve(driver).ok_or_else(|| {
                SchedulerError::DriverIneligible {
                    driver_id: driver_id.to_string(),
                    reason: "at capacity".into(),
                }
            })?;
            let (distance_km, estimated_minutes) = self.trip(driver.location(), order);
            Ok(Selection {
                driver: driver.clone(),
                score: 0.0,
                distance_km,
                estimated_minutes,
                reservation,
                sla_warning: None,
            })
        })
    }

    /// Assign every pending order, oldest first, with the default strategy.
    ///
    /// A failure on one order is recorded in the report and the batch moves
    /// on. Only failing to list the pending orders aborts the run.
    pub fn auto_assign_pending(&self) -> SchedulerResult<BatchReport> {
        let pending = self.registry.orders_with_status(OrderStatus::Pending)?;
        let strategy = self.config.dispatch.strategy;

        let mut report = BatchReport {
            total_orders: pending.len(),
            ..BatchReport::default()
        };

        for order in &pending {
            match self.assign_order_with(order.id(), strategy) {
                Ok(result) => {
                    report.success_count += 1;
                    report.details.push(BatchDetail {
                        order_id: order.id().to_string(),
                        success: true,
                        driver_id: Some(result.driver.id().to_string()),
                        error: None,
                    });
                }
                Err(e) => {
                    debug!(order = %order.id(), error = %e, "batch assignment failed for order");
                    report.failed_count += 1;
                    report.details.push(BatchDetail {
                        order_id: order.id().to_string(),
                        success: false,
                        driver_id: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            total = report.total_orders,
            assigned = report.success_count,
            failed = report.failed_count,
            %strategy,
            "batch assignment finished"
        );
        Ok(report)
    }

    // ── Order lifecycle ────────────────────────────────────────────

    pub fn mark_in_transit(&self, order_id: &str) -> SchedulerResult<Order> {
        self.transition(order_id, OrderStatus::InTransit)
    }

    /// Mark an order delivered, releasing its driver's workload slot.
    pub fn complete_order(&self, order_id: &str) -> SchedulerResult<Order> {
        self.transition(order_id, OrderStatus::Delivered)
    }

    /// Cancel an order. An assigned order releases its driver's slot.
    pub fn cancel_order(&self, order_id: &str) -> SchedulerResult<Order> {
        self.transition(order_id, OrderStatus::Cancelled)
    }

    // ── Drivers and pool ───────────────────────────────────────────

    /// Persist a new driver. Available drivers join the round-robin pool.
    ///
    /// An id that is already registered is rejected; its stored workload
    /// belongs to live assignments and is never overwritten.
    pub fn register_driver(&self, driver: Driver) -> SchedulerResult<()> {
        self.registry.insert_driver(&driver).map_err(|e| match e {
            StateError::AlreadyExists(_) => {
                SchedulerError::DriverAlreadyRegistered(driver.id().to_string())
            }
            other => other.into(),
        })?;
        self.sync_pool(&driver);
        info!(driver = %driver.id(), available = driver.is_available(), "driver registered");
        Ok(())
    }

    /// Mark a driver unavailable and remove it from the pool. Its current
    /// orders stay assigned.
    pub fn deactivate_driver(&self, driver_id: &str) -> SchedulerResult<Driver> {
        let driver = self.update_driver(driver_id, &mut |d: &mut Driver| d.set_available(false))?;
        self.sync_pool(&driver);
        info!(driver = %driver_id, "driver deactivated");
        Ok(driver)
    }

    /// Mark a driver available and add it back to the pool.
    pub fn activate_driver(&self, driver_id: &str) -> SchedulerResult<Driver> {
        let driver = self.update_driver(driver_id, &mut |d: &mut Driver| d.set_available(true))?;
        self.sync_pool(&driver);
        info!(driver = %driver_id, "driver activated");
        Ok(driver)
    }

    pub fn update_driver_location(&self, driver_id: &str, location: GeoPoint) -> SchedulerResult<Driver> {
        let driver = self.update_driver(driver_id, &mut |d: &mut Driver| d.set_location(location))?;
        debug!(
            driver = %driver_id,
            lat = location.latitude(),
            lon = location.longitude(),
            "driver location updated"
        );
        Ok(driver)
    }

    pub fn pool_state(&self) -> PoolState {
        lock(&self.pool).state()
    }

    /// Add a known driver to the rotation. Returns false if already present.
    pub fn add_to_pool(&self, driver_id: &str) -> SchedulerResult<bool> {
        if self.registry.get_driver(driver_id)?.is_none() {
            return Err(SchedulerError::DriverNotFound(driver_id.to_string()));
        }
        let mut pool = lock(&self.pool);
        let added = pool.add(driver_id);
        self.save_cursor(&pool);
        Ok(added)
    }

    /// Remove a driver from the rotation. Returns false if it was absent.
    pub fn remove_from_pool(&self, driver_id: &str) -> bool {
        let mut pool = lock(&self.pool);
        let removed = pool.remove(driver_id);
        self.save_cursor(&pool);
        removed
    }

    // ── Reporting ──────────────────────────────────────────────────

    pub fn analytics(&self) -> SchedulerResult<DispatchAnalytics> {
        let drivers: Vec<DriverLoad> = self
            .registry
            .list_drivers()?
            .iter()
            .map(|d| DriverLoad {
                driver_id: d.id().to_string(),
                available: d.is_available(),
                active_orders: d.active_orders(),
                reserved: self.ledger.reserved(d.id()),
                max_workload: d.max_workload(),
                utilization: f64::from(d.active_orders()) / f64::from(d.max_workload()),
            })
            .collect();

        let mut orders_by_status = BTreeMap::new();
        for order in self.registry.list_orders()? {
            *orders_by_status
                .entry(order.status().label().to_string())
                .or_insert(0) += 1;
        }

        Ok(DispatchAnalytics {
            drivers,
            orders_by_status,
            live_assignments: self.registry.list_assignments()?.len(),
            pool: self.pool_state(),
        })
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Claim, load, select, and commit one order.
    ///
    /// When the chosen driver turns out to be full or unavailable (the
    /// snapshot predates another commit), the round is repeated on a fresh
    /// snapshot. A manual pick is only repeated for commit failures, since
    /// its selection check is already authoritative.
    fn assign<'a, F>(
        &'a self,
        order_id: &str,
        strategy: Option<DispatchStrategy>,
        select: F,
    ) -> SchedulerResult<AssignmentResult>
    where
        F: Fn(&Order, &[Driver]) -> SchedulerResult<Selection<'a>>,
    {
        let _claim = self
            .claims
            .claim(order_id)
            .ok_or_else(|| SchedulerError::ConcurrentAssignmentConflict(order_id.to_string()))?;

        let order = self
            .registry
            .get_order(order_id)?
            .ok_or_else(|| SchedulerError::OrderNotFound(order_id.to_string()))?;
        if order.status() != OrderStatus::Pending {
            return Err(SchedulerError::OrderNotPending {
                order_id: order_id.to_string(),
                status: order.status(),
            });
        }

        let mut attempt = 1;
        loop {
            let drivers = self.registry.list_drivers()?;
            let outcome = match select(&order, &drivers) {
                Ok(selection) => self.commit(&order, strategy, selection),
                Err(e) if strategy.is_none() => return Err(e),
                Err(e) => Err(e),
            };
            match outcome {
                Err(SchedulerError::DriverIneligible { driver_id, reason })
                    if attempt < SELECTION_ATTEMPTS =>
                {
                    debug!(
                        order = %order_id,
                        driver = %driver_id,
                        %reason,
                        attempt,
                        "driver changed since snapshot, selecting again"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn commit(
        &self,
        order: &Order,
        strategy: Option<DispatchStrategy>,
        selection: Selection<'_>,
    ) -> SchedulerResult<AssignmentResult> {
        let Selection {
            driver,
            score,
            distance_km,
            estimated_minutes,
            reservation,
            sla_warning,
        } = selection;

        let assignment = Assignment {
            order_id: order.id().to_string(),
            driver_id: driver.id().to_string(),
            strategy,
            score,
            distance_km,
            estimated_minutes,
            created_at: epoch_secs(),
        };

        match self.registry.commit_assignment(&assignment) {
            Ok((order, committed)) => {
                reservation.confirm();
                info!(
                    order = %order.id(),
                    driver = %committed.id(),
                    strategy = strategy.map_or("manual", |s| s.label()),
                    score,
                    distance_km,
                    workload = committed.active_orders(),
                    "order assigned"
                );
                Ok(AssignmentResult {
                    order,
                    driver: committed,
                    strategy,
                    score,
                    distance_km,
                    workload: driver.active_orders(),
                    estimated_minutes,
                    sla_warning,
                })
            }
            Err(e) => {
                drop(reservation);
                warn!(
                    order = %order.id(),
                    driver = %driver.id(),
                    error = %e,
                    "assignment commit failed, reservation rolled back"
                );
                Err(commit_error(order.id(), e))
            }
        }
    }

    fn select_weighted<'a>(&'a self, order: &Order, drivers: &[Driver]) -> SchedulerResult<Selection<'a>> {
        let candidates = eligible_candidates(drivers, |id| self.ledger.reserved(id));
        let best = self
            .scoring
            .select(&candidates, &order.pickup(), order.priority())
            .map_err(|e| placement_error(order.id(), e))?;

        let driver = find_driver(drivers, &best.driver_id)?;
        let reservation = self.reserve(order, driver)?;
        let (_, estimated_minutes) = self.trip(driver.location(), order);
        Ok(Selection {
            driver: driver.clone(),
            score: best.score,
            distance_km: best.distance_km,
            estimated_minutes,
            reservation,
            sla_warning: None,
        })
    }

    fn select_sla<'a>(&'a self, order: &Order, drivers: &[Driver]) -> SchedulerResult<Selection<'a>> {
        let candidates = eligible_candidates(drivers, |id| self.ledger.reserved(id));
        let (best, sla_warning) =
            match self.sla.select(&candidates, &order.pickup(), &order.delivery()) {
                Ok(best) => (best, None),
                Err(PlacementError::SlaViolation(violation)) if self.config.sla.allow_violations => {
                    (violation.best.clone(), Some(violation))
                }
                Err(e) => return Err(placement_error(order.id(), e)),
            };

        let driver = find_driver(drivers, &best.driver_id)?;
        let reservation = self.reserve(order, driver)?;
        Ok(Selection {
            driver: driver.clone(),
            score: best.score,
            distance_km: best.to_pickup_km,
            estimated_minutes: best.estimated_minutes,
            reservation,
            sla_warning,
        })
    }

    /// Walk at most one full rotation, skipping drivers that are unknown,
    /// unavailable, or at capacity.
    fn select_round_robin<'a>(&'a self, order: &Order, drivers: &[Driver]) -> SchedulerResult<Selection<'a>> {
        let mut pool = lock(&self.pool);
        if pool.is_empty() {
            return Err(SchedulerError::EmptyPool);
        }

        for _ in 0..pool.len() {
            let driver_id = pool.next()?;
            let Some(driver) = drivers.iter().find(|d| d.id() == driver_id) else {
                warn!(driver = %driver_id, "pooled driver missing from registry");
                continue;
            };
            let Some(reservation) = self.ledger.reserve(driver) else {
                debug!(driver = %driver_id, "round robin skipped ineligible driver");
                continue;
            };

            self.save_cursor(&pool);
            let (distance_km, estimated_minutes) = self.trip(driver.location(), order);
            return Ok(Selection {
                driver: driver.clone(),
                score: 0.0,
                distance_km,
                estimated_minutes,
                reservation,
                sla_warning: None,
            });
        }

        self.save_cursor(&pool);
        Err(SchedulerError::NoAvailableDriver(order.id().to_string()))
    }

    /// Reserve a slot on the selected driver. Fails if a concurrent
    /// attempt took the last slot since candidates were built.
    fn reserve<'a>(&'a self, order: &Order, driver: &Driver) -> SchedulerResult<Reservation<'a>> {
        self.ledger.reserve(driver).ok_or_else(|| {
            debug!(order = %order.id(), driver = %driver.id(), "selected driver filled up concurrently");
            SchedulerError::DriverIneligible {
                driver_id: driver.id().to_string(),
                reason: "filled up concurrently".into(),
            }
        })
    }

    /// Driver to pickup distance and the full trip's travel time.
    fn trip(&self, from: GeoPoint, order: &Order) -> (f64, f64) {
        let to_pickup = haversine_km(&from, &order.pickup());
        let total = to_pickup + haversine_km(&order.pickup(), &order.delivery());
        (to_pickup, self.sla.params().eta_minutes(total))
    }

    fn transition(&self, order_id: &str, next: OrderStatus) -> SchedulerResult<Order> {
        let _claim = self
            .claims
            .claim(order_id)
            .ok_or_else(|| SchedulerError::ConcurrentAssignmentConflict(order_id.to_string()))?;

        match self.registry.transition_order(order_id, next, epoch_secs()) {
            Ok((order, released)) => {
                info!(
                    order = %order_id,
                    status = %next,
                    released = ?released.as_ref().map(|d| d.id()),
                    "order transitioned"
                );
                Ok(order)
            }
            Err(StateError::NotFound(_)) => Err(SchedulerError::OrderNotFound(order_id.to_string())),
            Err(StateError::Validation(e @ ValidationError::Transition { .. })) => {
                Err(SchedulerError::InvalidTransition {
                    order_id: order_id.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_driver(&self, driver_id: &str, f: &mut dyn FnMut(&mut Driver)) -> SchedulerResult<Driver> {
        self.registry.update_driver(driver_id, f).map_err(|e| match e {
            StateError::NotFound(_) => SchedulerError::DriverNotFound(driver_id.to_string()),
            other => other.into(),
        })
    }

    fn sync_pool(&self, driver: &Driver) {
        let mut pool = lock(&self.pool);
        let changed = if driver.is_available() {
            pool.add(driver.id())
        } else {
            pool.remove(driver.id())
        };
        if changed {
            self.save_cursor(&pool);
        }
    }

    /// Persist where the rotation resumes. Called with the pool lock held so
    /// saves land in rotation order. A failed save is logged, not returned.
    fn save_cursor(&self, pool: &DriverPool) {
        let Some(next) = pool.state().next_driver else {
            return;
        };
        if let Err(e) = self.registry.set_pool_cursor(&next) {
            warn!(driver = %next, error = %e, "failed to save pool cursor");
        }
    }
}

fn find_driver<'d>(drivers: &'d [Driver], driver_id: &str) -> SchedulerResult<&'d Driver> {
    drivers
        .iter()
        .find(|d| d.id() == driver_id)
        .ok_or_else(|| SchedulerError::DriverNotFound(driver_id.to_string()))
}

fn placement_error(order_id: &str, e: PlacementError) -> SchedulerError {
    match e {
        PlacementError::NoCandidates => SchedulerError::NoAvailableDriver(order_id.to_string()),
        PlacementError::SlaViolation(violation) => SchedulerError::SlaViolation {
            order_id: order_id.to_string(),
            violation,
        },
    }
}

/// Translate a failed store commit. Losing the order to another writer is a
/// conflict; a driver that changed under us is ineligible.
fn commit_error(order_id: &str, e: StateError) -> SchedulerError {
    match e {
        StateError::OrderNotPending { .. } => {
            SchedulerError::ConcurrentAssignmentConflict(order_id.to_string())
        }
        StateError::DriverUnavailable(driver_id) => SchedulerError::DriverIneligible {
            driver_id,
            reason: "unavailable".into(),
        },
        StateError::Validation(ValidationError::WorkloadExceeded { driver_id, active, max }) => {
            SchedulerError::DriverIneligible {
                driver_id,
                reason: format!("at capacity ({active}/{max})"),
            }
        }
        other => SchedulerError::State(other),
    }
}
