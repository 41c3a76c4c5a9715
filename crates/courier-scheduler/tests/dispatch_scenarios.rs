//! End-to-end dispatch scenarios.
//!
//! Runs the coordinator against an in-memory state store, sometimes behind a
//! registry wrapper that injects failures or stalls to exercise rollback and
//! conflict handling.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use courier_core::{CourierConfig, DispatchStrategy, GeoPoint, Priority};
use courier_scheduler::{AssignmentCoordinator, DispatchRegistry, SchedulerError};
use courier_state::*;

fn at(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).unwrap()
}

fn test_store() -> StateStore {
    StateStore::open_in_memory().unwrap()
}

fn driver(id: &str, active: u32, max: u32) -> Driver {
    Driver::new(id, at(12.97, 77.59), max, 4.5)
        .unwrap()
        .with_active_orders(active)
        .unwrap()
}

fn order(id: &str, priority: Priority, created_at: u64) -> Order {
    Order::new(id, at(12.97, 77.59), at(12.975, 77.595), priority, created_at).unwrap()
}

fn seed(store: &StateStore, drivers: &[Driver], orders: &[Order]) {
    for d in drivers {
        store.put_driver(d).unwrap();
    }
    for o in orders {
        store.put_order(o).unwrap();
    }
}

// ── Registry wrappers ─────────────────────────────────────────────

/// Delegates everything to a `StateStore`; hooks let tests interfere.
struct Hooked<H> {
    inner: StateStore,
    hooks: H,
}

trait Hooks: Send + Sync {
    fn before_list_drivers(&self) {}

    fn after_list_drivers(&self) {}

    fn before_commit(&self, _store: &StateStore, _assignment: &Assignment) -> StateResult<()> {
        Ok(())
    }
}

impl<H: Hooks> DispatchRegistry for Hooked<H> {
    fn get_order(&self, order_id: &str) -> StateResult<Option<Order>> {
        self.inner.get_order(order_id)
    }

    fn list_orders(&self) -> StateResult<Vec<Order>> {
        self.inner.list_orders()
    }

    fn orders_with_status(&self, status: OrderStatus) -> StateResult<Vec<Order>> {
        self.inner.list_orders_by_status(status)
    }

    fn get_driver(&self, driver_id: &str) -> StateResult<Option<Driver>> {
        self.inner.get_driver(driver_id)
    }

    fn list_drivers(&self) -> StateResult<Vec<Driver>> {
        self.hooks.before_list_drivers();
        let drivers = self.inner.list_drivers()?;
        self.hooks.after_list_drivers();
        Ok(drivers)
    }

    fn insert_driver(&self, driver: &Driver) -> StateResult<()> {
        self.inner.insert_driver(driver)
    }

    fn update_driver(&self, driver_id: &str, f: &mut dyn FnMut(&mut Driver)) -> StateResult<Driver> {
        self.inner.update_driver(driver_id, |d| f(d))
    }

    fn list_assignments(&self) -> StateResult<Vec<Assignment>> {
        self.inner.list_assignments()
    }

    fn commit_assignment(&self, assignment: &Assignment) -> StateResult<(Order, Driver)> {
        self.hooks.before_commit(&self.inner, assignment)?;
        self.inner.commit_assignment(assignment)
    }

    fn transition_order(
        &self,
        order_id: &str,
        next: OrderStatus,
        at: u64,
    ) -> StateResult<(Order, Option<Driver>)> {
        self.inner.transition_order(order_id, next, at)
    }

    fn pool_cursor(&self) -> StateResult<Option<String>> {
        self.inner.pool_cursor()
    }

    fn set_pool_cursor(&self, driver_id: &str) -> StateResult<()> {
        self.inner.set_pool_cursor(driver_id)
    }
}

/// Fails the first `remaining` commits.
struct FailCommits {
    remaining: AtomicUsize,
}

impl Hooks for FailCommits {
    fn before_commit(&self, _store: &StateStore, _assignment: &Assignment) -> StateResult<()> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining.store(left - 1, Ordering::SeqCst);
            return Err(StateError::Write("disk full".into()));
        }
        Ok(())
    }
}

/// Another dispatcher commits the order to `thief` just before our commit.
struct StealOrder {
    thief: &'static str,
}

impl Hooks for StealOrder {
    fn before_commit(&self, store: &StateStore, assignment: &Assignment) -> StateResult<()> {
        let stolen = Assignment {
            driver_id: self.thief.to_string(),
            ..assignment.clone()
        };
        store.commit_assignment(&stolen)?;
        Ok(())
    }
}

/// Once armed, parks the next `list_drivers` call until the test releases
/// it, either before the drivers are read or right after, holding a stale
/// snapshot.
struct Gate {
    armed: AtomicBool,
    after_read: bool,
    entered: Barrier,
    release: Barrier,
}

impl Gate {
    fn new(after_read: bool) -> Self {
        Self {
            armed: AtomicBool::new(false),
            after_read,
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn park(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
    }
}

impl Hooks for Gate {
    fn before_list_drivers(&self) {
        if !self.after_read {
            self.park();
        }
    }

    fn after_list_drivers(&self) {
        if self.after_read {
            self.park();
        }
    }
}

// ── Scenarios ─────────────────────────────────────────────────────

#[test]
fn idle_driver_beats_busy_driver_at_same_location() {
    let store = test_store();
    seed(
        &store,
        &[driver("D1", 0, 3), driver("D2", 1, 3)],
        &[order("o1", Priority::High, 1)],
    );
    let coordinator = AssignmentCoordinator::new(store, CourierConfig::default()).unwrap();

    let result = coordinator.assign_order("o1").unwrap();
    assert_eq!(result.driver.id(), "D1");
    assert_eq!(result.workload, 0);
    assert_eq!(result.distance_km, 0.0);
    assert_eq!(result.order.assigned_driver(), Some("D1"));
}

#[test]
fn non_pending_order_is_left_unchanged() {
    let store = test_store();
    seed(&store, &[driver("D1", 0, 3), driver("D2", 0, 3)], &[order("o1", Priority::Low, 1)]);
    let coordinator = AssignmentCoordinator::new(store, CourierConfig::default()).unwrap();

    let first = coordinator.assign_order("o1").unwrap();
    let before = coordinator.registry().get_order("o1").unwrap().unwrap();

    for strategy in [DispatchStrategy::WeightedScore, DispatchStrategy::SlaGreedy, DispatchStrategy::RoundRobin] {
        let err = coordinator.assign_order_with("o1", strategy).unwrap_err();
        assert!(
            matches!(err, SchedulerError::OrderNotPending { status: OrderStatus::Assigned, .. }),
            "{strategy}: {err}"
        );
    }
    assert!(matches!(
        coordinator.manual_assign("o1", "D2"),
        Err(SchedulerError::OrderNotPending { .. })
    ));

    let store = coordinator.registry();
    assert_eq!(store.get_order("o1").unwrap().unwrap(), before);
    let winner = store.get_driver(first.driver.id()).unwrap().unwrap();
    assert_eq!(winner.active_orders(), 1);
    let total: u32 = store.list_drivers().unwrap().iter().map(|d| d.active_orders()).sum();
    assert_eq!(total, 1);
}

#[test]
fn batch_fills_remaining_capacity_then_reports_failures() {
    let store = test_store();
    let orders: Vec<Order> = (1..=5)
        .map(|i| order(&format!("o{i}"), Priority::Medium, i))
        .collect();
    seed(&store, &[driver("full", 2, 2), driver("free", 0, 3)], &orders);
    let coordinator = AssignmentCoordinator::new(store, CourierConfig::default()).unwrap();

    let report = coordinator.auto_assign_pending().unwrap();
    assert_eq!(report.total_orders, 5);
    assert_eq!(report.success_count, 3);
    assert_eq!(report.failed_count, 2);

    // Oldest orders are served first.
    let assigned: Vec<&str> = report
        .details
        .iter()
        .filter(|d| d.success)
        .map(|d| d.order_id.as_str())
        .collect();
    assert_eq!(assigned, vec!["o1", "o2", "o3"]);
    assert!(
        report
            .details
            .iter()
            .filter(|d| d.success)
            .all(|d| d.driver_id.as_deref() == Some("free"))
    );
    for failed in report.details.iter().filter(|d| !d.success) {
        assert!(failed.error.as_deref().unwrap().contains("no available driver"));
    }

    let store = coordinator.registry();
    assert_eq!(store.get_driver("free").unwrap().unwrap().active_orders(), 3);
    assert_eq!(store.get_driver("full").unwrap().unwrap().active_orders(), 2);
    assert_eq!(store.list_orders_by_status(OrderStatus::Pending).unwrap().len(), 2);

    // A second run only sees the leftovers.
    let again = coordinator.auto_assign_pending().unwrap();
    assert_eq!(again.total_orders, 2);
    assert_eq!(again.failed_count, 2);
}

#[test]
fn batch_runs_configured_strategy() {
    let store = test_store();
    seed(
        &store,
        &[driver("a", 0, 5), driver("b", 0, 5)],
        &[
            order("o1", Priority::Low, 1),
            order("o2", Priority::Low, 2),
            order("o3", Priority::Low, 3),
            order("o4", Priority::Low, 4),
        ],
    );
    let config = CourierConfig::scaffold(DispatchStrategy::RoundRobin);
    let coordinator = AssignmentCoordinator::new(store, config).unwrap();

    let report = coordinator.auto_assign_pending().unwrap();
    let drivers: Vec<&str> = report
        .details
        .iter()
        .map(|d| d.driver_id.as_deref().unwrap())
        .collect();
    assert_eq!(drivers, vec!["a", "b", "a", "b"]);
}

#[test]
fn failed_commit_rolls_back_reservation() {
    let store = test_store();
    seed(&store, &[driver("D1", 0, 1)], &[order("o1", Priority::High, 1)]);
    let registry = Hooked {
        inner: store,
        hooks: FailCommits {
            remaining: AtomicUsize::new(1),
        },
    };
    let coordinator = AssignmentCoordinator::new(registry, CourierConfig::default()).unwrap();

    let err = coordinator.assign_order("o1").unwrap_err();
    assert!(matches!(err, SchedulerError::State(StateError::Write(_))), "{err}");

    assert!(coordinator.ledger().snapshot().is_empty());
    let store = &coordinator.registry().inner;
    assert_eq!(store.get_driver("D1").unwrap().unwrap().active_orders(), 0);
    assert_eq!(store.get_order("o1").unwrap().unwrap().status(), OrderStatus::Pending);
    assert!(store.get_assignment("o1").unwrap().is_none());

    // The single slot is free again, so a retry lands.
    let result = coordinator.assign_order("o1").unwrap();
    assert_eq!(result.driver.active_orders(), 1);
    assert!(coordinator.ledger().snapshot().is_empty());
}

#[test]
fn order_committed_elsewhere_is_never_overwritten() {
    let store = test_store();
    seed(&store, &[driver("D1", 0, 3), driver("thief", 0, 3)], &[order("o1", Priority::High, 1)]);
    let registry = Hooked {
        inner: store,
        hooks: StealOrder { thief: "thief" },
    };
    let coordinator = AssignmentCoordinator::new(registry, CourierConfig::default()).unwrap();

    let err = coordinator
        .assign_order_with("o1", DispatchStrategy::RoundRobin)
        .unwrap_err();
    assert!(
        matches!(&err, SchedulerError::ConcurrentAssignmentConflict(id) if id == "o1"),
        "{err}"
    );

    let store = &coordinator.registry().inner;
    let stored = store.get_order("o1").unwrap().unwrap();
    assert_eq!(stored.assigned_driver(), Some("thief"));
    assert_eq!(store.get_driver("thief").unwrap().unwrap().active_orders(), 1);
    assert_eq!(store.get_driver("D1").unwrap().unwrap().active_orders(), 0);
    assert!(coordinator.ledger().snapshot().is_empty());
}

#[test]
fn concurrent_attempt_on_same_order_conflicts() {
    let store = test_store();
    seed(&store, &[driver("D1", 0, 3)], &[order("o1", Priority::High, 1)]);
    let registry = Hooked {
        inner: store,
        hooks: Gate::new(false),
    };
    let coordinator = Arc::new(AssignmentCoordinator::new(registry, CourierConfig::default()).unwrap());
    coordinator.registry().hooks.arm();

    let first = {
        let coordinator = coordinator.clone();
        thread::spawn(move || coordinator.assign_order("o1"))
    };

    // First attempt holds the claim and is parked inside list_drivers.
    coordinator.registry().hooks.entered.wait();
    let err = coordinator.assign_order("o1").unwrap_err();
    assert!(matches!(err, SchedulerError::ConcurrentAssignmentConflict(_)), "{err}");
    assert!(matches!(
        coordinator.cancel_order("o1"),
        Err(SchedulerError::ConcurrentAssignmentConflict(_))
    ));
    coordinator.registry().hooks.release.wait();

    let result = first.join().unwrap().unwrap();
    assert_eq!(result.driver.id(), "D1");
    assert_eq!(
        coordinator.registry().inner.get_driver("D1").unwrap().unwrap().active_orders(),
        1
    );
}

#[test]
fn stale_snapshot_falls_through_to_driver_with_room() {
    let store = test_store();
    seed(
        &store,
        &[
            driver("near", 0, 1),
            Driver::new("far", at(13.0, 77.62), 5, 4.5).unwrap(),
        ],
        &[order("o1", Priority::High, 1), order("o2", Priority::High, 2)],
    );
    let registry = Hooked {
        inner: store,
        hooks: Gate::new(true),
    };
    let coordinator = Arc::new(AssignmentCoordinator::new(registry, CourierConfig::default()).unwrap());
    coordinator.registry().hooks.arm();

    let second = {
        let coordinator = coordinator.clone();
        thread::spawn(move || coordinator.assign_order("o2"))
    };

    // o2 holds a snapshot where `near` is still idle; o1 takes its only slot.
    coordinator.registry().hooks.entered.wait();
    let first = coordinator.assign_order("o1").unwrap();
    assert_eq!(first.driver.id(), "near");
    coordinator.registry().hooks.release.wait();

    let result = second.join().unwrap().unwrap();
    assert_eq!(result.driver.id(), "far");
    assert_eq!(result.order.assigned_driver(), Some("far"));

    let store = &coordinator.registry().inner;
    assert_eq!(store.get_driver("near").unwrap().unwrap().active_orders(), 1);
    assert_eq!(store.get_driver("far").unwrap().unwrap().active_orders(), 1);
    assert!(coordinator.ledger().snapshot().is_empty());
}

#[test]
fn parallel_orders_never_overbook_a_driver() {
    let store = test_store();
    let orders: Vec<Order> = (0..8)
        .map(|i| order(&format!("o{i}"), Priority::Medium, i))
        .collect();
    seed(&store, &[driver("D1", 0, 3)], &orders);
    let coordinator = Arc::new(AssignmentCoordinator::new(store, CourierConfig::default()).unwrap());
    let start = Arc::new(Barrier::new(orders.len()));

    let handles: Vec<_> = orders
        .iter()
        .map(|o| {
            let coordinator = coordinator.clone();
            let start = start.clone();
            let id = o.id().to_string();
            thread::spawn(move || {
                start.wait();
                coordinator.assign_order(&id).is_ok()
            })
        })
        .collect();

    let assigned = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(assigned, 3);
    let store = coordinator.registry();
    assert_eq!(store.get_driver("D1").unwrap().unwrap().active_orders(), 3);
    assert_eq!(store.list_assignments().unwrap().len(), 3);
    assert!(coordinator.ledger().snapshot().is_empty());
}

#[test]
fn full_lifecycle_releases_capacity_for_next_order() {
    let store = test_store();
    seed(
        &store,
        &[driver("D1", 0, 1)],
        &[order("o1", Priority::High, 1), order("o2", Priority::High, 2)],
    );
    let coordinator = AssignmentCoordinator::new(store, CourierConfig::default()).unwrap();

    coordinator.assign_order("o1").unwrap();
    assert!(matches!(
        coordinator.assign_order("o2"),
        Err(SchedulerError::NoAvailableDriver(_))
    ));

    coordinator.mark_in_transit("o1").unwrap();
    coordinator.complete_order("o1").unwrap();

    let second = coordinator.assign_order("o2").unwrap();
    assert_eq!(second.driver.id(), "D1");

    let archived = coordinator
        .registry()
        .get_archived_assignment("o1")
        .unwrap()
        .unwrap();
    assert_eq!(archived.outcome, OrderStatus::Delivered);
    assert_eq!(archived.assignment.driver_id, "D1");
}
