//! The coordinator's view of persisted drivers and orders.
//!
//! [`DispatchRegistry`] is implemented for [`StateStore`]. Tests wrap the
//! store to inject commit failures or slow lookups.

use courier_core::DriverId;
use courier_state::{Assignment, Driver, Order, OrderStatus, StateResult, StateStore};

/// Storage operations the coordinator relies on.
///
/// `commit_assignment` and `transition_order` must be atomic: either every
/// record they touch is written or none is.
pub trait DispatchRegistry: Send + Sync {
    fn get_order(&self, order_id: &str) -> StateResult<Option<Order>>;

    fn list_orders(&self) -> StateResult<Vec<Order>>;

    /// Orders with the given status, oldest first.
    fn orders_with_status(&self, status: OrderStatus) -> StateResult<Vec<Order>>;

    fn get_driver(&self, driver_id: &str) -> StateResult<Option<Driver>>;

    fn list_drivers(&self) -> StateResult<Vec<Driver>>;

    /// Store a new driver. Fails with `AlreadyExists` if the id is taken.
    fn insert_driver(&self, driver: &Driver) -> StateResult<()>;

    /// Read-modify-write a driver record atomically.
    fn update_driver(&self, driver_id: &str, f: &mut dyn FnMut(&mut Driver)) -> StateResult<Driver>;

    fn list_assignments(&self) -> StateResult<Vec<Assignment>>;

    fn commit_assignment(&self, assignment: &Assignment) -> StateResult<(Order, Driver)>;

    fn transition_order(
        &self,
        order_id: &str,
        next: OrderStatus,
        at: u64,
    ) -> StateResult<(Order, Option<Driver>)>;

    /// Driver the round-robin rotation last pointed at.
    fn pool_cursor(&self) -> StateResult<Option<DriverId>>;

    fn set_pool_cursor(&self, driver_id: &str) -> StateResult<()>;
}

impl DispatchRegistry for StateStore {
    fn get_order(&self, order_id: &str) -> StateResult<Option<Order>> {
        StateStore::get_order(self, order_id)
    }

    fn list_orders(&self) -> StateResult<Vec<Order>> {
        StateStore::list_orders(self)
    }

    fn orders_with_status(&self, status: OrderStatus) -> StateResult<Vec<Order>> {
        self.list_orders_by_status(status)
    }

    fn get_driver(&self, driver_id: &str) -> StateResult<Option<Driver>> {
        StateStore::get_driver(self, driver_id)
    }

    fn list_drivers(&self) -> StateResult<Vec<Driver>> {
        StateStore::list_drivers(self)
    }

    fn insert_driver(&self, driver: &Driver) -> StateResult<()> {
        StateStore::insert_driver(self, driver)
    }

    fn update_driver(&self, driver_id: &str, f: &mut dyn FnMut(&mut Driver)) -> StateResult<Driver> {
        StateStore::update_driver(self, driver_id, |d| f(d))
    }

    fn list_assignments(&self) -> StateResult<Vec<Assignment>> {
        StateStore::list_assignments(self)
    }

    fn commit_assignment(&self, assignment: &Assignment) -> StateResult<(Order, Driver)> {
        StateStore::commit_assignment(self, assignment)
    }

    fn transition_order(
        &self,
        order_id: &str,
        next: OrderStatus,
        at: u64,
    ) -> StateResult<(Order, Option<Driver>)> {
        StateStore::transition_order(self, order_id, next, at)
    }

    fn pool_cursor(&self) -> StateResult<Option<DriverId>> {
        StateStore::pool_cursor(self)
    }

    fn set_pool_cursor(&self, driver_id: &str) -> StateResult<()> {
        StateStore::set_pool_cursor(self, driver_id)
    }
}
