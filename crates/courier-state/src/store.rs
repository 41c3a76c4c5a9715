//! StateStore — redb-backed persistence for drivers, orders, and assignments.
//!
//! Provides typed CRUD operations plus the two multi-record transactions that
//! dispatch relies on: committing an assignment and moving an order through
//! its lifecycle (which releases driver workload on terminal states). All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const POOL_CURSOR_KEY: &str = "pool_cursor";

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DRIVERS).map_err(map_err!(Table))?;
        txn.open_table(ORDERS).map_err(map_err!(Table))?;
        txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        txn.open_table(ASSIGNMENT_ARCHIVE).map_err(map_err!(Table))?;
        txn.open_table(DISPATCH_META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Drivers ────────────────────────────────────────────────────

    /// Insert or update a driver.
    pub fn put_driver(&self, driver: &Driver) -> StateResult<()> {
        self.put(DRIVERS, driver.id(), driver)?;
        debug!(driver = %driver.id(), "driver stored");
        Ok(())
    }

    /// Insert a new driver. Fails with `AlreadyExists` if the id is taken,
    /// leaving the stored record and its workload untouched.
    pub fn insert_driver(&self, driver: &Driver) -> StateResult<()> {
        if !self.insert(DRIVERS, driver.id(), driver)? {
            return Err(StateError::AlreadyExists(format!("driver {}", driver.id())));
        }
        debug!(driver = %driver.id(), "driver inserted");
        Ok(())
    }

    pub fn get_driver(&self, driver_id: &str) -> StateResult<Option<Driver>> {
        self.get(DRIVERS, driver_id)
    }

    /// List all drivers in id order.
    pub fn list_drivers(&self) -> StateResult<Vec<Driver>> {
        self.list(DRIVERS)
    }

    /// Delete a driver by id. Returns true if it existed.
    pub fn delete_driver(&self, driver_id: &str) -> StateResult<bool> {
        self.delete(DRIVERS, driver_id)
    }

    /// Read-modify-write a driver inside one transaction.
    pub fn update_driver<F>(&self, driver_id: &str, f: F) -> StateResult<Driver>
    where
        F: FnOnce(&mut Driver),
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let driver = {
            let mut table = txn.open_table(DRIVERS).map_err(map_err!(Table))?;
            let mut driver: Driver = read_in(&table, driver_id)?
                .ok_or_else(|| StateError::NotFound(format!("driver {driver_id}")))?;
            f(&mut driver);
            write_in(&mut table, driver_id, &driver)?;
            driver
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(driver)
    }

    // ── Orders ─────────────────────────────────────────────────────

    /// Insert or update an order.
    pub fn put_order(&self, order: &Order) -> StateResult<()> {
        self.put(ORDERS, order.id(), order)?;
        debug!(order = %order.id(), status = %order.status(), "order stored");
        Ok(())
    }

    /// Insert a new order. Fails with `AlreadyExists` if the id is taken, so
    /// an assigned order can never be reset to pending.
    pub fn insert_order(&self, order: &Order) -> StateResult<()> {
        if !self.insert(ORDERS, order.id(), order)? {
            return Err(StateError::AlreadyExists(format!("order {}", order.id())));
        }
        debug!(order = %order.id(), status = %order.status(), "order inserted");
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> StateResult<Option<Order>> {
        self.get(ORDERS, order_id)
    }

    /// List all orders in id order.
    pub fn list_orders(&self) -> StateResult<Vec<Order>> {
        self.list(ORDERS)
    }

    /// List orders with the given status, oldest first (ties by id).
    pub fn list_orders_by_status(&self, status: OrderStatus) -> StateResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .list_orders()?
            .into_iter()
            .filter(|o| o.status() == status)
            .collect();
        orders.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(orders)
    }

    /// Delete an order by id. Returns true if it existed.
    pub fn delete_order(&self, order_id: &str) -> StateResult<bool> {
        self.delete(ORDERS, order_id)
    }

    // ── Assignments ────────────────────────────────────────────────

    /// Live assignment for an order, if any.
    pub fn get_assignment(&self, order_id: &str) -> StateResult<Option<Assignment>> {
        self.get(ASSIGNMENTS, order_id)
    }

    pub fn list_assignments(&self) -> StateResult<Vec<Assignment>> {
        self.list(ASSIGNMENTS)
    }

    pub fn get_archived_assignment(&self, order_id: &str) -> StateResult<Option<ArchivedAssignment>> {
        self.get(ASSIGNMENT_ARCHIVE, order_id)
    }

    pub fn list_archived_assignments(&self) -> StateResult<Vec<ArchivedAssignment>> {
        self.list(ASSIGNMENT_ARCHIVE)
    }

    // ── Dispatch bookkeeping ───────────────────────────────────────

    /// Driver the round-robin rotation resumes at, if one was saved.
    pub fn pool_cursor(&self) -> StateResult<Option<String>> {
        self.get(DISPATCH_META, POOL_CURSOR_KEY)
    }

    pub fn set_pool_cursor(&self, driver_id: &str) -> StateResult<()> {
        self.put(DISPATCH_META, POOL_CURSOR_KEY, &driver_id)
    }

    /// Commit an assignment in a single write transaction.
    ///
    /// Re-reads the order and driver inside the transaction: the order must
    /// still be `Pending`, the driver available and under capacity. On
    /// success the driver's workload is incremented, the order moves to
    /// `Assigned`, and the assignment row is written. On any error nothing
    /// is persisted.
    pub fn commit_assignment(&self, assignment: &Assignment) -> StateResult<(Order, Driver)> {
        let order_id = assignment.order_id.as_str();
        let driver_id = assignment.driver_id.as_str();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let committed = {
            let mut orders = txn.open_table(ORDERS).map_err(map_err!(Table))?;
            let mut drivers = txn.open_table(DRIVERS).map_err(map_err!(Table))?;
            let mut assignments = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;

            let mut order: Order = read_in(&orders, order_id)?
                .ok_or_else(|| StateError::NotFound(format!("order {order_id}")))?;
            if order.status() != OrderStatus::Pending {
                return Err(StateError::OrderNotPending {
                    order_id: order_id.to_string(),
                    status: order.status(),
                });
            }

            let mut driver: Driver = read_in(&drivers, driver_id)?
                .ok_or_else(|| StateError::NotFound(format!("driver {driver_id}")))?;
            if !driver.is_available() {
                return Err(StateError::DriverUnavailable(driver_id.to_string()));
            }

            driver.take_order()?;
            order.assign(driver_id)?;

            write_in(&mut drivers, driver_id, &driver)?;
            write_in(&mut orders, order_id, &order)?;
            write_in(&mut assignments, order_id, assignment)?;
            (order, driver)
        };
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(
            order = %order_id,
            driver = %driver_id,
            workload = committed.1.active_orders(),
            "assignment committed"
        );
        Ok(committed)
    }

    /// Move an order to `next` in a single write transaction.
    ///
    /// `Assigned` is reachable only through [`StateStore::commit_assignment`].
    /// When `next` is terminal and the order had a driver, the driver's
    /// workload is decremented and the live assignment is moved to the
    /// archive. Returns the updated order and, if one was released, the
    /// updated driver.
    pub fn transition_order(
        &self,
        order_id: &str,
        next: OrderStatus,
        at: u64,
    ) -> StateResult<(Order, Option<Driver>)> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let result = {
            let mut orders = txn.open_table(ORDERS).map_err(map_err!(Table))?;
            let mut drivers = txn.open_table(DRIVERS).map_err(map_err!(Table))?;
            let mut assignments = txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
            let mut archive = txn.open_table(ASSIGNMENT_ARCHIVE).map_err(map_err!(Table))?;

            let mut order: Order = read_in(&orders, order_id)?
                .ok_or_else(|| StateError::NotFound(format!("order {order_id}")))?;
            let previous = order.status();
            order.transition(next)?;

            let mut released = None;
            if next.is_terminal() && previous != OrderStatus::Pending {
                if let Some(driver_id) = order.assigned_driver() {
                    match read_in::<Driver>(&drivers, driver_id)? {
                        Some(mut driver) => {
                            driver.finish_order();
                            write_in(&mut drivers, driver_id, &driver)?;
                            released = Some(driver);
                        }
                        None => warn!(order = %order_id, driver = %driver_id, "released order references unknown driver"),
                    }
                }

                let live: Option<Assignment> = read_in(&assignments, order_id)?;
                if let Some(assignment) = live {
                    assignments.remove(order_id).map_err(map_err!(Write))?;
                    let archived = ArchivedAssignment {
                        assignment,
                        outcome: next,
                        closed_at: at,
                    };
                    write_in(&mut archive, order_id, &archived)?;
                }
            }

            write_in(&mut orders, order_id, &order)?;
            (order, released)
        };
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(order = %order_id, status = %next, "order transitioned");
        Ok(result)
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn put<T: Serialize>(&self, def: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            write_in(&mut table, key, value)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Write `value` only if `key` is absent. Returns false if it existed.
    fn insert<T: Serialize>(&self, def: JsonTable, key: &str, value: &T) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            let existed = table.get(key).map_err(map_err!(Read))?.is_some();
            if !existed {
                write_in(&mut table, key, value)?;
            }
            existed
        };
        if existed {
            txn.abort().map_err(map_err!(Transaction))?;
            return Ok(false);
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(true)
    }

    fn get<T: DeserializeOwned>(&self, def: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        read_in(&table, key)
    }

    fn list<T: DeserializeOwned>(&self, def: JsonTable) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    fn delete(&self, def: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = def.name(), %key, existed, "record deleted");
        Ok(existed)
    }
}

fn read_in<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StateResult<Option<T>> {
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn write_in<T: Serialize>(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}
