//! redb table definitions for the Courier state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Drivers keyed by `{driver_id}`.
pub const DRIVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("drivers");

/// Orders keyed by `{order_id}`.
pub const ORDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Live assignments keyed by `{order_id}`.
pub const ASSIGNMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("assignments");

/// Assignments whose order reached a terminal state, keyed by `{order_id}`.
pub const ASSIGNMENT_ARCHIVE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("assignment_archive");

/// Small dispatch bookkeeping values keyed by name (e.g. `pool_cursor`).
pub const DISPATCH_META: TableDefinition<&str, &[u8]> = TableDefinition::new("dispatch_meta");
