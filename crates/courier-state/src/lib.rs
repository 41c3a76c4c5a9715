//! courier-state — driver/order records and the embedded state store.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for drivers, orders, live assignments, and the assignment archive.
//!
//! # Architecture
//!
//! Records are validated once at construction (and again on
//! deserialization), then JSON-serialized into redb's `&[u8]` value columns
//! keyed by record id. Operations that touch more than one record, such as
//! committing an assignment or releasing a driver's workload, run inside a
//! single write transaction.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult, ValidationError};
pub use store::StateStore;
pub use types::*;
