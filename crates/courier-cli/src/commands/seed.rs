//! `courier seed` — load drivers and orders from a JSON fixture.
//!
//! Coordinates in the fixture are `[longitude, latitude]` pairs, the order
//! used by GeoJSON and most upstream order feeds. Orders always start out
//! pending.
//!
//! Records whose id is already stored are skipped, so re-seeding never
//! resets an assigned order or a driver's workload.

use std::path::Path;

use anyhow::Context as _;
use courier_core::{DriverId, GeoPoint, OrderId, Priority, epoch_secs};
use courier_scheduler::{AssignmentCoordinator, SchedulerError};
use courier_state::{Driver, Order, StateError, StateStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Context, print_json};

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    drivers: Vec<SeedDriver>,
    #[serde(default)]
    orders: Vec<SeedOrder>,
}

#[derive(Debug, Deserialize)]
struct SeedDriver {
    id: DriverId,
    #[serde(default)]
    name: Option<String>,
    /// `[lon, lat]`
    location: [f64; 2],
    #[serde(default = "available_by_default")]
    available: bool,
    #[serde(default)]
    active_orders: u32,
    max_workload: u32,
    #[serde(default)]
    rating: f64,
}

#[derive(Debug, Deserialize)]
struct SeedOrder {
    id: OrderId,
    pickup: [f64; 2],
    delivery: [f64; 2],
    #[serde(default)]
    priority: Priority,
    /// Defaults to file order, starting now.
    #[serde(default)]
    created_at: Option<u64>,
}

fn available_by_default() -> bool {
    true
}

#[derive(Debug, Default, Serialize)]
struct SeedSummary {
    drivers: usize,
    orders: usize,
    /// Ids already present in the store.
    skipped_drivers: Vec<DriverId>,
    skipped_orders: Vec<OrderId>,
}

pub fn seed(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading fixture {}", file.display()))?;
    let coordinator = ctx.coordinator()?;
    let summary = load(&coordinator, &content, epoch_secs())?;
    print_json(&summary)
}

/// Parse a fixture and write it through the coordinator.
fn load(
    coordinator: &AssignmentCoordinator<StateStore>,
    content: &str,
    now: u64,
) -> anyhow::Result<SeedSummary> {
    let fixture: SeedFile = serde_json::from_str(content).context("parsing fixture")?;
    let mut summary = SeedSummary::default();

    for seed in &fixture.drivers {
        let driver = driver_from_seed(seed).with_context(|| format!("driver {}", seed.id))?;
        match coordinator.register_driver(driver) {
            Ok(()) => summary.drivers += 1,
            Err(SchedulerError::DriverAlreadyRegistered(id)) => {
                warn!(driver = %id, "driver already stored, skipped");
                summary.skipped_drivers.push(id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    for (offset, seed) in (0u64..).zip(&fixture.orders) {
        let order = Order::new(
            seed.id.clone(),
            GeoPoint::from_lon_lat(seed.pickup).with_context(|| format!("order {} pickup", seed.id))?,
            GeoPoint::from_lon_lat(seed.delivery).with_context(|| format!("order {} delivery", seed.id))?,
            seed.priority,
            seed.created_at.unwrap_or(now + offset),
        )?;
        match coordinator.registry().insert_order(&order) {
            Ok(()) => summary.orders += 1,
            Err(StateError::AlreadyExists(_)) => {
                warn!(order = %seed.id, "order already stored, skipped");
                summary.skipped_orders.push(seed.id.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        drivers = summary.drivers,
        orders = summary.orders,
        skipped = summary.skipped_drivers.len() + summary.skipped_orders.len(),
        "fixture loaded"
    );
    Ok(summary)
}

fn driver_from_seed(seed: &SeedDriver) -> anyhow::Result<Driver> {
    let mut driver = Driver::new(
        seed.id.clone(),
        GeoPoint::from_lon_lat(seed.location)?,
        seed.max_workload,
        seed.rating,
    )?
    .with_availability(seed.available)
    .with_active_orders(seed.active_orders)?;
    if let Some(name) = &seed.name {
        driver = driver.with_name(name.clone());
    }
    Ok(driver)
}
