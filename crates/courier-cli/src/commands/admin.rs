//! Driver administration, pool inspection, analytics and config scaffolding.

use std::path::Path;

use anyhow::bail;
use courier_core::{CourierConfig, DispatchStrategy, GeoPoint};

use super::{Context, print_json};

pub fn list_drivers(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.open_store()?.list_drivers()?)
}

pub fn deactivate(ctx: &Context, driver_id: &str) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.deactivate_driver(driver_id)?)
}

pub fn activate(ctx: &Context, driver_id: &str) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.activate_driver(driver_id)?)
}

pub fn locate(ctx: &Context, driver_id: &str, lat: f64, lon: f64) -> anyhow::Result<()> {
    let location = GeoPoint::new(lat, lon)?;
    print_json(&ctx.coordinator()?.update_driver_location(driver_id, location)?)
}

pub fn pool(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.pool_state())
}

pub fn analytics(ctx: &Context) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.analytics()?)
}

pub fn init_config(path: &Path, strategy: DispatchStrategy) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let config = CourierConfig::scaffold(strategy);
    std::fs::write(path, config.to_toml_string()?)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}
