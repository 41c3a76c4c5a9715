//! `courier assign`, `auto-assign`, `manual-assign` and the order lifecycle
//! commands.

use courier_core::DispatchStrategy;

use super::{Context, print_json};

pub fn assign(ctx: &Context, order_id: &str, strategy: Option<DispatchStrategy>) -> anyhow::Result<()> {
    let coordinator = ctx.coordinator()?;
    let result = match strategy {
        Some(strategy) => coordinator.assign_order_with(order_id, strategy)?,
        None => coordinator.assign_order(order_id)?,
    };
    if let Some(warning) = &result.sla_warning {
        eprintln!("warning: {warning}");
    }
    print_json(&result)
}

pub fn auto_assign(ctx: &Context) -> anyhow::Result<()> {
    let report = ctx.coordinator()?.auto_assign_pending()?;
    print_json(&report)
}

pub fn manual_assign(ctx: &Context, order_id: &str, driver_id: &str) -> anyhow::Result<()> {
    let result = ctx.coordinator()?.manual_assign(order_id, driver_id)?;
    print_json(&result)
}

pub fn in_transit(ctx: &Context, order_id: &str) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.mark_in_transit(order_id)?)
}

pub fn complete(ctx: &Context, order_id: &str) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.complete_order(order_id)?)
}

pub fn cancel(ctx: &Context, order_id: &str) -> anyhow::Result<()> {
    print_json(&ctx.coordinator()?.cancel_order(order_id)?)
}
