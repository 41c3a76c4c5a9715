use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_core::DispatchStrategy;

mod commands;

#[derive(Parser)]
#[command(
    name = "courier",
    about = "Courier — food-delivery dispatch core",
    version,
    propagate_version = true,
)]
struct Cli {
    /// State database file
    #[arg(long, global = true, default_value = "courier.redb")]
    db: PathBuf,
    /// Dispatch config (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load drivers and orders from a JSON fixture
    Seed {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Assign one pending order
    Assign {
        order_id: String,
        /// round_robin, weighted_score, or sla_greedy (default: from config)
        #[arg(short, long)]
        strategy: Option<DispatchStrategy>,
    },
    /// Assign every pending order, oldest first
    AutoAssign,
    /// Assign an order to a specific driver
    ManualAssign { order_id: String, driver_id: String },
    /// Mark an assigned order as picked up
    InTransit { order_id: String },
    /// Mark an order delivered and release its driver
    Complete { order_id: String },
    /// Cancel an order, releasing its driver if assigned
    Cancel { order_id: String },
    /// Driver administration
    Driver {
        #[command(subcommand)]
        action: DriverAction,
    },
    /// Show the round-robin pool
    Pool,
    /// Workload and order status summary
    Analytics,
    /// Write a courier.toml with every default spelled out
    InitConfig {
        #[arg(short, long, default_value = "courier.toml")]
        path: PathBuf,
        #[arg(short, long, default_value = "weighted_score")]
        strategy: DispatchStrategy,
    },
}

#[derive(Subcommand)]
enum DriverAction {
    /// List registered drivers
    List,
    /// Take a driver off dispatch
    Deactivate { driver_id: String },
    /// Put a driver back on dispatch
    Activate { driver_id: String },
    /// Move a driver
    Locate {
        driver_id: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logs = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("courier=info".parse()?)
        )
        .with_writer(std::io::stderr);
    if cli.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    let ctx = commands::Context::new(cli.db, cli.config);

    match cli.command {
        Commands::Seed { file } => commands::seed::seed(&ctx, &file),
        Commands::Assign { order_id, strategy } => commands::dispatch::assign(&ctx, &order_id, strategy),
        Commands::AutoAssign => commands::dispatch::auto_assign(&ctx),
        Commands::ManualAssign { order_id, driver_id } => {
            commands::dispatch::manual_assign(&ctx, &order_id, &driver_id)
        }
        Commands::InTransit { order_id } => commands::dispatch::in_transit(&ctx, &order_id),
        Commands::Complete { order_id } => commands::dispatch::complete(&ctx, &order_id),
        Commands::Cancel { order_id } => commands::dispatch::cancel(&ctx, &order_id),
        Commands::Driver { action } => match action {
            DriverAction::List => commands::admin::list_drivers(&ctx),
            DriverAction::Deactivate { driver_id } => commands::admin::deactivate(&ctx, &driver_id),
            DriverAction::Activate { driver_id } => commands::admin::activate(&ctx, &driver_id),
            DriverAction::Locate { driver_id, lat, lon } => {
                commands::admin::locate(&ctx, &driver_id, lat, lon)
            }
        },
        Commands::Pool => commands::admin::pool(&ctx),
        Commands::Analytics => commands::admin::analytics(&ctx),
        Commands::InitConfig { path, strategy } => commands::admin::init_config(&path, strategy),
    }
}
