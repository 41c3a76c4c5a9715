use std::path::PathBuf;

use anyhow::Context as _;
use courier_core::CourierConfig;
use courier_scheduler::AssignmentCoordinator;
use courier_state::StateStore;
use serde::Serialize;

pub mod admin;
pub mod dispatch;
pub mod seed;

/// Global options shared by every subcommand.
pub struct Context {
    db: PathBuf,
    config: Option<PathBuf>,
}

impl Context {
    pub fn new(db: PathBuf, config: Option<PathBuf>) -> Self {
        Self { db, config }
    }

    pub fn load_config(&self) -> anyhow::Result<CourierConfig> {
        match &self.config {
            Some(path) => CourierConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display())),
            None => Ok(CourierConfig::default()),
        }
    }

    pub fn open_store(&self) -> anyhow::Result<StateStore> {
        StateStore::open(&self.db).with_context(|| format!("opening state db {}", self.db.display()))
    }

    pub fn coordinator(&self) -> anyhow::Result<AssignmentCoordinator> {
        let config = self.load_config()?;
        Ok(AssignmentCoordinator::new(self.open_store()?, config)?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
