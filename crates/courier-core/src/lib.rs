pub mod config;
pub mod geo;
pub mod time;
pub mod types;

pub use config::CourierConfig;
pub use geo::{GeoError, GeoPoint, haversine_km};
pub use time::epoch_secs;
pub use types::*;
