pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{ProviderSettings, RunConfig};

pub use crate::core::{merge, FallbackResolver, GeocodeEngine, ResultStore, RunReport};
pub use utils::error::{GeoError, ProviderError, Result};
