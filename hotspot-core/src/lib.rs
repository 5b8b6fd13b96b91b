//! Core types and pipeline wiring for the South Tyrol tourism hotspot analysis.

/// Configuration loaded from `hotspot.toml`.
pub mod config;
/// Kernel density estimation over the province.
pub mod density;
/// Pipeline error type.
pub mod error;
/// Domain models shared by all crates.
pub mod model;
/// Colour ramps for choropleths and heatmaps.
pub mod palette;
/// Bundle of the data sources for a region.
pub mod plugin;
/// Traits describing the data-source interfaces.
pub mod ports;
/// Cleaning, spatial join, and aggregation.
pub mod prepare;
/// High-level service facade used by the binaries.
pub mod service;
/// Persistence of raw, intermediate, and dashboard files.
pub mod storage;

pub use config::*;
pub use error::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
