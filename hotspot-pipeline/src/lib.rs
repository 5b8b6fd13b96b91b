//! Batch steps of the hotspot analysis and their static outputs.

/// Subscriber setup for the binaries.
pub mod logging;
/// SVG choropleths and density heatmap.
pub mod plot;
/// Fetch and prepare runs.
pub mod steps;

pub use steps::{FetchReport, PrepareOutcome, collect_rooms, region_plugin, run_fetch, run_prepare};
