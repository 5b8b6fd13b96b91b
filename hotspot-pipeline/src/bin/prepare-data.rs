//! Join the fetched accommodations to municipalities and write tables, dashboard data, and plots.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use hotspot_core::{Config, HotspotService};
use hotspot_pipeline::{logging, region_plugin, run_prepare};
use tracing::info;

fn main() -> Result<()> {
    logging::init().map_err(|err| anyhow!(err))?;

    let config = Config::load().context("loading configuration")?;
    config
        .prepare_dirs()
        .context("creating data directories")?;

    let plugin = region_plugin(&config).context("setting up data sources")?;
    let service = HotspotService::new(Arc::new(plugin));

    let outcome = run_prepare(&service, &config).context("preparing data")?;

    info!(
        input_records = outcome.report.input_records,
        duplicates = outcome.report.duplicates,
        invalid_coordinates = outcome.report.invalid_coordinates,
        unmatched = outcome.report.unmatched,
        without_room_info = outcome.report.without_room_info,
        accommodations = outcome.accommodations,
        municipalities = outcome.municipalities,
        density_grid = outcome.density_grid,
        plots = outcome.plots.len(),
        "prepare finished"
    );
    Ok(())
}
