//! Download accommodations and their room information from the Open Data Hub.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use hotspot_core::{Config, HotspotService};
use hotspot_pipeline::{logging, region_plugin, run_fetch};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init().map_err(|err| anyhow!(err))?;

    let config = Config::load().context("loading configuration")?;
    config
        .prepare_dirs()
        .context("creating data directories")?;

    let plugin = region_plugin(&config).context("setting up data sources")?;
    let service = HotspotService::new(Arc::new(plugin));
    info!(region = %service.region().name, "fetching accommodation data");

    let report = run_fetch(&service, &config)
        .await
        .context("fetching accommodation data")?;

    info!(
        pages = report.listing.pages,
        records = report.listing.records,
        room_calls = report.rooms.calls,
        room_calls_skipped = report.rooms.skipped,
        room_rows = report.room_rows,
        "fetch finished"
    );
    Ok(())
}
