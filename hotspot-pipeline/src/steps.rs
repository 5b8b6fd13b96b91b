//! The fetch and prepare steps, wired to the configured directories.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use hotspot_core::prepare::{PrepareReport, prepare};
use hotspot_core::storage::{self, MunicipalityFeature};
use hotspot_core::{
    AccommodationId, AccommodationRecord, Config, Coordinates, DensityMetric, FetchSummary,
    HotspotError, HotspotService, Municipality, PageRequest, PathsConfig, PortError,
    PreparedAccommodation, RegionPlugin, Result, RoomInfo, RoomSummary, density,
};
use hotspot_provider_opendatahub::OpenDataHubPort;

/// What a fetch run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Accommodation listing.
    pub listing: FetchSummary,
    /// Room info calls.
    pub rooms: RoomSummary,
    /// Rows in the merged room info file.
    pub room_rows: usize,
}

/// What a prepare run produced.
#[derive(Debug, Clone)]
pub struct PrepareOutcome {
    /// Counts of dropped and flagged records.
    pub report: PrepareReport,
    /// Cleaned accommodations written.
    pub accommodations: usize,
    /// Municipality rows written.
    pub municipalities: usize,
    /// Whether a density grid could be estimated.
    pub density_grid: bool,
    /// Rendered plot files.
    pub plots: Vec<PathBuf>,
}

/// Build the South Tyrol plugin from the configuration.
///
/// # Errors
///
/// Returns a network error when the HTTP client cannot be constructed.
pub fn region_plugin(config: &Config) -> Result<RegionPlugin> {
    let client = Client::builder()
        .user_agent(config.api.user_agent.as_str())
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()
        .map_err(PortError::from)?;

    Ok(RegionPlugin::new(
        Arc::new(OpenDataHubPort::new(client, &config.api)),
        hotspot_provider_boundaries::from_config(&config.boundaries),
    ))
}

/// Download every accommodation page, then the rooms of accommodations not
/// yet on disk, and merge all room results into one file.
///
/// # Errors
///
/// Returns the first network or storage error. Pages and room batches written
/// before the failure stay on disk, so a rerun skips finished room calls.
pub async fn run_fetch(service: &HotspotService, config: &Config) -> Result<FetchReport> {
    let paths = &config.paths;
    let listing = service
        .fetch_accommodations(PageRequest::new(1, config.api.page_size), &paths.pages_dir)
        .await?;

    let ids = accommodation_ids(&read_records(paths)?);
    let known: HashSet<AccommodationId> = collect_rooms(paths)?
        .into_iter()
        .map(|room| room.id)
        .collect();
    let rooms = service
        .fetch_rooms(&ids, &known, &paths.room_batches_dir, config.api.room_batch_size)
        .await?;

    let room_rows = collect_rooms(paths)?.len();
    Ok(FetchReport {
        listing,
        rooms,
        room_rows,
    })
}

/// Clean and join the fetched data, aggregate per municipality, estimate the
/// density grid, and write tables, dashboard files, and plots.
///
/// # Errors
///
/// Returns an error when no pages were fetched, the boundaries cannot be
/// loaded, or an output cannot be written.
pub fn run_prepare(service: &HotspotService, config: &Config) -> Result<PrepareOutcome> {
    let paths = &config.paths;
    let records = read_records(paths)?;
    if records.is_empty() {
        return Err(HotspotError::InvalidInput(format!(
            "no accommodation pages in {}, run fetch-data first",
            paths.pages_dir.display()
        )));
    }
    storage::write_csv(&paths.parsed_accommodations_file(), &records)?;

    let rooms = collect_rooms(paths)?;
    let index = service.municipalities()?;
    let prepared = prepare(records, &rooms, &index);

    storage::write_csv(&paths.prepared_accommodations_file(), &prepared.accommodations)?;
    storage::write_csv(&paths.municipality_table_file(), &prepared.metrics)?;
    storage::write_municipality_geojson(
        &paths.municipality_geojson_file(),
        index.municipalities(),
        &prepared.metrics,
    )?;

    let points: Vec<Coordinates> = prepared
        .accommodations
        .iter()
        .filter(|accommodation| accommodation.municipality_de.is_some())
        .map(PreparedAccommodation::coordinates)
        .collect();
    let grid = density::estimate(&points, &index, &config.density);
    match &grid {
        Some(grid) => storage::write_json(&paths.density_file(), grid)?,
        None => warn!("no geometry to span a density grid"),
    }

    let features = join_features(index.municipalities(), &prepared.metrics);
    let plots = crate::plot::write_plots(
        &paths.plot_dir,
        &features,
        grid.as_ref(),
        index.municipalities(),
        &prepared.accommodations,
    )?;

    info!(
        accommodations = prepared.accommodations.len(),
        municipalities = prepared.metrics.len(),
        "prepared data written"
    );
    Ok(PrepareOutcome {
        report: prepared.report,
        accommodations: prepared.accommodations.len(),
        municipalities: prepared.metrics.len(),
        density_grid: grid.is_some(),
        plots,
    })
}

/// Merge the room info file with every room batch and rewrite the file.
///
/// Rows already in the file win over batch rows for the same id.
///
/// # Errors
///
/// Returns an error when a room file cannot be read or written.
pub fn collect_rooms(paths: &PathsConfig) -> Result<Vec<RoomInfo>> {
    let file = paths.room_info_file();
    let mut rooms: Vec<RoomInfo> = if file.is_file() {
        storage::read_csv(&file)?
    } else {
        Vec::new()
    };
    if paths.room_batches_dir.is_dir() {
        rooms.extend(storage::merge_room_batches(&paths.room_batches_dir)?);
    }
    rooms.sort_by(|left, right| left.id.cmp(&right.id));
    rooms.dedup_by(|later, earlier| later.id == earlier.id);

    storage::write_csv(&file, &rooms)?;
    Ok(rooms)
}

fn read_records(paths: &PathsConfig) -> Result<Vec<AccommodationRecord>> {
    if !paths.pages_dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(storage::read_pages(&paths.pages_dir)?
        .into_iter()
        .flat_map(|page| page.records)
        .collect())
}

/// Normalized ids in first-seen order.
fn accommodation_ids(records: &[AccommodationRecord]) -> Vec<AccommodationId> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| record.id.normalized())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn join_features(
    municipalities: &[Municipality],
    metrics: &[DensityMetric],
) -> Vec<MunicipalityFeature> {
    metrics
        .iter()
        .filter_map(|metric| {
            municipalities
                .iter()
                .find(|municipality| municipality.name_de == metric.name_de)
                .map(|municipality| MunicipalityFeature {
                    boundary: municipality.boundary.clone(),
                    metric: metric.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> AccommodationRecord {
        AccommodationRecord {
            id: AccommodationId(id.to_owned()),
            name: None,
            city: None,
            region: None,
            category_id: None,
            room_types: None,
            has_apartment: None,
            is_gastronomy: None,
            altitude: None,
            latitude: None,
            longitude: None,
        }
    }

    fn room(id: &str, max_occupancy: u32) -> RoomInfo {
        RoomInfo {
            id: AccommodationId(id.to_owned()),
            total_rooms: 1,
            max_occupancy,
        }
    }

    fn paths_in(root: &std::path::Path) -> PathsConfig {
        PathsConfig {
            data_dir: root.to_owned(),
            raw_data_dir: root.join("raw"),
            pages_dir: root.join("raw/pages"),
            room_batches_dir: root.join("raw/rooms"),
            prepared_dir: root.join("prepared"),
            dashboard_dir: root.join("dashboard"),
            plot_dir: root.join("plots"),
        }
    }

    #[test]
    fn ids_are_normalized_and_unique() {
        let ids = accommodation_ids(&[record("b_REDUCED"), record("a"), record("b")]);

        let ids: Vec<&str> = ids.iter().map(|id| id.0.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn room_file_wins_over_batches() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        for dir in [&paths.prepared_dir, &paths.room_batches_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        storage::write_csv(&paths.room_info_file(), &[room("a", 2)]).unwrap();
        storage::write_room_batch(&paths.room_batches_dir, 2, &[room("a", 9), room("b", 4)])
            .unwrap();

        let rooms = collect_rooms(&paths).unwrap();

        assert_eq!(rooms, vec![room("a", 2), room("b", 4)]);
        let on_disk: Vec<RoomInfo> = storage::read_csv(&paths.room_info_file()).unwrap();
        assert_eq!(on_disk, rooms);
    }

    #[test]
    fn missing_pages_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();

        assert!(read_records(&paths_in(dir.path())).unwrap().is_empty());
    }
}
