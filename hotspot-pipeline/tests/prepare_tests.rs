//! Prepare runs over files on disk, with GeoJSON boundaries and an offline API port.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hotspot_core::{
    AccommodationId, AccommodationPage, AccommodationPort, AccommodationRecord, BoundaryConfig,
    Config, DensityConfig, DensityGrid, DensityMetric, HotspotService, PathsConfig, PortError,
    RegionId, RegionMeta, RegionPlugin, RoomInfo, storage,
};
use hotspot_pipeline::run_prepare;

struct Offline(RegionMeta);

#[async_trait]
impl AccommodationPort for Offline {
    fn region(&self) -> &RegionMeta {
        &self.0
    }

    async fn page(&self, _number: u32, _page_size: u32) -> Result<AccommodationPage, PortError> {
        Err(PortError::Response("offline".to_owned()))
    }

    async fn rooms(&self, id: &AccommodationId) -> Result<RoomInfo, PortError> {
        Err(PortError::Response(format!("offline, no rooms for {id}")))
    }
}

const BOUNDARIES: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"NAME_D": "A", "NAME_I": "a", "BW_WOHNBEV": 100},
            "geometry": {"type": "Polygon", "coordinates": [[[11.0, 46.0], [11.5, 46.0], [11.5, 46.5], [11.0, 46.5], [11.0, 46.0]]]}
        },
        {
            "type": "Feature",
            "properties": {"NAME_D": "B", "NAME_I": "b", "BW_WOHNBEV": 50},
            "geometry": {"type": "Polygon", "coordinates": [[[11.5, 46.0], [12.0, 46.0], [12.0, 46.5], [11.5, 46.5], [11.5, 46.0]]]}
        }
    ]
}"#;

fn config(root: &Path) -> Config {
    let boundary_file = root.join("boundaries.geojson");
    std::fs::write(&boundary_file, BOUNDARIES).unwrap();
    Config {
        paths: PathsConfig {
            data_dir: root.join("data"),
            raw_data_dir: root.join("data/raw"),
            pages_dir: root.join("data/raw/pages"),
            room_batches_dir: root.join("data/raw/rooms"),
            prepared_dir: root.join("data/prepared"),
            dashboard_dir: root.join("data/dashboard"),
            plot_dir: root.join("plots"),
        },
        boundaries: BoundaryConfig {
            file: boundary_file,
            ..BoundaryConfig::default()
        },
        density: DensityConfig {
            grid_size: 20,
            bandwidth: 0.05,
        },
        ..Config::default()
    }
}

fn service(config: &Config) -> HotspotService {
    let accommodations = Arc::new(Offline(RegionMeta {
        id: RegionId("test".to_owned()),
        name: "Testland".to_owned(),
    }));
    let boundaries = hotspot_provider_boundaries::from_config(&config.boundaries);
    HotspotService::new(Arc::new(RegionPlugin::new(accommodations, boundaries)))
}

fn record(id: &str, latitude: f64, longitude: f64) -> AccommodationRecord {
    AccommodationRecord {
        id: AccommodationId(id.to_owned()),
        name: Some(format!("Gasthof {id}")),
        city: None,
        region: None,
        category_id: Some("3sstars".to_owned()),
        room_types: Some(2),
        has_apartment: Some(false),
        is_gastronomy: Some(false),
        altitude: Some(1_200.0),
        latitude: Some(latitude),
        longitude: Some(longitude),
    }
}

fn room(id: &str, max_occupancy: u32) -> RoomInfo {
    RoomInfo {
        id: AccommodationId(id.to_owned()),
        total_rooms: max_occupancy / 2,
        max_occupancy,
    }
}

fn seed(config: &Config) {
    config.prepare_dirs().unwrap();
    let page = AccommodationPage {
        number: 1,
        total_pages: Some(1),
        total_results: Some(4),
        next_page: None,
        fetched_at: Utc::now(),
        records: vec![
            record("a1_REDUCED", 46.1, 11.1),
            record("a2", 46.3, 11.3),
            record("b1", 46.2, 11.7),
            record("lost", 0.0, 0.0),
        ],
    };
    storage::write_page(&config.paths.pages_dir, &page).unwrap();
    storage::write_room_batch(
        &config.paths.room_batches_dir,
        3,
        &[room("a1", 10), room("a2", 5), room("b1", 20)],
    )
    .unwrap();
}

#[test]
fn prepare_writes_tables_dashboard_files_and_plots() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    seed(&config);

    let outcome = run_prepare(&service(&config), &config).unwrap();

    assert_eq!(outcome.report.input_records, 4);
    assert_eq!(outcome.report.invalid_coordinates, 1);
    assert_eq!(outcome.accommodations, 3);
    assert_eq!(outcome.municipalities, 2);
    assert!(outcome.density_grid);
    assert_eq!(outcome.plots.len(), 20);

    let metrics: Vec<DensityMetric> =
        storage::read_csv(&config.paths.municipality_table_file()).unwrap();
    assert_eq!(metrics.len(), 2);
    assert!((metrics[0].density.unwrap() - 0.15).abs() < 1e-12);
    assert!((metrics[1].density.unwrap() - 0.40).abs() < 1e-12);

    let features = storage::read_municipality_geojson(&config.paths.municipality_geojson_file())
        .unwrap();
    assert_eq!(features.len(), 2);

    let grid: DensityGrid = storage::read_json(&config.paths.density_file()).unwrap();
    assert_eq!(grid.rows, 20);
    assert!(grid.max_value().unwrap() > 0.0);
}

#[test]
fn prepare_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    seed(&config);
    let service = service(&config);

    run_prepare(&service, &config).unwrap();
    let first = std::fs::read(config.paths.prepared_accommodations_file()).unwrap();
    let first_metrics = std::fs::read(config.paths.municipality_table_file()).unwrap();
    run_prepare(&service, &config).unwrap();

    assert_eq!(std::fs::read(config.paths.prepared_accommodations_file()).unwrap(), first);
    assert_eq!(std::fs::read(config.paths.municipality_table_file()).unwrap(), first_metrics);
}

#[test]
fn prepare_without_pages_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    config.prepare_dirs().unwrap();

    let result = run_prepare(&service(&config), &config);

    assert!(result.unwrap_err().to_string().contains("fetch-data"));
}
