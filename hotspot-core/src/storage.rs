//! Reading and writing of pipeline files.
//!
//! Raw pages and the density grid are JSON, tables are CSV, and the
//! municipality layer for the dashboard is a GeoJSON feature collection.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{HotspotError, Result};
use crate::model::{AccommodationPage, DensityMetric, Municipality, RoomInfo};

const PAGE_PREFIX: &str = "page_";
const ROOM_BATCH_PREFIX: &str = "accommodations_nr_rooms_";

/// A municipality boundary together with its metrics.
#[derive(Debug, Clone)]
pub struct MunicipalityFeature {
    /// Boundary in WGS84 lon/lat.
    pub boundary: MultiPolygon<f64>,
    /// Metrics of the municipality.
    pub metric: DensityMetric,
}

/// Write rows to a CSV file with a header derived from the row type.
///
/// # Errors
///
/// Returns an error when the file cannot be created or a row cannot be serialized.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|err| HotspotError::csv(path, err))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| HotspotError::csv(path, err))?;
    }
    writer.flush().map_err(|err| HotspotError::io(path, err))?;
    debug!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

/// Read every row of a CSV file.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or a row cannot be deserialized.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| HotspotError::csv(path, err))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|err| HotspotError::csv(path, err))
}

/// Serialize a value to a JSON file.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|err| HotspotError::io(path, err))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|err| HotspotError::json(path, err))?;
    writer.flush().map_err(|err| HotspotError::io(path, err))
}

/// Deserialize a value from a JSON file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| HotspotError::io(path, err))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| HotspotError::json(path, err))
}

/// Persist one fetched page as `page_{number}.json`.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_page(dir: &Path, page: &AccommodationPage) -> Result<PathBuf> {
    let path = dir.join(format!("{PAGE_PREFIX}{}.json", page.number));
    write_json(&path, page)?;
    Ok(path)
}

/// Read every persisted page of `dir`, ordered by page number.
///
/// # Errors
///
/// Returns an error when the directory or a page cannot be read.
pub fn read_pages(dir: &Path) -> Result<Vec<AccommodationPage>> {
    let mut pages = files_with_prefix(dir, PAGE_PREFIX, "json")?
        .iter()
        .map(|path| read_json::<AccommodationPage>(path))
        .collect::<Result<Vec<_>>>()?;
    pages.sort_by_key(|page| page.number);
    Ok(pages)
}

/// Persist a batch of room results; the name records the call count and last id.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_room_batch(dir: &Path, calls: usize, rooms: &[RoomInfo]) -> Result<PathBuf> {
    let last_id = rooms.last().map_or("empty", |room| room.id.0.as_str());
    let path = dir.join(format!("{ROOM_BATCH_PREFIX}{calls}_{last_id}.csv"));
    write_csv(&path, rooms)?;
    Ok(path)
}

/// Merge all room batches of `dir`, keeping the first result per id, ordered by id.
///
/// Batches are visited by call count, so the earliest flush of a run wins.
///
/// # Errors
///
/// Returns an error when a batch cannot be read.
pub fn merge_room_batches(dir: &Path) -> Result<Vec<RoomInfo>> {
    let mut batches = files_with_prefix(dir, ROOM_BATCH_PREFIX, "csv")?;
    batches.sort_by_cached_key(|path| (batch_calls(path).unwrap_or(usize::MAX), path.clone()));

    let mut rooms: Vec<RoomInfo> = Vec::new();
    for path in batches {
        rooms.extend(read_csv::<RoomInfo>(&path)?);
    }
    // stable sort keeps the earliest batch first within an id
    rooms.sort_by(|left, right| left.id.cmp(&right.id));
    rooms.dedup_by(|later, earlier| later.id == earlier.id);
    Ok(rooms)
}

/// Write municipality boundaries with their metrics as GeoJSON features.
///
/// Metrics are matched to municipalities by German name; municipalities
/// without a metric row are skipped.
///
/// # Errors
///
/// Returns an error when a metric cannot be converted or the file cannot be written.
pub fn write_municipality_geojson(
    path: &Path,
    municipalities: &[Municipality],
    metrics: &[DensityMetric],
) -> Result<()> {
    let mut features = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let Some(municipality) = municipalities
            .iter()
            .find(|municipality| municipality.name_de == metric.name_de)
        else {
            continue;
        };

        let properties = match serde_json::to_value(metric) {
            Ok(serde_json::Value::Object(properties)) => properties,
            Ok(_) => {
                return Err(HotspotError::InvalidInput(format!(
                    "metric of {} is not an object",
                    metric.name_de
                )));
            }
            Err(err) => return Err(HotspotError::json(path, err)),
        };

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&municipality.boundary))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    fs::write(path, GeoJson::from(collection).to_string())
        .map_err(|err| HotspotError::io(path, err))
}

/// Read the municipality layer written by [`write_municipality_geojson`].
///
/// # Errors
///
/// Returns an error when the file is unreadable, not GeoJSON, or a feature lacks
/// a polygon geometry or metric properties.
pub fn read_municipality_geojson(path: &Path) -> Result<Vec<MunicipalityFeature>> {
    let text = fs::read_to_string(path).map_err(|err| HotspotError::io(path, err))?;
    let collection: FeatureCollection = text
        .parse()
        .map_err(|err| HotspotError::geojson(path, err))?;

    collection
        .features
        .into_iter()
        .map(|feature| {
            let boundary = feature
                .geometry
                .and_then(|geometry| multipolygon_from_geojson(geometry.value))
                .ok_or_else(|| {
                    HotspotError::InvalidInput(format!(
                        "{}: feature without polygon geometry",
                        path.display()
                    ))
                })?;
            let properties = feature.properties.unwrap_or_default();
            let metric = serde_json::from_value(serde_json::Value::Object(properties))
                .map_err(|err| HotspotError::json(path, err))?;
            Ok(MunicipalityFeature { boundary, metric })
        })
        .collect()
}

/// Convert a GeoJSON `Polygon` or `MultiPolygon` into a multi-polygon.
#[must_use]
pub fn multipolygon_from_geojson(value: geojson::Value) -> Option<MultiPolygon<f64>> {
    match value {
        geojson::Value::Polygon(_) => geo::Polygon::<f64>::try_from(value)
            .ok()
            .map(|polygon| MultiPolygon(vec![polygon])),
        geojson::Value::MultiPolygon(_) => MultiPolygon::<f64>::try_from(value).ok(),
        _ => None,
    }
}

/// Call count encoded in a room batch file name.
fn batch_calls(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(ROOM_BATCH_PREFIX)?
        .split('_')
        .next()?
        .parse()
        .ok()
}

fn files_with_prefix(dir: &Path, prefix: &str, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| HotspotError::io(dir, err))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| HotspotError::io(dir, err))?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix))
            && path
                .extension()
                .is_some_and(|found| found.eq_ignore_ascii_case(extension));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use geo::polygon;

    use super::*;
    use crate::model::{AccommodationId, AccommodationRecord};

    fn metric(name: &str) -> DensityMetric {
        DensityMetric {
            name_de: name.to_owned(),
            name_it: format!("{name} (it)"),
            population: 1_000,
            area_km2: 12.5,
            nr_establishments: 3,
            total_occupancy: 40,
            total_nr_rooms: 20,
            avg_occupancy: Some(13.3),
            nr_establishments_per_thousand_pop: Some(3.0),
            total_occupancy_per_thousand_pop: Some(40.0),
            total_nr_rooms_per_thousand_pop: Some(20.0),
            occupancy_per_km2: Some(3.2),
            density: Some(0.04),
            share_1_rating: None,
            share_2_rating: Some(0.0),
            share_3_rating: Some(100.0),
            share_3s_rating: None,
            share_4_rating: None,
            share_4s_rating: None,
            share_5_rating: None,
            share_stars: Some(100.0),
            share_suns: None,
            share_flowers: None,
        }
    }

    fn room(id: &str, max_occupancy: u32) -> RoomInfo {
        RoomInfo {
            id: AccommodationId(id.to_owned()),
            total_rooms: 1,
            max_occupancy,
        }
    }

    #[test]
    fn pages_are_read_in_page_order() {
        let dir = tempfile::tempdir().unwrap();
        for number in [10, 2, 1] {
            let page = AccommodationPage {
                number,
                total_pages: Some(10),
                total_results: Some(10),
                next_page: None,
                fetched_at: Utc::now(),
                records: vec![AccommodationRecord {
                    id: AccommodationId(format!("id-{number}")),
                    name: None,
                    city: None,
                    region: None,
                    category_id: None,
                    room_types: None,
                    has_apartment: None,
                    is_gastronomy: None,
                    altitude: None,
                    latitude: Some(46.5),
                    longitude: Some(11.3),
                }],
            };
            write_page(dir.path(), &page).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let pages = read_pages(dir.path()).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|page| page.number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }

    #[test]
    fn metrics_survive_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipalities.csv");
        let rows = vec![metric("Bozen"), metric("Meran")];

        write_csv(&path, &rows).unwrap();
        let read: Vec<DensityMetric> = read_csv(&path).unwrap();

        assert_eq!(read, rows);
    }

    #[test]
    fn room_batches_merge_first_result_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_room_batch(dir.path(), 2, &[room("b", 4), room("a", 2)]).unwrap();
        write_room_batch(dir.path(), 3, &[room("a", 99)]).unwrap();

        let merged = merge_room_batches(dir.path()).unwrap();

        assert_eq!(merged, vec![room("a", 2), room("b", 4)]);
    }

    #[test]
    fn room_batches_merge_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        write_room_batch(dir.path(), 1000, &[room("a", 99)]).unwrap();
        write_room_batch(dir.path(), 200, &[room("a", 2)]).unwrap();
        fs::write(
            dir.path().join("accommodations_nr_rooms_manual.csv"),
            "id,total_rooms,max_occupancy\na,1,7\nc,1,3\n",
        )
        .unwrap();

        let merged = merge_room_batches(dir.path()).unwrap();

        assert_eq!(merged, vec![room("a", 2), room("c", 3)]);
    }

    #[test]
    fn municipality_layer_keeps_geometry_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipality.geojson");
        let municipality = Municipality {
            name_de: "Bozen".to_owned(),
            name_it: "Bolzano".to_owned(),
            population: 1_000,
            boundary: MultiPolygon(vec![polygon![
                (x: 11.0, y: 46.0),
                (x: 11.5, y: 46.0),
                (x: 11.5, y: 46.5),
                (x: 11.0, y: 46.0),
            ]]),
        };

        write_municipality_geojson(&path, &[municipality.clone()], &[metric("Bozen")]).unwrap();
        let features = read_municipality_geojson(&path).unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].metric, metric("Bozen"));
        assert_eq!(features[0].boundary, municipality.boundary);
    }
}
