//! Provider for municipal boundaries with resident population.
//!
//! Reads ESRI shapefiles (`.shp` with its `.dbf`) or GeoJSON feature
//! collections. Coordinates must already be WGS84 longitude/latitude.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::{Coord, CoordsIter, LineString, MultiPolygon, Polygon};
use geojson::FeatureCollection;
use serde_json::Value;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape};
use tracing::{debug, info};

use hotspot_core::{
    config::BoundaryConfig,
    model::Municipality,
    ports::{BoundaryPort, PortError},
    storage,
};

/// Attribute names to read from each boundary feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNames {
    /// German name.
    pub name_de: String,
    /// Italian name.
    pub name_it: String,
    /// Resident population.
    pub population: String,
}

impl From<&BoundaryConfig> for AttributeNames {
    fn from(config: &BoundaryConfig) -> Self {
        Self {
            name_de: config.name_de_field.clone(),
            name_it: config.name_it_field.clone(),
            population: config.population_field.clone(),
        }
    }
}

/// Municipalities from an ESRI shapefile.
pub struct ShapefileBoundaryPort {
    path: PathBuf,
    attributes: AttributeNames,
}

impl ShapefileBoundaryPort {
    /// Read `path` (the `.shp`; the `.dbf` must sit next to it).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, attributes: AttributeNames) -> Self {
        Self {
            path: path.into(),
            attributes,
        }
    }
}

impl BoundaryPort for ShapefileBoundaryPort {
    fn municipalities(&self) -> Result<Vec<Municipality>, PortError> {
        let shapes = shapefile::read(&self.path).map_err(|err| {
            PortError::Boundary(format!("{}: {err}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), shapes = shapes.len(), "read shapefile");

        shapes
            .into_iter()
            .enumerate()
            .map(|(position, (shape, record))| {
                let boundary = shape_to_multipolygon(shape).ok_or_else(|| {
                    PortError::Boundary(format!(
                        "{}: shape {position} is not a polygon",
                        self.path.display()
                    ))
                })?;
                municipality(
                    boundary,
                    |field| record_text(&record, field),
                    |field| record_count(&record, field),
                    &self.attributes,
                )
                .map_err(|reason| {
                    PortError::Boundary(format!(
                        "{}: shape {position}: {reason}",
                        self.path.display()
                    ))
                })
            })
            .collect()
    }
}

/// Municipalities from a GeoJSON feature collection.
pub struct GeoJsonBoundaryPort {
    path: PathBuf,
    attributes: AttributeNames,
}

impl GeoJsonBoundaryPort {
    /// Read the feature collection at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, attributes: AttributeNames) -> Self {
        Self {
            path: path.into(),
            attributes,
        }
    }
}

impl BoundaryPort for GeoJsonBoundaryPort {
    fn municipalities(&self) -> Result<Vec<Municipality>, PortError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|err| PortError::Boundary(format!("{}: {err}", self.path.display())))?;
        let collection: FeatureCollection = text
            .parse()
            .map_err(|err| PortError::Boundary(format!("{}: {err}", self.path.display())))?;
        debug!(path = %self.path.display(), features = collection.features.len(), "read geojson");

        collection
            .features
            .into_iter()
            .enumerate()
            .map(|(position, feature)| {
                let boundary = feature
                    .geometry
                    .as_ref()
                    .and_then(|geometry| storage::multipolygon_from_geojson(geometry.value.clone()))
                    .ok_or_else(|| {
                        PortError::Boundary(format!(
                            "{}: feature {position} is not a polygon",
                            self.path.display()
                        ))
                    })?;
                municipality(
                    boundary,
                    |field| feature.property(field).and_then(json_text),
                    |field| feature.property(field).and_then(json_count),
                    &self.attributes,
                )
                .map_err(|reason| {
                    PortError::Boundary(format!(
                        "{}: feature {position}: {reason}",
                        self.path.display()
                    ))
                })
            })
            .collect()
    }
}

/// Pick the boundary reader matching the configured file's extension.
///
/// `.geojson` and `.json` files are read as GeoJSON, everything else as a shapefile.
#[must_use]
pub fn from_config(config: &BoundaryConfig) -> Arc<dyn BoundaryPort> {
    let attributes = AttributeNames::from(config);
    if is_geojson(&config.file) {
        info!(path = %config.file.display(), "using geojson boundaries");
        Arc::new(GeoJsonBoundaryPort::new(&config.file, attributes))
    } else {
        info!(path = %config.file.display(), "using shapefile boundaries");
        Arc::new(ShapefileBoundaryPort::new(&config.file, attributes))
    }
}

fn is_geojson(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extension.eq_ignore_ascii_case("geojson") || extension.eq_ignore_ascii_case("json")
        })
}

fn municipality(
    boundary: MultiPolygon<f64>,
    text: impl Fn(&str) -> Option<String>,
    count: impl Fn(&str) -> Option<u64>,
    attributes: &AttributeNames,
) -> Result<Municipality, String> {
    if !in_lon_lat_range(&boundary) {
        return Err("coordinates outside the lon/lat range, reproject to WGS84".to_owned());
    }
    let name_de = text(&attributes.name_de)
        .ok_or_else(|| format!("missing attribute {}", attributes.name_de))?;
    let name_it = text(&attributes.name_it)
        .ok_or_else(|| format!("missing attribute {}", attributes.name_it))?;
    let population = count(&attributes.population)
        .ok_or_else(|| format!("missing attribute {}", attributes.population))?;

    Ok(Municipality {
        name_de,
        name_it,
        population,
        boundary,
    })
}

fn in_lon_lat_range(boundary: &MultiPolygon<f64>) -> bool {
    boundary.coords_iter().all(|coord| {
        coord.x.is_finite()
            && coord.y.is_finite()
            && (-180.0..=180.0).contains(&coord.x)
            && (-90.0..=90.0).contains(&coord.y)
    })
}

fn shape_to_multipolygon(shape: Shape) -> Option<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Some(assemble(polygon.rings(), |point| Coord {
            x: point.x,
            y: point.y,
        })),
        Shape::PolygonM(polygon) => Some(assemble(polygon.rings(), |point| Coord {
            x: point.x,
            y: point.y,
        })),
        Shape::PolygonZ(polygon) => Some(assemble(polygon.rings(), |point| Coord {
            x: point.x,
            y: point.y,
        })),
        _ => None,
    }
}

/// Outer rings open a new polygon, inner rings are holes of the last outer ring.
fn assemble<P>(rings: &[PolygonRing<P>], coord: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&coord).collect();
        match ring {
            PolygonRing::Outer(_) => polygons.push((line, Vec::new())),
            PolygonRing::Inner(_) => {
                if let Some((_, holes)) = polygons.last_mut() {
                    holes.push(line);
                } else {
                    // hole before any outer ring: keep the area rather than drop it
                    polygons.push((line, Vec::new()));
                }
            }
        }
    }
    MultiPolygon(
        polygons
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}

fn record_text(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => {
            Some(text.trim().to_owned()).filter(|text| !text.is_empty())
        }
        FieldValue::Numeric(Some(number)) => Some(number.to_string()),
        FieldValue::Integer(number) => Some(number.to_string()),
        _ => None,
    }
}

fn record_count(record: &Record, field: &str) -> Option<u64> {
    match record.get(field)? {
        FieldValue::Numeric(Some(number)) | FieldValue::Double(number) => float_count(*number),
        FieldValue::Float(Some(number)) => float_count(f64::from(*number)),
        FieldValue::Integer(number) => u64::try_from(*number).ok(),
        FieldValue::Character(Some(text)) => text.trim().parse().ok(),
        _ => None,
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_owned()).filter(|text| !text.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn json_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(float_count)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "checked to be a finite non-negative count"
)]
fn float_count(number: f64) -> Option<u64> {
    (number.is_finite() && number >= 0.0).then(|| number.round() as u64)
}
