use geo::{BoundingRect, Contains, LineString, Point, Rect};
use hotspot_core::storage::{self, MunicipalityFeature};
use hotspot_core::{DensityGrid, HotspotError, PathsConfig, PreparedAccommodation};
use tracing::info;

const RASTER_COLS: usize = 160;
const RASTER_ROWS: usize = 100;
/// Outline vertices closer than this (degrees) to the previous kept one are dropped.
const OUTLINE_TOLERANCE: f64 = 0.002;

/// Sample point of the choropleth fill and the municipality it falls in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RasterCell {
    pub lon: f64,
    pub lat: f64,
    pub feature: usize,
}

pub(crate) struct DashboardData {
    pub features: Vec<MunicipalityFeature>,
    /// Thinned rings per feature, as lon/lat pairs.
    pub outlines: Vec<Vec<Vec<(f64, f64)>>>,
    pub raster: Vec<RasterCell>,
    pub bounds: Rect<f64>,
    pub grid: Option<DensityGrid>,
    pub establishments: Vec<(f64, f64)>,
}

impl DashboardData {
    /// Read the municipality layer, and the density grid and establishments if present.
    pub(crate) fn load(paths: &PathsConfig) -> hotspot_core::Result<Self> {
        let features = storage::read_municipality_geojson(&paths.municipality_geojson_file())?;

        let density_file = paths.density_file();
        let grid = if density_file.is_file() {
            Some(storage::read_json::<DensityGrid>(&density_file)?)
        } else {
            None
        };

        let accommodations_file = paths.prepared_accommodations_file();
        let establishments = if accommodations_file.is_file() {
            storage::read_csv::<PreparedAccommodation>(&accommodations_file)?
                .iter()
                .filter(|accommodation| accommodation.municipality_de.is_some())
                .map(|accommodation| (accommodation.longitude, accommodation.latitude))
                .collect()
        } else {
            Vec::new()
        };

        let data = Self::from_parts(features, grid, establishments)?;
        info!(
            municipalities = data.features.len(),
            establishments = data.establishments.len(),
            density_grid = data.grid.is_some(),
            "dashboard data loaded"
        );
        Ok(data)
    }

    pub(crate) fn from_parts(
        features: Vec<MunicipalityFeature>,
        grid: Option<DensityGrid>,
        establishments: Vec<(f64, f64)>,
    ) -> hotspot_core::Result<Self> {
        let rects: Vec<Option<Rect<f64>>> = features
            .iter()
            .map(|feature| feature.boundary.bounding_rect())
            .collect();
        let bounds = rects.iter().flatten().copied().reduce(union).ok_or_else(|| {
            HotspotError::InvalidInput("municipality layer is empty, run prepare-data first".to_owned())
        })?;

        let outlines = features
            .iter()
            .map(|feature| {
                feature
                    .boundary
                    .iter()
                    .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
                    .map(thin)
                    .collect()
            })
            .collect();
        let raster = rasterize(&features, &rects, bounds);

        Ok(Self {
            features,
            outlines,
            raster,
            bounds,
            grid,
            establishments,
        })
    }
}

#[expect(clippy::cast_precision_loss, reason = "raster sizes are small")]
fn rasterize(
    features: &[MunicipalityFeature],
    rects: &[Option<Rect<f64>>],
    bounds: Rect<f64>,
) -> Vec<RasterCell> {
    let step_lon = bounds.width() / RASTER_COLS as f64;
    let step_lat = bounds.height() / RASTER_ROWS as f64;
    let mut raster = Vec::new();

    for row in 0..RASTER_ROWS {
        let lat = bounds.min().y + (row as f64 + 0.5) * step_lat;
        for col in 0..RASTER_COLS {
            let lon = bounds.min().x + (col as f64 + 0.5) * step_lon;
            let point = Point::new(lon, lat);
            let hit = features.iter().zip(rects).position(|(feature, rect)| {
                rect.is_some_and(|rect| rect.contains(&point)) && feature.boundary.contains(&point)
            });
            if let Some(feature) = hit {
                raster.push(RasterCell { lon, lat, feature });
            }
        }
    }
    raster
}

fn thin(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    let mut kept: Vec<(f64, f64)> = Vec::new();
    let coords: Vec<_> = ring.coords().collect();
    for (idx, coord) in coords.iter().enumerate() {
        let is_last = idx + 1 == coords.len();
        let far_enough = kept.last().is_none_or(|&(lon, lat)| {
            (coord.x - lon).abs() > OUTLINE_TOLERANCE || (coord.y - lat).abs() > OUTLINE_TOLERANCE
        });
        if far_enough || is_last {
            kept.push((coord.x, coord.y));
        }
    }
    kept
}

fn union(left: Rect<f64>, right: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::coord! {
            x: left.min().x.min(right.min().x),
            y: left.min().y.min(right.min().y),
        },
        geo::coord! {
            x: left.max().x.max(right.max().x),
            y: left.max().y.max(right.max().y),
        },
    )
}
