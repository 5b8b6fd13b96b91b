//! Static SVG maps: one choropleth per KPI and a density heatmap.
//!
//! Coordinates are drawn in an equirectangular projection scaled by the
//! cosine of the map's middle latitude, which is accurate enough at the
//! size of a province.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::{BoundingRect, LineString, MultiPolygon, Rect};
use tracing::info;

use hotspot_core::palette::{Ramp, Rgb, Scale};
use hotspot_core::storage::MunicipalityFeature;
use hotspot_core::{DensityGrid, HotspotError, Kpi, Municipality, PreparedAccommodation, Result};

const WIDTH: f64 = 900.0;
const MARGIN: f64 = 20.0;
const LEGEND_HEIGHT: f64 = 80.0;
const LEGEND_STEPS: u32 = 5;
const NO_DATA: Rgb = Rgb(224, 224, 224);

/// Town marked on the heatmap for orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Town {
    /// Display name.
    pub name: &'static str,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Main towns of South Tyrol.
pub const REFERENCE_TOWNS: [Town; 9] = [
    Town { name: "Merano", latitude: 46.669_877, longitude: 11.164_477 },
    Town { name: "Bolzano", latitude: 46.490_620, longitude: 11.338_833 },
    Town { name: "Ortisei", latitude: 46.572_632, longitude: 11.676_449 },
    Town { name: "Bressanone", latitude: 46.714_856, longitude: 11.656_111 },
    Town { name: "Brunico", latitude: 46.795_319, longitude: 11.938_820 },
    Town { name: "Vipiteno", latitude: 46.892_434, longitude: 11.430_226 },
    Town { name: "Silandro", latitude: 46.628_023, longitude: 10.771_166 },
    Town { name: "Curon", latitude: 46.807_447, longitude: 10.539_065 },
    Town { name: "San Candido", latitude: 46.731_986, longitude: 12.281_373 },
];

struct Projection {
    min_lon: f64,
    max_lat: f64,
    scale_x: f64,
    scale_y: f64,
    map_height: f64,
}

impl Projection {
    fn fit(bounds: Rect<f64>) -> Self {
        let middle = (bounds.min().y + bounds.max().y) / 2.0;
        let aspect = middle.to_radians().cos();
        let span_x = (bounds.width() * aspect).max(f64::EPSILON);
        let span_y = bounds.height().max(f64::EPSILON);
        let scale = (WIDTH - 2.0 * MARGIN) / span_x;
        Self {
            min_lon: bounds.min().x,
            max_lat: bounds.max().y,
            scale_x: scale * aspect,
            scale_y: scale,
            map_height: span_y * scale + 2.0 * MARGIN,
        }
    }

    fn project(&self, longitude: f64, latitude: f64) -> (f64, f64) {
        (
            MARGIN + (longitude - self.min_lon) * self.scale_x,
            MARGIN + (self.max_lat - latitude) * self.scale_y,
        )
    }

    fn height(&self) -> f64 {
        self.map_height + LEGEND_HEIGHT
    }
}

/// Render a choropleth of `kpi` over the municipalities.
///
/// # Errors
///
/// Returns an error when writing to `out` fails.
pub fn write_choropleth<W: Write>(
    out: &mut W,
    features: &[MunicipalityFeature],
    kpi: Kpi,
) -> io::Result<()> {
    let bounds = features
        .iter()
        .filter_map(|feature| feature.boundary.bounding_rect())
        .reduce(union);
    let Some(bounds) = bounds else {
        return write_empty(out, kpi.label());
    };
    let projection = Projection::fit(bounds);
    let scale = Scale::spanning(features.iter().filter_map(|feature| kpi.value(&feature.metric)));

    open_svg(out, &projection)?;
    for feature in features {
        let value = kpi.value(&feature.metric);
        let fill = match (value, scale) {
            (Some(value), Some(scale)) => Ramp::Blues.at(scale.fraction(value)),
            _ => NO_DATA,
        };
        writeln!(
            out,
            r##"<path class="municipality" d="{}" fill="{}" fill-rule="evenodd" stroke="#ffffff" stroke-width="0.5"><title>{} / {}: {}</title></path>"##,
            path_data(&feature.boundary, &projection),
            fill.hex(),
            escape(&feature.metric.name_de),
            escape(&feature.metric.name_it),
            escape(&kpi.display(value)),
        )?;
    }

    let legend_top = projection.map_height + 10.0;
    writeln!(
        out,
        r#"<text x="{MARGIN}" y="{:.1}" font-family="sans-serif" font-size="14">{}</text>"#,
        legend_top + 12.0,
        escape(kpi.label()),
    )?;
    if let Some(scale) = scale {
        let swatch = 90.0;
        for step in 0..LEGEND_STEPS {
            let fraction = f64::from(step) / f64::from(LEGEND_STEPS - 1);
            let value = scale.min + (scale.max - scale.min) * fraction;
            let x = MARGIN + f64::from(step) * (swatch + 10.0);
            write_swatch(out, x, legend_top + 24.0, swatch, Ramp::Blues.at(fraction), &kpi.display(Some(value)))?;
        }
    }
    let no_data_x = MARGIN + f64::from(LEGEND_STEPS) * 100.0;
    write_swatch(out, no_data_x, legend_top + 24.0, 90.0, NO_DATA, "No data")?;
    writeln!(out, "</svg>")
}

/// Render the density grid with municipality outlines, establishments, and towns.
///
/// # Errors
///
/// Returns an error when writing to `out` fails.
pub fn write_heatmap<W: Write>(
    out: &mut W,
    grid: &DensityGrid,
    municipalities: &[Municipality],
    accommodations: &[PreparedAccommodation],
) -> io::Result<()> {
    const TITLE: &str = "Density of Tourism Establishments";

    let bounds = Rect::new(
        geo::coord! { x: grid.min_lon, y: grid.min_lat },
        geo::coord! { x: grid.max_lon, y: grid.max_lat },
    );
    let projection = Projection::fit(bounds);
    let Some(max) = grid.max_value().filter(|max| *max > 0.0) else {
        return write_empty(out, TITLE);
    };

    open_svg(out, &projection)?;
    let (step_lon, step_lat) = cell_size(grid);
    let cell_width = step_lon * projection.scale_x;
    let cell_height = step_lat * projection.scale_y;
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let Some(value) = grid.value(row, col).filter(|value| *value > 0.0) else {
                continue;
            };
            let (longitude, latitude) = grid.node(row, col);
            let (x, y) = projection.project(longitude, latitude);
            writeln!(
                out,
                r#"<rect class="cell" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
                x - cell_width / 2.0,
                y - cell_height / 2.0,
                cell_width,
                cell_height,
                Ramp::PuBu.at(value / max).hex(),
            )?;
        }
    }

    for municipality in municipalities {
        writeln!(
            out,
            r##"<path class="outline" d="{}" fill="none" stroke="#737373" stroke-width="0.4"/>"##,
            path_data(&municipality.boundary, &projection),
        )?;
    }

    for accommodation in accommodations {
        let (x, y) = projection.project(accommodation.longitude, accommodation.latitude);
        writeln!(
            out,
            r##"<circle class="establishment" cx="{x:.1}" cy="{y:.1}" r="0.7" fill="#000000" fill-opacity="0.3"/>"##,
        )?;
    }

    for town in &REFERENCE_TOWNS {
        let (x, y) = projection.project(town.longitude, town.latitude);
        writeln!(
            out,
            r##"<circle class="town" cx="{x:.1}" cy="{y:.1}" r="3" fill="#d62728"/><text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="11">{}</text>"##,
            x + 5.0,
            y - 4.0,
            escape(town.name),
        )?;
    }

    writeln!(
        out,
        r#"<text x="{MARGIN}" y="{:.1}" font-family="sans-serif" font-size="14">{TITLE} (bandwidth {}°)</text>"#,
        projection.map_height + 22.0,
        grid.bandwidth,
    )?;
    writeln!(out, "</svg>")
}

/// Write every choropleth and, if a grid is given, the heatmap into `dir`.
///
/// # Errors
///
/// Returns an error when a file cannot be written.
pub fn write_plots(
    dir: &Path,
    features: &[MunicipalityFeature],
    grid: Option<&DensityGrid>,
    municipalities: &[Municipality],
    accommodations: &[PreparedAccommodation],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(Kpi::ALL.len() + 1);
    for kpi in Kpi::ALL {
        let path = dir.join(format!("choropleth_{}.svg", kpi.column()));
        render(&path, |out| write_choropleth(out, features, kpi))?;
        written.push(path);
    }
    if let Some(grid) = grid {
        let path = dir.join("density_heatmap.svg");
        render(&path, |out| write_heatmap(out, grid, municipalities, accommodations))?;
        written.push(path);
    }
    info!(plots = written.len(), dir = %dir.display(), "rendered plots");
    Ok(written)
}

fn render(
    path: &Path,
    draw: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<()> {
    let file = File::create(path).map_err(|err| HotspotError::io(path, err))?;
    let mut out = BufWriter::new(file);
    draw(&mut out).map_err(|err| HotspotError::io(path, err))?;
    out.flush().map_err(|err| HotspotError::io(path, err))
}

fn open_svg<W: Write>(out: &mut W, projection: &Projection) -> io::Result<()> {
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height:.0}" viewBox="0 0 {WIDTH} {height:.0}">"#,
        height = projection.height(),
    )?;
    writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)
}

fn write_empty<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="100" viewBox="0 0 {WIDTH} 100">"#,
    )?;
    writeln!(
        out,
        r#"<text x="{MARGIN}" y="50" font-family="sans-serif" font-size="14">{}: no data</text>"#,
        escape(title),
    )?;
    writeln!(out, "</svg>")
}

fn write_swatch<W: Write>(
    out: &mut W,
    x: f64,
    y: f64,
    width: f64,
    colour: Rgb,
    label: &str,
) -> io::Result<()> {
    writeln!(
        out,
        r##"<rect class="legend" x="{x:.1}" y="{y:.1}" width="{width:.1}" height="12" fill="{}" stroke="#999999" stroke-width="0.5"/><text x="{x:.1}" y="{:.1}" font-family="sans-serif" font-size="11">{}</text>"##,
        colour.hex(),
        y + 26.0,
        escape(label),
    )
}

#[expect(clippy::cast_precision_loss, reason = "grid sizes are small")]
fn cell_size(grid: &DensityGrid) -> (f64, f64) {
    let step = |span: f64, nodes: usize| {
        if nodes > 1 {
            span / (nodes - 1) as f64
        } else {
            span
        }
    };
    (
        step(grid.max_lon - grid.min_lon, grid.cols),
        step(grid.max_lat - grid.min_lat, grid.rows),
    )
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

fn path_data(boundary: &MultiPolygon<f64>, projection: &Projection) -> String {
    boundary
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|ring| ring_path(ring, projection))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ring_path(ring: &LineString<f64>, projection: &Projection) -> String {
    let points = ring
        .coords()
        .enumerate()
        .map(|(idx, coord)| {
            let (x, y) = projection.project(coord.x, coord.y);
            let command = if idx == 0 { 'M' } else { 'L' };
            format!("{command}{x:.1},{y:.1}")
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{points} Z")
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
