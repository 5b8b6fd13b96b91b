//! Gaussian kernel density estimate of establishment locations.

use std::f64::consts::PI;

use tracing::debug;

use crate::config::DensityConfig;
use crate::model::{Coordinates, DensityGrid};
use crate::prepare::MunicipalityIndex;

/// Kernels are truncated beyond this many bandwidths.
const CUTOFF_BANDWIDTHS: f64 = 5.0;

/// Estimate establishment density on a grid spanning all municipalities.
///
/// Nodes outside every municipality are masked. Returns `None` when the index
/// has no geometry to span.
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "point counts stay far below 2^52"
)]
pub fn estimate(
    points: &[Coordinates],
    index: &MunicipalityIndex,
    config: &DensityConfig,
) -> Option<DensityGrid> {
    let bounds = index.bounds()?;
    let size = config.grid_size.max(2);
    let bandwidth = config.bandwidth;

    let mut grid = DensityGrid {
        min_lon: bounds.min().x,
        max_lon: bounds.max().x,
        min_lat: bounds.min().y,
        max_lat: bounds.max().y,
        rows: size,
        cols: size,
        bandwidth,
        values: Vec::with_capacity(size * size),
    };

    let mut sorted: Vec<Coordinates> = points.to_vec();
    sorted.sort_by(|left, right| left.latitude.total_cmp(&right.latitude));

    let cutoff = bandwidth * CUTOFF_BANDWIDTHS;
    let normalisation = if sorted.is_empty() {
        0.0
    } else {
        1.0 / (sorted.len() as f64 * 2.0 * PI * bandwidth * bandwidth)
    };

    for row in 0..size {
        let (_, latitude) = grid.node(row, 0);
        let start = sorted.partition_point(|point| point.latitude < latitude - cutoff);
        let end = sorted.partition_point(|point| point.latitude <= latitude + cutoff);
        let window = sorted.get(start..end).unwrap_or_default();

        for col in 0..size {
            let (longitude, _) = grid.node(row, col);
            let node = Coordinates {
                latitude,
                longitude,
            };
            if index.locate(node).is_none() {
                grid.values.push(None);
                continue;
            }

            let sum: f64 = window
                .iter()
                .filter(|point| (point.longitude - longitude).abs() <= cutoff)
                .map(|point| {
                    let d_lat = point.latitude - latitude;
                    let d_lon = point.longitude - longitude;
                    (-(d_lat * d_lat + d_lon * d_lon) / (2.0 * bandwidth * bandwidth)).exp()
                })
                .sum();
            grid.values.push(Some(sum * normalisation));
        }
    }

    debug!(
        nodes = grid.values.len(),
        points = sorted.len(),
        "estimated kernel density"
    );
    Some(grid)
}
