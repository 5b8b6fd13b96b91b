//! Domain data structures for accommodations, municipalities, and density metrics.

use std::fmt;

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// Suffix the API appends to ids of reduced (anonymised) records.
const REDUCED_SUFFIX: &str = "_REDUCED";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier for a region covered by a data source.
pub struct RegionId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a region and its human-friendly name.
pub struct RegionMeta {
    /// Unique identifier.
    pub id: RegionId,
    /// Localized display name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a lodging establishment as issued by the tourism API.
pub struct AccommodationId(pub String);

impl AccommodationId {
    /// Return the id without the `_REDUCED` suffix newer API responses carry.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self(
            self.0
                .strip_suffix(REDUCED_SUFFIX)
                .unwrap_or(&self.0)
                .to_owned(),
        )
    }
}

impl fmt::Display for AccommodationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// WGS84 position in decimal degrees.
pub struct Coordinates {
    /// Latitude (north/south).
    pub latitude: f64,
    /// Longitude (east/west).
    pub longitude: f64,
}

impl Coordinates {
    /// Validate a raw latitude/longitude pair.
    ///
    /// Rejects missing, non-finite, out-of-range, and null-island (`0, 0`) positions.
    #[must_use]
    pub fn from_raw(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        let (latitude, longitude) = (latitude?, longitude?);
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        let null_island = latitude == 0.0 && longitude == 0.0;
        (in_range && !null_island).then_some(Self {
            latitude,
            longitude,
        })
    }

    /// Convert into a `geo` point (x = longitude, y = latitude).
    #[must_use]
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Official classification of an establishment, e.g. rating `3S` of type `Stars`.
pub struct Category {
    /// Rating such as `1`, `3S`, or `5`.
    pub rating: String,
    /// Plural, title-cased classification family (`Stars`, `Suns`, `Flowers`).
    pub kind: String,
}

impl Category {
    /// Parse an API category id such as `3sstars` or `4flowers`.
    ///
    /// Returns `None` for `Not categorized` and for ids too short to split.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("Not categorized") {
            return None;
        }

        // "3sstars" and "4sstars" carry a two character rating.
        let split_at = if raw.contains("ss") { 2 } else { 1 };
        if !raw.is_char_boundary(split_at) || raw.len() <= split_at {
            return None;
        }
        let (rating, kind) = raw.split_at(split_at);

        let kind = match kind.to_lowercase().as_str() {
            "flower" => "flowers".to_owned(),
            "star" => "stars".to_owned(),
            "sun" => "suns".to_owned(),
            other => other.to_owned(),
        };

        Some(Self {
            rating: rating.to_uppercase(),
            kind: title_case(&kind),
        })
    }
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A single lodging establishment as returned by the tourism API.
pub struct AccommodationRecord {
    /// Identifier issued by the API.
    pub id: AccommodationId,
    /// Display name (German).
    pub name: Option<String>,
    /// City name (German).
    pub city: Option<String>,
    /// Tourism region name (German).
    pub region: Option<String>,
    /// Raw category id such as `3sstars`.
    pub category_id: Option<String>,
    /// Number of room types listed for the establishment.
    pub room_types: Option<u32>,
    /// Whether the establishment offers apartments.
    pub has_apartment: Option<bool>,
    /// Whether the establishment is also a restaurant.
    pub is_gastronomy: Option<bool>,
    /// Altitude in metres.
    pub altitude: Option<f64>,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
}

impl AccommodationRecord {
    /// Validated position of the establishment, if any.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_raw(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Room capacity of an establishment.
pub struct RoomInfo {
    /// Identifier of the establishment (normalized).
    pub id: AccommodationId,
    /// Sum of room quantities over all room types.
    pub total_rooms: u32,
    /// Sum of quantity times per-room maximum occupancy, i.e. beds.
    pub max_occupancy: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One page of accommodation results.
pub struct AccommodationPage {
    /// Page number as reported by the API (1-based).
    pub number: u32,
    /// Total number of pages, if reported.
    pub total_pages: Option<u32>,
    /// Total number of results across all pages, if reported.
    pub total_results: Option<u32>,
    /// URL of the following page; `None` on the last page.
    pub next_page: Option<String>,
    /// When the page was received.
    pub fetched_at: DateTime<Utc>,
    /// Parsed entries of the page.
    pub records: Vec<AccommodationRecord>,
}

impl AccommodationPage {
    /// Whether another page follows this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        let within_total = self
            .total_pages
            .is_none_or(|total_pages| self.number < total_pages);
        self.next_page.is_some() && within_total
    }
}

#[derive(Debug, Clone)]
/// Administrative area used as the unit of aggregation.
pub struct Municipality {
    /// German name, unique within a boundary file.
    pub name_de: String,
    /// Italian name.
    pub name_it: String,
    /// Resident population.
    pub population: u64,
    /// Boundary in WGS84 lon/lat.
    pub boundary: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Cleaned accommodation joined with capacity and municipality.
pub struct PreparedAccommodation {
    /// Normalized identifier.
    pub id: AccommodationId,
    /// Display name.
    pub name: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Parsed category rating.
    pub category_rating: Option<String>,
    /// Parsed category family.
    pub category_type: Option<String>,
    /// Rooms from the room endpoint.
    pub total_rooms: Option<u32>,
    /// Beds from the room endpoint.
    pub max_occupancy: Option<u32>,
    /// Containing municipality (German); `None` when outside all boundaries.
    pub municipality_de: Option<String>,
    /// Containing municipality (Italian).
    pub municipality_it: Option<String>,
}

impl PreparedAccommodation {
    /// Position of the establishment.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Tourism intensity of one municipality.
pub struct DensityMetric {
    /// German name.
    pub name_de: String,
    /// Italian name.
    pub name_it: String,
    /// Resident population.
    pub population: u64,
    /// Geodesic area in square kilometres.
    pub area_km2: f64,
    /// Number of establishments located in the municipality.
    pub nr_establishments: u32,
    /// Total beds.
    pub total_occupancy: u64,
    /// Total rooms.
    pub total_nr_rooms: u64,
    /// Mean beds per establishment with known capacity.
    pub avg_occupancy: Option<f64>,
    /// Establishments per 1,000 residents.
    pub nr_establishments_per_thousand_pop: Option<f64>,
    /// Beds per 1,000 residents.
    pub total_occupancy_per_thousand_pop: Option<f64>,
    /// Rooms per 1,000 residents.
    pub total_nr_rooms_per_thousand_pop: Option<f64>,
    /// Beds per square kilometre.
    pub occupancy_per_km2: Option<f64>,
    /// Beds per resident.
    pub density: Option<f64>,
    /// Percentage of establishments rated 1.
    pub share_1_rating: Option<f64>,
    /// Percentage of establishments rated 2.
    pub share_2_rating: Option<f64>,
    /// Percentage of establishments rated 3.
    pub share_3_rating: Option<f64>,
    /// Percentage of establishments rated 3S.
    pub share_3s_rating: Option<f64>,
    /// Percentage of establishments rated 4.
    pub share_4_rating: Option<f64>,
    /// Percentage of establishments rated 4S.
    pub share_4s_rating: Option<f64>,
    /// Percentage of establishments rated 5.
    pub share_5_rating: Option<f64>,
    /// Percentage of establishments classified with stars.
    pub share_stars: Option<f64>,
    /// Percentage of establishments classified with suns.
    pub share_suns: Option<f64>,
    /// Percentage of establishments classified with flowers.
    pub share_flowers: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Metrics of [`DensityMetric`] that can be visualised.
pub enum Kpi {
    /// Beds per resident.
    Density,
    /// Number of establishments.
    NrEstablishments,
    /// Establishments per 1,000 residents.
    NrEstablishmentsPerThousandPop,
    /// Total beds.
    TotalOccupancy,
    /// Beds per 1,000 residents.
    TotalOccupancyPerThousandPop,
    /// Beds per square kilometre.
    OccupancyPerKm2,
    /// Total rooms.
    TotalNrRooms,
    /// Rooms per 1,000 residents.
    TotalNrRoomsPerThousandPop,
    /// Mean beds per establishment.
    AvgOccupancy,
    /// Share rated 1.
    Share1Rating,
    /// Share rated 2.
    Share2Rating,
    /// Share rated 3.
    Share3Rating,
    /// Share rated 3S.
    Share3sRating,
    /// Share rated 4.
    Share4Rating,
    /// Share rated 4S.
    Share4sRating,
    /// Share rated 5.
    Share5Rating,
    /// Share of star establishments.
    ShareStars,
    /// Share of sun establishments.
    ShareSuns,
    /// Share of flower establishments.
    ShareFlowers,
}

/// How a KPI value is rendered for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiFormat {
    /// Thousands-separated, no decimals.
    Count,
    /// Fixed number of decimals.
    Decimal(usize),
    /// Percentage with two decimals.
    Percent,
}

impl Kpi {
    /// Every KPI in display order.
    pub const ALL: [Self; 19] = [
        Self::Density,
        Self::NrEstablishments,
        Self::NrEstablishmentsPerThousandPop,
        Self::TotalOccupancy,
        Self::TotalOccupancyPerThousandPop,
        Self::OccupancyPerKm2,
        Self::TotalNrRooms,
        Self::TotalNrRoomsPerThousandPop,
        Self::AvgOccupancy,
        Self::Share1Rating,
        Self::Share2Rating,
        Self::Share3Rating,
        Self::Share3sRating,
        Self::Share4Rating,
        Self::Share4sRating,
        Self::Share5Rating,
        Self::ShareStars,
        Self::ShareSuns,
        Self::ShareFlowers,
    ];

    /// Column name in the municipality table.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Density => "density",
            Self::NrEstablishments => "nr_establishments",
            Self::NrEstablishmentsPerThousandPop => "nr_establishments_per_thousand_pop",
            Self::TotalOccupancy => "total_occupancy",
            Self::TotalOccupancyPerThousandPop => "total_occupancy_per_thousand_pop",
            Self::OccupancyPerKm2 => "occupancy_per_km2",
            Self::TotalNrRooms => "total_nr_rooms",
            Self::TotalNrRoomsPerThousandPop => "total_nr_rooms_per_thousand_pop",
            Self::AvgOccupancy => "avg_occupancy",
            Self::Share1Rating => "share_1_rating",
            Self::Share2Rating => "share_2_rating",
            Self::Share3Rating => "share_3_rating",
            Self::Share3sRating => "share_3s_rating",
            Self::Share4Rating => "share_4_rating",
            Self::Share4sRating => "share_4s_rating",
            Self::Share5Rating => "share_5_rating",
            Self::ShareStars => "share_stars",
            Self::ShareSuns => "share_suns",
            Self::ShareFlowers => "share_flowers",
        }
    }

    /// Human-friendly label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Density => "Tourist Beds per Inhabitant",
            Self::NrEstablishments => "Number of Tourism Establishments",
            Self::NrEstablishmentsPerThousandPop => {
                "Number of Tourism Establishments per 1,000 Inhabitants"
            }
            Self::TotalOccupancy => "Total Occupancy",
            Self::TotalOccupancyPerThousandPop => "Total Occupancy per 1,000 Inhabitants",
            Self::OccupancyPerKm2 => "Total Occupancy per km²",
            Self::TotalNrRooms => "Total Number of Rooms",
            Self::TotalNrRoomsPerThousandPop => "Number of Rooms per 1,000 Inhabitants",
            Self::AvgOccupancy => "Mean Occupancy of Tourism Establishments",
            Self::Share1Rating => "Share of Establishments with Rating 1",
            Self::Share2Rating => "Share of Establishments with Rating 2",
            Self::Share3Rating => "Share of Establishments with Rating 3",
            Self::Share3sRating => "Share of Establishments with Rating 3S",
            Self::Share4Rating => "Share of Establishments with Rating 4",
            Self::Share4sRating => "Share of Establishments with Rating 4S",
            Self::Share5Rating => "Share of Establishments with Rating 5",
            Self::ShareStars => "Share of Stars Establishments",
            Self::ShareSuns => "Share of Suns Establishments",
            Self::ShareFlowers => "Share of Flowers Establishments",
        }
    }

    /// Display format of the KPI.
    #[must_use]
    pub fn format(self) -> KpiFormat {
        match self {
            Self::NrEstablishments | Self::TotalOccupancy | Self::TotalNrRooms => KpiFormat::Count,
            Self::Density => KpiFormat::Decimal(2),
            Self::NrEstablishmentsPerThousandPop
            | Self::TotalOccupancyPerThousandPop
            | Self::OccupancyPerKm2
            | Self::TotalNrRoomsPerThousandPop
            | Self::AvgOccupancy => KpiFormat::Decimal(1),
            _ => KpiFormat::Percent,
        }
    }

    /// Look up a KPI by its column name.
    #[must_use]
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kpi| kpi.column() == column)
    }

    /// Extract the KPI value from a metric row.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "counts stay far below 2^52"
    )]
    pub fn value(self, metric: &DensityMetric) -> Option<f64> {
        match self {
            Self::Density => metric.density,
            Self::NrEstablishments => Some(f64::from(metric.nr_establishments)),
            Self::NrEstablishmentsPerThousandPop => metric.nr_establishments_per_thousand_pop,
            Self::TotalOccupancy => Some(metric.total_occupancy as f64),
            Self::TotalOccupancyPerThousandPop => metric.total_occupancy_per_thousand_pop,
            Self::OccupancyPerKm2 => metric.occupancy_per_km2,
            Self::TotalNrRooms => Some(metric.total_nr_rooms as f64),
            Self::TotalNrRoomsPerThousandPop => metric.total_nr_rooms_per_thousand_pop,
            Self::AvgOccupancy => metric.avg_occupancy,
            Self::Share1Rating => metric.share_1_rating,
            Self::Share2Rating => metric.share_2_rating,
            Self::Share3Rating => metric.share_3_rating,
            Self::Share3sRating => metric.share_3s_rating,
            Self::Share4Rating => metric.share_4_rating,
            Self::Share4sRating => metric.share_4s_rating,
            Self::Share5Rating => metric.share_5_rating,
            Self::ShareStars => metric.share_stars,
            Self::ShareSuns => metric.share_suns,
            Self::ShareFlowers => metric.share_flowers,
        }
    }

    /// Render a value with the KPI's format; missing values show as `n/a`.
    #[must_use]
    pub fn display(self, value: Option<f64>) -> String {
        let Some(value) = value else {
            return "n/a".to_owned();
        };
        match self.format() {
            KpiFormat::Count => group_thousands(value),
            KpiFormat::Decimal(decimals) => format!("{value:.decimals$}"),
            KpiFormat::Percent => format!("{value:.2}%"),
        }
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (idx, digit) in rounded.chars().enumerate() {
        if idx > 0 && (rounded.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0.0 && rounded != "0" {
        grouped.insert(0, '-');
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Kernel density estimate of establishment locations on a regular grid.
pub struct DensityGrid {
    /// Western edge (longitude).
    pub min_lon: f64,
    /// Eastern edge (longitude).
    pub max_lon: f64,
    /// Southern edge (latitude).
    pub min_lat: f64,
    /// Northern edge (latitude).
    pub max_lat: f64,
    /// Number of rows (latitude steps).
    pub rows: usize,
    /// Number of columns (longitude steps).
    pub cols: usize,
    /// Kernel bandwidth in degrees.
    pub bandwidth: f64,
    /// Row-major density values, south to north; `None` outside the region.
    pub values: Vec<Option<f64>>,
}

impl DensityGrid {
    /// Longitude/latitude of a grid node.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "grid sizes are small")]
    pub fn node(&self, row: usize, col: usize) -> (f64, f64) {
        let lon_step = if self.cols > 1 {
            (self.max_lon - self.min_lon) / (self.cols - 1) as f64
        } else {
            0.0
        };
        let lat_step = if self.rows > 1 {
            (self.max_lat - self.min_lat) / (self.rows - 1) as f64
        } else {
            0.0
        };
        (
            self.min_lon + lon_step * col as f64,
            self.min_lat + lat_step * row as f64,
        )
    }

    /// Density at a grid node.
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied().flatten()
    }

    /// Largest unmasked density.
    #[must_use]
    pub fn max_value(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_superior_categories() {
        let category = Category::parse("3sstars").unwrap();
        assert_eq!(category.rating, "3S");
        assert_eq!(category.kind, "Stars");
    }

    #[test]
    fn parses_and_pluralises_plain_categories() {
        let category = Category::parse("4flowers").unwrap();
        assert_eq!(category.rating, "4");
        assert_eq!(category.kind, "Flowers");

        let category = Category::parse("2sun").unwrap();
        assert_eq!(category.kind, "Suns");
    }

    #[test]
    fn uncategorized_has_no_category() {
        assert_eq!(Category::parse("Not categorized"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn strips_reduced_suffix_only() {
        let id = AccommodationId("ABCDUCED_REDUCED".to_owned());
        assert_eq!(id.normalized().0, "ABCDUCED");
        let id = AccommodationId("REDUCED".to_owned());
        assert_eq!(id.normalized().0, "REDUCED");
    }

    #[test]
    fn rejects_invalid_coordinates() {
        assert!(Coordinates::from_raw(Some(0.0), Some(0.0)).is_none());
        assert!(Coordinates::from_raw(None, Some(11.3)).is_none());
        assert!(Coordinates::from_raw(Some(f64::NAN), Some(11.3)).is_none());
        assert!(Coordinates::from_raw(Some(95.0), Some(11.3)).is_none());
        assert!(Coordinates::from_raw(Some(46.49), Some(11.33)).is_some());
    }

    #[test]
    fn page_without_next_link_is_last() {
        let page = AccommodationPage {
            number: 3,
            total_pages: Some(5),
            total_results: Some(50),
            next_page: None,
            fetched_at: Utc::now(),
            records: Vec::new(),
        };
        assert!(!page.has_next());

        let page = AccommodationPage {
            next_page: Some("https://example.org/next".to_owned()),
            ..page
        };
        assert!(page.has_next());

        let page = AccommodationPage { number: 5, ..page };
        assert!(!page.has_next());
    }

    #[test]
    fn formats_kpi_values() {
        assert_eq!(Kpi::TotalOccupancy.display(Some(1_234_567.0)), "1,234,567");
        assert_eq!(Kpi::Density.display(Some(0.149_9)), "0.15");
        assert_eq!(Kpi::ShareStars.display(Some(12.5)), "12.50%");
        assert_eq!(Kpi::AvgOccupancy.display(None), "n/a");
    }

    #[test]
    fn kpi_columns_round_trip() {
        for kpi in Kpi::ALL {
            assert_eq!(Kpi::from_column(kpi.column()), Some(kpi));
        }
    }
}
