//! Cleaning, spatial join, and aggregation of accommodation records.
//!
//! The preparer is a pure function of its inputs: the same records, rooms, and
//! municipalities always produce the same tables in the same order.

use std::collections::HashMap;

use geo::{BoundingRect, Contains, GeodesicArea, Intersects, Rect};
use tracing::{info, warn};

use crate::model::{
    AccommodationId, AccommodationRecord, Category, Coordinates, DensityMetric, Municipality,
    PreparedAccommodation, RoomInfo,
};

const SQUARE_METRES_PER_KM2: f64 = 1_000_000.0;

/// Municipalities with precomputed bounding boxes for point lookups.
#[derive(Debug, Clone)]
pub struct MunicipalityIndex {
    municipalities: Vec<Municipality>,
    bounds: Vec<Option<Rect<f64>>>,
}

impl MunicipalityIndex {
    /// Build the index, dropping later duplicates by German name and sorting by it.
    #[must_use]
    pub fn new(municipalities: Vec<Municipality>) -> Self {
        let total = municipalities.len();
        let mut by_name: Vec<Municipality> = Vec::with_capacity(total);
        for municipality in municipalities {
            if by_name
                .iter()
                .any(|existing| existing.name_de == municipality.name_de)
            {
                continue;
            }
            by_name.push(municipality);
        }
        if by_name.len() < total {
            warn!(
                duplicates = total - by_name.len(),
                "dropped municipalities with duplicate names"
            );
        }
        by_name.sort_by(|left, right| left.name_de.cmp(&right.name_de));

        let bounds = by_name
            .iter()
            .map(|municipality| municipality.boundary.bounding_rect())
            .collect();
        Self {
            municipalities: by_name,
            bounds,
        }
    }

    /// Municipalities ordered by German name.
    #[must_use]
    pub fn municipalities(&self) -> &[Municipality] {
        &self.municipalities
    }

    /// Whether the index holds no municipality.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    /// Bounding box of all municipalities.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds.iter().flatten().copied().reduce(|acc, rect| {
            Rect::new(
                geo::coord! { x: acc.min().x.min(rect.min().x), y: acc.min().y.min(rect.min().y) },
                geo::coord! { x: acc.max().x.max(rect.max().x), y: acc.max().y.max(rect.max().y) },
            )
        })
    }

    /// Find the municipality containing a position.
    ///
    /// Interior containment wins; a point on a shared border goes to the first
    /// municipality (by German name) whose boundary touches it.
    #[must_use]
    pub fn locate(&self, coordinates: Coordinates) -> Option<&Municipality> {
        let point = coordinates.to_point();
        let candidates = || {
            self.municipalities
                .iter()
                .zip(&self.bounds)
                .filter(|(_, rect)| rect.is_some_and(|rect| rect.intersects(&point)))
                .map(|(municipality, _)| municipality)
        };

        candidates()
            .find(|municipality| municipality.boundary.contains(&point))
            .or_else(|| candidates().find(|municipality| municipality.boundary.intersects(&point)))
    }
}

/// Counts of what happened to the input records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Records handed to the preparer.
    pub input_records: usize,
    /// Exact duplicates removed.
    pub duplicates: usize,
    /// Records dropped for missing or invalid coordinates.
    pub invalid_coordinates: usize,
    /// Records outside every municipality (kept, but not aggregated).
    pub unmatched: usize,
    /// Records without room information.
    pub without_room_info: usize,
}

/// Output of a preparation run.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Cleaned accommodations ordered by id.
    pub accommodations: Vec<PreparedAccommodation>,
    /// One metric row per municipality ordered by German name.
    pub metrics: Vec<DensityMetric>,
    /// What was dropped or flagged on the way.
    pub report: PrepareReport,
}

/// Clean records, join rooms and municipalities, and aggregate per municipality.
#[must_use]
pub fn prepare(
    records: Vec<AccommodationRecord>,
    rooms: &[RoomInfo],
    index: &MunicipalityIndex,
) -> PreparedData {
    let mut report = PrepareReport {
        input_records: records.len(),
        ..PrepareReport::default()
    };

    let records = records
        .into_iter()
        .map(|record| AccommodationRecord {
            id: record.id.normalized(),
            ..record
        })
        .collect();
    let (records, duplicates) = drop_duplicates(records);
    report.duplicates = duplicates;
    info!(duplicates, "removed duplicate records");

    let rooms_by_id: HashMap<&AccommodationId, &RoomInfo> =
        rooms.iter().map(|room| (&room.id, room)).collect();

    let mut accommodations = Vec::with_capacity(records.len());
    for record in records {
        let Some(coordinates) = record.coordinates() else {
            report.invalid_coordinates += 1;
            continue;
        };

        let category = record.category_id.as_deref().and_then(Category::parse);
        let room = rooms_by_id.get(&record.id);
        if room.is_none() {
            report.without_room_info += 1;
        }
        let municipality = index.locate(coordinates);
        if municipality.is_none() {
            report.unmatched += 1;
        }

        accommodations.push(PreparedAccommodation {
            id: record.id,
            name: record.name,
            city: record.city,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            category_rating: category.as_ref().map(|category| category.rating.clone()),
            category_type: category.map(|category| category.kind),
            total_rooms: room.map(|room| room.total_rooms),
            max_occupancy: room.map(|room| room.max_occupancy),
            municipality_de: municipality.map(|municipality| municipality.name_de.clone()),
            municipality_it: municipality.map(|municipality| municipality.name_it.clone()),
        });
    }

    info!(
        invalid_coordinates = report.invalid_coordinates,
        unmatched = report.unmatched,
        without_room_info = report.without_room_info,
        kept = accommodations.len(),
        "joined accommodations to municipalities"
    );

    let metrics = aggregate(&accommodations, index);
    PreparedData {
        accommodations,
        metrics,
        report,
    }
}

fn drop_duplicates(mut records: Vec<AccommodationRecord>) -> (Vec<AccommodationRecord>, usize) {
    records.sort_by(|left, right| left.id.cmp(&right.id));
    let total = records.len();

    let mut kept: Vec<AccommodationRecord> = Vec::with_capacity(total);
    let mut group_start = 0;
    for record in records {
        if kept.last().is_none_or(|last| last.id != record.id) {
            group_start = kept.len();
        }
        let seen = kept
            .get(group_start..)
            .is_some_and(|group| group.contains(&record));
        if !seen {
            kept.push(record);
        }
    }

    let duplicates = total - kept.len();
    (kept, duplicates)
}

#[derive(Debug, Default)]
struct Tally {
    establishments: u32,
    occupancy: u64,
    rooms: u64,
    with_occupancy: u32,
    ratings: HashMap<String, u32>,
    kinds: HashMap<String, u32>,
}

impl Tally {
    fn add(&mut self, accommodation: &PreparedAccommodation) {
        self.establishments += 1;
        if let Some(occupancy) = accommodation.max_occupancy {
            self.occupancy += u64::from(occupancy);
            self.with_occupancy += 1;
        }
        if let Some(rooms) = accommodation.total_rooms {
            self.rooms += u64::from(rooms);
        }
        if let Some(rating) = &accommodation.category_rating {
            *self.ratings.entry(rating.clone()).or_default() += 1;
        }
        if let Some(kind) = &accommodation.category_type {
            *self.kinds.entry(kind.clone()).or_default() += 1;
        }
    }

    fn share(&self, counts: &HashMap<String, u32>, key: &str) -> Option<f64> {
        (self.establishments > 0).then(|| {
            let count = counts.get(key).copied().unwrap_or_default();
            f64::from(count) / f64::from(self.establishments) * 100.0
        })
    }
}

/// Aggregate joined accommodations into one metric row per municipality.
///
/// Every indexed municipality gets a row, with zero counts when nothing was
/// located in it. Rates are `None` when the population is zero.
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "populations and bed counts stay far below 2^52"
)]
pub fn aggregate(
    accommodations: &[PreparedAccommodation],
    index: &MunicipalityIndex,
) -> Vec<DensityMetric> {
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for accommodation in accommodations {
        if let Some(name) = accommodation.municipality_de.as_deref() {
            tallies.entry(name).or_default().add(accommodation);
        }
    }

    index
        .municipalities()
        .iter()
        .map(|municipality| {
            let tally = tallies
                .remove(municipality.name_de.as_str())
                .unwrap_or_default();
            let population = municipality.population as f64;
            let per_resident = |value: f64| (population > 0.0).then(|| value / population);
            let per_thousand = |value: f64| per_resident(value).map(|rate| rate * 1_000.0);

            let area_km2 = municipality.boundary.geodesic_area_unsigned() / SQUARE_METRES_PER_KM2;
            let occupancy = tally.occupancy as f64;
            let establishments = f64::from(tally.establishments);
            let rooms = tally.rooms as f64;

            DensityMetric {
                name_de: municipality.name_de.clone(),
                name_it: municipality.name_it.clone(),
                population: municipality.population,
                area_km2,
                nr_establishments: tally.establishments,
                total_occupancy: tally.occupancy,
                total_nr_rooms: tally.rooms,
                avg_occupancy: (tally.with_occupancy > 0)
                    .then(|| occupancy / f64::from(tally.with_occupancy)),
                nr_establishments_per_thousand_pop: per_thousand(establishments),
                total_occupancy_per_thousand_pop: per_thousand(occupancy),
                total_nr_rooms_per_thousand_pop: per_thousand(rooms),
                occupancy_per_km2: (area_km2 > 0.0).then(|| occupancy / area_km2),
                density: per_resident(occupancy),
                share_1_rating: tally.share(&tally.ratings, "1"),
                share_2_rating: tally.share(&tally.ratings, "2"),
                share_3_rating: tally.share(&tally.ratings, "3"),
                share_3s_rating: tally.share(&tally.ratings, "3S"),
                share_4_rating: tally.share(&tally.ratings, "4"),
                share_4s_rating: tally.share(&tally.ratings, "4S"),
                share_5_rating: tally.share(&tally.ratings, "5"),
                share_stars: tally.share(&tally.kinds, "Stars"),
                share_suns: tally.share(&tally.kinds, "Suns"),
                share_flowers: tally.share(&tally.kinds, "Flowers"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn square(name: &str, population: u64, min_x: f64, min_y: f64, size: f64) -> Municipality {
        Municipality {
            name_de: name.to_owned(),
            name_it: format!("{name} (it)"),
            population,
            boundary: MultiPolygon(vec![polygon![
                (x: min_x, y: min_y),
                (x: min_x + size, y: min_y),
                (x: min_x + size, y: min_y + size),
                (x: min_x, y: min_y + size),
                (x: min_x, y: min_y),
            ]]),
        }
    }

    fn record(id: &str, latitude: f64, longitude: f64) -> AccommodationRecord {
        AccommodationRecord {
            id: AccommodationId(id.to_owned()),
            name: Some(format!("Hotel {id}")),
            city: None,
            region: None,
            category_id: Some("3sstars".to_owned()),
            room_types: Some(2),
            has_apartment: Some(false),
            is_gastronomy: Some(false),
            altitude: Some(262.0),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    fn rooms(id: &str, max_occupancy: u32) -> RoomInfo {
        RoomInfo {
            id: AccommodationId(id.to_owned()),
            total_rooms: max_occupancy / 2,
            max_occupancy,
        }
    }

    #[test]
    fn locates_point_in_its_municipality() {
        let index = MunicipalityIndex::new(vec![
            square("Bozen", 100, 11.0, 46.0, 0.5),
            square("Meran", 100, 11.5, 46.0, 0.5),
        ]);
        let coordinates = Coordinates {
            latitude: 46.2,
            longitude: 11.7,
        };
        assert_eq!(index.locate(coordinates).unwrap().name_de, "Meran");

        let outside = Coordinates {
            latitude: 47.5,
            longitude: 11.7,
        };
        assert!(index.locate(outside).is_none());
    }

    #[test]
    fn shared_border_goes_to_one_municipality() {
        let index = MunicipalityIndex::new(vec![
            square("Meran", 100, 11.5, 46.0, 0.5),
            square("Bozen", 100, 11.0, 46.0, 0.5),
        ]);
        let on_border = Coordinates {
            latitude: 46.25,
            longitude: 11.5,
        };
        assert_eq!(index.locate(on_border).unwrap().name_de, "Bozen");
    }

    #[test]
    fn drops_duplicate_municipality_names() {
        let index = MunicipalityIndex::new(vec![
            square("Bozen", 100, 11.0, 46.0, 0.5),
            square("Bozen", 999, 12.0, 46.0, 0.5),
        ]);
        assert_eq!(index.municipalities().len(), 1);
        assert_eq!(index.municipalities()[0].population, 100);
    }

    #[test]
    fn computes_sample_densities() {
        let index = MunicipalityIndex::new(vec![
            square("A", 100, 11.0, 46.0, 0.5),
            square("B", 50, 11.5, 46.0, 0.5),
        ]);
        let records = vec![
            record("a1", 46.1, 11.1),
            record("a2", 46.2, 11.2),
            record("b1", 46.2, 11.7),
        ];
        let room_info = vec![rooms("a1", 10), rooms("a2", 5), rooms("b1", 20)];

        let prepared = prepare(records, &room_info, &index);

        let [first, second] = prepared.metrics.as_slice() else {
            panic!("expected two metric rows");
        };
        assert_eq!(first.name_de, "A");
        assert_eq!(first.nr_establishments, 2);
        assert_eq!(first.total_occupancy, 15);
        assert!((first.density.unwrap() - 0.15).abs() < 1e-12);
        assert!((first.total_occupancy_per_thousand_pop.unwrap() - 150.0).abs() < 1e-9);
        assert!((first.avg_occupancy.unwrap() - 7.5).abs() < 1e-12);
        assert_eq!(second.name_de, "B");
        assert!((second.density.unwrap() - 0.40).abs() < 1e-12);
        assert!(second.occupancy_per_km2.unwrap() > 0.0);
    }

    #[test]
    fn flags_records_outside_all_boundaries() {
        let index = MunicipalityIndex::new(vec![square("A", 100, 11.0, 46.0, 0.5)]);
        let records = vec![record("in", 46.1, 11.1), record("out", 47.9, 13.0)];

        let prepared = prepare(records, &[], &index);

        assert_eq!(prepared.report.unmatched, 1);
        assert_eq!(prepared.report.without_room_info, 2);
        let outside = prepared
            .accommodations
            .iter()
            .find(|accommodation| accommodation.id.0 == "out")
            .unwrap();
        assert_eq!(outside.municipality_de, None);
        assert_eq!(prepared.metrics[0].nr_establishments, 1);
    }

    #[test]
    fn removes_duplicates_and_invalid_coordinates() {
        let index = MunicipalityIndex::new(vec![square("A", 100, 11.0, 46.0, 0.5)]);
        let original = record("dup", 46.1, 11.1);
        let reduced = AccommodationRecord {
            id: AccommodationId("dup_REDUCED".to_owned()),
            ..original.clone()
        };
        let mut missing = record("missing", 46.1, 11.1);
        missing.longitude = None;
        let records = vec![original, reduced, record("zero", 0.0, 0.0), missing];

        let prepared = prepare(records, &[], &index);

        assert_eq!(prepared.report.input_records, 4);
        assert_eq!(prepared.report.duplicates, 1);
        assert_eq!(prepared.report.invalid_coordinates, 2);
        assert_eq!(prepared.accommodations.len(), 1);
        assert_eq!(prepared.accommodations[0].id.0, "dup");
    }

    #[test]
    fn zero_population_has_no_rates() {
        let index = MunicipalityIndex::new(vec![square("Empty", 0, 11.0, 46.0, 0.5)]);
        let prepared = prepare(vec![record("a", 46.1, 11.1)], &[rooms("a", 4)], &index);

        let metric = &prepared.metrics[0];
        assert_eq!(metric.total_occupancy, 4);
        assert_eq!(metric.density, None);
        assert_eq!(metric.nr_establishments_per_thousand_pop, None);
    }

    #[test]
    fn shares_are_percentages_of_establishments() {
        let index = MunicipalityIndex::new(vec![square("A", 100, 11.0, 46.0, 0.5)]);
        let mut flowers = record("f", 46.2, 11.2);
        flowers.category_id = Some("2flowers".to_owned());
        let records = vec![record("s", 46.1, 11.1), flowers];

        let prepared = prepare(records, &[], &index);

        let metric = &prepared.metrics[0];
        assert_eq!(metric.share_3s_rating, Some(50.0));
        assert_eq!(metric.share_2_rating, Some(50.0));
        assert_eq!(metric.share_stars, Some(50.0));
        assert_eq!(metric.share_flowers, Some(50.0));
        assert_eq!(metric.share_suns, Some(0.0));
        assert_eq!(metric.avg_occupancy, None);
    }
}
