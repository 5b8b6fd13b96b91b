//! End-to-end tests of fetching, persisting, and preparing with in-memory ports.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use geo::{MultiPolygon, polygon};
use hotspot_core::prepare::prepare;
use hotspot_core::storage;
use hotspot_core::{
    AccommodationId, AccommodationPage, AccommodationPort, AccommodationRecord, BoundaryPort,
    HotspotService, Municipality, PageRequest, PortError, RegionId, RegionMeta, RegionPlugin,
    RoomInfo,
};

struct StaticAccommodations {
    meta: RegionMeta,
    pages: Vec<Vec<AccommodationRecord>>,
    room_calls: AtomicUsize,
}

#[async_trait]
impl AccommodationPort for StaticAccommodations {
    fn region(&self) -> &RegionMeta {
        &self.meta
    }

    async fn page(&self, number: u32, _page_size: u32) -> Result<AccommodationPage, PortError> {
        let total_pages = u32::try_from(self.pages.len()).unwrap();
        let records = self
            .pages
            .get(number as usize - 1)
            .cloned()
            .ok_or_else(|| PortError::Response(format!("no page {number}")))?;
        Ok(AccommodationPage {
            number,
            total_pages: Some(total_pages),
            total_results: Some(self.pages.iter().map(Vec::len).sum::<usize>() as u32),
            next_page: (number < total_pages).then(|| format!("page={}", number + 1)),
            fetched_at: Utc::now(),
            records,
        })
    }

    async fn rooms(&self, id: &AccommodationId) -> Result<RoomInfo, PortError> {
        self.room_calls.fetch_add(1, Ordering::SeqCst);
        let max_occupancy = match id.0.as_str() {
            "a1" => 10,
            "a2" => 5,
            "b1" => 20,
            _ => return Err(PortError::Response(format!("no rooms for {id}"))),
        };
        Ok(RoomInfo {
            id: id.clone(),
            total_rooms: max_occupancy / 2,
            max_occupancy,
        })
    }
}

struct StaticBoundaries(Vec<Municipality>);

impl BoundaryPort for StaticBoundaries {
    fn municipalities(&self) -> Result<Vec<Municipality>, PortError> {
        Ok(self.0.clone())
    }
}

fn square(name: &str, population: u64, min_x: f64) -> Municipality {
    Municipality {
        name_de: name.to_owned(),
        name_it: name.to_lowercase(),
        population,
        boundary: MultiPolygon(vec![polygon![
            (x: min_x, y: 46.0),
            (x: min_x + 0.5, y: 46.0),
            (x: min_x + 0.5, y: 46.5),
            (x: min_x, y: 46.5),
            (x: min_x, y: 46.0),
        ]]),
    }
}

fn record(id: &str, latitude: f64, longitude: f64) -> AccommodationRecord {
    AccommodationRecord {
        id: AccommodationId(id.to_owned()),
        name: Some(format!("Gasthof {id}")),
        city: Some("Bozen".to_owned()),
        region: None,
        category_id: Some("3stars".to_owned()),
        room_types: Some(1),
        has_apartment: Some(false),
        is_gastronomy: Some(true),
        altitude: None,
        latitude: Some(latitude),
        longitude: Some(longitude),
    }
}

fn service() -> (HotspotService, Arc<StaticAccommodations>) {
    let accommodations = Arc::new(StaticAccommodations {
        meta: RegionMeta {
            id: RegionId("test".to_owned()),
            name: "Testland".to_owned(),
        },
        pages: vec![
            vec![record("a1", 46.1, 11.1), record("b1", 46.2, 11.7)],
            vec![record("a2", 46.3, 11.3)],
            vec![record("nowhere", 47.9, 13.0)],
        ],
        room_calls: AtomicUsize::new(0),
    });
    let boundaries = Arc::new(StaticBoundaries(vec![
        square("A", 100, 11.0),
        square("B", 50, 11.5),
    ]));
    let plugin = RegionPlugin::new(Arc::clone(&accommodations) as Arc<dyn AccommodationPort>, boundaries);
    (HotspotService::new(Arc::new(plugin)), accommodations)
}

#[tokio::test]
async fn paginates_until_last_page_and_persists_every_page() {
    let (service, _) = service();
    let dir = tempfile::tempdir().unwrap();

    let summary = service
        .fetch_accommodations(PageRequest::new(1, 2), dir.path())
        .await
        .unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.records, 4);
    assert_eq!(summary.total_results, Some(4));
    let pages = storage::read_pages(dir.path()).unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2].records[0].id.0, "nowhere");
}

#[tokio::test]
async fn room_fetch_skips_known_ids_and_flushes_batches() {
    let (service, accommodations) = service();
    let dir = tempfile::tempdir().unwrap();
    let ids: Vec<AccommodationId> = ["a1", "a2", "b1", "a1"]
        .into_iter()
        .map(|id| AccommodationId(id.to_owned()))
        .collect();
    let known: HashSet<AccommodationId> = [AccommodationId("a2".to_owned())].into();

    let summary = service
        .fetch_rooms(&ids, &known, dir.path(), 1)
        .await
        .unwrap();

    assert_eq!(summary.calls, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.batches, 2);
    assert_eq!(accommodations.room_calls.load(Ordering::SeqCst), 2);
    let rooms = storage::merge_room_batches(dir.path()).unwrap();
    let merged: Vec<&str> = rooms.iter().map(|room| room.id.0.as_str()).collect();
    assert_eq!(merged, vec!["a1", "b1"]);
}

#[tokio::test]
async fn room_fetch_surfaces_port_errors() {
    let (service, _) = service();
    let dir = tempfile::tempdir().unwrap();
    let ids = vec![AccommodationId("unknown".to_owned())];

    let result = service
        .fetch_rooms(&ids, &HashSet::new(), dir.path(), 10)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn preparing_twice_writes_identical_tables() {
    let (service, _) = service();
    let dir = tempfile::tempdir().unwrap();
    service
        .fetch_accommodations(PageRequest::default(), dir.path())
        .await
        .unwrap();
    let records: Vec<AccommodationRecord> = storage::read_pages(dir.path())
        .unwrap()
        .into_iter()
        .flat_map(|page| page.records)
        .collect();
    let ids: Vec<AccommodationId> = records.iter().map(|record| record.id.clone()).collect();
    let rooms_dir = dir.path().join("rooms");
    std::fs::create_dir(&rooms_dir).unwrap();
    service
        .fetch_rooms(&ids[..3], &HashSet::new(), &rooms_dir, 200)
        .await
        .unwrap();
    let rooms = storage::merge_room_batches(&rooms_dir).unwrap();
    let index = service.municipalities().unwrap();

    let mut outputs = Vec::new();
    for run in 0..2 {
        let prepared = prepare(records.clone(), &rooms, &index);
        let path = dir.path().join(format!("municipalities_{run}.csv"));
        storage::write_csv(&path, &prepared.metrics).unwrap();
        outputs.push(std::fs::read(&path).unwrap());

        assert_eq!(prepared.report.unmatched, 1);
        let densities: Vec<f64> = prepared
            .metrics
            .iter()
            .map(|metric| metric.density.unwrap())
            .collect();
        assert!((densities[0] - 0.15).abs() < 1e-12);
        assert!((densities[1] - 0.40).abs() < 1e-12);
        assert!(densities.iter().all(|density| density.is_finite() && *density >= 0.0));
    }

    assert_eq!(outputs[0], outputs[1]);
}
