//! High-level service facade over the region's data sources.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::{HotspotError, Result};
use crate::model::{AccommodationId, RegionMeta, RoomInfo};
use crate::plugin::RegionPlugin;
use crate::ports::PageRequest;
use crate::prepare::MunicipalityIndex;
use crate::storage;

/// Progress is logged every this many pages.
const PAGE_LOG_INTERVAL: u32 = 10;

/// Outcome of paginating through the accommodation listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    /// Pages fetched and persisted.
    pub pages: u32,
    /// Records across all pages.
    pub records: usize,
    /// Total reported by the first page.
    pub total_results: Option<u32>,
}

/// Outcome of fetching room information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSummary {
    /// Ids skipped because their rooms were already on disk.
    pub skipped: usize,
    /// Room endpoint calls made.
    pub calls: usize,
    /// Batch files written.
    pub batches: usize,
}

/// Public entry point for fetching and loading the region's data.
pub struct HotspotService {
    plugin: Arc<RegionPlugin>,
}

impl HotspotService {
    /// Create a new service bound to the provided plugin.
    #[must_use]
    pub fn new(plugin: Arc<RegionPlugin>) -> Self {
        Self { plugin }
    }

    /// Region served by this service.
    #[must_use]
    pub fn region(&self) -> &RegionMeta {
        &self.plugin.meta
    }

    /// Fetch every accommodation page and persist each one to `pages_dir`.
    ///
    /// Stops after the page without a successor.
    ///
    /// # Errors
    ///
    /// Returns the first port or storage error; pages written so far stay on disk.
    pub async fn fetch_accommodations(
        &self,
        request: PageRequest,
        pages_dir: &Path,
    ) -> Result<FetchSummary> {
        let port = &self.plugin.accommodation_port;
        let mut number = request.first_page;
        let mut summary = FetchSummary {
            pages: 0,
            records: 0,
            total_results: None,
        };

        loop {
            let page = port.page(number, request.page_size).await?;
            if summary.pages == 0 {
                info!(
                    total_results = page.total_results,
                    total_pages = page.total_pages,
                    "accommodation listing"
                );
                summary.total_results = page.total_results;
            }
            if summary.pages % PAGE_LOG_INTERVAL == 0 {
                info!(page = page.number, "fetching page");
            }

            storage::write_page(pages_dir, &page)?;
            summary.pages += 1;
            summary.records += page.records.len();

            if !page.has_next() {
                break;
            }
            number = page.number.max(number) + 1;
        }

        info!(
            pages = summary.pages,
            records = summary.records,
            region = %self.plugin.meta.name,
            "fetched accommodations"
        );
        Ok(summary)
    }

    /// Fetch room information for every id not in `known`, flushing a batch
    /// file to `batch_dir` every `batch_size` calls.
    ///
    /// # Errors
    ///
    /// Returns the first port or storage error; completed batches stay on disk.
    pub async fn fetch_rooms(
        &self,
        ids: &[AccommodationId],
        known: &HashSet<AccommodationId>,
        batch_dir: &Path,
        batch_size: usize,
    ) -> Result<RoomSummary> {
        if batch_size == 0 {
            return Err(HotspotError::InvalidInput(
                "room batch size must be positive".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        let pending: Vec<&AccommodationId> = ids
            .iter()
            .filter(|id| !known.contains(*id) && seen.insert(*id))
            .collect();
        let mut summary = RoomSummary {
            skipped: ids.len() - pending.len(),
            calls: 0,
            batches: 0,
        };
        info!(calls = pending.len(), skipped = summary.skipped, "room info calls to make");

        let port = &self.plugin.accommodation_port;
        let mut batch: Vec<RoomInfo> = Vec::with_capacity(batch_size);
        for id in pending {
            batch.push(port.rooms(id).await?);
            summary.calls += 1;

            if batch.len() == batch_size {
                storage::write_room_batch(batch_dir, summary.calls, &batch)?;
                summary.batches += 1;
                batch.clear();
                info!(calls = summary.calls, "room info calls made");
            }
        }
        if !batch.is_empty() {
            storage::write_room_batch(batch_dir, summary.calls, &batch)?;
            summary.batches += 1;
        }

        Ok(summary)
    }

    /// Load the region's municipalities into a lookup index.
    ///
    /// # Errors
    ///
    /// Returns a port error when the boundaries cannot be read, or
    /// [`HotspotError::InvalidInput`] when the source holds no municipality.
    pub fn municipalities(&self) -> Result<MunicipalityIndex> {
        let municipalities = self.plugin.boundary_port.municipalities()?;
        info!(count = municipalities.len(), "loaded municipalities");
        let index = MunicipalityIndex::new(municipalities);
        if index.is_empty() {
            return Err(HotspotError::InvalidInput(
                "boundary source contains no municipality".to_owned(),
            ));
        }
        Ok(index)
    }
}
