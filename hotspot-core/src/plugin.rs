//! Bundle of the data sources that make up one analysed region.

use std::sync::Arc;

use crate::model::RegionMeta;
use crate::ports::{AccommodationPort, BoundaryPort};

/// Collection of ports implementing the data sources for a single region.
pub struct RegionPlugin {
    /// Static metadata describing the region.
    pub meta: RegionMeta,
    /// Implementation for listing accommodations and their rooms.
    pub accommodation_port: Arc<dyn AccommodationPort>,
    /// Implementation for loading municipalities.
    pub boundary_port: Arc<dyn BoundaryPort>,
}

impl RegionPlugin {
    /// Bundle the ports, taking region metadata from the accommodation port.
    #[must_use]
    pub fn new(
        accommodation_port: Arc<dyn AccommodationPort>,
        boundary_port: Arc<dyn BoundaryPort>,
    ) -> Self {
        Self {
            meta: accommodation_port.region().clone(),
            accommodation_port,
            boundary_port,
        }
    }
}
