//! Traits describing data-source capabilities and shared helper types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{AccommodationId, AccommodationPage, Municipality, RegionMeta, RoomInfo};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to data sources.
pub enum PortError {
    /// Network layer failed or the server answered with an error status.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The response body could not be understood.
    #[error("Unexpected response: {0}")]
    Response(String),
    /// A boundary file could not be read or is malformed.
    #[error("Boundary error: {0}")]
    Boundary(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Pagination parameters for listing accommodations.
pub struct PageRequest {
    /// First page to request (1-based).
    pub first_page: u32,
    /// Number of entries per page.
    pub page_size: u32,
}

impl PageRequest {
    /// Construct a request starting at `first_page`.
    #[must_use]
    pub fn new(first_page: u32, page_size: u32) -> Self {
        Self {
            first_page: first_page.max(1),
            page_size: page_size.max(1),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

#[async_trait]
/// Trait for remote accommodation backends.
pub trait AccommodationPort: Send + Sync {
    /// Metadata describing the region served by this port.
    fn region(&self) -> &RegionMeta;

    /// Fetch a single page of accommodations.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the body cannot be decoded.
    async fn page(&self, number: u32, page_size: u32) -> Result<AccommodationPage, PortError>;

    /// Fetch room capacity of one accommodation.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the body cannot be decoded.
    async fn rooms(&self, id: &AccommodationId) -> Result<RoomInfo, PortError>;
}

/// Trait for loaders of municipal boundaries and population.
pub trait BoundaryPort: Send + Sync {
    /// Load every municipality of the boundary source.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Boundary`] when the source is unreadable or malformed.
    fn municipalities(&self) -> Result<Vec<Municipality>, PortError>;
}
