//! Provider implementation for South Tyrol using the Open Data Hub tourism API.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

use hotspot_core::{
    config::ApiConfig,
    model::{AccommodationId, AccommodationPage, AccommodationRecord, RegionId, RegionMeta, RoomInfo},
    ports::{AccommodationPort, PortError},
};

/// Response wrapper from /Accommodation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccommodationListResponse {
    total_results: Option<u32>,
    total_pages: Option<u32>,
    current_page: Option<u32>,
    next_page: Option<String>,
    items: Option<Vec<AccommodationEntry>>,
}

/// Single establishment from /Accommodation; many more fields exist, we ignore them.
///
/// The API sends `null` for absent nested objects, so every level is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccommodationEntry {
    id: String,
    acco_detail: Option<HashMap<String, Option<AccoDetail>>>,
    acco_category_id: Option<String>,
    acco_room_info: Option<Vec<IgnoredAny>>,
    has_apartment: Option<bool>,
    is_gastronomy: Option<bool>,
    location_info: Option<LocationInfo>,
    altitude: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Language specific details inside `AccoDetail`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccoDetail {
    name: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocationInfo {
    region_info: Option<RegionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionInfo {
    name: Option<HashMap<String, Option<String>>>,
}

/// Room type entry from /AccommodationRoom
#[derive(Debug, Deserialize)]
struct RoomEntry {
    #[serde(rename = "RoomQuantity")]
    quantity: Option<u32>,
    #[serde(rename = "Roommax")]
    max_occupancy: Option<u32>,
}

/// Accommodation listing and room lookup for South Tyrol.
pub struct OpenDataHubPort {
    client: Client,
    base_url: String,
    language: String,
    meta: RegionMeta,
}

impl OpenDataHubPort {
    /// Create a new port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, config: &ApiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            language: config.language.clone(),
            meta: region_meta(),
        }
    }
}

#[async_trait]
impl AccommodationPort for OpenDataHubPort {
    fn region(&self) -> &RegionMeta {
        &self.meta
    }

    async fn page(&self, number: u32, page_size: u32) -> Result<AccommodationPage, PortError> {
        let number_s = number.to_string();
        let page_size_s = page_size.to_string();
        let req = self
            .client
            .get(format!("{}/Accommodation", self.base_url))
            .query(&[
                ("pagenumber", number_s.as_str()),
                ("pagesize", page_size_s.as_str()),
                ("language", self.language.as_str()),
            ]);

        let resp = fetch_json::<AccommodationListResponse>(req).await?;
        debug!(
            page = number,
            items = resp.items.as_ref().map_or(0, Vec::len),
            "received accommodation page"
        );
        Ok(into_page(resp, number, &self.language))
    }

    async fn rooms(&self, id: &AccommodationId) -> Result<RoomInfo, PortError> {
        let id = id.normalized();
        let req = self
            .client
            .get(format!("{}/AccommodationRoom", self.base_url))
            .query(&[
                ("accoid", id.0.as_str()),
                ("idsource", "lts"),
                ("getall", "true"),
                ("language", self.language.as_str()),
                ("removenullvalues", "true"),
            ]);

        let entries = fetch_json::<Vec<RoomEntry>>(req).await?;
        Ok(sum_rooms(id, &entries))
    }
}

/// Metadata of the region served by the Open Data Hub.
#[must_use]
pub fn region_meta() -> RegionMeta {
    RegionMeta {
        id: RegionId(String::from("south-tyrol")),
        name: String::from("Südtirol"),
    }
}

fn into_page(resp: AccommodationListResponse, requested: u32, language: &str) -> AccommodationPage {
    AccommodationPage {
        number: resp.current_page.unwrap_or(requested),
        total_pages: resp.total_pages,
        total_results: resp.total_results,
        next_page: resp.next_page.filter(|next| !next.trim().is_empty()),
        fetched_at: Utc::now(),
        records: resp
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|entry| into_record(entry, language))
            .collect(),
    }
}

/// Keep only the attributes the analysis needs.
fn into_record(entry: AccommodationEntry, language: &str) -> AccommodationRecord {
    let detail = entry
        .acco_detail
        .and_then(|mut details| details.remove(language).flatten());
    let region = entry
        .location_info
        .and_then(|location| location.region_info)
        .and_then(|region| region.name)
        .and_then(|mut names| names.remove(language).flatten());
    let (name, city) = detail.map_or((None, None), |detail| (detail.name, detail.city));

    AccommodationRecord {
        id: AccommodationId(entry.id),
        name,
        city,
        region,
        category_id: entry.acco_category_id,
        room_types: entry
            .acco_room_info
            .map(|rooms| u32::try_from(rooms.len()).unwrap_or(u32::MAX)),
        has_apartment: entry.has_apartment,
        is_gastronomy: entry.is_gastronomy,
        altitude: entry.altitude,
        latitude: entry.latitude,
        longitude: entry.longitude,
    }
}

fn sum_rooms(id: AccommodationId, entries: &[RoomEntry]) -> RoomInfo {
    let (total_rooms, max_occupancy) =
        entries
            .iter()
            .fold((0_u32, 0_u32), |(rooms, beds), entry| {
                let quantity = entry.quantity.unwrap_or_default();
                let per_room = entry.max_occupancy.unwrap_or_default();
                (
                    rooms.saturating_add(quantity),
                    beds.saturating_add(quantity.saturating_mul(per_room)),
                )
            });
    RoomInfo {
        id,
        total_rooms,
        max_occupancy,
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let resp = req.send().await?.error_for_status()?;
    let url = resp.url().clone();
    let body = resp.bytes().await?;
    decode(&body).map_err(|err| PortError::Response(format!("{url}: {err}")))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "TotalResults": 3,
        "TotalPages": 2,
        "CurrentPage": 1,
        "PreviousPage": null,
        "NextPage": "https://tourism.api.opendatahub.bz.it/v1/Accommodation?pagenumber=2",
        "Items": [
            {
                "Id": "0A1B2C_REDUCED",
                "AccoDetail": {
                    "de": {"Name": "Hotel Laurin", "City": "Bozen"},
                    "it": {"Name": "Hotel Laurin", "City": "Bolzano"}
                },
                "AccoCategoryId": "4stars",
                "AccoRoomInfo": [{"Id": "r1"}, {"Id": "r2"}],
                "HasApartment": false,
                "IsGastronomy": true,
                "LocationInfo": {"RegionInfo": {"Name": {"de": "Bozen und Umgebung", "it": null}}},
                "Altitude": 262.0,
                "Latitude": 46.4983,
                "Longitude": 11.3548
            },
            {
                "Id": "FFFF",
                "AccoCategoryId": "Not categorized",
                "LocationInfo": {},
                "Latitude": null,
                "Longitude": null
            }
        ]
    }"#;

    #[test]
    fn decodes_accommodation_page() {
        let resp: AccommodationListResponse = serde_json::from_str(PAGE).unwrap();
        let page = into_page(resp, 1, "de");

        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, Some(2));
        assert_eq!(page.total_results, Some(3));
        assert!(page.has_next());
        assert_eq!(page.records.len(), 2);

        let laurin = &page.records[0];
        assert_eq!(laurin.id.0, "0A1B2C_REDUCED");
        assert_eq!(laurin.name.as_deref(), Some("Hotel Laurin"));
        assert_eq!(laurin.city.as_deref(), Some("Bozen"));
        assert_eq!(laurin.region.as_deref(), Some("Bozen und Umgebung"));
        assert_eq!(laurin.room_types, Some(2));
        assert_eq!(laurin.is_gastronomy, Some(true));
        assert!(laurin.coordinates().is_some());
    }

    #[test]
    fn missing_nested_objects_become_none() {
        let resp: AccommodationListResponse = serde_json::from_str(PAGE).unwrap();
        let page = into_page(resp, 1, "de");

        let bare = &page.records[1];
        assert_eq!(bare.name, None);
        assert_eq!(bare.region, None);
        assert_eq!(bare.room_types, None);
        assert!(bare.coordinates().is_none());
    }

    #[test]
    fn null_nested_objects_become_none() {
        let resp: AccommodationListResponse = serde_json::from_str(
            r#"{
                "TotalResults": 3,
                "TotalPages": 1,
                "CurrentPage": 1,
                "NextPage": null,
                "Items": [
                    {"Id": "A", "AccoDetail": null, "AccoRoomInfo": null, "LocationInfo": null},
                    {"Id": "B", "AccoDetail": {"de": null}, "LocationInfo": {"RegionInfo": null}},
                    {"Id": "C", "LocationInfo": {"RegionInfo": {"Name": null}}}
                ]
            }"#,
        )
        .unwrap();
        let page = into_page(resp, 1, "de");

        assert_eq!(page.records.len(), 3);
        for record in &page.records {
            assert_eq!(record.name, None);
            assert_eq!(record.city, None);
            assert_eq!(record.region, None);
            assert_eq!(record.room_types, None);
        }
    }

    #[test]
    fn null_item_list_is_an_empty_page() {
        let resp: AccommodationListResponse =
            serde_json::from_str(r#"{"TotalPages": 0, "CurrentPage": 1, "Items": null}"#).unwrap();

        let page = into_page(resp, 1, "de");

        assert!(page.records.is_empty());
        assert!(!page.has_next());
    }

    #[test]
    fn undecodable_body_is_reported() {
        let err = decode::<Vec<RoomEntry>>(br#"{"message": "rate limited"}"#).unwrap_err();

        assert!(err.is_data());
    }

    #[test]
    fn italian_details_are_selectable() {
        let resp: AccommodationListResponse = serde_json::from_str(PAGE).unwrap();
        let page = into_page(resp, 1, "it");

        assert_eq!(page.records[0].city.as_deref(), Some("Bolzano"));
        assert_eq!(page.records[0].region, None);
    }

    #[test]
    fn last_page_has_no_successor() {
        let resp: AccommodationListResponse = serde_json::from_str(
            r#"{"TotalResults": 3, "TotalPages": 2, "CurrentPage": 2, "NextPage": null, "Items": []}"#,
        )
        .unwrap();
        let page = into_page(resp, 2, "de");

        assert!(!page.has_next());
    }

    #[test]
    fn sums_rooms_and_beds() {
        let entries: Vec<RoomEntry> = serde_json::from_str(
            r#"[
                {"RoomQuantity": 4, "Roommax": 2},
                {"RoomQuantity": 2, "Roommax": 3},
                {"Roommax": 5}
            ]"#,
        )
        .unwrap();

        let info = sum_rooms(AccommodationId("0A1B2C".to_owned()), &entries);

        assert_eq!(info.total_rooms, 6);
        assert_eq!(info.max_occupancy, 14);
    }
}
