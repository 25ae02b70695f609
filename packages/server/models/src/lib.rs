#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the terminal map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the engine's domain types to allow independent evolution of the
//! API contract; region names are flattened to `state`/`district` strings
//! with `"Unknown"` standing in for unresolved regions, matching what the
//! map frontend renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use terminal_map_telemetry_models::{TerminalRecord, TrackPoint, TransmissionStatus};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is up.
    pub healthy: bool,
    /// Server crate version.
    pub version: String,
}

/// A terminal's latest state as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTerminal {
    /// Unique device id.
    pub device_id: String,
    /// Latest reported latitude.
    pub latitude: f64,
    /// Latest reported longitude.
    pub longitude: f64,
    /// Timestamp of the latest report.
    pub timestamp: DateTime<Utc>,
    /// Resolved district, or "Unknown".
    pub district: String,
    /// Resolved state, or "Unknown".
    pub state: String,
    /// Ids of geofences currently containing the terminal.
    pub active_geofences: Vec<String>,
    /// Transmission status.
    pub status: TransmissionStatus,
}

impl From<TerminalRecord> for ApiTerminal {
    fn from(record: TerminalRecord) -> Self {
        let (state, district) = record
            .current_region
            .map_or(("Unknown".to_string(), "Unknown".to_string()), |region| {
                (region.state, region.district)
            });
        Self {
            device_id: record.device_id,
            latitude: record.last_point.latitude,
            longitude: record.last_point.longitude,
            timestamp: record.last_timestamp,
            district,
            state,
            active_geofences: record.active_geofences.into_iter().collect(),
            status: record.transmission_status,
        }
    }
}

/// An entry in the terminal dropdown list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTerminalListItem {
    /// Device id.
    pub id: String,
    /// Display name (the device id; terminals have no separate label).
    pub name: String,
}

/// One history row for the terminal data table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTrackPoint {
    /// Reported latitude.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
    /// Report timestamp.
    pub timestamp: DateTime<Utc>,
    /// District at this position, or "Unknown".
    pub district: String,
    /// State at this position, or "Unknown".
    pub state: String,
}

impl From<TrackPoint> for ApiTrackPoint {
    fn from(point: TrackPoint) -> Self {
        let (state, district) = point
            .region
            .map_or(("Unknown".to_string(), "Unknown".to_string()), |region| {
                (region.state, region.district)
            });
        Self {
            latitude: point.point.latitude,
            longitude: point.point.longitude,
            timestamp: point.timestamp,
            district,
            state,
        }
    }
}

/// One point of a terminal's path polyline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPathPoint {
    /// Reported latitude.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
    /// Report timestamp.
    pub timestamp: DateTime<Utc>,
}

impl From<TrackPoint> for ApiPathPoint {
    fn from(point: TrackPoint) -> Self {
        Self {
            latitude: point.point.latitude,
            longitude: point.point.longitude,
            timestamp: point.timestamp,
        }
    }
}

/// Paginated history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTerminalDataPage {
    /// Rows for the requested page.
    pub data: Vec<ApiTrackPoint>,
    /// Total number of pages.
    pub total_pages: u32,
    /// The requested page (1-based).
    pub current_page: u32,
    /// Total matching rows.
    pub total_items: u64,
}

/// Query parameters for the terminal history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalDataQueryParams {
    /// Device id to query.
    pub terminal: Option<String>,
    /// Look-back window in hours.
    pub timeframe: Option<i64>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Rows per page.
    pub per_page: Option<u32>,
}

/// Query parameters for the path endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathQueryParams {
    /// Device id to query.
    pub terminal: Option<String>,
    /// Look-back window in hours.
    pub timeframe: Option<i64>,
}

/// Query parameters for location-filtered terminal lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQueryParams {
    /// Keep only terminals currently in this state.
    pub state: Option<String>,
    /// Keep only terminals currently in this district.
    pub district: Option<String>,
}

/// Query parameters for the district list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictsQueryParams {
    /// State to enumerate districts for.
    pub state: Option<String>,
}

/// Request body for creating a geofence over a district.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
}

/// Response for a created geofence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGeofenceCreated {
    /// The new geofence id (`"{state}_{district}"`).
    pub id: String,
}

/// Active geofence listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGeofenceList {
    /// Active geofence ids.
    pub geofences: Vec<String>,
    /// Registry generation the listing was taken at.
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use terminal_map_telemetry_models::{Point, RegionName};

    #[test]
    fn api_terminal_flattens_region() {
        let record = TerminalRecord {
            device_id: "dev-1".to_string(),
            last_point: Point::new(18.52, 73.85),
            last_timestamp: Utc::now(),
            current_region: Some(RegionName {
                state: "Maharashtra".to_string(),
                district: "Pune".to_string(),
            }),
            active_geofences: BTreeSet::from(["Maharashtra_Pune".to_string()]),
            transmission_status: TransmissionStatus::Disabled,
        };

        let api = ApiTerminal::from(record);
        assert_eq!(api.state, "Maharashtra");
        assert_eq!(api.district, "Pune");
        assert_eq!(api.active_geofences, vec!["Maharashtra_Pune"]);

        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["deviceId"], "dev-1");
        assert_eq!(json["status"], "DISABLED");
    }

    #[test]
    fn unresolved_region_maps_to_unknown() {
        let record = TerminalRecord {
            device_id: "dev-1".to_string(),
            last_point: Point::new(0.0, 0.0),
            last_timestamp: Utc::now(),
            current_region: None,
            active_geofences: BTreeSet::new(),
            transmission_status: TransmissionStatus::Active,
        };
        let api = ApiTerminal::from(record);
        assert_eq!(api.state, "Unknown");
        assert_eq!(api.district, "Unknown");
    }
}
