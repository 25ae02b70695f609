#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Satellite terminal telemetry domain types.
//!
//! This crate defines the canonical types shared across the terminal-map
//! system: position reports as they arrive from the ingestion boundary,
//! per-terminal tracked state, and the enter/exit transition events the
//! engine emits when a terminal crosses a geofence boundary.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Maximum accepted length of a device identifier.
pub const MAX_DEVICE_ID_LEN: usize = 64;

/// Transmission state of a terminal.
///
/// A terminal is `Disabled` while it sits inside at least one active
/// geofence and `Active` otherwise. The state is derived from geofence
/// membership as a whole, never from one specific fence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransmissionStatus {
    /// Terminal may transmit.
    Active,
    /// Transmission is inhibited while inside a geofence.
    Disabled,
}

impl TransmissionStatus {
    /// Derives the status from a terminal's current geofence membership.
    #[must_use]
    pub fn from_membership(active_geofences: &BTreeSet<String>) -> Self {
        if active_geofences.is_empty() {
            Self::Active
        } else {
            Self::Disabled
        }
    }
}

/// Direction of a geofence boundary crossing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    /// The terminal moved into the geofence.
    Enter,
    /// The terminal moved out of the geofence.
    Exit,
}

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    /// Latitude, -90.0 to 90.0.
    pub latitude: f64,
    /// Longitude, -180.0 to 180.0.
    pub longitude: f64,
}

impl Point {
    /// Creates a point without range checking.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// An administrative region name: two-level state/district.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionName {
    /// State name (`NAME_1` in the boundary dataset).
    pub state: String,
    /// District name (`NAME_2` in the boundary dataset).
    pub district: String,
}

impl std::fmt::Display for RegionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.state, self.district)
    }
}

/// A single position report from a terminal, as received from the
/// ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    /// Unique device identifier.
    pub device_id: String,
    /// Reported latitude in decimal degrees.
    pub latitude: f64,
    /// Reported longitude in decimal degrees.
    pub longitude: f64,
    /// Report timestamp.
    pub timestamp: DateTime<Utc>,
}

impl TelemetryReport {
    /// Checks coordinate ranges and the device identifier shape.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReportError`] if the latitude is outside ±90, the
    /// longitude outside ±180, either coordinate is non-finite, or the
    /// device id is empty, too long, or contains non-printable characters.
    pub fn validate(&self) -> Result<(), InvalidReportError> {
        if !self.latitude.is_finite() || self.latitude.abs() > 90.0 {
            return Err(InvalidReportError::Latitude {
                value: self.latitude,
            });
        }
        if !self.longitude.is_finite() || self.longitude.abs() > 180.0 {
            return Err(InvalidReportError::Longitude {
                value: self.longitude,
            });
        }
        if self.device_id.is_empty() || self.device_id.len() > MAX_DEVICE_ID_LEN {
            return Err(InvalidReportError::DeviceId {
                device_id: self.device_id.clone(),
            });
        }
        if !self.device_id.chars().all(|c| c.is_ascii_graphic()) {
            return Err(InvalidReportError::DeviceId {
                device_id: self.device_id.clone(),
            });
        }
        Ok(())
    }

    /// The reported position as a [`Point`].
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.latitude, self.longitude)
    }
}

/// Error returned when a [`TelemetryReport`] fails validation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReportError {
    /// Latitude outside ±90 or non-finite.
    Latitude {
        /// The rejected value.
        value: f64,
    },
    /// Longitude outside ±180 or non-finite.
    Longitude {
        /// The rejected value.
        value: f64,
    },
    /// Device id empty, oversized, or containing non-printable characters.
    DeviceId {
        /// The rejected identifier.
        device_id: String,
    },
}

impl std::fmt::Display for InvalidReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latitude { value } => {
                write!(f, "invalid latitude {value}: expected -90 to 90")
            }
            Self::Longitude { value } => {
                write!(f, "invalid longitude {value}: expected -180 to 180")
            }
            Self::DeviceId { device_id } => {
                write!(
                    f,
                    "invalid device id {device_id:?}: expected 1-{MAX_DEVICE_ID_LEN} printable ASCII characters"
                )
            }
        }
    }
}

impl std::error::Error for InvalidReportError {}

/// Tracked state of a single terminal.
///
/// Created on the first observed report for a device id and updated on
/// every subsequent report. Records are never implicitly deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRecord {
    /// Unique device identifier.
    pub device_id: String,
    /// Most recently reported position.
    pub last_point: Point,
    /// Timestamp of the most recent report.
    pub last_timestamp: DateTime<Utc>,
    /// Administrative region containing the last position, if any.
    pub current_region: Option<RegionName>,
    /// Ids of every geofence currently containing the terminal.
    pub active_geofences: BTreeSet<String>,
    /// Derived transmission state.
    pub transmission_status: TransmissionStatus,
}

/// An edge-triggered geofence boundary crossing for one terminal.
///
/// Produced once per transition and consumed by downstream listeners;
/// the engine does not store these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    /// Terminal that crossed the boundary.
    pub device_id: String,
    /// Geofence that was entered or exited.
    pub geofence_id: String,
    /// Crossing direction.
    pub kind: TransitionKind,
    /// Timestamp of the report that triggered the transition.
    pub timestamp: DateTime<Utc>,
}

/// One entry in a terminal's position history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    /// Reported position.
    pub point: Point,
    /// Report timestamp.
    pub timestamp: DateTime<Utc>,
    /// Region resolved for this position, if any.
    pub region: Option<RegionName>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(device_id: &str, latitude: f64, longitude: f64) -> TelemetryReport {
        TelemetryReport {
            device_id: device_id.to_string(),
            latitude,
            longitude,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn valid_report_passes() {
        assert_eq!(report("1712328952086-29105A0", 28.6139, 77.209).validate(), Ok(()));
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let err = report("dev-1", 90.5, 0.0).validate().unwrap_err();
        assert_eq!(err, InvalidReportError::Latitude { value: 90.5 });
    }

    #[test]
    fn out_of_range_longitude_is_rejected() {
        let err = report("dev-1", 0.0, -180.01).validate().unwrap_err();
        assert_eq!(err, InvalidReportError::Longitude { value: -180.01 });
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        assert!(report("dev-1", f64::NAN, 0.0).validate().is_err());
        assert!(report("dev-1", 0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn empty_device_id_is_rejected() {
        assert!(matches!(
            report("", 10.0, 10.0).validate(),
            Err(InvalidReportError::DeviceId { .. })
        ));
    }

    #[test]
    fn oversized_device_id_is_rejected() {
        let id = "x".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(report(&id, 10.0, 10.0).validate().is_err());
    }

    #[test]
    fn whitespace_device_id_is_rejected() {
        assert!(report("dev 1", 10.0, 10.0).validate().is_err());
    }

    #[test]
    fn status_derives_from_membership() {
        let mut fences = BTreeSet::new();
        assert_eq!(
            TransmissionStatus::from_membership(&fences),
            TransmissionStatus::Active
        );
        fences.insert("Maharashtra_Pune".to_string());
        assert_eq!(
            TransmissionStatus::from_membership(&fences),
            TransmissionStatus::Disabled
        );
    }

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(TransmissionStatus::Active.to_string(), "ACTIVE");
        assert_eq!(TransmissionStatus::Disabled.to_string(), "DISABLED");
        assert_eq!(TransitionKind::Enter.to_string(), "ENTER");
        assert_eq!(TransitionKind::Exit.to_string(), "EXIT");
    }
}
