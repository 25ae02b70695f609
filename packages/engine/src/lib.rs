#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geospatial membership engine for satellite terminal tracking.
//!
//! Consumes a stream of position reports, maintains per-terminal state,
//! resolves point-in-polygon membership against the administrative
//! boundary dataset and the dynamic geofence registry, detects
//! enter/exit transitions (edge-triggered: one event per crossing, none
//! for sustained presence), and publishes consistent state changes to
//! downstream consumers.
//!
//! The engine persists nothing and renders nothing: boundaries come in
//! through [`terminal_map_boundary`], reports through [`TrackingEngine::ingest`],
//! and everything going out crosses the publisher boundary in
//! [`publish`].

pub mod detector;
pub mod publish;
pub mod resolver;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use geo::MultiPolygon;
use terminal_map_boundary::BoundaryIndex;
use terminal_map_geofence::GeofenceRegistry;
use terminal_map_telemetry_models::{
    InvalidReportError, TelemetryReport, TerminalRecord, TrackPoint, TransitionEvent,
    TransitionKind, TransmissionStatus,
};
use thiserror::Error;
use tokio::sync::broadcast;

pub use publish::{EngineEvent, PositionRow, SinkResult, StatusRow, TelemetrySink};
pub use store::{HISTORY_CAPACITY, StateFilter};
pub use terminal_map_geofence::{GeofenceError, GeofenceSnapshot};

/// Errors returned by [`TrackingEngine::ingest`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// The report failed validation; no state was mutated.
    #[error("invalid report: {0}")]
    InvalidReport(#[from] InvalidReportError),
}

/// Errors returned by the geofence control operations.
#[derive(Debug, Error)]
pub enum GeofenceControlError {
    /// No such district in the boundary dataset.
    #[error("no district {district:?} in state {state:?}")]
    UnknownDistrict {
        /// Requested state.
        state: String,
        /// Requested district.
        district: String,
    },

    /// Registry operation failed.
    #[error(transparent)]
    Geofence(#[from] GeofenceError),
}

/// Result of one accepted report.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The terminal's record after the update.
    pub record: TerminalRecord,
    /// Transitions this report triggered (empty when membership did not
    /// change).
    pub transitions: Vec<TransitionEvent>,
}

/// The tracking engine: terminal state store, geofence control, and
/// event publishing behind one facade.
///
/// Reports for the same device id are serialized by the store's shard
/// locks; reports for different devices proceed in parallel. The engine
/// is `Send + Sync` and is shared behind an `Arc` by the server and
/// generator.
pub struct TrackingEngine {
    boundary: Arc<BoundaryIndex>,
    geofences: GeofenceRegistry,
    store: store::TerminalStore,
    publisher: publish::EventPublisher,
}

impl TrackingEngine {
    /// Creates an engine over a loaded boundary index, optionally wired
    /// to a persistence sink.
    #[must_use]
    pub fn new(boundary: Arc<BoundaryIndex>, sink: Option<Box<dyn TelemetrySink>>) -> Self {
        Self {
            boundary,
            geofences: GeofenceRegistry::new(),
            store: store::TerminalStore::new(),
            publisher: publish::EventPublisher::new(sink),
        }
    }

    /// The boundary index the engine resolves regions against.
    #[must_use]
    pub fn boundary(&self) -> &BoundaryIndex {
        &self.boundary
    }

    /// The current geofence snapshot.
    #[must_use]
    pub fn geofence_snapshot(&self) -> Arc<GeofenceSnapshot> {
        self.geofences.snapshot()
    }

    /// Subscribes to the engine's event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.publisher.subscribe()
    }

    /// Ingests one telemetry report.
    ///
    /// Resolves membership, detects transitions against the terminal's
    /// previous state, updates the record and its history, and publishes
    /// the resulting events. The whole sequence runs under the
    /// terminal's shard lock, so two reports for the same device can
    /// never tear the previous-state read from the new-state write.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidReport`] for out-of-range
    /// coordinates or a malformed device id; nothing is mutated or
    /// published in that case.
    pub fn ingest(&self, report: &TelemetryReport) -> Result<IngestOutcome, IngestError> {
        report.validate()?;

        let mut shard = self.store.lock_shard(&report.device_id);
        // The snapshot is taken under the shard lock: a concurrent
        // geofence removal either swaps before this point (we resolve
        // against the new snapshot) or walks this shard after we
        // release (it sees our update). Either way no terminal is left
        // flagged inside a fence that no longer exists.
        let snapshot = self.geofences.snapshot();
        let membership =
            resolver::resolve_membership(report.latitude, report.longitude, &self.boundary, &snapshot);

        let entry = shard
            .entry(report.device_id.clone())
            .or_insert_with(|| store::TerminalEntry {
                record: TerminalRecord {
                    device_id: report.device_id.clone(),
                    last_point: report.point(),
                    last_timestamp: report.timestamp,
                    current_region: None,
                    active_geofences: std::collections::BTreeSet::new(),
                    transmission_status: TransmissionStatus::Active,
                },
                history: std::collections::VecDeque::new(),
            });

        let transitions = detector::detect_transitions(
            &entry.record.active_geofences,
            &membership.geofences,
            &report.device_id,
            report.timestamp,
        );
        let new_status = TransmissionStatus::from_membership(&membership.geofences);
        let status_changed = new_status != entry.record.transmission_status;

        entry.record.last_point = report.point();
        entry.record.last_timestamp = report.timestamp;
        entry.record.current_region = membership.region.clone();
        entry.record.active_geofences = membership.geofences;
        entry.record.transmission_status = new_status;
        entry.push_history(TrackPoint {
            point: report.point(),
            timestamp: report.timestamp,
            region: membership.region,
        });

        let record = entry.record.clone();

        // Publishing happens under the shard lock so transition order on
        // the event stream matches update order for a given terminal.
        // Every send below is non-blocking.
        for transition in &transitions {
            log::debug!(
                "{} {} geofence {}",
                transition.device_id,
                transition.kind,
                transition.geofence_id
            );
            self.publisher
                .publish(EngineEvent::Transition(transition.clone()));
        }
        if status_changed {
            self.publisher.publish(EngineEvent::Status {
                device_id: record.device_id.clone(),
                status: record.transmission_status,
                timestamp: record.last_timestamp,
            });
            self.publisher.sink_status(StatusRow {
                timestamp: record.last_timestamp,
                device_id: record.device_id.clone(),
                status: record.transmission_status,
            });
        }
        self.publisher.publish(EngineEvent::Position {
            record: record.clone(),
        });
        self.publisher.sink_position(position_row(&record));

        Ok(IngestOutcome {
            record,
            transitions,
        })
    }

    /// Creates a geofence over a district's polygon. The id is
    /// `"{state}_{district}"`.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceControlError::UnknownDistrict`] if the district
    /// is not in the boundary dataset, or a duplicate error if the fence
    /// already exists.
    pub fn create_geofence(
        &self,
        state: &str,
        district: &str,
    ) -> Result<String, GeofenceControlError> {
        let polygon = self.boundary.district_polygon(state, district).ok_or_else(|| {
            GeofenceControlError::UnknownDistrict {
                state: state.to_string(),
                district: district.to_string(),
            }
        })?;
        let id = format!("{state}_{district}");
        self.geofences.add(&id, polygon.clone())?;
        Ok(id)
    }

    /// Adds a geofence with an arbitrary id and polygon.
    ///
    /// # Errors
    ///
    /// Returns a duplicate or empty-polygon error from the registry.
    pub fn add_geofence(
        &self,
        id: &str,
        polygon: MultiPolygon<f64>,
    ) -> Result<(), GeofenceControlError> {
        self.geofences.add(id, polygon)?;
        Ok(())
    }

    /// Deletes a geofence and synthesizes an EXIT for every terminal
    /// currently inside it.
    ///
    /// The registry swap happens first; the store walk then runs shard
    /// by shard, so any report racing the removal lands either before
    /// the walk (its fence flag is cleared here) or after the swap (it
    /// resolves against the post-removal snapshot and never sets the
    /// flag). A removed geofence cannot leave a terminal disabled
    /// forever.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::NotFound`] if the id is absent.
    pub fn delete_geofence(&self, id: &str) -> Result<(), GeofenceControlError> {
        self.geofences.remove(id)?;
        let timestamp = Utc::now();
        let mut exited = 0_usize;

        self.store.for_each_shard(|shard| {
            for entry in shard.values_mut() {
                if !entry.record.active_geofences.remove(id) {
                    continue;
                }
                exited += 1;

                let transition = TransitionEvent {
                    device_id: entry.record.device_id.clone(),
                    geofence_id: id.to_string(),
                    kind: TransitionKind::Exit,
                    timestamp,
                };
                self.publisher.publish(EngineEvent::Transition(transition));

                let new_status =
                    TransmissionStatus::from_membership(&entry.record.active_geofences);
                if new_status != entry.record.transmission_status {
                    entry.record.transmission_status = new_status;
                    self.publisher.publish(EngineEvent::Status {
                        device_id: entry.record.device_id.clone(),
                        status: new_status,
                        timestamp,
                    });
                    self.publisher.sink_status(StatusRow {
                        timestamp,
                        device_id: entry.record.device_id.clone(),
                        status: new_status,
                    });
                }
            }
        });

        if exited > 0 {
            log::info!("Geofence {id} removed; synthesized {exited} exit events");
        }
        Ok(())
    }

    /// The current record for a terminal, if it has ever reported.
    #[must_use]
    pub fn current_state(&self, device_id: &str) -> Option<TerminalRecord> {
        self.store.get(device_id)
    }

    /// All terminal records matching the filter, sorted by device id.
    #[must_use]
    pub fn all_states(&self, filter: &StateFilter) -> Vec<TerminalRecord> {
        self.store.all(filter)
    }

    /// Position history for one terminal from `since` onward.
    #[must_use]
    pub fn history(
        &self,
        device_id: &str,
        since: Option<chrono::DateTime<Utc>>,
    ) -> Vec<TrackPoint> {
        self.store.history(device_id, since)
    }

    /// Every device id the engine has seen, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        self.store.device_ids()
    }
}

fn position_row(record: &TerminalRecord) -> PositionRow {
    let (state, district) = record
        .current_region
        .as_ref()
        .map_or(("Unknown", "Unknown"), |region| {
            (region.state.as_str(), region.district.as_str())
        });
    PositionRow {
        timestamp: record.last_timestamp,
        device_id: record.device_id.clone(),
        latitude: record.last_point.latitude,
        longitude: record.last_point.longitude,
        district: district.to_string(),
        state: state.to_string(),
        status: record.transmission_status,
    }
}
