//! Event publishing boundary.
//!
//! Fans engine events out to any number of subscribers over a broadcast
//! channel and forwards persistence-bound rows to an injected
//! [`TelemetrySink`] through a bounded queue drained by a dedicated
//! thread. Both paths are non-blocking from the ingestion side: a lagging
//! subscriber skips ahead, and a full sink queue drops the row with a
//! warning. Downstream failures never surface as ingestion failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use terminal_map_telemetry_models::{TerminalRecord, TransitionEvent, TransmissionStatus};
use tokio::sync::{broadcast, mpsc};

/// Broadcast buffer per subscriber before old events are overwritten.
const BROADCAST_CAPACITY: usize = 1024;

/// Bounded depth of the sink queue.
const SINK_QUEUE_CAPACITY: usize = 1024;

/// An event published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A terminal reported a position (sent for every accepted report).
    #[serde(rename_all = "camelCase")]
    Position {
        /// The terminal's updated record.
        record: TerminalRecord,
    },
    /// A terminal crossed a geofence boundary.
    Transition(TransitionEvent),
    /// A terminal's transmission status flipped.
    #[serde(rename_all = "camelCase")]
    Status {
        /// Terminal whose status changed.
        device_id: String,
        /// The new status.
        status: TransmissionStatus,
        /// Timestamp of the triggering report or removal.
        timestamp: DateTime<Utc>,
    },
}

/// A flattened telemetry row bound for the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    /// Report timestamp.
    pub timestamp: DateTime<Utc>,
    /// Terminal device id.
    pub device_id: String,
    /// Reported latitude.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
    /// Resolved district, or "Unknown".
    pub district: String,
    /// Resolved state, or "Unknown".
    pub state: String,
    /// Transmission status after this report.
    pub status: TransmissionStatus,
}

/// A status flip bound for the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRow {
    /// Timestamp of the flip.
    pub timestamp: DateTime<Utc>,
    /// Terminal device id.
    pub device_id: String,
    /// The new status.
    pub status: TransmissionStatus,
}

/// Result type for sink writes.
pub type SinkResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Downstream persistence collaborator.
///
/// Implementations run on the publisher's drain thread and may block;
/// the engine never waits on them.
pub trait TelemetrySink: Send + 'static {
    /// Records an accepted position report.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the row is dropped.
    fn record_position(&mut self, row: &PositionRow) -> SinkResult;

    /// Records a transmission status flip.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the row is dropped.
    fn record_status(&mut self, row: &StatusRow) -> SinkResult;
}

enum SinkMessage {
    Position(PositionRow),
    Status(StatusRow),
}

/// Publisher owning both downstream paths.
pub struct EventPublisher {
    events: broadcast::Sender<EngineEvent>,
    sink_tx: Option<mpsc::Sender<SinkMessage>>,
}

impl EventPublisher {
    /// Creates a publisher; if a sink is given, spawns its drain thread.
    #[must_use]
    pub fn new(sink: Option<Box<dyn TelemetrySink>>) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);

        let sink_tx = sink.map(|mut sink| {
            let (tx, mut rx) = mpsc::channel::<SinkMessage>(SINK_QUEUE_CAPACITY);
            std::thread::Builder::new()
                .name("telemetry-sink".to_string())
                .spawn(move || {
                    while let Some(message) = rx.blocking_recv() {
                        let result = match &message {
                            SinkMessage::Position(row) => sink.record_position(row),
                            SinkMessage::Status(row) => sink.record_status(row),
                        };
                        if let Err(e) = result {
                            log::error!("Telemetry sink write failed: {e}");
                        }
                    }
                })
                .expect("failed to spawn telemetry sink thread");
            tx
        });

        Self { events, sink_tx }
    }

    /// Subscribes to the engine event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Publishes an event to all subscribers. Send errors mean "no
    /// subscribers" and are ignored.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Queues a position row for the sink, dropping it if the queue is full.
    pub fn sink_position(&self, row: PositionRow) {
        self.dispatch(SinkMessage::Position(row));
    }

    /// Queues a status row for the sink, dropping it if the queue is full.
    pub fn sink_status(&self, row: StatusRow) {
        self.dispatch(SinkMessage::Status(row));
    }

    fn dispatch(&self, message: SinkMessage) {
        let Some(tx) = &self.sink_tx else {
            return;
        };
        if let Err(e) = tx.try_send(message) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    log::warn!("Telemetry sink queue full, dropping row");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    log::warn!("Telemetry sink thread is gone, dropping row");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};
    use terminal_map_telemetry_models::Point;

    struct RecordingSink {
        positions: Arc<Mutex<Vec<PositionRow>>>,
        statuses: Arc<Mutex<Vec<StatusRow>>>,
    }

    impl TelemetrySink for RecordingSink {
        fn record_position(&mut self, row: &PositionRow) -> SinkResult {
            self.positions.lock().unwrap().push(row.clone());
            Ok(())
        }

        fn record_status(&mut self, row: &StatusRow) -> SinkResult {
            self.statuses.lock().unwrap().push(row.clone());
            Ok(())
        }
    }

    fn sample_record() -> TerminalRecord {
        TerminalRecord {
            device_id: "dev-1".to_string(),
            last_point: Point::new(10.0, 20.0),
            last_timestamp: Utc::now(),
            current_region: None,
            active_geofences: BTreeSet::new(),
            transmission_status: TransmissionStatus::Active,
        }
    }

    #[test]
    fn subscribers_receive_published_events() {
        let publisher = EventPublisher::new(None);
        let mut rx = publisher.subscribe();

        publisher.publish(EngineEvent::Position {
            record: sample_record(),
        });

        match rx.try_recv().unwrap() {
            EngineEvent::Position { record } => assert_eq!(record.device_id, "dev-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let publisher = EventPublisher::new(None);
        publisher.publish(EngineEvent::Status {
            device_id: "dev-1".to_string(),
            status: TransmissionStatus::Disabled,
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn sink_rows_reach_the_drain_thread() {
        let positions = Arc::new(Mutex::new(Vec::new()));
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let publisher = EventPublisher::new(Some(Box::new(RecordingSink {
            positions: Arc::clone(&positions),
            statuses: Arc::clone(&statuses),
        })));

        publisher.sink_position(PositionRow {
            timestamp: Utc::now(),
            device_id: "dev-1".to_string(),
            latitude: 10.0,
            longitude: 20.0,
            district: "Unknown".to_string(),
            state: "Unknown".to_string(),
            status: TransmissionStatus::Active,
        });
        publisher.sink_status(StatusRow {
            timestamp: Utc::now(),
            device_id: "dev-1".to_string(),
            status: TransmissionStatus::Disabled,
        });

        // The drain thread picks the rows up asynchronously.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if positions.lock().unwrap().len() == 1 && statuses.lock().unwrap().len() == 1 {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("sink rows were not drained in time");
    }

    #[test]
    fn event_serialization_is_tagged() {
        let event = EngineEvent::Transition(TransitionEvent {
            device_id: "dev-1".to_string(),
            geofence_id: "Maharashtra_Pune".to_string(),
            kind: terminal_map_telemetry_models::TransitionKind::Enter,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "transition");
        assert_eq!(json["kind"], "ENTER");
    }
}
