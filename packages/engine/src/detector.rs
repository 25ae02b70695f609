//! Edge-triggered geofence transition detection.
//!
//! Compares a terminal's previous geofence membership with its newly
//! resolved membership and produces one event per changed fence. A
//! terminal that stays inside the same fence across many reports produces
//! nothing; transitions fire on change only, never on sustained
//! presence.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use terminal_map_telemetry_models::{TransitionEvent, TransitionKind};

/// Computes the transitions between two membership sets.
///
/// Exits (`previous − current`) are emitted before enters
/// (`current − previous`); within each kind, events follow the set's
/// lexicographic order. Identical sets produce an empty vec.
#[must_use]
pub fn detect_transitions(
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
    device_id: &str,
    timestamp: DateTime<Utc>,
) -> Vec<TransitionEvent> {
    let exits = previous.difference(current).map(|id| TransitionEvent {
        device_id: device_id.to_string(),
        geofence_id: id.clone(),
        kind: TransitionKind::Exit,
        timestamp,
    });
    let enters = current.difference(previous).map(|id| TransitionEvent {
        device_id: device_id.to_string(),
        geofence_id: id.clone(),
        kind: TransitionKind::Enter,
        timestamp,
    });
    exits.chain(enters).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    fn detect(previous: &[&str], current: &[&str]) -> Vec<(String, TransitionKind)> {
        detect_transitions(&set(previous), &set(current), "dev-1", Utc::now())
            .into_iter()
            .map(|e| (e.geofence_id, e.kind))
            .collect()
    }

    #[test]
    fn no_change_emits_nothing() {
        assert!(detect(&[], &[]).is_empty());
        assert!(detect(&["a"], &["a"]).is_empty());
        assert!(detect(&["a", "b"], &["a", "b"]).is_empty());
    }

    #[test]
    fn entering_emits_one_enter() {
        assert_eq!(
            detect(&[], &["a"]),
            vec![("a".to_string(), TransitionKind::Enter)]
        );
    }

    #[test]
    fn exiting_emits_one_exit() {
        assert_eq!(
            detect(&["a"], &[]),
            vec![("a".to_string(), TransitionKind::Exit)]
        );
    }

    #[test]
    fn crossing_between_fences_emits_exit_then_enter() {
        assert_eq!(
            detect(&["a"], &["b"]),
            vec![
                ("a".to_string(), TransitionKind::Exit),
                ("b".to_string(), TransitionKind::Enter),
            ]
        );
    }

    #[test]
    fn overlapping_fences_transition_independently() {
        // Moving out of the overlap of a+b into b alone exits only a.
        assert_eq!(
            detect(&["a", "b"], &["b"]),
            vec![("a".to_string(), TransitionKind::Exit)]
        );
        // Moving into a third fence while staying in b.
        assert_eq!(
            detect(&["b"], &["b", "c"]),
            vec![("c".to_string(), TransitionKind::Enter)]
        );
    }

    #[test]
    fn round_trip_produces_exactly_one_exit_and_one_enter() {
        // A -> outside -> A again.
        let out = detect(&["a"], &[]);
        assert_eq!(out, vec![("a".to_string(), TransitionKind::Exit)]);
        let back = detect(&[], &["a"]);
        assert_eq!(back, vec![("a".to_string(), TransitionKind::Enter)]);
    }
}
