//! Pure membership resolution.
//!
//! Given a point and the static/snapshot data it is tested against, this
//! module answers "which administrative region and which geofences contain
//! it". No side effects and no mutation: the same inputs always produce
//! the same answer, which keeps the resolution logic unit-testable in
//! isolation from the state store.

use std::collections::BTreeSet;

use terminal_map_boundary::BoundaryIndex;
use terminal_map_geofence::GeofenceSnapshot;
use terminal_map_telemetry_models::RegionName;

/// Resolved membership for one point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Administrative region containing the point, if any.
    pub region: Option<RegionName>,
    /// Ids of every geofence containing the point.
    pub geofences: BTreeSet<String>,
}

/// Resolves the administrative region and geofence set for a point.
///
/// An unresolved region (`None`) is the "Unknown" region, a valid
/// outcome that never blocks geofence resolution.
#[must_use]
pub fn resolve_membership(
    latitude: f64,
    longitude: f64,
    boundary: &BoundaryIndex,
    geofences: &GeofenceSnapshot,
) -> Membership {
    Membership {
        region: boundary.resolve(latitude, longitude).cloned(),
        geofences: geofences.matching(latitude, longitude),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};
    use terminal_map_geofence::GeofenceRegistry;

    const DATASET: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"NAME_1":"Alpha","NAME_2":"North"},
         "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}
    ]}"#;

    #[test]
    fn resolves_region_and_fences_independently() {
        let boundary = BoundaryIndex::from_geojson_str(DATASET).unwrap();
        let registry = GeofenceRegistry::new();
        registry
            .add(
                "offset_fence",
                MultiPolygon(vec![polygon![
                    (x: 0.5, y: 0.5),
                    (x: 2.0, y: 0.5),
                    (x: 2.0, y: 2.0),
                    (x: 0.5, y: 2.0),
                    (x: 0.5, y: 0.5),
                ]]),
            )
            .unwrap();
        let snapshot = registry.snapshot();

        // Inside both the district and the fence.
        let both = resolve_membership(0.75, 0.75, &boundary, &snapshot);
        assert_eq!(both.region.as_ref().unwrap().district, "North");
        assert!(both.geofences.contains("offset_fence"));

        // Inside the fence but outside every district: Unknown region
        // must not block geofence resolution.
        let fence_only = resolve_membership(1.5, 1.5, &boundary, &snapshot);
        assert!(fence_only.region.is_none());
        assert!(fence_only.geofences.contains("offset_fence"));

        // Inside the district only.
        let region_only = resolve_membership(0.25, 0.25, &boundary, &snapshot);
        assert!(region_only.region.is_some());
        assert!(region_only.geofences.is_empty());
    }

    #[test]
    fn determinism_for_identical_inputs() {
        let boundary = BoundaryIndex::from_geojson_str(DATASET).unwrap();
        let registry = GeofenceRegistry::new();
        let snapshot = registry.snapshot();

        let first = resolve_membership(0.5, 0.5, &boundary, &snapshot);
        for _ in 0..10 {
            assert_eq!(resolve_membership(0.5, 0.5, &boundary, &snapshot), first);
        }
    }
}
