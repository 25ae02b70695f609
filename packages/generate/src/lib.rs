#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Synthetic telemetry generator.
//!
//! Seeds a fleet of simulated terminals at fixed starting coordinates
//! spread across India and random-walks each one, feeding a
//! [`TrackingEngine`] with one report per terminal per tick. Steps that
//! would leave the India boundary polygon are nudged back toward the
//! interior instead.
//!
//! This is an external producer of the engine's input stream: it knows
//! nothing about geofences or transitions, it just moves terminals.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use geo::{Contains, Polygon};
use rand::Rng;
use terminal_map_engine::TrackingEngine;
use terminal_map_telemetry_models::TelemetryReport;

/// Device id prefix; the walker index is appended.
pub const DEVICE_ID_PREFIX: &str = "1712328952086-29105A";

/// Starting coordinates (latitude, longitude) for the simulated fleet,
/// one per major region.
pub const INITIAL_COORDINATES: [(f64, f64); 10] = [
    (20.5937, 78.9629),
    (11.059_821, 78.387_451),
    (17.123_18, 79.208_824),
    (29.065_773, 76.040_497),
    (27.391_277, 73.432_617),
    (15.317_277, 75.713_89),
    (22.309_425, 72.136_23),
    (25.096_073, 85.313_118),
    (21.251_385, 81.629_641),
    (26.846_708_8, 80.946_159_2),
];

/// Rough outline of India's land boundary, (latitude, longitude).
const INDIA_BOUNDARY_COORDS: [(f64, f64); 25] = [
    (37.109_318, 75.298_346),
    (35.860_28, 79.980_722),
    (30.453_842, 81.582_569),
    (28.879_888, 80.022_675),
    (26.458_814, 87.989_875),
    (27.950_51, 88.124_059),
    (27.980_139, 88.845_3),
    (26.983_175, 89.013_031),
    (26.953_277, 91.981_861),
    (27.817_079, 91.981_861),
    (29.378_043, 96.024_167),
    (28.246_433, 97.366_011),
    (27.162_397, 97.097_642),
    (21.353_003, 92.615_252),
    (23.165_416, 91.393_22),
    (24.904_206, 92.454_443),
    (26.171_505, 89.692_141),
    (26.563_018, 88.381_217),
    (21.853_482, 89.036_679),
    (8.224_025, 77.765_732),
    (23.683_655, 67.931_95),
    (27.259_897, 69.597_233),
    (35.938_934, 72.497_122),
    (37.115_564, 74.621_793),
    (37.109_318, 75.298_346),
];

/// The India boundary as a geo polygon (x = longitude, y = latitude).
fn india_boundary() -> &'static Polygon<f64> {
    static BOUNDARY: OnceLock<Polygon<f64>> = OnceLock::new();
    BOUNDARY.get_or_init(|| {
        let ring: Vec<(f64, f64)> = INDIA_BOUNDARY_COORDS
            .iter()
            .map(|&(lat, lon)| (lon, lat))
            .collect();
        Polygon::new(ring.into(), vec![])
    })
}

/// Whether a coordinate lies inside the India boundary outline.
#[must_use]
pub fn inside_india(latitude: f64, longitude: f64) -> bool {
    india_boundary().contains(&geo::Point::new(longitude, latitude))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// One simulated terminal.
pub struct Walker {
    /// Device id reported by this walker.
    pub device_id: String,
    latitude: f64,
    longitude: f64,
}

impl Walker {
    /// Creates a walker at a starting coordinate.
    #[must_use]
    pub fn new(device_id: String, latitude: f64, longitude: f64) -> Self {
        Self {
            device_id,
            latitude,
            longitude,
        }
    }

    /// The walker's current position (latitude, longitude).
    #[must_use]
    pub const fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Takes one random step of up to `max_change` degrees per axis.
    ///
    /// A step landing inside the boundary is kept; one landing outside
    /// is replaced by a nudge back toward the interior (southern points
    /// move north, western points move east, everything else moves
    /// southwest).
    pub fn step<R: Rng>(&mut self, rng: &mut R, max_change: f64) {
        let new_latitude = self.latitude + rng.gen_range(-max_change..=max_change);
        let new_longitude = self.longitude + rng.gen_range(-max_change..=max_change);

        if inside_india(new_latitude, new_longitude) {
            self.latitude = round_to(new_latitude, 3);
            self.longitude = round_to(new_longitude, 3);
        } else if new_latitude < 21.0 {
            self.latitude = round_to(new_latitude + rng.gen_range(0.0..=max_change), 5);
            self.longitude = round_to(new_longitude, 5);
        } else if new_longitude < 79.0 {
            self.latitude = round_to(new_latitude, 5);
            self.longitude = round_to(new_longitude + rng.gen_range(0.0..=max_change), 5);
        } else {
            self.latitude = round_to(new_latitude - rng.gen_range(0.0..=max_change), 5);
            self.longitude = round_to(new_longitude - rng.gen_range(0.0..=max_change), 5);
        }
    }

    /// Builds a report for the walker's current position, stamped now.
    #[must_use]
    pub fn report(&self) -> TelemetryReport {
        TelemetryReport {
            device_id: self.device_id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: Utc::now(),
        }
    }
}

/// Generator settings.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of simulated terminals.
    pub terminals: usize,
    /// Delay between report rounds.
    pub interval: Duration,
    /// Maximum per-axis step in degrees.
    pub max_change: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            terminals: 10,
            interval: Duration::from_secs(10),
            max_change: 1.0,
        }
    }
}

/// Seeds `count` walkers, cycling the starting coordinates when the
/// fleet is larger than the coordinate list.
#[must_use]
pub fn seed_walkers(count: usize) -> Vec<Walker> {
    (0..count)
        .map(|i| {
            let (latitude, longitude) = INITIAL_COORDINATES[i % INITIAL_COORDINATES.len()];
            Walker::new(format!("{DEVICE_ID_PREFIX}{i}"), latitude, longitude)
        })
        .collect()
}

/// Runs the generator loop forever, one round of reports per interval.
pub async fn run(engine: Arc<TrackingEngine>, config: GeneratorConfig) {
    let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::from_entropy();
    let mut walkers = seed_walkers(config.terminals);
    let mut ticker = tokio::time::interval(config.interval);

    log::info!(
        "Generating telemetry for {} terminals every {:?}",
        walkers.len(),
        config.interval
    );

    loop {
        ticker.tick().await;
        for walker in &mut walkers {
            walker.step(&mut rng, config.max_change);
            let report = walker.report();
            match engine.ingest(&report) {
                Ok(outcome) => {
                    for transition in &outcome.transitions {
                        log::info!(
                            "{} {} geofence {}",
                            transition.device_id,
                            transition.kind,
                            transition.geofence_id
                        );
                    }
                }
                Err(e) => log::warn!("Generated report rejected: {e}"),
            }
        }
        log::debug!("Generated reports for {} terminals", walkers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn initial_coordinates_are_inside_india() {
        for (latitude, longitude) in INITIAL_COORDINATES {
            assert!(
                inside_india(latitude, longitude),
                "({latitude}, {longitude}) should be inside the boundary"
            );
        }
    }

    #[test]
    fn ocean_point_is_outside_india() {
        assert!(!inside_india(0.0, 0.0));
        assert!(!inside_india(20.0, 60.0));
    }

    #[test]
    fn walkers_get_distinct_device_ids() {
        let walkers = seed_walkers(12);
        assert_eq!(walkers.len(), 12);
        assert_eq!(walkers[0].device_id, format!("{DEVICE_ID_PREFIX}0"));
        assert_eq!(walkers[11].device_id, format!("{DEVICE_ID_PREFIX}11"));
        // Walker 10 reuses the first starting coordinate.
        assert_eq!(walkers[10].position(), INITIAL_COORDINATES[0]);
    }

    #[test]
    fn steps_produce_valid_reports() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut walker = Walker::new("dev-1".to_string(), 20.5937, 78.9629);

        for _ in 0..500 {
            walker.step(&mut rng, 1.0);
            let report = walker.report();
            assert!(
                report.validate().is_ok(),
                "report at {:?} failed validation",
                walker.position()
            );
        }
    }

    #[test]
    fn steps_stay_near_the_boundary() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut walker = Walker::new("dev-1".to_string(), 20.5937, 78.9629);

        let mut inside = 0;
        for _ in 0..200 {
            walker.step(&mut rng, 1.0);
            let (latitude, longitude) = walker.position();
            if inside_india(latitude, longitude) {
                inside += 1;
            }
            // The nudge rules keep coordinates in a sane envelope even
            // when a step temporarily leaves the outline.
            assert!((0.0..50.0).contains(&latitude));
            assert!((55.0..105.0).contains(&longitude));
        }
        assert!(inside > 50, "only {inside}/200 steps were inside");
    }
}
