#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Mutable registry of user-defined geofence polygons.
//!
//! The registry hands out immutable, generation-stamped snapshots.
//! Mutations build a fresh snapshot and swap it in under a write lock, so
//! a reader holding a snapshot never observes a partially-added or
//! partially-removed geofence, and lookups on the hot ingestion path cost
//! one `Arc` clone.
//!
//! `remove` returns the pre-removal snapshot: the engine uses it to
//! compute synthetic EXIT transitions against a stable view of which
//! terminals were inside the deleted fence.
//!
//! Containment follows [`geo::Contains`]: a point exactly on a fence edge
//! is outside. A point may be inside zero, one, or many overlapping
//! fences.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use geo::{BoundingRect, Contains, MultiPolygon, Rect};
use thiserror::Error;

/// Errors returned by geofence registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeofenceError {
    /// A geofence with this id already exists.
    #[error("geofence {id:?} already exists")]
    DuplicateGeofence {
        /// The conflicting id.
        id: String,
    },

    /// No geofence with this id exists.
    #[error("geofence {id:?} not found")]
    NotFound {
        /// The missing id.
        id: String,
    },

    /// The polygon has no area (empty geometry).
    #[error("geofence {id:?} has an empty polygon")]
    EmptyPolygon {
        /// The rejected id.
        id: String,
    },
}

/// A single named geofence inside a snapshot.
#[derive(Debug)]
struct FenceEntry {
    id: String,
    /// Bounding box prefilter, checked before the polygon test.
    bbox: Rect<f64>,
    polygon: MultiPolygon<f64>,
}

impl FenceEntry {
    fn contains(&self, longitude: f64, latitude: f64) -> bool {
        let min = self.bbox.min();
        let max = self.bbox.max();
        if longitude < min.x || longitude > max.x || latitude < min.y || latitude > max.y {
            return false;
        }
        self.polygon.contains(&geo::Point::new(longitude, latitude))
    }
}

/// An immutable view of the registry at one generation.
#[derive(Debug)]
pub struct GeofenceSnapshot {
    generation: u64,
    fences: Vec<FenceEntry>,
}

impl GeofenceSnapshot {
    /// The ids of every geofence containing the point.
    #[must_use]
    pub fn matching(&self, latitude: f64, longitude: f64) -> BTreeSet<String> {
        self.fences
            .iter()
            .filter(|fence| fence.contains(longitude, latitude))
            .map(|fence| fence.id.clone())
            .collect()
    }

    /// Whether a geofence with this id is present.
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.fences.iter().any(|fence| fence.id == id)
    }

    /// All geofence ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.fences.iter().map(|fence| fence.id.as_str()).collect()
    }

    /// Monotonic version of the registry this snapshot was taken at.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of geofences in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether this snapshot holds no geofences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// Registry of named geofence polygons.
///
/// Reads are cheap (an `Arc` clone); `add`/`remove` are rare, exclusive,
/// brief mutations.
pub struct GeofenceRegistry {
    current: RwLock<Arc<GeofenceSnapshot>>,
}

impl Default for GeofenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeofenceRegistry {
    /// Creates an empty registry at generation zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(GeofenceSnapshot {
                generation: 0,
                fences: Vec::new(),
            })),
        }
    }

    /// The current snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the registry lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Arc<GeofenceSnapshot> {
        Arc::clone(&self.current.read().expect("geofence registry lock poisoned"))
    }

    /// Adds a geofence. No state changes on error.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::DuplicateGeofence`] if the id is already
    /// present, or [`GeofenceError::EmptyPolygon`] if the polygon has no
    /// bounding rectangle.
    ///
    /// # Panics
    ///
    /// Panics if the registry lock is poisoned.
    pub fn add(&self, id: &str, polygon: MultiPolygon<f64>) -> Result<(), GeofenceError> {
        let Some(bbox) = polygon.bounding_rect() else {
            return Err(GeofenceError::EmptyPolygon { id: id.to_string() });
        };

        let mut current = self.current.write().expect("geofence registry lock poisoned");
        if current.contains_id(id) {
            return Err(GeofenceError::DuplicateGeofence { id: id.to_string() });
        }

        let mut fences: Vec<FenceEntry> = current
            .fences
            .iter()
            .map(|fence| FenceEntry {
                id: fence.id.clone(),
                bbox: fence.bbox,
                polygon: fence.polygon.clone(),
            })
            .collect();
        fences.push(FenceEntry {
            id: id.to_string(),
            bbox,
            polygon,
        });

        let generation = current.generation + 1;
        *current = Arc::new(GeofenceSnapshot { generation, fences });
        log::info!("Added geofence {id} (generation {generation})");
        Ok(())
    }

    /// Removes a geofence, returning the pre-removal snapshot so callers
    /// can resolve which terminals were inside the deleted fence.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::NotFound`] if the id is absent; no state
    /// changes in that case.
    ///
    /// # Panics
    ///
    /// Panics if the registry lock is poisoned.
    pub fn remove(&self, id: &str) -> Result<Arc<GeofenceSnapshot>, GeofenceError> {
        let mut current = self.current.write().expect("geofence registry lock poisoned");
        if !current.contains_id(id) {
            return Err(GeofenceError::NotFound { id: id.to_string() });
        }

        let fences: Vec<FenceEntry> = current
            .fences
            .iter()
            .filter(|fence| fence.id != id)
            .map(|fence| FenceEntry {
                id: fence.id.clone(),
                bbox: fence.bbox,
                polygon: fence.polygon.clone(),
            })
            .collect();

        let generation = current.generation + 1;
        let previous = std::mem::replace(
            &mut *current,
            Arc::new(GeofenceSnapshot { generation, fences }),
        );
        log::info!("Removed geofence {id} (generation {generation})");
        Ok(previous)
    }
}
