#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory administrative boundary index.
//!
//! Loads state/district polygons from a GeoJSON `FeatureCollection` at
//! startup, builds an R-tree spatial index, and provides fast
//! point-in-polygon region lookups for the ingestion path. The dataset is
//! immutable once loaded.
//!
//! Features must carry `NAME_1` (state) and `NAME_2` (district) string
//! properties and a `Polygon` or `MultiPolygon` geometry, the layout of
//! the GADM-derived `india_districts.geojson` dataset. A malformed feature
//! is skipped with a warning; a dataset with no usable feature is a fatal
//! load error.
//!
//! Containment follows [`geo::Contains`]: a point exactly on a polygon
//! edge is treated as outside. The convention is stable across calls.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Contains, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};
use terminal_map_telemetry_models::RegionName;
use thiserror::Error;

/// Errors that can occur while loading a boundary dataset.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Reading the dataset file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset is not valid GeoJSON.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The dataset parsed but is not a `FeatureCollection`.
    #[error("boundary dataset is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// Every feature in the dataset was skipped as malformed.
    #[error("boundary dataset contains no usable features")]
    Empty,
}

/// A region polygon stored in the R-tree with its metadata.
#[derive(Debug)]
struct RegionEntry {
    region: RegionName,
    /// Position of the feature in the source dataset. Ties between
    /// overlapping polygons resolve to the earliest feature so lookups
    /// stay deterministic even with imperfect data.
    dataset_index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over administrative state/district polygons.
///
/// Constructed once at startup and shared read-only across all consumers.
#[derive(Debug)]
pub struct BoundaryIndex {
    regions: RTree<RegionEntry>,
    /// state -> districts, in dataset order.
    states_and_districts: BTreeMap<String, Vec<String>>,
}

impl BoundaryIndex {
    /// Loads a boundary dataset from a GeoJSON file.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the file cannot be read, is not a
    /// GeoJSON `FeatureCollection`, or yields no usable features.
    pub fn load(path: &Path) -> Result<Self, BoundaryError> {
        let raw = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&raw)?;
        log::info!(
            "Loaded {} district polygons across {} states from {}",
            index.regions.size(),
            index.states_and_districts.len(),
            path.display()
        );
        Ok(index)
    }

    /// Builds the index from GeoJSON text.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the text is not a `FeatureCollection`
    /// or yields no usable features.
    pub fn from_geojson_str(raw: &str) -> Result<Self, BoundaryError> {
        let geojson: GeoJson = raw.parse()?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(BoundaryError::NotFeatureCollection);
        };

        let mut entries = Vec::new();
        let mut states_and_districts: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (dataset_index, feature) in collection.features.into_iter().enumerate() {
            let Some(region) = region_name(feature.properties.as_ref()) else {
                log::warn!("Skipping feature {dataset_index}: missing NAME_1/NAME_2 properties");
                continue;
            };

            let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
                log::warn!("Skipping feature {dataset_index} ({region}): no polygon geometry");
                continue;
            };

            let Some(envelope) = compute_envelope(&polygon) else {
                log::warn!("Skipping feature {dataset_index} ({region}): empty geometry");
                continue;
            };

            let districts = states_and_districts.entry(region.state.clone()).or_default();
            if !districts.contains(&region.district) {
                districts.push(region.district.clone());
            }

            entries.push(RegionEntry {
                region,
                dataset_index,
                envelope,
                polygon,
            });
        }

        if entries.is_empty() {
            return Err(BoundaryError::Empty);
        }

        Ok(Self {
            regions: RTree::bulk_load(entries),
            states_and_districts,
        })
    }

    /// Resolves the administrative region containing a point.
    ///
    /// Districts tile the dataset without (intentional) overlap; where the
    /// data disagrees, the earliest feature in the dataset wins. `None`
    /// means no district contains the point: the "Unknown" region, a
    /// valid outcome rather than an error.
    #[must_use]
    pub fn resolve(&self, latitude: f64, longitude: f64) -> Option<&RegionName> {
        let point = geo::Point::new(longitude, latitude);
        let query_env = AABB::from_point([longitude, latitude]);

        self.regions
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .min_by_key(|entry| entry.dataset_index)
            .map(|entry| &entry.region)
    }

    /// All state names in the dataset, sorted.
    #[must_use]
    pub fn states(&self) -> Vec<&str> {
        self.states_and_districts
            .keys()
            .map(String::as_str)
            .collect()
    }

    /// District names for a state, in dataset order. `None` if the state
    /// is not in the dataset.
    #[must_use]
    pub fn districts(&self, state: &str) -> Option<Vec<&str>> {
        self.states_and_districts
            .get(state)
            .map(|districts| districts.iter().map(String::as_str).collect())
    }

    /// The polygon for a specific district, used to materialize a
    /// geofence over it.
    #[must_use]
    pub fn district_polygon(&self, state: &str, district: &str) -> Option<&MultiPolygon<f64>> {
        self.regions
            .iter()
            .find(|entry| entry.region.state == state && entry.region.district == district)
            .map(|entry| &entry.polygon)
    }

    /// Number of indexed district polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.size()
    }

    /// Whether the index holds no polygons. Never true for a successfully
    /// loaded index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.size() == 0
    }
}

/// Extract the two-level region name from feature properties.
fn region_name(properties: Option<&geojson::JsonObject>) -> Option<RegionName> {
    let properties = properties?;
    let state = properties.get("NAME_1")?.as_str()?;
    let district = properties.get("NAME_2")?.as_str()?;
    if state.is_empty() || district.is_empty() {
        return None;
    }
    Some(RegionName {
        state: state.to_string(),
        district: district.to_string(),
    })
}

/// Convert a GeoJSON geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    use geo::BoundingRect;

    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
