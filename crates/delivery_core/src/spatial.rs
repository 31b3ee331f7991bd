//! Geospatial operations: great-circle distance, interpolation and an H3-backed
//! index of courier and restaurant positions.
//!
//! This module provides:
//!
//! - **GeoPoint**: latitude/longitude in degrees
//! - **Distance**: haversine distance on a sphere of radius 6371 km
//! - **Movement**: interpolation and "move towards" with snapping
//! - **SpatialIndex**: H3 cell → entity mappings for nearby queries
//!
//! The index uses resolution 7 (~1.4 km edge), coarse enough that a radius
//! query of a few kilometres touches only a few dozen cells. Exact distances are
//! always checked with haversine after the cell lookup.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use bevy_ecs::prelude::{Entity, Resource};
use h3o::{CellIndex, LatLng, Resolution};
use lru::LruCache;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Resolution of the spatial index.
pub const INDEX_RESOLUTION: Resolution = Resolution::Seven;

/// Largest grid ring ever queried; keeps pathological radii bounded.
const MAX_RING: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }

    /// H3 cell containing this point, or `None` for invalid coordinates.
    pub fn to_cell(&self, resolution: Resolution) -> Option<CellIndex> {
        LatLng::new(self.lat, self.lon)
            .ok()
            .map(|ll| ll.to_cell(resolution))
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// True when the two points are within `threshold_km` of each other.
pub fn is_near(a: GeoPoint, b: GeoPoint, threshold_km: f64) -> bool {
    haversine_km(a, b) <= threshold_km
}

/// Linear interpolation in lat/lon; `fraction` is clamped to [0, 1].
pub fn interpolate(from: GeoPoint, to: GeoPoint, fraction: f64) -> GeoPoint {
    let f = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    GeoPoint {
        lat: from.lat + (to.lat - from.lat) * f,
        lon: from.lon + (to.lon - from.lon) * f,
    }
}

/// Result of a single movement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveStep {
    pub position: GeoPoint,
    pub remaining_km: f64,
    pub arrived: bool,
}

/// Move `step_km` from `from` towards `to`. If the remaining distance is shorter
/// than the step the position snaps to `to`.
pub fn move_towards(from: GeoPoint, to: GeoPoint, step_km: f64) -> MoveStep {
    let total = haversine_km(from, to);
    let step_km = step_km.max(0.0);
    if total <= step_km || total <= f64::EPSILON {
        return MoveStep {
            position: to,
            remaining_km: 0.0,
            arrived: true,
        };
    }
    let position = interpolate(from, to, step_km / total);
    MoveStep {
        position,
        remaining_km: haversine_km(position, to),
        arrived: false,
    }
}

/// Grid ring size that covers `radius_km` at [INDEX_RESOLUTION].
pub fn ring_for_radius(radius_km: f64) -> u32 {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return 0;
    }
    let edge = INDEX_RESOLUTION.edge_length_km();
    ((radius_km / edge).ceil() as u32 + 1).min(MAX_RING)
}

/// Grid disk cache for repeated radius queries around static points (restaurants).
struct GridDiskCache {
    cache: Mutex<LruCache<(CellIndex, u32), Vec<CellIndex>>>,
}

impl GridDiskCache {
    fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(2_000).expect("cache size must be non-zero"),
            )),
        }
    }

    fn get_or_compute(&self, origin: CellIndex, k: u32) -> Vec<CellIndex> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => return origin.grid_disk::<Vec<_>>(k), // Fallback: compute without cache if mutex poisoned
        };
        cache
            .get_or_insert((origin, k), || origin.grid_disk::<Vec<_>>(k))
            .clone()
    }
}

static GRID_DISK_CACHE: OnceLock<GridDiskCache> = OnceLock::new();

/// Get grid disk with caching.
pub fn grid_disk_cached(origin: CellIndex, k: u32) -> Vec<CellIndex> {
    GRID_DISK_CACHE
        .get_or_init(GridDiskCache::new)
        .get_or_compute(origin, k)
}

/// Spatial index for courier and restaurant lookups by H3 cell.
///
/// Maintained incrementally: couriers are re-indexed whenever they move,
/// restaurants once at scenario build.
#[derive(Debug, Resource, Default)]
pub struct SpatialIndex {
    couriers_by_cell: HashMap<CellIndex, Vec<Entity>>,
    restaurants_by_cell: HashMap<CellIndex, Vec<Entity>>,
    courier_to_cell: HashMap<Entity, CellIndex>,
    restaurant_to_cell: HashMap<Entity, CellIndex>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_courier(&mut self, entity: Entity, location: GeoPoint) {
        let Some(cell) = location.to_cell(INDEX_RESOLUTION) else {
            return;
        };
        self.remove_courier(entity);
        self.couriers_by_cell.entry(cell).or_default().push(entity);
        self.courier_to_cell.insert(entity, cell);
    }

    pub fn insert_restaurant(&mut self, entity: Entity, location: GeoPoint) {
        let Some(cell) = location.to_cell(INDEX_RESOLUTION) else {
            return;
        };
        self.restaurants_by_cell.entry(cell).or_default().push(entity);
        self.restaurant_to_cell.insert(entity, cell);
    }

    pub fn remove_courier(&mut self, entity: Entity) {
        if let Some(cell) = self.courier_to_cell.remove(&entity) {
            if let Some(entities) = self.couriers_by_cell.get_mut(&cell) {
                entities.retain(|&e| e != entity);
                if entities.is_empty() {
                    self.couriers_by_cell.remove(&cell);
                }
            }
        }
    }

    /// Re-index a courier after it moved. Cheap when the cell did not change.
    pub fn update_courier_position(&mut self, entity: Entity, location: GeoPoint) {
        let Some(new_cell) = location.to_cell(INDEX_RESOLUTION) else {
            return;
        };
        if self.courier_to_cell.get(&entity) == Some(&new_cell) {
            return;
        }
        self.insert_courier(entity, location);
    }

    /// Couriers whose indexed cell lies within the ring covering `radius_km`.
    /// Callers still filter by exact distance.
    pub fn couriers_near(&self, center: GeoPoint, radius_km: f64) -> Vec<Entity> {
        Self::lookup(&self.couriers_by_cell, center, radius_km)
    }

    /// Restaurants whose indexed cell lies within the ring covering `radius_km`.
    pub fn restaurants_near(&self, center: GeoPoint, radius_km: f64) -> Vec<Entity> {
        Self::lookup(&self.restaurants_by_cell, center, radius_km)
    }

    pub fn courier_cell(&self, entity: Entity) -> Option<CellIndex> {
        self.courier_to_cell.get(&entity).copied()
    }

    pub fn courier_count(&self) -> usize {
        self.courier_to_cell.len()
    }

    pub fn restaurant_count(&self) -> usize {
        self.restaurant_to_cell.len()
    }

    pub fn clear(&mut self) {
        self.couriers_by_cell.clear();
        self.restaurants_by_cell.clear();
        self.courier_to_cell.clear();
        self.restaurant_to_cell.clear();
    }

    fn lookup(
        by_cell: &HashMap<CellIndex, Vec<Entity>>,
        center: GeoPoint,
        radius_km: f64,
    ) -> Vec<Entity> {
        let Some(origin) = center.to_cell(INDEX_RESOLUTION) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for cell in grid_disk_cached(origin, ring_for_radius(radius_km)) {
            if let Some(entities) = by_cell.get(&cell) {
                result.extend(entities.iter().copied());
            }
        }
        // Stable order keeps seeded runs reproducible.
        result.sort_unstable();
        result.dedup();
        result
    }
}
