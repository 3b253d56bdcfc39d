//! # Spot Store
//!
//! Ordered, in-memory collection of WiFi spots. Spots are appended, never
//! deleted; a record only changes by full replacement.
//!
//! Seed spots are fixed templates ([`SEED_SPOTS`]). Each template knows its
//! resting position and its offset from the user, so repositioning them after
//! a geolocation fix never touches spots the user created.

use log::debug;
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

use crate::spot::{SpotDraft, SpotId, WifiSpot};
use crate::{Bounds, LatLng};

/// A demo spot that is placed relative to the user once a fix is known.
#[derive(Debug, Clone, Copy)]
pub struct SeedSpot {
    pub id: SpotId,
    pub name: &'static str,
    pub speed: &'static str,
    pub is_free: bool,
    pub rating: f64,
    pub reviews: u32,
    /// Position before any fix
    pub resting: LatLng,
    /// (dlat, dlng) from the user's position
    pub offset: (f64, f64),
}

impl SeedSpot {
    fn at(&self, position: LatLng) -> WifiSpot {
        WifiSpot {
            id: self.id,
            name: self.name.to_string(),
            speed: self.speed.to_string(),
            is_free: self.is_free,
            rating: self.rating,
            reviews: self.reviews,
            lat: position.lat,
            lng: position.lng,
        }
    }

    /// Record at the resting position.
    pub fn resting_spot(&self) -> WifiSpot {
        self.at(self.resting)
    }

    /// Record placed relative to a fix.
    pub fn spot_near(&self, fix: LatLng) -> WifiSpot {
        self.at(fix.offset(self.offset.0, self.offset.1))
    }
}

pub const SEED_SPOTS: [SeedSpot; 3] = [
    SeedSpot {
        id: 1,
        name: "Coffee Shop WiFi",
        speed: "50 Mbps",
        is_free: true,
        rating: 4.5,
        reviews: 120,
        resting: LatLng {
            lat: 34.052235,
            lng: -118.243683,
        },
        offset: (0.004, 0.01),
    },
    SeedSpot {
        id: 2,
        name: "Library Connection",
        speed: "20 Mbps",
        is_free: true,
        rating: 4.0,
        reviews: 78,
        resting: LatLng {
            lat: 34.056235,
            lng: -118.253683,
        },
        offset: (-0.002, -0.01),
    },
    SeedSpot {
        id: 3,
        name: "Hotel Lobby",
        speed: "100 Mbps",
        is_free: false,
        rating: 4.8,
        reviews: 45,
        resting: LatLng {
            lat: 34.048235,
            lng: -118.233683,
        },
        offset: (0.001, 0.005),
    },
];

/// Point entry in the spatial index, keyed as [lng, lat].
type IndexedSpot = GeomWithData<[f64; 2], SpotId>;

pub struct SpotStore {
    spots: Vec<WifiSpot>,
    last_id: SpotId,

    // Spatial index for viewport queries, rebuilt lazily
    spatial_index: RTree<IndexedSpot>,
    spatial_dirty: bool,
}

impl SpotStore {
    /// Store holding the seed spots at their resting positions.
    pub fn new() -> Self {
        let mut store = Self::empty();
        for seed in &SEED_SPOTS {
            store.insert(seed.resting_spot());
        }
        store
    }

    /// Store with no spots at all.
    pub fn empty() -> Self {
        Self {
            spots: Vec::new(),
            last_id: 0,
            spatial_index: RTree::new(),
            spatial_dirty: false,
        }
    }

    /// All spots in insertion order.
    pub fn list(&self) -> &[WifiSpot] {
        &self.spots
    }

    pub fn get(&self, id: SpotId) -> Option<&WifiSpot> {
        self.spots.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Append a record; a record with an existing id replaces it in place.
    pub fn insert(&mut self, spot: WifiSpot) {
        self.last_id = self.last_id.max(spot.id);
        match self.spots.iter_mut().find(|s| s.id == spot.id) {
            Some(existing) => *existing = spot,
            None => self.spots.push(spot),
        }
        self.spatial_dirty = true;
    }

    /// Create a spot from a draft with a fresh id and return a copy of it.
    pub fn create(&mut self, draft: SpotDraft, speed_unit: &str) -> WifiSpot {
        let id = self.next_id();
        let spot = draft.into_spot(id, speed_unit);
        debug!("[SpotStore] Created spot {} '{}'", spot.id, spot.name);
        self.insert(spot.clone());
        spot
    }

    /// Current time in milliseconds, bumped past the last id handed out.
    fn next_id(&self) -> SpotId {
        let now = chrono::Utc::now().timestamp_millis();
        now.max(self.last_id + 1)
    }

    /// Move the seed spots next to a new fix. User-created spots stay put.
    pub fn relocate_seeds(&mut self, fix: LatLng) {
        for seed in &SEED_SPOTS {
            self.insert(seed.spot_near(fix));
        }
    }

    // ========================================================================
    // Spatial Queries
    // ========================================================================

    fn ensure_spatial_index(&mut self) {
        if !self.spatial_dirty {
            return;
        }

        let entries: Vec<IndexedSpot> = self
            .spots
            .iter()
            .filter(|s| s.position().is_valid())
            .map(|s| GeomWithData::new([s.lng, s.lat], s.id))
            .collect();

        self.spatial_index = RTree::bulk_load(entries);
        self.spatial_dirty = false;
    }

    /// Ids of spots inside the bounds, in insertion order.
    pub fn ids_in_bounds(&mut self, bounds: &Bounds) -> Vec<SpotId> {
        self.ensure_spatial_index();

        let envelope = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );

        let mut found: Vec<SpotId> = self
            .spatial_index
            .locate_in_envelope(&envelope)
            .map(|entry| entry.data)
            .collect();

        // R-tree order is arbitrary
        found.sort_by_key(|id| self.spots.iter().position(|s| s.id == *id));
        found
    }

    /// Spot closest to a point (planar degrees, good enough at city scale).
    pub fn nearest(&mut self, point: LatLng) -> Option<&WifiSpot> {
        self.ensure_spatial_index();
        let id = self.spatial_index.nearest_neighbor(&[point.lng, point.lat])?.data;
        self.get(id)
    }
}

impl Default for SpotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: LatLng, lat: f64, lng: f64) {
        assert!((actual.lat - lat).abs() < 1e-9, "lat {} != {}", actual.lat, lat);
        assert!((actual.lng - lng).abs() < 1e-9, "lng {} != {}", actual.lng, lng);
    }

    #[test]
    fn test_seeded_store() {
        let store = SpotStore::new();
        assert_eq!(store.len(), 3);
        let names: Vec<&str> = store.list().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Coffee Shop WiFi", "Library Connection", "Hotel Lobby"]
        );
        assert_close(store.get(1).unwrap().position(), 34.052235, -118.243683);
        assert!(!store.get(3).unwrap().is_free);
    }

    #[test]
    fn test_relocate_seeds() {
        let mut store = SpotStore::new();
        store.relocate_seeds(LatLng::new(10.0, 20.0));

        assert_eq!(store.len(), 3);
        assert_close(store.get(1).unwrap().position(), 10.004, 20.01);
        assert_close(store.get(2).unwrap().position(), 9.998, 19.99);
        assert_close(store.get(3).unwrap().position(), 10.001, 20.005);
        // Order and metadata preserved
        assert_eq!(store.list()[0].id, 1);
        assert_eq!(store.get(2).unwrap().reviews, 78);
    }

    #[test]
    fn test_relocate_keeps_user_spots() {
        let mut store = SpotStore::new();
        let draft = SpotDraft {
            name: "Mine".to_string(),
            speed: "10".to_string(),
            lat: 1.0,
            lng: 1.0,
            ..SpotDraft::default()
        };
        let created = store.create(draft, "Mbps");
        store.relocate_seeds(LatLng::new(50.0, 8.0));

        assert_eq!(store.len(), 4);
        assert_eq!(store.get(created.id).unwrap().position(), LatLng::new(1.0, 1.0));
    }

    #[test]
    fn test_create_assigns_unique_ids() {
        let mut store = SpotStore::new();
        let a = store.create(SpotDraft::default(), "Mbps");
        let b = store.create(SpotDraft::default(), "Mbps");
        assert_ne!(a.id, b.id);
        assert!(b.id > a.id);
        assert!(a.id > 3);
        assert_eq!(store.len(), 5);
        assert_eq!(store.list().last().unwrap().id, b.id);
    }

    #[test]
    fn test_viewport_query() {
        let mut store = SpotStore::new();
        store.relocate_seeds(LatLng::new(10.0, 20.0));

        // Only the coffee shop sits at lng > 20.008
        let ids = store.ids_in_bounds(&Bounds {
            min_lat: 9.0,
            max_lat: 11.0,
            min_lng: 20.008,
            max_lng: 21.0,
        });
        assert_eq!(ids, vec![1]);

        let ids = store.ids_in_bounds(&Bounds::around(LatLng::new(10.0, 20.0), 0.5));
        assert_eq!(ids, vec![1, 2, 3]);

        let ids = store.ids_in_bounds(&Bounds::around(LatLng::new(-40.0, 100.0), 0.5));
        assert!(ids.is_empty());
    }

    #[test]
    fn test_index_refreshes_after_insert() {
        let mut store = SpotStore::new();
        let far = Bounds::around(LatLng::new(-33.86, 151.2), 0.1);
        assert!(store.ids_in_bounds(&far).is_empty());

        let created = store.create(
            SpotDraft {
                name: "Harbour".to_string(),
                speed: "40".to_string(),
                lat: -33.86,
                lng: 151.2,
                ..SpotDraft::default()
            },
            "Mbps",
        );
        assert_eq!(store.ids_in_bounds(&far), vec![created.id]);
        assert_eq!(store.nearest(LatLng::new(-33.0, 150.0)).unwrap().id, created.id);
    }
}
