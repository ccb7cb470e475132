//! Spatial queries over the listing set.
//!
//! An R-tree over listing coordinates answers viewport (bounding box) queries, and
//! prefilters drawn-area queries before the exact point-in-polygon test.

use geo::{Contains, Coord, LineString, Point, Polygon};
use rstar::{RTree, RTreeObject, AABB};

use crate::drawing::MIN_POLYGON_VERTICES;
use crate::{Bounds, GeoPoint, Property};

/// A listing position with its index into the source slice
#[derive(Debug, Clone, Copy)]
struct IndexedProperty {
    idx: usize,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedProperty {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// R-tree index of listing positions.
///
/// Queries return indices into the slice the index was built from, in ascending order.
#[derive(Debug, Default)]
pub struct PropertyIndex {
    tree: RTree<IndexedProperty>,
}

impl PropertyIndex {
    /// Index every listing with valid coordinates.
    pub fn new(properties: &[Property]) -> Self {
        let items: Vec<IndexedProperty> = properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.coordinates.is_valid())
            .map(|(idx, p)| IndexedProperty {
                idx,
                lng: p.coordinates.lng,
                lat: p.coordinates.lat,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Listings inside a bounding box (edges inclusive).
    pub fn within_bounds(&self, bounds: &Bounds) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Listings strictly inside a polygon given by its unclosed vertex list.
    ///
    /// Fewer than three vertices describe no area and match nothing.
    pub fn within_polygon(&self, vertices: &[GeoPoint]) -> Vec<usize> {
        if vertices.len() < MIN_POLYGON_VERTICES {
            return Vec::new();
        }

        let coords: Vec<Coord> = vertices.iter().map(|v| Coord { x: v.lng, y: v.lat }).collect();
        // Polygon::new closes the ring
        let polygon = Polygon::new(LineString::new(coords), vec![]);

        let bounds = crate::geo_utils::compute_bounds(vertices);
        let envelope = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|item| polygon.contains(&Point::new(item.lng, item.lat)))
            .map(|item| item.idx)
            .collect();
        hits.sort_unstable();
        hits
    }
}
