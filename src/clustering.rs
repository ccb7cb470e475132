//! # Listing Clustering
//!
//! Groups nearby listings into clusters for the current zoom level.
//!
//! ## Algorithm
//! 1. Compute a distance threshold from the zoom: `2^(15 - zoom) * 100` meters
//! 2. Walk the listings in input order; each unvisited listing opens a new group
//! 3. Every later unvisited listing within the threshold of the group's first member joins it
//! 4. Each group becomes a [`Cluster`] whose centroid is the mean of its members
//!
//! Grouping is first-come: a listing belongs to the earliest unvisited listing (in
//! input order) that is close enough, so results are deterministic for a fixed order.
//!
//! This is O(n²) per call. `n` is one viewport's listing set (tens of points), and
//! the greedy semantics decide which listings end up together, so it is kept as is
//! rather than swapped for a grid or tree based method.

use log::debug;

use crate::geo_utils::{compute_center, distance_meters};
use crate::{GeoPoint, Property};

/// Configuration for the clustering policy.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Clustering only applies when there are more listings than this.
    /// Default: 5
    pub min_points: usize,

    /// Zoom level at and above which clustering is disabled.
    /// Default: 15.0
    pub disable_at_zoom: f64,

    /// Zoom levels added when a cluster marker is clicked.
    /// Default: 2.0
    pub zoom_increment: f64,

    /// Cap for the cluster click zoom. Default: 18.0
    pub max_zoom: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_points: 5,
            disable_at_zoom: 15.0,
            zoom_increment: 2.0,
            max_zoom: 18.0,
        }
    }
}

impl ClusterConfig {
    /// Whether a listing set of `count` points is clustered at `zoom`.
    pub fn should_cluster(&self, count: usize, zoom: f64, show_clusters: bool) -> bool {
        show_clusters && count > self.min_points && zoom < self.disable_at_zoom
    }

    /// Zoom requested when a cluster marker is clicked at `current_zoom`.
    pub fn expand_zoom(&self, current_zoom: f64) -> f64 {
        (current_zoom + self.zoom_increment).min(self.max_zoom)
    }
}

/// A group of nearby listings rendered as one marker.
///
/// Ephemeral: rebuilt whenever the zoom or the listing set changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Arithmetic mean of the members' coordinates
    pub centroid: GeoPoint,
    /// Never empty
    pub members: Vec<Property>,
}

impl Cluster {
    /// A degenerate cluster holding one listing.
    pub fn single(property: Property) -> Self {
        Self {
            centroid: property.coordinates,
            members: vec![property],
        }
    }

    /// Build a cluster from its members, computing the centroid.
    pub fn from_members(members: Vec<Property>) -> Self {
        let coords: Vec<GeoPoint> = members.iter().map(|p| p.coordinates).collect();
        Self {
            centroid: compute_center(&coords),
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }

    /// Registry key: the listing id for a single, otherwise `cluster:{first id}+{others}`.
    ///
    /// Every listing belongs to exactly one cluster, so distinct listing ids give distinct
    /// keys even when two centroids coincide.
    pub fn key(&self) -> String {
        match self.members.as_slice() {
            [only] => only.id.clone(),
            [first, rest @ ..] => format!("cluster:{}+{}", first.id, rest.len()),
            [] => String::from("cluster:empty"),
        }
    }
}

/// Grouping distance in meters for a zoom level.
///
/// Halves with every zoom level: 100 m at zoom 15, 3.2 km at zoom 10.
#[inline]
pub fn cluster_threshold_meters(zoom: f64) -> f64 {
    2f64.powf(15.0 - zoom) * 100.0
}

/// Group listings into clusters for a zoom level.
///
/// Always clusters; see [`build_clusters`] for the policy-aware entry point.
///
/// # Example
/// ```
/// use property_map::{cluster_properties, GeoPoint, ListingType, Property};
///
/// let listings: Vec<Property> = (0..3)
///     .map(|i| Property::new(
///         &format!("p{}", i),
///         GeoPoint::new(40.4168 + i as f64 * 0.0001, -3.7038),
///         300_000.0,
///         ListingType::Sale,
///     ))
///     .collect();
///
/// let clusters = cluster_properties(&listings, 10.0);
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusters[0].len(), 3);
/// ```
pub fn cluster_properties(points: &[Property], zoom: f64) -> Vec<Cluster> {
    let threshold = cluster_threshold_meters(zoom);
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let anchor = &points[i].coordinates;
        let mut members = vec![points[i].clone()];

        // Everything before i is already visited
        for j in (i + 1)..points.len() {
            if visited[j] {
                continue;
            }
            if distance_meters(anchor, &points[j].coordinates) <= threshold {
                visited[j] = true;
                members.push(points[j].clone());
            }
        }

        clusters.push(Cluster::from_members(members));
    }

    debug!(
        "[ClusterEngine] {} listings -> {} clusters at zoom {:.2} (threshold {:.0}m)",
        points.len(),
        clusters.len(),
        zoom,
        threshold
    );

    clusters
}

/// Apply the clustering policy, then cluster.
///
/// With clustering off, too few listings, or a zoom at/above the ceiling, every
/// listing becomes its own single-member cluster.
pub fn build_clusters(
    points: &[Property],
    zoom: f64,
    show_clusters: bool,
    config: &ClusterConfig,
) -> Vec<Cluster> {
    if config.should_cluster(points.len(), zoom, show_clusters) {
        cluster_properties(points, zoom)
    } else {
        points.iter().cloned().map(Cluster::single).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListingType;
    use std::collections::HashSet;

    fn listing(id: &str, lat: f64, lng: f64) -> Property {
        Property::new(id, GeoPoint::new(lat, lng), 250_000.0, ListingType::Sale)
    }

    /// Six listings within ~50 m of each other
    fn tight_group() -> Vec<Property> {
        (0..6)
            .map(|i| listing(&format!("p{}", i), 40.4168 + i as f64 * 0.00005, -3.7038))
            .collect()
    }

    /// Listings spread across a city at increasing distances
    fn spread() -> Vec<Property> {
        vec![
            listing("a", 40.4168, -3.7038),
            listing("b", 40.4170, -3.7040),
            listing("c", 40.4200, -3.7000),
            listing("d", 40.4300, -3.6900),
            listing("e", 40.4500, -3.6500),
            listing("f", 40.5000, -3.6000),
            listing("g", 40.6000, -3.5000),
            listing("h", 40.9000, -3.2000),
        ]
    }

    #[test]
    fn test_threshold_halves_per_zoom() {
        assert_eq!(cluster_threshold_meters(15.0), 100.0);
        assert_eq!(cluster_threshold_meters(10.0), 3200.0);
        assert_eq!(cluster_threshold_meters(16.0), 50.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_properties(&[], 10.0).is_empty());
    }

    #[test]
    fn test_tight_group_zoom_10_forms_one_cluster() {
        let clusters = build_clusters(&tight_group(), 10.0, true, &ClusterConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 6);
    }

    #[test]
    fn test_tight_group_above_ceiling_stays_single() {
        let clusters = build_clusters(&tight_group(), 17.0, true, &ClusterConfig::default());
        assert_eq!(clusters.len(), 6);
        assert!(clusters.iter().all(|c| c.is_single()));
    }

    #[test]
    fn test_clustering_disabled_by_toggle() {
        let clusters = build_clusters(&tight_group(), 10.0, false, &ClusterConfig::default());
        assert_eq!(clusters.len(), 6);
    }

    #[test]
    fn test_min_points_threshold() {
        let five: Vec<Property> = tight_group().into_iter().take(5).collect();
        let clusters = build_clusters(&five, 10.0, true, &ClusterConfig::default());
        assert_eq!(clusters.len(), 5);
    }

    #[test]
    fn test_cluster_count_never_increases_with_zoom() {
        let points = spread();
        let mut previous = 0;
        for step in 0..=36 {
            let zoom = 2.0 + step as f64 * 0.5;
            let count = cluster_properties(&points, zoom).len();
            assert!(
                count >= previous,
                "zoom {} gave {} clusters, fewer than {} at a lower zoom",
                zoom,
                count,
                previous
            );
            previous = count;
        }
    }

    #[test]
    fn test_clusters_partition_input() {
        let points = spread();
        for zoom in [5.0, 9.5, 12.0, 14.0] {
            let first = cluster_properties(&points, zoom);
            let second = cluster_properties(&points, zoom);

            let ids = |clusters: &[Cluster]| -> Vec<HashSet<String>> {
                clusters
                    .iter()
                    .map(|c| c.members.iter().map(|m| m.id.clone()).collect())
                    .collect()
            };
            assert_eq!(ids(&first), ids(&second));

            let total: usize = first.iter().map(|c| c.len()).sum();
            assert_eq!(total, points.len());

            let unique: HashSet<String> = first
                .iter()
                .flat_map(|c| c.members.iter().map(|m| m.id.clone()))
                .collect();
            assert_eq!(unique.len(), points.len());
        }
    }

    #[test]
    fn test_first_come_grouping() {
        // b is within range of both a and c; a comes first and claims it,
        // c is out of a's range and opens its own cluster
        let threshold = cluster_threshold_meters(14.0); // 200 m
        let step = threshold * 0.9 / 111_195.0;
        let points = vec![
            listing("a", 40.0, -3.0),
            listing("b", 40.0 + step, -3.0),
            listing("c", 40.0 + 2.0 * step, -3.0),
        ];

        let clusters = cluster_properties(&points, 14.0);
        assert_eq!(clusters.len(), 2);
        let first: Vec<&str> = clusters[0].members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(clusters[1].members[0].id, "c");
    }

    #[test]
    fn test_centroid_is_member_mean() {
        let points = vec![listing("a", 40.0, -3.0), listing("b", 40.001, -3.002)];
        let clusters = cluster_properties(&points, 10.0);
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].centroid.lat - 40.0005).abs() < 1e-9);
        assert!((clusters[0].centroid.lng + 3.001).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_keys() {
        let single = Cluster::single(listing("flat-7", 40.0, -3.0));
        assert_eq!(single.key(), "flat-7");

        let group = Cluster::from_members(vec![
            listing("a", 40.0, -3.0),
            listing("b", 40.00002, -3.0),
            listing("c", 40.00001, -3.0),
        ]);
        assert_eq!(group.key(), "cluster:a+2");
    }

    #[test]
    fn test_expand_zoom_is_capped() {
        let config = ClusterConfig::default();
        assert_eq!(config.expand_zoom(10.0), 12.0);
        assert_eq!(config.expand_zoom(17.5), 18.0);
    }
}
