//! Marker registry.
//!
//! Owns every listing/cluster marker and its hover popup. Each reconcile disposes all
//! previously owned handles and rebuilds the full set, so a handle can never outlive
//! the entity it was created for.

use std::collections::HashMap;

use log::{debug, warn};

use crate::clustering::{Cluster, ClusterConfig};
use crate::geo_utils::format_price;
use crate::renderer::{MapRenderer, MarkerHandle, MarkerKind, MarkerSpec, PopupHandle, PopupSpec};
use crate::{GeoPoint, ListingType, Property};

const SALE_COLOR: &str = "#2563eb";
const RENT_COLOR: &str = "#16a34a";

/// What a registry entry draws: one listing or a group of them.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSpec {
    Single(Property),
    Cluster {
        centroid: GeoPoint,
        members: Vec<Property>,
    },
}

impl RenderSpec {
    /// A one-member cluster renders exactly like a bare listing.
    pub fn from_cluster(cluster: Cluster) -> Self {
        let Cluster { centroid, mut members } = cluster;
        if members.len() == 1 {
            RenderSpec::Single(members.remove(0))
        } else {
            RenderSpec::Cluster { centroid, members }
        }
    }

    pub fn position(&self) -> GeoPoint {
        match self {
            RenderSpec::Single(property) => property.coordinates,
            RenderSpec::Cluster { centroid, .. } => *centroid,
        }
    }

    /// Marker appearance: price label, colored by listing type or cluster size.
    pub fn marker_spec(&self) -> MarkerSpec {
        match self {
            RenderSpec::Single(property) => MarkerSpec {
                kind: MarkerKind::Property,
                position: property.coordinates,
                label: Some(format_price(property.price)),
                badge: None,
                color: listing_color(property.listing_type).to_string(),
                size: 0,
            },
            RenderSpec::Cluster { centroid, members } => {
                let (color, size) = cluster_style(members.len());
                MarkerSpec {
                    kind: MarkerKind::Cluster,
                    position: *centroid,
                    label: min_price(members).map(format_price),
                    badge: Some(members.len() as u32),
                    color: color.to_string(),
                    size,
                }
            }
        }
    }

    pub fn popup_spec(&self) -> PopupSpec {
        match self {
            RenderSpec::Single(property) => property_popup(property),
            RenderSpec::Cluster { members, .. } => {
                let mut lines = Vec::new();
                if let (Some(min), Some(max)) = (min_price(members), max_price(members)) {
                    if min == max {
                        lines.push(format_price(min));
                    } else {
                        lines.push(format!("{} – {}", format_price(min), format_price(max)));
                    }
                }
                lines.push("Click to zoom in".to_string());
                PopupSpec {
                    title: format!("{} properties", members.len()),
                    lines,
                    image_url: None,
                }
            }
        }
    }
}

fn listing_color(listing_type: ListingType) -> &'static str {
    match listing_type {
        ListingType::Sale => SALE_COLOR,
        ListingType::Rent => RENT_COLOR,
    }
}

/// (color, diameter) by member count
fn cluster_style(count: usize) -> (&'static str, u32) {
    match count {
        0..=9 => ("#3b82f6", 32),
        10..=49 => ("#f59e0b", 40),
        _ => ("#ef4444", 48),
    }
}

fn min_price(members: &[Property]) -> Option<f64> {
    members.iter().map(|p| p.price).reduce(f64::min)
}

fn max_price(members: &[Property]) -> Option<f64> {
    members.iter().map(|p| p.price).reduce(f64::max)
}

fn property_popup(property: &Property) -> PopupSpec {
    let title = property
        .address
        .clone()
        .or_else(|| property.property_type.clone())
        .unwrap_or_else(|| "Property".to_string());

    let price = match property.listing_type {
        ListingType::Sale => format!("{} · For sale", format_price(property.price)),
        ListingType::Rent => format!("{}/mo · For rent", format_price(property.price)),
    };

    let mut details = Vec::new();
    if let Some(beds) = property.beds {
        details.push(format!("{} bd", beds));
    }
    if let Some(baths) = property.baths {
        details.push(format!("{} ba", baths));
    }
    if let Some(area) = &property.area_label {
        details.push(area.clone());
    }

    let mut lines = vec![price];
    if !details.is_empty() {
        lines.push(details.join(" · "));
    }

    PopupSpec {
        title,
        lines,
        image_url: property.images.first().cloned(),
    }
}

/// Registry input for a set of clusters.
pub fn entries_for(clusters: Vec<Cluster>) -> Vec<(String, RenderSpec)> {
    clusters
        .into_iter()
        .map(|cluster| (cluster.key(), RenderSpec::from_cluster(cluster)))
        .collect()
}

/// What clicking a marker asks the host/map to do.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerAction {
    SelectProperty(String),
    ZoomTo { center: GeoPoint, zoom: f64 },
}

/// A live marker owned by the registry.
#[derive(Debug, Clone)]
pub struct MarkerEntry {
    pub key: String,
    pub handle: MarkerHandle,
    pub popup_handle: PopupHandle,
    pub spec: RenderSpec,
}

/// Owns the mapping from listing id / cluster key to on-map handles.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: HashMap<String, MarkerEntry>,
    reconcile_count: u64,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispose every owned handle, then create the full new entry set.
    ///
    /// A key repeated in `entries` keeps only its last spec.
    pub fn reconcile<R: MapRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        entries: Vec<(String, RenderSpec)>,
    ) {
        let disposed = self.clear(renderer);

        for (key, spec) in entries {
            if let Some(previous) = self.entries.remove(&key) {
                warn!("[MarkerRegistry] duplicate key '{}', keeping the last entry", key);
                Self::dispose(renderer, &previous);
            }

            let handle = renderer.add_marker(&spec.marker_spec());
            let popup_handle = renderer.attach_popup(handle, &spec.popup_spec());
            self.entries.insert(
                key.clone(),
                MarkerEntry {
                    key,
                    handle,
                    popup_handle,
                    spec,
                },
            );
        }

        self.reconcile_count += 1;
        debug!(
            "[MarkerRegistry] reconcile #{}: disposed {}, created {}",
            self.reconcile_count,
            disposed,
            self.entries.len()
        );
    }

    /// Dispose every owned handle. Returns how many entries were removed.
    pub fn clear<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            Self::dispose(renderer, &entry);
        }
        count
    }

    fn dispose<R: MapRenderer + ?Sized>(renderer: &mut R, entry: &MarkerEntry) {
        renderer.remove_popup(entry.popup_handle);
        renderer.remove_marker(entry.handle);
    }

    /// Pointer entered a marker: open its popup.
    pub fn pointer_enter<R: MapRenderer + ?Sized>(&self, renderer: &mut R, key: &str) -> bool {
        self.set_popup(renderer, key, true)
    }

    /// Pointer left a marker: close its popup.
    pub fn pointer_leave<R: MapRenderer + ?Sized>(&self, renderer: &mut R, key: &str) -> bool {
        self.set_popup(renderer, key, false)
    }

    fn set_popup<R: MapRenderer + ?Sized>(&self, renderer: &mut R, key: &str, open: bool) -> bool {
        match self.entries.get(key) {
            Some(entry) => {
                renderer.set_popup_open(entry.popup_handle, open);
                true
            }
            None => false,
        }
    }

    /// Resolve a click on the marker with `key`.
    pub fn click(
        &self,
        key: &str,
        current_zoom: f64,
        config: &ClusterConfig,
    ) -> Option<MarkerAction> {
        let entry = self.entries.get(key)?;
        Some(match &entry.spec {
            RenderSpec::Single(property) => MarkerAction::SelectProperty(property.id.clone()),
            RenderSpec::Cluster { centroid, .. } => MarkerAction::ZoomTo {
                center: *centroid,
                zoom: config.expand_zoom(current_zoom),
            },
        })
    }

    pub fn get(&self, key: &str) -> Option<&MarkerEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Number of reconcile calls so far.
    pub fn reconcile_count(&self) -> u64 {
        self.reconcile_count
    }
}
