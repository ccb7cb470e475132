//! # Geographic Utilities
//!
//! Distance, bounding and formatting helpers shared by the clustering, marker and
//! spatial modules.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_meters`] | Great-circle distance between two points |
//! | [`format_price`] | Compact price label (`1.2M`, `850k`) |
//! | [`compute_bounds`] | Bounding box of a point set |
//! | [`compute_center`] | Arithmetic-mean centroid of a point set |
//!
//! ## Example
//!
//! ```rust
//! use property_map::{GeoPoint, geo_utils};
//!
//! let madrid = GeoPoint::new(40.4168, -3.7038);
//! let barcelona = GeoPoint::new(41.3874, 2.1686);
//!
//! let dist = geo_utils::distance_meters(&madrid, &barcelona);
//! assert!((dist - 505_000.0).abs() < 5_000.0);
//!
//! assert_eq!(geo_utils::format_price(1_260_000.0), "1.3M");
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a spherical Earth of radius 6,371,000 m. The
//! clustering thresholds are expressed against that radius, so it is fixed here rather
//! than taken from an ellipsoid model.

use crate::{Bounds, GeoPoint};

/// Spherical Earth radius used by [`distance_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in meters between two points (haversine).
///
/// Symmetric, and zero exactly when both points are equal.
///
/// # Example
///
/// ```rust
/// use property_map::{GeoPoint, geo_utils};
///
/// let a = GeoPoint::new(0.0, 0.0);
/// let b = GeoPoint::new(1.0, 0.0);
///
/// // One degree of latitude
/// let distance = geo_utils::distance_meters(&a, &b);
/// assert!((distance - 111_195.0).abs() < 1.0);
/// ```
#[inline]
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

// =============================================================================
// Formatting
// =============================================================================

/// Abbreviate a price for a marker label.
///
/// `B`/`M`/`k` suffixes at the 1e9/1e6/1e3 thresholds, one decimal place, with a
/// trailing `.0` stripped. Prices under 1,000 are printed whole.
///
/// ```rust
/// use property_map::geo_utils::format_price;
///
/// assert_eq!(format_price(2_000_000_000.0), "2B");
/// assert_eq!(format_price(1_500_000.0), "1.5M");
/// assert_eq!(format_price(950.0), "950");
/// ```
pub fn format_price(price: f64) -> String {
    let (value, suffix) = if price >= 1e9 {
        (price / 1e9, "B")
    } else if price >= 1e6 {
        (price / 1e6, "M")
    } else if price >= 1e3 {
        (price / 1e3, "k")
    } else {
        return format!("{}", price.round());
    };

    let formatted = format!("{:.1}", value);
    let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{}{}", trimmed, suffix)
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Bounding box of a set of points.
///
/// For an empty slice the result is inverted (min > max) and contains nothing; use
/// [`Bounds::from_points`] when emptiness must be handled explicitly.
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lng = min_lng.min(p.lng);
        max_lng = max_lng.max(p.lng);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Arithmetic mean of the points' coordinates.
///
/// Returns (0, 0) for an empty slice.
pub fn compute_center(points: &[GeoPoint]) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.lat).sum();
    let sum_lng: f64 = points.iter().map(|p| p.lng).sum();
    let n = points.len() as f64;

    GeoPoint::new(sum_lat / n, sum_lng / n)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_distance_same_point() {
        let p = GeoPoint::new(40.4168, -3.7038);
        assert_eq!(distance_meters(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        let madrid = GeoPoint::new(40.4168, -3.7038);
        let barcelona = GeoPoint::new(41.3874, 2.1686);
        let dist = distance_meters(&madrid, &barcelona);
        assert!(approx_eq(dist, 505_096.0, 100.0));
    }

    #[test]
    fn test_distance_symmetric() {
        let a = GeoPoint::new(40.0, -3.0);
        let b = GeoPoint::new(40.1, -3.2);
        assert!(approx_eq(distance_meters(&a, &b), distance_meters(&b, &a), 1e-9));
    }

    #[test]
    fn test_distance_triangle_inequality() {
        let a = GeoPoint::new(40.0, -3.0);
        let b = GeoPoint::new(40.5, -2.0);
        let c = GeoPoint::new(41.0, -3.5);
        let ab = distance_meters(&a, &b);
        let bc = distance_meters(&b, &c);
        let ac = distance_meters(&a, &c);
        assert!(ac <= ab + bc + 1e-6);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        // 1 degree of latitude on a 6,371 km sphere is ~111.195 km
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        assert!(approx_eq(distance_meters(&a, &b), 111_194.9, 1.0));
    }

    #[test]
    fn test_format_price_suffixes() {
        assert_eq!(format_price(0.0), "0");
        assert_eq!(format_price(999.0), "999");
        assert_eq!(format_price(1_000.0), "1k");
        assert_eq!(format_price(1_260.0), "1.3k");
        assert_eq!(format_price(850_000.0), "850k");
        assert_eq!(format_price(1_000_000.0), "1M");
        assert_eq!(format_price(2_460_000.0), "2.5M");
        assert_eq!(format_price(3_000_000_000.0), "3B");
    }

    #[test]
    fn test_compute_bounds() {
        let points = vec![
            GeoPoint::new(40.42, -3.71),
            GeoPoint::new(40.40, -3.69),
            GeoPoint::new(40.41, -3.70),
        ];
        let bounds = compute_bounds(&points);
        assert_eq!(bounds.min_lat, 40.40);
        assert_eq!(bounds.max_lat, 40.42);
        assert_eq!(bounds.min_lng, -3.71);
        assert_eq!(bounds.max_lng, -3.69);
    }

    #[test]
    fn test_compute_center() {
        let points = vec![
            GeoPoint::new(40.40, -3.68),
            GeoPoint::new(40.44, -3.72),
        ];
        let center = compute_center(&points);
        assert!(approx_eq(center.lat, 40.42, 0.001));
        assert!(approx_eq(center.lng, -3.70, 0.001));
    }

    #[test]
    fn test_compute_center_empty() {
        let center = compute_center(&[]);
        assert_eq!(center.lat, 0.0);
        assert_eq!(center.lng, 0.0);
    }
}
