//! Geographic helpers for averaged track points.
//!
//! All coordinates are WGS84 latitude/longitude in degrees, as produced by
//! the simulator's GPS channels.

use geo::{Distance, Haversine, Point};

use crate::TrackMapPoint;

/// Great-circle distance between two map points in meters.
///
/// # Example
/// ```
/// use track_mapper::{geo_utils, TrackMapPoint};
///
/// let a = TrackMapPoint::raw(0.0, 51.5074, -0.1278, 1); // London
/// let b = TrackMapPoint::raw(0.5, 48.8566, 2.3522, 1); // Paris
/// let dist = geo_utils::haversine_distance(&a, &b);
/// assert!((dist - 343_560.0).abs() < 5_000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &TrackMapPoint, p2: &TrackMapPoint) -> f64 {
    let point1 = Point::new(p1.lon, p1.lat);
    let point2 = Point::new(p2.lon, p2.lat);
    Haversine::distance(point1, point2)
}

/// Total length of the averaged centerline in meters.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point maps return 0.0.
pub fn polyline_length(points: &[TrackMapPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}
