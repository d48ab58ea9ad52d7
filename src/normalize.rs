//! Unit-square normalization of averaged track points.
//!
//! Rescales raw GPS coordinates into [0,1] x [0,1] for rendering. Both axes
//! share a single scale (the larger of the two coordinate ranges), so the
//! rendered shape keeps the aspect ratio of the original trace; the shorter
//! axis is centered inside the square.

use crate::error::{Result, TrackMapError};
use crate::{Bounds, TrackMapPoint};

/// Fill in the `x`/`y` unit-square coordinates of every point in place.
///
/// `y` grows with latitude (north is up) and `x` with longitude. Raw
/// `lat`/`lon` values are left untouched so consumers keep access to both
/// coordinate spaces.
///
/// # Errors
/// Returns [`TrackMapError::DegenerateTrack`] when the bounding box has zero
/// extent on both axes (for example a single-point map); emitting NaN or
/// infinite coordinates is never an option.
///
/// # Example
/// ```
/// use track_mapper::{normalize_points, TrackMapPoint};
///
/// let mut map = vec![
///     TrackMapPoint::raw(0.0, 42.0, -76.0, 3),
///     TrackMapPoint::raw(0.5, 42.1, -76.1, 4),
/// ];
/// normalize_points(&mut map).unwrap();
/// assert!(map.iter().all(|p| p.x.is_some() && p.y.is_some()));
/// ```
pub fn normalize_points(points: &mut [TrackMapPoint]) -> Result<()> {
    let bounds = Bounds::from_points(points)
        .ok_or(TrackMapError::DegenerateTrack { points: 0 })?;

    let scale = bounds.lat_range().max(bounds.lon_range());
    if scale <= 0.0 || !scale.is_finite() {
        return Err(TrackMapError::DegenerateTrack {
            points: points.len(),
        });
    }

    let (lat_center, lon_center) = bounds.center();
    for point in points.iter_mut() {
        point.y = Some((point.lat - lat_center) / scale + 0.5);
        point.x = Some((point.lon - lon_center) / scale + 0.5);
    }

    Ok(())
}
