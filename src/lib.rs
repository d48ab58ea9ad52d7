//! # Track Mapper
//!
//! Track map generation from recorded racing telemetry.
//!
//! This library turns a session's noisy per-sample GPS telemetry into a
//! compact, ordered outline of the circuit:
//! - quantizes each lap's samples into fixed-resolution buckets
//! - averages every bucket into a single (lat, lon) point
//! - merges captures from multiple sessions of the same circuit
//! - optionally rescales the result into a unit square for rendering
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel directory scanning with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use track_mapper::source::{MemoryTelemetry, Sample, SessionInfo};
//! use track_mapper::{generate_from_source, MapConfig};
//!
//! let session = SessionInfo {
//!     track_id: 127,
//!     track_name: "Watkins Glen".to_string(),
//! };
//! let samples: Vec<Sample> = (0..100)
//!     .map(|i| {
//!         let pct = f64::from(i) / 100.0;
//!         Sample::from_params([
//!             ("Lap", 1.0),
//!             ("Lat", 42.33 + (pct * 6.28).sin() * 0.01),
//!             ("Lon", -76.92 + (pct * 6.28).cos() * 0.01),
//!             ("LapDistPct", pct),
//!             ("IsOnTrackCar", 1.0),
//!         ])
//!     })
//!     .collect();
//!
//! let mut source = MemoryTelemetry::new(session, samples);
//! let map = generate_from_source(&mut source, &MapConfig::default()).unwrap();
//!
//! assert_eq!(map.total_laps, 1);
//! assert!(!map.map.is_empty());
//! ```

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackMapError};

// Telemetry source boundary (Sample / TelemetrySource / SourceLoader)
pub mod source;
pub use source::{
    JsonlLoader, JsonlTelemetry, MemoryTelemetry, Sample, SessionInfo, SourceLoader,
    TelemetrySource,
};

// Resolution bucketing and bucket aggregation
mod aggregate;
use aggregate::BucketGrid;

// Geographic utilities (distance, centerline length)
pub mod geo_utils;

// Unit-square normalization
pub mod normalize;
pub use normalize::normalize_points;

// Directory scanning and multi-source merging
pub mod scan;
pub use scan::{generate_from_latest, scan_track_maps, scan_track_maps_with_config};

// ============================================================================
// Core Types
// ============================================================================

/// One observation extracted from a telemetry sample.
///
/// Points are transient: they flow through the pipeline and are discarded
/// once folded into a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// Lap number the sample was recorded on.
    pub lap: i32,
    /// Fractional distance around the lap, expected in [0,1) but not
    /// guaranteed by the simulator.
    pub track_position_pct: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Whether the car was actively driving the circuit. Off-track samples
    /// (pit lane, spins, resets) never contribute to the map.
    pub on_track: bool,
}

impl TrackPoint {
    /// Extract a point from a raw sample.
    ///
    /// `on_track` is true exactly when `IsOnTrackCar == 1`.
    ///
    /// # Errors
    /// Returns [`TrackMapError::MissingParam`] if any of the five required
    /// channels is absent, which rejects the whole containing stream.
    pub fn from_sample(sample: &Sample) -> Result<Self> {
        Ok(Self {
            lap: sample.require(source::PARAM_LAP)? as i32,
            latitude: sample.require(source::PARAM_LAT)?,
            longitude: sample.require(source::PARAM_LON)?,
            track_position_pct: sample.require(source::PARAM_LAP_DIST_PCT)?,
            on_track: sample.require(source::PARAM_IS_ON_TRACK)? == 1.0,
        })
    }
}

/// A track point tagged with the circuit it was recorded on.
///
/// Only used in multi-file merge mode, where points from many captures are
/// combined into one stream before grouping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackIdPoint {
    pub track_id: u32,
    pub point: TrackPoint,
}

/// How an averaged bucket reports its position around the lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketPosition {
    /// `bucket_index / resolution`: deterministic, independent of where the
    /// samples actually fell inside the bucket.
    Nominal,
    /// Mean of the observed positions folded into the bucket; follows the
    /// true sample centroid under uneven densities. Default.
    Observed,
}

/// What to do with positions at or beyond 1.0, whose bucket index lands at
/// or past `resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOverflow {
    /// Keep the overflow index as a valid extra bucket. Default.
    Retain,
    /// Fold the overflow into the last regular bucket.
    Clamp,
}

/// Configuration for map generation.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Number of buckets spanning the [0,1) position range. More buckets =
    /// more detailed map. Must be > 0.
    pub resolution: u32,
    /// Bucket position policy; see [`BucketPosition`].
    pub bucket_position: BucketPosition,
    /// Bucket overflow policy; see [`BucketOverflow`].
    pub overflow: BucketOverflow,
    /// Rescale coordinates into the unit square after sorting.
    pub normalize: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: 500,
            bucket_position: BucketPosition::Observed,
            overflow: BucketOverflow::Retain,
            normalize: false,
        }
    }
}

/// One averaged point of the finished map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMapPoint {
    /// Position around the lap this point represents.
    pub track_position_pct: f64,
    /// Mean latitude of the samples in this bucket.
    pub lat: f64,
    /// Mean longitude of the samples in this bucket.
    pub lon: f64,
    /// Number of samples averaged into this point; always >= 1.
    pub samples: u32,
    /// Unit-square coordinate, present only after normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Unit-square coordinate, present only after normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl TrackMapPoint {
    /// A raw (not yet normalized) map point.
    pub fn raw(track_position_pct: f64, lat: f64, lon: f64, samples: u32) -> Self {
        Self {
            track_position_pct,
            lat,
            lon,
            samples,
            x: None,
            y: None,
        }
    }
}

/// Bounding box of an averaged map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Compute the bounding box of a map. Returns `None` for empty input.
    pub fn from_points(points: &[TrackMapPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lon = min_lon.min(p.lon);
            max_lon = max_lon.max(p.lon);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Midpoint of the box as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn lat_range(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_range(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

/// The finished artifact: an ordered outline of one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMap {
    /// Circuit key the map was built from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u32>,
    /// Count of distinct laps observed, in single-file mode. Maps merged
    /// from multiple sessions report the sentinel `0`: lap numbers are not
    /// comparable across sessions.
    pub total_laps: u32,
    /// Averaged points, ascending by `track_position_pct`.
    pub map: Vec<TrackMapPoint>,
}

impl TrackMap {
    /// Total number of telemetry samples folded into the map.
    pub fn total_samples(&self) -> u64 {
        self.map.iter().map(|p| u64::from(p.samples)).sum()
    }

    /// Serialize the map as JSON to `path`.
    ///
    /// # Errors
    /// Returns [`TrackMapError::Source`] if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).map_err(|e| TrackMapError::Source {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?;
        fs::write(path, json).map_err(|source| TrackMapError::Source {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the aggregation pipeline over one already-open telemetry source.
///
/// The filtered on-track stream is buffered once; lap counting and bucket
/// aggregation both derive from that buffer, so the source is read exactly
/// one time.
///
/// # Errors
/// - [`TrackMapError::MissingParam`] if a sample violates the data contract.
/// - [`TrackMapError::EmptyMap`] if no on-track samples exist (the car
///   never left the pit lane).
/// - [`TrackMapError::DegenerateTrack`] if normalization is requested and
///   the map has no spatial extent.
pub fn generate_from_source(
    source: &mut dyn TelemetrySource,
    config: &MapConfig,
) -> Result<TrackMap> {
    let session = source.session().clone();

    let mut points: Vec<TrackPoint> = Vec::new();
    for sample in source.samples() {
        let point = TrackPoint::from_sample(&sample?)?;
        if point.on_track {
            points.push(point);
        }
    }

    if points.is_empty() {
        return Err(TrackMapError::EmptyMap);
    }

    let total_laps = aggregate::count_laps(&points);

    let mut grid = BucketGrid::new(config.resolution, config.overflow);
    for point in &points {
        grid.add_point(point);
    }
    let mut map = grid.build(config.bucket_position);

    if config.normalize {
        normalize_points(&mut map)?;
    }

    debug!(
        "[TrackMapper] track {} ({}): {} on-track samples over {} lap(s) -> {} map points, ~{:.0}m centerline",
        session.track_id,
        session.track_name,
        points.len(),
        total_laps,
        map.len(),
        geo_utils::polyline_length(&map)
    );

    Ok(TrackMap {
        track_id: Some(session.track_id),
        total_laps,
        map,
    })
}

/// Generate a track map from a single telemetry file.
///
/// `resolution` is the number of buckets used to define the map (more
/// resolution = more detailed map); `normalize` rescales the averaged
/// coordinates into the unit square.
///
/// # Errors
/// Propagates loader open/parse failures and every pipeline error from
/// [`generate_from_source`].
pub fn generate_from_file<L: SourceLoader>(
    loader: &L,
    path: &Path,
    resolution: u32,
    normalize: bool,
) -> Result<TrackMap> {
    let config = MapConfig {
        resolution,
        normalize,
        ..MapConfig::default()
    };
    generate_from_file_with_config(loader, path, &config)
}

/// Generate a track map from a single telemetry file with full control over
/// bucketing and normalization.
///
/// # Errors
/// See [`generate_from_file`].
pub fn generate_from_file_with_config<L: SourceLoader>(
    loader: &L,
    path: &Path,
    config: &MapConfig,
) -> Result<TrackMap> {
    info!("[TrackMapper] generating map from {}", path.display());
    let mut source = loader.open(path)?;
    generate_from_source(source.as_mut(), config)
}

// ============================================================================
// Tests
// ============================================================================
