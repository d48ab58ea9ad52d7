//! Resolution bucketing and bucket aggregation.
//!
//! On-track points are quantized into `resolution` buckets spanning the
//! [0,1) track-position range. Each bucket keeps running sums (count, Σlat,
//! Σlon, Σposition) and is reduced to a single averaged map point once the
//! stream is exhausted. The grid is sparse: a bucket that receives no points
//! is never materialized, so averaging cannot divide by zero.

use std::collections::{HashMap, HashSet};

use crate::{BucketOverflow, BucketPosition, TrackMapPoint, TrackPoint};

/// Running sums for one bucket.
#[derive(Debug, Clone, Default)]
struct BucketAccumulator {
    sample_count: u32,
    sum_lat: f64,
    sum_lon: f64,
    sum_position_pct: f64,
}

impl BucketAccumulator {
    fn add(&mut self, point: &TrackPoint) {
        self.sample_count += 1;
        self.sum_lat += point.latitude;
        self.sum_lon += point.longitude;
        self.sum_position_pct += point.track_position_pct;
    }

    fn merge(&mut self, other: &BucketAccumulator) {
        self.sample_count += other.sample_count;
        self.sum_lat += other.sum_lat;
        self.sum_lon += other.sum_lon;
        self.sum_position_pct += other.sum_position_pct;
    }
}

/// Sparse accumulator grid over the track-position range.
///
/// Accumulation is a plain fold with a single owner; when sources are
/// processed concurrently, each worker fills its own grid and the partial
/// grids are combined with [`merge`](BucketGrid::merge) afterward.
#[derive(Debug)]
pub(crate) struct BucketGrid {
    resolution: u32,
    overflow: BucketOverflow,
    buckets: HashMap<u32, BucketAccumulator>,
}

impl BucketGrid {
    /// `resolution` is the number of buckets spanning [0,1); must be > 0.
    pub(crate) fn new(resolution: u32, overflow: BucketOverflow) -> Self {
        Self {
            resolution,
            overflow,
            buckets: HashMap::new(),
        }
    }

    /// Quantize a track-position fraction to a bucket index.
    ///
    /// Truncation toward zero, not rounding. Positions at or beyond 1.0 land
    /// in index >= resolution; [`BucketOverflow::Retain`] keeps that index as
    /// a valid extra bucket, [`BucketOverflow::Clamp`] folds it into the last
    /// regular bucket.
    fn bucket_index(&self, position_pct: f64) -> u32 {
        let index = (position_pct * f64::from(self.resolution)) as u32;
        match self.overflow {
            BucketOverflow::Retain => index,
            BucketOverflow::Clamp => index.min(self.resolution.saturating_sub(1)),
        }
    }

    pub(crate) fn add_point(&mut self, point: &TrackPoint) {
        let index = self.bucket_index(point.track_position_pct);
        self.buckets.entry(index).or_default().add(point);
    }

    /// Fold another grid's partial sums into this one, bucket by bucket.
    pub(crate) fn merge(&mut self, other: BucketGrid) {
        for (index, accumulator) in other.buckets {
            self.buckets.entry(index).or_default().merge(&accumulator);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Average every bucket and return the points sorted ascending by
    /// track-position fraction.
    pub(crate) fn build(self, position: BucketPosition) -> Vec<TrackMapPoint> {
        let resolution = f64::from(self.resolution);

        let mut points: Vec<TrackMapPoint> = self
            .buckets
            .into_iter()
            .map(|(index, acc)| {
                let count = f64::from(acc.sample_count);
                let track_position_pct = match position {
                    BucketPosition::Nominal => f64::from(index) / resolution,
                    BucketPosition::Observed => acc.sum_position_pct / count,
                };
                TrackMapPoint {
                    track_position_pct,
                    lat: acc.sum_lat / count,
                    lon: acc.sum_lon / count,
                    samples: acc.sample_count,
                    x: None,
                    y: None,
                }
            })
            .collect();

        points.sort_by(|a, b| a.track_position_pct.total_cmp(&b.track_position_pct));
        points
    }
}

/// Count distinct lap numbers across the filtered point stream.
///
/// Consumes the full buffer before producing a result; the value seeds
/// `total_laps` and has no other consumer.
pub(crate) fn count_laps(points: &[TrackPoint]) -> u32 {
    let laps: HashSet<i32> = points.iter().map(|p| p.lap).collect();
    laps.len() as u32
}
