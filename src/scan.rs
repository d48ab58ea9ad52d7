//! Directory scanning and multi-source merging.
//!
//! A telemetry folder typically holds captures from many sessions on many
//! circuits. The scanner opens every file with the loader's recognized
//! extension, tags each on-track point with its file's track id, groups the
//! combined stream by track id, and aggregates one map per circuit, so a
//! bucket can blend contributions from every session driven on that track.
//!
//! Per-file failures (unreadable, malformed, zero-byte) are logged and
//! skipped; one bad capture never aborts the scan. With the `parallel`
//! feature each file is processed into its own partial grid on a worker
//! and the partials are merged afterward, so no two workers ever touch the
//! same accumulator.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::aggregate::BucketGrid;
use crate::error::{Result, TrackMapError};
use crate::normalize::normalize_points;
use crate::source::{SessionInfo, SourceLoader};
use crate::{generate_from_file_with_config, MapConfig, TrackIdPoint, TrackMap, TrackPoint};

/// Generate one track map per distinct track id found in `dir`.
///
/// Equivalent to [`scan_track_maps_with_config`] with the default
/// configuration at the given resolution, normalization enabled.
///
/// # Errors
/// Fails only if the directory itself cannot be listed; per-file errors are
/// logged and skipped. An empty directory yields an empty vector.
pub fn scan_track_maps<L: SourceLoader + Sync>(
    loader: &L,
    dir: &Path,
    resolution: u32,
) -> Result<Vec<TrackMap>> {
    let config = MapConfig {
        resolution,
        normalize: true,
        ..MapConfig::default()
    };
    scan_track_maps_with_config(loader, dir, &config)
}

/// Generate one track map per distinct track id found in `dir`, with full
/// control over bucketing and normalization.
///
/// Maps are returned sorted by track id. `total_laps` is reported as the
/// sentinel `0` for every map: lap numbers are not comparable across
/// sessions, so a merged count would be meaningless rather than merely
/// approximate.
///
/// A track whose merged map cannot be normalized (degenerate bounding box)
/// is skipped with a logged warning, matching the per-file isolation policy.
pub fn scan_track_maps_with_config<L: SourceLoader + Sync>(
    loader: &L,
    dir: &Path,
    config: &MapConfig,
) -> Result<Vec<TrackMap>> {
    let files = matching_files(loader, dir)?;
    info!(
        "[Scan] {} matching .{} file(s) in {}",
        files.len(),
        loader.extension(),
        dir.display()
    );

    #[cfg(feature = "parallel")]
    let collected: Vec<(PathBuf, FileGrids)> = {
        use rayon::prelude::*;
        files
            .into_par_iter()
            .map(|path| {
                let result = file_grids(loader, &path, config);
                (path, result)
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let collected: Vec<(PathBuf, FileGrids)> = files
        .into_iter()
        .map(|path| {
            let result = file_grids(loader, &path, config);
            (path, result)
        })
        .collect();

    // Merge phase: single-threaded combination of per-file partial grids,
    // so accumulators only ever have one writer.
    let mut grids: HashMap<u32, BucketGrid> = HashMap::new();
    let mut names: HashMap<u32, String> = HashMap::new();

    for (path, result) in collected {
        match result {
            Ok((session, partials)) => {
                names
                    .entry(session.track_id)
                    .or_insert_with(|| session.track_name.clone());
                for (track_id, partial) in partials {
                    grids
                        .entry(track_id)
                        .or_insert_with(|| BucketGrid::new(config.resolution, config.overflow))
                        .merge(partial);
                }
            }
            Err(e) => {
                warn!("[Scan] skipping {}: {}", path.display(), e);
            }
        }
    }

    let mut entries: Vec<(u32, BucketGrid)> = grids.into_iter().collect();
    entries.sort_by_key(|(track_id, _)| *track_id);

    let mut maps = Vec::with_capacity(entries.len());
    for (track_id, grid) in entries {
        let mut points = grid.build(config.bucket_position);

        if config.normalize {
            if let Err(e) = normalize_points(&mut points) {
                warn!("[Scan] skipping track {track_id}: {e}");
                continue;
            }
        }

        let map = TrackMap {
            track_id: Some(track_id),
            total_laps: 0,
            map: points,
        };
        let name = names.get(&track_id).map_or("?", String::as_str);
        info!(
            "[Scan] track {} ({}): {} map points from {} samples",
            track_id,
            name,
            map.map.len(),
            map.total_samples()
        );
        maps.push(map);
    }

    Ok(maps)
}

/// Generate a map from the most recently modified matching file in `dir`.
///
/// # Errors
/// Returns [`TrackMapError::Source`] if the directory cannot be listed or
/// contains no matching files; otherwise propagates single-file pipeline
/// errors.
pub fn generate_from_latest<L: SourceLoader + Sync>(
    loader: &L,
    dir: &Path,
    resolution: u32,
    normalize: bool,
) -> Result<TrackMap> {
    let files = matching_files(loader, dir)?;
    let latest = files
        .into_iter()
        .max_by_key(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
        .ok_or_else(|| TrackMapError::Source {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "no matching telemetry files"),
        })?;

    info!("[Scan] latest capture: {}", latest.display());
    let config = MapConfig {
        resolution,
        normalize,
        ..MapConfig::default()
    };
    generate_from_file_with_config(loader, &latest, &config)
}

type FileGrids = Result<(SessionInfo, HashMap<u32, BucketGrid>)>;

/// Process one file into its partial per-track grids.
fn file_grids<L: SourceLoader>(loader: &L, path: &Path, config: &MapConfig) -> FileGrids {
    let (session, points) = collect_tagged_points(loader, path)?;
    let mut grids = HashMap::new();
    merge_points(&mut grids, &points, config);
    Ok((session, grids))
}

/// Fold a batch of tagged points into the per-track grids, grouping by
/// track id before bucketing.
fn merge_points(grids: &mut HashMap<u32, BucketGrid>, points: &[TrackIdPoint], config: &MapConfig) {
    for tagged in points {
        grids
            .entry(tagged.track_id)
            .or_insert_with(|| BucketGrid::new(config.resolution, config.overflow))
            .add_point(&tagged.point);
    }
}

/// Open one file and return its session plus on-track points tagged with
/// the session's track id.
fn collect_tagged_points<L: SourceLoader>(
    loader: &L,
    path: &Path,
) -> Result<(SessionInfo, Vec<TrackIdPoint>)> {
    let mut source = loader.open(path)?;
    let session = source.session().clone();
    let track_id = session.track_id;

    let mut points = Vec::new();
    for sample in source.samples() {
        let point = TrackPoint::from_sample(&sample?)?;
        if point.on_track {
            points.push(TrackIdPoint { track_id, point });
        }
    }

    Ok((session, points))
}

/// List files in `dir` carrying the loader's extension, sorted by path for
/// deterministic processing order.
fn matching_files<L: SourceLoader>(loader: &L, dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| TrackMapError::Source {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TrackMapError::Source {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(loader.extension()));
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
