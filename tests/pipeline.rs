//! End-to-end tests for the single-file pipeline over the JSONL source.

use std::fs;
use std::path::{Path, PathBuf};

use track_mapper::{
    generate_from_file, generate_from_file_with_config, BucketOverflow, BucketPosition,
    JsonlLoader, MapConfig, TrackMap, TrackMapError,
};

/// Write a JSONL capture: one session header line, then one sample per line
/// as (lap, lat, lon, lap_dist_pct, is_on_track_car).
fn write_capture(
    dir: &Path,
    name: &str,
    track_id: u32,
    track_name: &str,
    samples: &[(f64, f64, f64, f64, f64)],
) -> PathBuf {
    let mut content = format!("{{\"track_id\":{track_id},\"track_name\":\"{track_name}\"}}\n");
    for (lap, lat, lon, pct, on_track) in samples {
        content.push_str(&format!(
            "{{\"Lap\":{lap},\"Lat\":{lat},\"Lon\":{lon},\"LapDistPct\":{pct},\"IsOnTrackCar\":{on_track}}}\n"
        ));
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// One synthetic lap with `n` evenly spaced on-track samples around a small
/// circle, so the map always has spatial extent on both axes.
fn circular_lap(n: u32) -> Vec<(f64, f64, f64, f64, f64)> {
    (0..n)
        .map(|i| {
            let pct = f64::from(i) / f64::from(n);
            let angle = pct * std::f64::consts::TAU;
            (
                1.0,
                42.33 + angle.sin() * 0.01,
                -76.92 + angle.cos() * 0.01,
                pct,
                1.0,
            )
        })
        .collect()
}

#[test]
fn samples_sharing_a_bucket_are_averaged() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "glen.jsonl",
        127,
        "Watkins Glen",
        &[
            (1.0, 42.0, -76.0, 0.01, 1.0),
            (1.0, 43.0, -77.0, 0.02, 1.0),
            (1.0, 44.0, -78.0, 0.03, 1.0),
        ],
    );

    let map = generate_from_file(&JsonlLoader, &path, 10, false).unwrap();
    assert_eq!(map.map.len(), 1);
    assert_eq!(map.map[0].samples, 3);
    assert!((map.map[0].lat - 43.0).abs() < 1e-12);
    assert!((map.map[0].lon - (-77.0)).abs() < 1e-12);
    assert_eq!(map.track_id, Some(127));
}

#[test]
fn lap_count_ignores_off_track_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "laps.jsonl",
        127,
        "Watkins Glen",
        &[
            (1.0, 42.00, -76.00, 0.10, 1.0),
            (7.0, 0.00, 0.00, 0.15, 0.0), // tow back to the pits
            (2.0, 42.10, -76.10, 0.40, 1.0),
            (2.0, 42.15, -76.15, 0.45, 1.0),
            (8.0, 0.00, 0.00, 0.45, 0.0),
            (3.0, 42.20, -76.20, 0.70, 1.0),
        ],
    );

    let map = generate_from_file(&JsonlLoader, &path, 10, false).unwrap();
    assert_eq!(map.total_laps, 3);
    // Off-track coordinates never reach any bucket average.
    assert!(map.map.iter().all(|p| p.lat > 40.0));
}

#[test]
fn output_is_sorted_and_bounded_by_resolution() {
    let dir = tempfile::tempdir().unwrap();
    // 21 positions 0.00, 0.05, ... 1.00 inclusive: the 1.00 sample overflows
    // into the extra bucket under the default Retain policy.
    let samples: Vec<(f64, f64, f64, f64, f64)> = (0..=20)
        .map(|i| {
            let pct = f64::from(i) * 0.05;
            (1.0, 42.0 + pct, -76.0 - pct, pct, 1.0)
        })
        .collect();
    let path = write_capture(dir.path(), "full.jsonl", 127, "Watkins Glen", &samples);

    let resolution = 10;
    let map = generate_from_file(&JsonlLoader, &path, resolution, false).unwrap();

    assert!(map.map.len() <= resolution as usize + 1);
    assert!(map.map.iter().all(|p| p.samples > 0));
    for pair in map.map.windows(2) {
        assert!(pair[0].track_position_pct <= pair[1].track_position_pct);
    }
}

#[test]
fn overflow_policy_controls_the_extra_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<(f64, f64, f64, f64, f64)> = (0..=20)
        .map(|i| {
            let pct = f64::from(i) * 0.05;
            (1.0, 42.0 + pct, -76.0 - pct, pct, 1.0)
        })
        .collect();
    let path = write_capture(dir.path(), "overflow.jsonl", 127, "Watkins Glen", &samples);

    let retain = MapConfig {
        resolution: 10,
        overflow: BucketOverflow::Retain,
        ..MapConfig::default()
    };
    let clamp = MapConfig {
        resolution: 10,
        overflow: BucketOverflow::Clamp,
        ..MapConfig::default()
    };

    let retained = generate_from_file_with_config(&JsonlLoader, &path, &retain).unwrap();
    let clamped = generate_from_file_with_config(&JsonlLoader, &path, &clamp).unwrap();

    assert_eq!(retained.map.len(), 11);
    assert_eq!(clamped.map.len(), 10);
    // Retain keeps the 1.00 sample in its own extra bucket; Clamp folds it
    // in with the 0.90 and 0.95 samples of the last regular bucket.
    assert_eq!(retained.map.last().unwrap().samples, 1);
    assert_eq!(clamped.map.last().unwrap().samples, 3);
}

#[test]
fn nominal_position_policy_is_bucket_derived() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "nominal.jsonl",
        127,
        "Watkins Glen",
        &[
            (1.0, 42.0, -76.0, 0.27, 1.0),
            (1.0, 42.1, -76.1, 0.63, 1.0),
        ],
    );

    let config = MapConfig {
        resolution: 10,
        bucket_position: BucketPosition::Nominal,
        ..MapConfig::default()
    };
    let map = generate_from_file_with_config(&JsonlLoader, &path, &config).unwrap();

    assert!((map.map[0].track_position_pct - 0.2).abs() < 1e-12);
    assert!((map.map[1].track_position_pct - 0.6).abs() < 1e-12);
}

#[test]
fn normalized_coordinates_stay_in_unit_square() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "circle.jsonl",
        127,
        "Watkins Glen",
        &circular_lap(200),
    );

    let map = generate_from_file(&JsonlLoader, &path, 50, true).unwrap();
    assert!(map.map.len() > 10);
    for point in &map.map {
        let (x, y) = (point.x.unwrap(), point.y.unwrap());
        assert!((0.0..=1.0).contains(&x));
        assert!((0.0..=1.0).contains(&y));
        assert!(x.is_finite() && y.is_finite());
    }
}

#[test]
fn single_sample_capture_fails_normalization_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "lonely.jsonl",
        127,
        "Watkins Glen",
        &[(1.0, 42.0, -76.0, 0.1, 1.0)],
    );

    let err = generate_from_file(&JsonlLoader, &path, 10, true).unwrap_err();
    assert!(matches!(err, TrackMapError::DegenerateTrack { .. }));
}

#[test]
fn missing_channel_rejects_the_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jsonl");
    fs::write(
        &path,
        concat!(
            "{\"track_id\":1,\"track_name\":\"Test\"}\n",
            "{\"Lap\":1,\"Lat\":42.0,\"Lon\":-76.0,\"IsOnTrackCar\":1}\n",
        ),
    )
    .unwrap();

    let err = generate_from_file(&JsonlLoader, &path, 10, false).unwrap_err();
    assert!(matches!(
        err,
        TrackMapError::MissingParam {
            name: "LapDistPct"
        }
    ));
}

#[test]
fn pipeline_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_capture(
        dir.path(),
        "repeat.jsonl",
        127,
        "Watkins Glen",
        &circular_lap(150),
    );

    let first = generate_from_file(&JsonlLoader, &path, 25, true).unwrap();
    let second = generate_from_file(&JsonlLoader, &path, 25, true).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn write_json_round_trips_through_serde() {
    let dir = tempfile::tempdir().unwrap();
    let capture = write_capture(
        dir.path(),
        "export.jsonl",
        127,
        "Watkins Glen",
        &circular_lap(100),
    );

    let map = generate_from_file(&JsonlLoader, &capture, 25, true).unwrap();
    let out = dir.path().join("map-out.json");
    map.write_json(&out).unwrap();

    let restored: TrackMap = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(restored, map);
}
