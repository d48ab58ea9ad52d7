//! Unified error handling for track map generation.
//!
//! All fallible operations in this crate return [`Result`], which wraps
//! [`TrackMapError`]. Per-file failures during a directory scan are caught
//! and logged by the scanner rather than surfaced through this type; see
//! [`crate::scan`] for that policy.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackMapError>;

/// Errors produced while turning telemetry into a track map.
#[derive(Debug, Error)]
pub enum TrackMapError {
    /// The telemetry source could not be opened or read.
    #[error("failed to read telemetry source {}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source content could not be decoded. Decoding is all-or-nothing
    /// per file; there is no recovery of partially decoded samples.
    #[error("malformed telemetry in {} at line {line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A sample did not expose a required parameter. The data contract is
    /// violated, so the whole containing stream is rejected.
    #[error("sample is missing required parameter `{name}`")]
    MissingParam { name: &'static str },

    /// Normalization was asked to rescale a map whose bounding box has zero
    /// extent on both axes (for example a single-point map).
    #[error("cannot normalize degenerate track: {points}-point map has no spatial extent")]
    DegenerateTrack { points: usize },

    /// The source produced no on-track samples at all.
    #[error("no on-track samples found in telemetry source")]
    EmptyMap,
}
