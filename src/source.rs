//! Telemetry source boundary.
//!
//! Decoding a simulator's proprietary capture format is outside the scope of
//! this crate. Instead, the pipeline consumes anything that implements
//! [`TelemetrySource`]: a finite, ordered sequence of [`Sample`]s plus the
//! session metadata needed to group maps by circuit. A matching
//! [`SourceLoader`] teaches the directory scanner how to recognize and open
//! files in a given capture format.
//!
//! Two implementations ship with the crate:
//!
//! - [`JsonlTelemetry`] / [`JsonlLoader`]: a line-delimited JSON replay
//!   format (one session header line, then one object of parameter
//!   name/value pairs per sample). Useful for fixtures and for telemetry
//!   exported from other tools.
//! - [`MemoryTelemetry`]: an in-memory source for tests and embedding.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackMapError};

/// Parameter name for the current lap number.
pub const PARAM_LAP: &str = "Lap";
/// Parameter name for GPS latitude in degrees.
pub const PARAM_LAT: &str = "Lat";
/// Parameter name for GPS longitude in degrees.
pub const PARAM_LON: &str = "Lon";
/// Parameter name for the fractional distance around the lap, in [0,1).
pub const PARAM_LAP_DIST_PCT: &str = "LapDistPct";
/// Parameter name for the on-track flag (1 = driving the circuit).
pub const PARAM_IS_ON_TRACK: &str = "IsOnTrackCar";

/// Session metadata attached to a telemetry capture.
///
/// `track_id` is an opaque key: two captures with the same id are assumed to
/// be recorded on the same physical circuit and may be merged into one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub track_id: u32,
    pub track_name: String,
}

/// One decoded telemetry sample: a lookup of named scalar parameters.
///
/// All simulator channels are exposed as `f64`; integer channels such as
/// `Lap` arrive as whole-valued floats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    params: HashMap<String, f64>,
}

impl Sample {
    /// Build a sample from `(name, value)` pairs.
    ///
    /// # Example
    /// ```
    /// use track_mapper::source::{Sample, PARAM_LAP};
    ///
    /// let sample = Sample::from_params([(PARAM_LAP, 3.0)]);
    /// assert_eq!(sample.param(PARAM_LAP), Some(3.0));
    /// ```
    pub fn from_params<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    /// Look up a parameter that the data contract requires to be present.
    ///
    /// # Errors
    /// Returns [`TrackMapError::MissingParam`] if the parameter is absent.
    pub fn require(&self, name: &'static str) -> Result<f64> {
        self.param(name)
            .ok_or(TrackMapError::MissingParam { name })
    }
}

/// A finite, ordered sequence of telemetry samples with session metadata.
///
/// Sources are consumed in a single pass; implementations may decode lazily
/// and surface decode failures through the iterator, which aborts processing
/// of that source.
pub trait TelemetrySource {
    /// Session metadata for this capture.
    fn session(&self) -> &SessionInfo;

    /// The sample stream, in capture order.
    fn samples(&mut self) -> Box<dyn Iterator<Item = Result<Sample>> + '_>;
}

/// Opens telemetry files in a particular capture format.
///
/// The directory scanner uses [`extension`](SourceLoader::extension) to
/// restrict the file listing and [`open`](SourceLoader::open) to produce a
/// source per matching file.
pub trait SourceLoader {
    /// File extension (without the leading dot) this loader recognizes.
    fn extension(&self) -> &str;

    /// Open the file at `path` as a telemetry source.
    ///
    /// # Errors
    /// Returns [`TrackMapError::Source`] if the file cannot be read and
    /// [`TrackMapError::Parse`] if its content cannot be decoded.
    fn open(&self, path: &Path) -> Result<Box<dyn TelemetrySource>>;
}

// ============================================================================
// In-memory source
// ============================================================================

/// An in-memory telemetry source.
#[derive(Debug, Clone)]
pub struct MemoryTelemetry {
    session: SessionInfo,
    samples: Vec<Sample>,
}

impl MemoryTelemetry {
    pub fn new(session: SessionInfo, samples: Vec<Sample>) -> Self {
        Self { session, samples }
    }
}

impl TelemetrySource for MemoryTelemetry {
    fn session(&self) -> &SessionInfo {
        &self.session
    }

    fn samples(&mut self) -> Box<dyn Iterator<Item = Result<Sample>> + '_> {
        Box::new(self.samples.iter().cloned().map(Ok))
    }
}

// ============================================================================
// JSONL replay source
// ============================================================================

/// Telemetry replayed from a line-delimited JSON file.
///
/// The first line is a [`SessionInfo`] object; every following non-empty
/// line is one sample as an object of parameter name/value pairs:
///
/// ```text
/// {"track_id":127,"track_name":"Watkins Glen"}
/// {"Lap":1,"Lat":42.33,"Lon":-76.92,"LapDistPct":0.01,"IsOnTrackCar":1}
/// ```
///
/// The whole file is decoded at open time; a malformed line rejects the file
/// (decode failure is all-or-nothing per capture).
#[derive(Debug, Clone)]
pub struct JsonlTelemetry {
    session: SessionInfo,
    samples: Vec<Sample>,
}

impl JsonlTelemetry {
    /// Open and fully decode a JSONL telemetry file.
    ///
    /// # Errors
    /// [`TrackMapError::Source`] if the file cannot be read,
    /// [`TrackMapError::Parse`] if the header or any sample line is
    /// malformed.
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| TrackMapError::Source {
            path: path.to_path_buf(),
            source,
        })?;

        let mut lines = content.lines().enumerate();

        let (_, header) = lines
            .next()
            .ok_or_else(|| TrackMapError::Parse {
                path: path.to_path_buf(),
                line: 1,
                message: "missing session header".to_string(),
            })?;
        let session: SessionInfo =
            serde_json::from_str(header).map_err(|e| TrackMapError::Parse {
                path: path.to_path_buf(),
                line: 1,
                message: e.to_string(),
            })?;

        let mut samples = Vec::new();
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let sample: Sample = serde_json::from_str(line).map_err(|e| TrackMapError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: e.to_string(),
            })?;
            samples.push(sample);
        }

        Ok(Self { session, samples })
    }
}

impl TelemetrySource for JsonlTelemetry {
    fn session(&self) -> &SessionInfo {
        &self.session
    }

    fn samples(&mut self) -> Box<dyn Iterator<Item = Result<Sample>> + '_> {
        Box::new(self.samples.iter().cloned().map(Ok))
    }
}

/// Loader for [`JsonlTelemetry`] files (extension `jsonl`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlLoader;

impl SourceLoader for JsonlLoader {
    fn extension(&self) -> &str {
        "jsonl"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn TelemetrySource>> {
        Ok(Box::new(JsonlTelemetry::open(path)?))
    }
}
