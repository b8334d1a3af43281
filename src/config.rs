//! Pipeline configuration
//!
//! Canonical video space, quality thresholds and time binning are carried in an
//! explicit [`PipelineConfig`] that is handed to every stage.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default canonical video width (pixels)
pub const DEFAULT_CANONICAL_WIDTH: f64 = 1280.0;

/// Default canonical video height (pixels)
pub const DEFAULT_CANONICAL_HEIGHT: f64 = 960.0;

/// Default edge band, as a fraction of each canonical dimension
pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.10;

/// Default maximum edge fraction for a session to be kept
pub const DEFAULT_QUALITY_DROP_THRESHOLD: f64 = 0.5;

/// Default time bin width in seconds
pub const DEFAULT_TIME_BIN_WIDTH: f64 = 0.28;

/// How a sample's raw time is tested against a session's interval pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalSemantics {
    /// Every pair is tested in order and the last tested pair decides the label.
    #[default]
    LastPairWins,
    /// The sample is hazardous if it falls strictly inside any pair.
    AnyInterval,
}

/// Configuration shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Canonical video width (W)
    pub canonical_width: f64,
    /// Canonical video height (H)
    pub canonical_height: f64,
    /// Edge band fraction applied to both dimensions
    pub edge_threshold: f64,
    /// Sessions with an edge fraction above this value are rejected
    pub quality_drop_threshold: f64,
    /// Width of a time bin in seconds
    pub time_bin_width: f64,
    /// Interval labeling rule
    pub interval_semantics: IntervalSemantics,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canonical_width: DEFAULT_CANONICAL_WIDTH,
            canonical_height: DEFAULT_CANONICAL_HEIGHT,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            quality_drop_threshold: DEFAULT_QUALITY_DROP_THRESHOLD,
            time_bin_width: DEFAULT_TIME_BIN_WIDTH,
            interval_semantics: IntervalSemantics::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.canonical_width.is_finite() && self.canonical_width > 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "canonical_width must be positive, got {}",
                self.canonical_width
            )));
        }
        if !(self.canonical_height.is_finite() && self.canonical_height > 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "canonical_height must be positive, got {}",
                self.canonical_height
            )));
        }
        if !(0.0..0.5).contains(&self.edge_threshold) {
            return Err(ComputeError::InvalidConfig(format!(
                "edge_threshold must be in [0, 0.5), got {}",
                self.edge_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.quality_drop_threshold) {
            return Err(ComputeError::InvalidConfig(format!(
                "quality_drop_threshold must be in [0, 1], got {}",
                self.quality_drop_threshold
            )));
        }
        if !(self.time_bin_width.is_finite() && self.time_bin_width > 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "time_bin_width must be positive, got {}",
                self.time_bin_width
            )));
        }
        Ok(())
    }

    /// Aspect ratio of the canonical video space
    pub fn video_aspect(&self) -> f64 {
        self.canonical_width / self.canonical_height
    }
}
