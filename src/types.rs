//! Core types for the hazard gaze pipeline
//!
//! This module defines the rows that flow through each stage of the pipeline:
//! joined sessions, normalized samples, hazard-labeled samples, encoded samples,
//! and the per-video and per-bin reductions built from them.

use crate::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of one recording session (one user watching one video)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub user_id: String,
    pub video_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            video_id: video_id.into(),
        }
    }
}

/// Raw gaze point as captured in screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
    /// Capture timestamp (milliseconds)
    pub time: f64,
}

/// Screen size at capture time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenDimensions {
    pub width: f64,
    pub height: f64,
}

/// Demographic attributes joined from the profile table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub age: Option<f64>,
    pub license_age: Option<f64>,
    pub ethnicity: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub visually_impaired: Option<bool>,
}

/// Answers the operator gave for one viewing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswers {
    /// Operator-level ground truth for the whole session
    pub hazard_detected: bool,
    pub no_detection_reason: Option<String>,
    pub detection_confidence: Option<f64>,
    pub hazard_severity: Option<f64>,
    pub attention_factors: Vec<String>,
    /// Alternating interval-start / interval-end event times (milliseconds)
    pub spacebar_timestamps: Vec<f64>,
    /// Viewing start (milliseconds)
    pub start_time: Option<f64>,
    /// Viewing end (milliseconds)
    pub end_time: Option<f64>,
}

/// One joined recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub window: ScreenDimensions,
    pub answers: SurveyAnswers,
    pub demographics: Demographics,
    /// Extra form attributes carried through untouched
    #[serde(default)]
    pub form_data: serde_json::Map<String, serde_json::Value>,
    pub gaze: Vec<GazePoint>,
}

impl Session {
    /// Viewing duration in seconds, when both bounds were recorded
    pub fn gaze_duration_sec(&self) -> Option<f64> {
        match (self.answers.start_time, self.answers.end_time) {
            (Some(start), Some(end)) => Some((end - start) / 1000.0),
            _ => None,
        }
    }

    /// Whether the session carries any interval boundary
    pub fn has_intervals(&self) -> bool {
        !self.answers.spacebar_timestamps.is_empty()
    }
}

/// Largest video-aspect rectangle fitting a screen, and its centering offsets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayBox {
    pub display_width: f64,
    pub display_height: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

/// Gaze sample remapped into the canonical video space
///
/// The original coordinates, screen size and display box are kept next to the
/// transformed point for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGazeSample {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// Capture time; raw milliseconds until the labeler rewrites it
    pub time: f64,
    /// Canonical x, clipped to [0, W]
    pub x: f64,
    /// Canonical y, clipped to [0, H]
    pub y: f64,
    pub original_x: f64,
    pub original_y: f64,
    pub original_width: f64,
    pub original_height: f64,
    #[serde(flatten)]
    pub display: DisplayBox,
    pub normalized_to_width: f64,
    pub normalized_to_height: f64,
}

/// Normalized sample stamped with a hazard label and session-relative time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardLabeledSample {
    /// Source sample with `time` in seconds since the session's first sample
    #[serde(flatten)]
    pub sample: NormalizedGazeSample,
    /// Capture time before renormalization (milliseconds)
    pub raw_time: f64,
    pub hazard: bool,
}

/// Session attributes after categorical encoding, broadcast to every sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionFeatures {
    #[serde(rename = "detectionConfidence")]
    pub detection_confidence: f64,
    #[serde(rename = "gazeDuration")]
    pub gaze_duration: f64,
    pub age: f64,
    #[serde(rename = "licenseAge")]
    pub license_age: f64,
    #[serde(rename = "hazardDetected")]
    pub hazard_detected: bool,
    #[serde(rename = "hazardSeverity")]
    pub hazard_severity: Option<f64>,
    #[serde(rename = "noDetection_no_to_subtle_hazard")]
    pub no_detection_no_to_subtle_hazard: bool,
    /// `attentionFactors_{value}` multi-hot flags
    #[serde(flatten)]
    pub attention_factors: BTreeMap<String, bool>,
    /// `{column}_{value}` one-hot flags
    #[serde(flatten)]
    pub categories: BTreeMap<String, bool>,
}

/// Atomic row consumed by the video aggregator and the time binner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledGazeSample {
    #[serde(flatten)]
    pub labeled: HazardLabeledSample,
    #[serde(flatten)]
    pub features: SessionFeatures,
}

impl LabeledGazeSample {
    pub fn video_id(&self) -> &str {
        &self.labeled.sample.video_id
    }

    /// Session-relative time in seconds
    pub fn time(&self) -> f64 {
        self.labeled.sample.time
    }

    pub fn x(&self) -> f64 {
        self.labeled.sample.x
    }

    pub fn y(&self) -> f64 {
        self.labeled.sample.y
    }

    pub fn hazard(&self) -> bool {
        self.labeled.hazard
    }
}

/// Labeled sample whose session is missing a required field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteGazeSample {
    #[serde(flatten)]
    pub labeled: HazardLabeledSample,
    pub missing_fields: Vec<String>,
}

/// First-pass reduction of one video's labeled samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAggregate {
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// Canonical x values, ordered by ascending time
    pub x: Vec<f64>,
    /// Canonical y values, ordered by ascending time
    pub y: Vec<f64>,
    /// Session-relative times, ascending
    pub time: Vec<f64>,
    #[serde(rename = "meanDetectionConfidence")]
    pub mean_detection_confidence: f64,
    #[serde(rename = "minGazeDuration")]
    pub min_gaze_duration: f64,
    #[serde(rename = "meanAge")]
    pub mean_age: f64,
    #[serde(rename = "hazardDetected")]
    pub hazard_detected: bool,
    #[serde(rename = "meanLicenseAge")]
    pub mean_license_age: f64,
    #[serde(rename = "noDetection_no_to_subtle_hazard")]
    pub no_detection_no_to_subtle_hazard: bool,
    #[serde(rename = "weightedHazardSeverity")]
    pub weighted_hazard_severity: f64,
    #[serde(flatten)]
    pub attention_factors: BTreeMap<String, bool>,
}

/// Per-video summary row with spatial dispersion statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoFeatures {
    #[serde(flatten)]
    pub aggregate: VideoAggregate,
    pub mean_x: f64,
    pub mean_y: f64,
    #[serde(rename = "numGazes")]
    pub num_gazes: usize,
    /// Sample variance of x (n - 1)
    pub variance_x: f64,
    /// Sample variance of y (n - 1)
    pub variance_y: f64,
    /// Sample variance of the distance of each point from the centroid
    #[serde(rename = "gazeVariance")]
    pub gaze_variance: f64,
    /// Trace of the 2x2 sample covariance matrix of (x, y)
    #[serde(rename = "spreadFeature")]
    pub spread_feature: f64,
}

/// One supervised-learning row: a fixed-width time window of one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBin {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(skip)]
    pub bin_index: i64,
    /// Bin start offset in seconds
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub hazard: bool,
}

/// Quality filter outcome for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDecision {
    Kept,
    Rejected,
    /// Session had no gaze samples
    Empty,
}

/// Quality filter record for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionQuality {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub total_samples: usize,
    pub edge_samples: usize,
    /// Absent for empty sessions
    pub edge_fraction: Option<f64>,
    pub decision: QualityDecision,
}

/// Row and session counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    /// Survey records, one session each
    pub surveys: usize,
    /// Distinct `(userId, videoId)` keys judged by the quality filter
    pub sessions: usize,
    pub kept_sessions: usize,
    pub rejected_sessions: usize,
    pub empty_sessions: usize,
    pub incomplete_sessions: usize,
    pub normalized_rows: usize,
    pub rejected_rows: usize,
    pub labeled_rows: usize,
    pub incomplete_rows: usize,
    pub videos: usize,
    pub time_bins: usize,
}

/// Metadata describing one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub producer: String,
    pub version: String,
    pub run_id: String,
    pub computed_at_utc: String,
    pub category_schema: String,
    pub config: PipelineConfig,
    pub counts: TableCounts,
}
