//! Error types for the hazard gaze pipeline

use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Data-quality exclusions (edge-gazing sessions, rows with missing required
/// fields) are not errors; they are routed to side tables.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error(
        "Invalid screen dimensions {width}x{height} for user {user_id}, video {video_id}: both must be positive"
    )]
    InvalidScreenDimensions {
        user_id: String,
        video_id: String,
        width: f64,
        height: f64,
    },

    #[error("Non-finite gaze sample at index {index} for user {user_id}, video {video_id}")]
    InvalidGazeSample {
        user_id: String,
        video_id: String,
        index: usize,
    },

    #[error("Malformed interval list for user {user_id}, video {video_id}: {reason}")]
    MalformedIntervals {
        user_id: String,
        video_id: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
