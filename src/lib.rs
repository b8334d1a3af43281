//! Hazard Gaze - gaze dataset pipeline for driving hazard detection
//!
//! Turns raw eye-tracking sessions recorded while participants watched driving
//! videos into training tables through a deterministic batch pipeline:
//! coordinate normalization → edge-gazing filter → hazard interval labeling
//! → categorical encoding → per-video aggregation and time binning.
//!
//! ## Modules
//!
//! - **Input**: survey results and user profiles ([`schema`])
//! - **Stages**: [`normalizer`], [`quality`], [`labeler`], [`encoder`],
//!   [`aggregator`], [`features`], [`binner`]
//! - **Output**: [`pipeline`] orchestration and [`output`] table writer

pub mod aggregator;
pub mod binner;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod labeler;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod types;

pub use config::{IntervalSemantics, PipelineConfig};
pub use encoder::{CategoricalEncoder, CategoryVocabulary, CATEGORY_SCHEMA};
pub use error::ComputeError;
pub use output::{OutputFormat, TableWriter};
pub use pipeline::{surveys_to_gaze_tables, GazePipeline, PipelineOutput};

// Schema exports
pub use schema::{ProfileRecord, SessionAdapter, SurveyRecord, PROFILE_SCHEMA, SURVEY_SCHEMA};

/// Crate version recorded in every run report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded in every run report
pub const PRODUCER_NAME: &str = "hazard-gaze";
