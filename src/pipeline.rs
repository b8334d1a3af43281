//! Pipeline orchestration
//!
//! This module provides the public API for the gaze pipeline. It takes survey
//! results and user profiles through every stage and returns all output tables.

use crate::aggregator::VideoAggregator;
use crate::binner::TimeBinner;
use crate::config::PipelineConfig;
use crate::encoder::{CategoricalEncoder, CategoryVocabulary};
use crate::error::ComputeError;
use crate::features::SpatialFeatureDeriver;
use crate::labeler::HazardIntervalLabeler;
use crate::normalizer::CoordinateNormalizer;
use crate::quality::QualityFilter;
use crate::schema::{ProfileRecord, SessionAdapter, SurveyRecord};
use crate::types::{
    IncompleteGazeSample, LabeledGazeSample, NormalizedGazeSample, PipelineReport,
    QualityDecision, Session, SessionKey, SessionQuality, TableCounts, TimeBin, VideoFeatures,
};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Every table produced by one run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Samples of sessions that passed the quality filter (Output 1)
    pub normalized: Vec<NormalizedGazeSample>,
    /// Samples of sessions rejected for edge gazing (Output 2)
    pub rejected: Vec<NormalizedGazeSample>,
    /// Hazard-labeled, encoded samples feeding both reducers
    pub labeled: Vec<LabeledGazeSample>,
    /// Labeled samples of sessions missing a required field
    pub incomplete: Vec<IncompleteGazeSample>,
    /// Per-video summary (Output 3)
    pub aggregates: Vec<VideoFeatures>,
    /// Time-binned training rows (Output 4)
    pub bins: Vec<TimeBin>,
    pub session_quality: Vec<SessionQuality>,
    pub report: PipelineReport,
}

/// Run the full pipeline on survey and profile JSON arrays with the default
/// configuration.
///
/// # Example
/// ```ignore
/// let output = surveys_to_gaze_tables(&surveys_json, &profiles_json)?;
/// println!("{} training rows", output.bins.len());
/// ```
pub fn surveys_to_gaze_tables(
    surveys_json: &str,
    profiles_json: &str,
) -> Result<PipelineOutput, ComputeError> {
    let surveys = SessionAdapter::parse_surveys_array(surveys_json)?;
    let profiles = SessionAdapter::parse_profiles_array(profiles_json)?;
    GazePipeline::new(PipelineConfig::default())?.run(&surveys, &profiles)
}

/// Configured pipeline.
///
/// Stages:
/// 1. CoordinateNormalizer - screen space to canonical video space
/// 2. QualityFilter - reject edge-gazing sessions
/// 3. HazardIntervalLabeler - per-sample hazard label and relative time
/// 4. CategoricalEncoder - flag columns and required-field check
/// 5. VideoAggregator + SpatialFeatureDeriver - per-video summary
/// 6. TimeBinner - per-video fixed-width windows
pub struct GazePipeline {
    config: PipelineConfig,
    normalizer: CoordinateNormalizer,
    quality: QualityFilter,
    labeler: HazardIntervalLabeler,
    encoder: CategoricalEncoder,
    binner: TimeBinner,
    run_id: String,
}

impl GazePipeline {
    /// Create a pipeline with the default category vocabulary
    pub fn new(config: PipelineConfig) -> Result<Self, ComputeError> {
        Self::with_vocabulary(config, CategoryVocabulary::default())
    }

    /// Create a pipeline with a custom category vocabulary
    pub fn with_vocabulary(
        config: PipelineConfig,
        vocabulary: CategoryVocabulary,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        vocabulary.validate()?;

        Ok(Self {
            normalizer: CoordinateNormalizer::new(&config),
            quality: QualityFilter::new(&config),
            labeler: HazardIntervalLabeler::new(&config),
            encoder: CategoricalEncoder::new(vocabulary),
            binner: TimeBinner::new(&config),
            run_id: Uuid::new_v4().to_string(),
            config,
        })
    }

    /// Override the run identifier recorded in the report
    pub fn with_run_id(mut self, run_id: String) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Join surveys to profiles and run every stage.
    pub fn run(
        &self,
        surveys: &[SurveyRecord],
        profiles: &[ProfileRecord],
    ) -> Result<PipelineOutput, ComputeError> {
        let sessions = SessionAdapter::join(surveys, profiles)?;
        self.run_sessions(&sessions)
    }

    /// Run every stage on already-joined sessions.
    ///
    /// Each session is normalized and labeled on its own. The quality filter pools
    /// every session sharing a `(userId, videoId)` key, so repeated viewings of one
    /// video by one user are kept or rejected together.
    pub fn run_sessions(&self, sessions: &[Session]) -> Result<PipelineOutput, ComputeError> {
        // Stage 1: canonical coordinates
        let samples_by_session = sessions
            .iter()
            .map(|session| self.normalizer.normalize_session(session))
            .collect::<Result<Vec<_>, _>>()?;

        // Stage 2: edge-gazing filter, keys in order of first appearance
        let mut keys: Vec<&SessionKey> = Vec::new();
        let mut members: HashMap<&SessionKey, Vec<usize>> = HashMap::new();
        for (index, session) in sessions.iter().enumerate() {
            members
                .entry(&session.key)
                .or_insert_with(|| {
                    keys.push(&session.key);
                    Vec::new()
                })
                .push(index);
        }

        let session_quality: Vec<SessionQuality> = keys
            .iter()
            .map(|key| {
                let pooled = members[key]
                    .iter()
                    .flat_map(|&index| samples_by_session[index].iter());
                self.quality.evaluate(key, pooled)
            })
            .collect();
        let decisions: HashMap<&SessionKey, QualityDecision> = keys
            .iter()
            .copied()
            .zip(session_quality.iter().map(|q| q.decision))
            .collect();

        let mut normalized = Vec::new();
        let mut rejected = Vec::new();
        let mut labeled = Vec::new();
        let mut incomplete = Vec::new();
        let mut incomplete_sessions = 0;

        for (session, samples) in sessions.iter().zip(samples_by_session) {
            match decisions.get(&session.key) {
                Some(QualityDecision::Kept) => {}
                Some(QualityDecision::Rejected) => {
                    rejected.extend(samples);
                    continue;
                }
                _ => continue,
            }
            if samples.is_empty() {
                continue;
            }

            // Stage 3: hazard labels
            let hazard_labeled = self.labeler.label_session(session, &samples)?;
            normalized.extend(samples);

            // Stage 4: categorical encoding
            let (complete, missing) = self.encoder.apply(session, hazard_labeled);
            if let Some(first) = missing.first() {
                warn!(
                    user_id = %session.key.user_id,
                    video_id = %session.key.video_id,
                    missing = ?first.missing_fields,
                    "session missing required fields; routed to incomplete table"
                );
                incomplete_sessions += 1;
            }
            labeled.extend(complete);
            incomplete.extend(missing);
        }

        // Stage 5: per-video summary
        let aggregates = SpatialFeatureDeriver::derive_all(VideoAggregator::aggregate(&labeled));

        // Stage 6: time bins
        let bins = self.binner.bin(&labeled);

        let counts = TableCounts {
            surveys: sessions.len(),
            sessions: session_quality.len(),
            kept_sessions: count_decision(&session_quality, QualityDecision::Kept),
            rejected_sessions: count_decision(&session_quality, QualityDecision::Rejected),
            empty_sessions: count_decision(&session_quality, QualityDecision::Empty),
            incomplete_sessions,
            normalized_rows: normalized.len(),
            rejected_rows: rejected.len(),
            labeled_rows: labeled.len(),
            incomplete_rows: incomplete.len(),
            videos: aggregates.len(),
            time_bins: bins.len(),
        };

        info!(
            run_id = %self.run_id,
            surveys = counts.surveys,
            sessions = counts.sessions,
            kept = counts.kept_sessions,
            rejected = counts.rejected_sessions,
            empty = counts.empty_sessions,
            incomplete = counts.incomplete_sessions,
            labeled_rows = counts.labeled_rows,
            videos = counts.videos,
            time_bins = counts.time_bins,
            "gaze pipeline run complete"
        );

        let report = PipelineReport {
            producer: PRODUCER_NAME.to_string(),
            version: VERSION.to_string(),
            run_id: self.run_id.clone(),
            computed_at_utc: Utc::now().to_rfc3339(),
            category_schema: self.encoder.vocabulary().version.clone(),
            config: self.config.clone(),
            counts,
        };

        Ok(PipelineOutput {
            normalized,
            rejected,
            labeled,
            incomplete,
            aggregates,
            bins,
            session_quality,
            report,
        })
    }
}

fn count_decision(records: &[SessionQuality], decision: QualityDecision) -> usize {
    records.iter().filter(|q| q.decision == decision).count()
}
