//! Hazard interval labeling
//!
//! Participants press the spacebar when a hazard appears and again when it clears,
//! producing a flat list of alternating boundaries. Each gaze sample is tested
//! against consecutive boundary pairs using its raw capture time.
//!
//! Under the default [`IntervalSemantics::LastPairWins`] every pair is tested in
//! order and each test overwrites the previous one, so only the last pair decides
//! the label. A sample inside an earlier interval but outside the last one is
//! labeled `false`. [`IntervalSemantics::AnyInterval`] labels a sample hazardous
//! when it falls inside any pair.

use crate::config::{IntervalSemantics, PipelineConfig};
use crate::error::ComputeError;
use crate::types::{HazardLabeledSample, NormalizedGazeSample, Session};
use tracing::debug;

/// Per-sample hazard labeler
#[derive(Debug, Clone)]
pub struct HazardIntervalLabeler {
    semantics: IntervalSemantics,
}

impl HazardIntervalLabeler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            semantics: config.interval_semantics,
        }
    }

    /// Label a sample's raw time against an interval boundary list.
    ///
    /// A trailing unpaired boundary is never tested.
    pub fn label(&self, raw_time: f64, boundaries: &[f64]) -> bool {
        let mut pairs = boundaries.chunks_exact(2);
        let inside = |pair: &[f64]| raw_time > pair[0] && raw_time < pair[1];

        match self.semantics {
            IntervalSemantics::LastPairWins => pairs.fold(false, |_, pair| inside(pair)),
            IntervalSemantics::AnyInterval => pairs.any(inside),
        }
    }

    /// Label every sample of one session and rebase its time to seconds since the
    /// session's first sample.
    ///
    /// Returns one labeled sample per input sample, in input order. An empty input
    /// yields no rows.
    pub fn label_session(
        &self,
        session: &Session,
        samples: &[NormalizedGazeSample],
    ) -> Result<Vec<HazardLabeledSample>, ComputeError> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let boundaries = &session.answers.spacebar_timestamps;
        if let Some(index) = boundaries.iter().position(|b| !b.is_finite()) {
            return Err(ComputeError::MalformedIntervals {
                user_id: session.key.user_id.clone(),
                video_id: session.key.video_id.clone(),
                reason: format!("boundary {} is not finite", index),
            });
        }
        if boundaries.len() % 2 == 1 {
            debug!(
                user_id = %session.key.user_id,
                video_id = %session.key.video_id,
                boundaries = boundaries.len(),
                "odd-length interval list; trailing boundary ignored"
            );
        }

        let use_intervals = session.answers.hazard_detected && session.has_intervals();
        let min_time = samples
            .iter()
            .map(|s| s.time)
            .fold(f64::INFINITY, f64::min);

        Ok(samples
            .iter()
            .map(|sample| {
                let hazard = use_intervals && self.label(sample.time, boundaries);
                HazardLabeledSample {
                    sample: NormalizedGazeSample {
                        time: (sample.time - min_time) / 1000.0,
                        ..sample.clone()
                    },
                    raw_time: sample.time,
                    hazard,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Demographics, DisplayBox, ScreenDimensions, SessionKey, SurveyAnswers,
    };

    fn last_pair_wins() -> HazardIntervalLabeler {
        HazardIntervalLabeler::new(&PipelineConfig::default())
    }

    fn any_interval() -> HazardIntervalLabeler {
        HazardIntervalLabeler::new(&PipelineConfig {
            interval_semantics: IntervalSemantics::AnyInterval,
            ..Default::default()
        })
    }

    fn make_test_session(hazard_detected: bool, boundaries: Vec<f64>) -> Session {
        Session {
            key: SessionKey::new("u1", "v1"),
            window: ScreenDimensions {
                width: 1280.0,
                height: 960.0,
            },
            answers: SurveyAnswers {
                hazard_detected,
                spacebar_timestamps: boundaries,
                ..Default::default()
            },
            demographics: Demographics::default(),
            form_data: serde_json::Map::new(),
            gaze: Vec::new(),
        }
    }

    fn make_test_sample(time: f64) -> NormalizedGazeSample {
        NormalizedGazeSample {
            user_id: "u1".to_string(),
            video_id: "v1".to_string(),
            time,
            x: 640.0,
            y: 480.0,
            original_x: 640.0,
            original_y: 480.0,
            original_width: 1280.0,
            original_height: 960.0,
            display: DisplayBox {
                display_width: 1280.0,
                display_height: 960.0,
                x_offset: 0.0,
                y_offset: 0.0,
            },
            normalized_to_width: 1280.0,
            normalized_to_height: 960.0,
        }
    }

    #[test]
    fn test_last_pair_wins_overrides_earlier_match() {
        // 1.5 lies inside (1, 2) but the later pair (5, 8) overwrites the result
        let labeler = last_pair_wins();
        assert!(!labeler.label(1.5, &[1.0, 2.0, 5.0, 8.0]));
        assert!(labeler.label(6.0, &[1.0, 2.0, 5.0, 8.0]));
    }

    #[test]
    fn test_any_interval_matches_earlier_pair() {
        let labeler = any_interval();
        assert!(labeler.label(1.5, &[1.0, 2.0, 5.0, 8.0]));
        assert!(labeler.label(6.0, &[1.0, 2.0, 5.0, 8.0]));
        assert!(!labeler.label(3.0, &[1.0, 2.0, 5.0, 8.0]));
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let labeler = last_pair_wins();
        assert!(!labeler.label(1.0, &[1.0, 2.0]));
        assert!(!labeler.label(2.0, &[1.0, 2.0]));
    }

    #[test]
    fn test_unpaired_boundary_is_ignored() {
        let labeler = last_pair_wins();
        assert!(!labeler.label(5.0, &[1.0]));
        // Trailing 10 is never paired, so (1, 4) is the last tested pair
        assert!(labeler.label(3.0, &[1.0, 4.0, 10.0]));
        assert!(!labeler.label(12.0, &[1.0, 4.0, 10.0]));
    }

    #[test]
    fn test_label_session_rebases_time() {
        let labeler = last_pair_wins();
        let session = make_test_session(true, vec![1500.0, 2500.0]);
        let samples = vec![
            make_test_sample(2000.0),
            make_test_sample(1000.0),
            make_test_sample(3000.0),
        ];

        let labeled = labeler.label_session(&session, &samples).unwrap();
        assert_eq!(labeled.len(), 3);

        // Input order is preserved
        assert!((labeled[0].sample.time - 1.0).abs() < 1e-9);
        assert!((labeled[1].sample.time - 0.0).abs() < 1e-9);
        assert!((labeled[2].sample.time - 2.0).abs() < 1e-9);
        assert_eq!(labeled[0].raw_time, 2000.0);

        assert!(labeled[0].hazard);
        assert!(!labeled[1].hazard);
        assert!(!labeled[2].hazard);
    }

    #[test]
    fn test_no_hazard_detected_labels_false() {
        let labeler = last_pair_wins();
        let session = make_test_session(false, vec![0.0, 5000.0]);
        let labeled = labeler
            .label_session(&session, &[make_test_sample(1000.0)])
            .unwrap();
        assert!(!labeled[0].hazard);
    }

    #[test]
    fn test_hazard_without_intervals_labels_false() {
        let labeler = any_interval();
        let session = make_test_session(true, Vec::new());
        let labeled = labeler
            .label_session(&session, &[make_test_sample(0.0), make_test_sample(1000.0)])
            .unwrap();
        assert_eq!(labeled.len(), 2);
        assert!(labeled.iter().all(|s| !s.hazard));
    }

    #[test]
    fn test_empty_session_yields_no_rows() {
        let labeler = last_pair_wins();
        let session = make_test_session(true, vec![0.0, 5000.0]);
        assert!(labeler.label_session(&session, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_boundary_is_fatal() {
        let labeler = last_pair_wins();
        let session = make_test_session(true, vec![0.0, f64::NAN]);
        let err = labeler
            .label_session(&session, &[make_test_sample(1.0)])
            .unwrap_err();
        assert!(matches!(err, ComputeError::MalformedIntervals { .. }));
    }
}
