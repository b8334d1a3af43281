//! Edge-gazing quality filter
//!
//! Participants who look away from the video produce gaze clustered on the frame
//! border. Samples are pooled per `(userId, videoId)` over every survey for that key,
//! and a key whose share of border samples exceeds the drop threshold has all its
//! samples routed to the rejected table.

use crate::config::PipelineConfig;
use crate::types::{NormalizedGazeSample, QualityDecision, SessionKey, SessionQuality};
use tracing::warn;

/// Session-level quality filter
#[derive(Debug, Clone)]
pub struct QualityFilter {
    width: f64,
    height: f64,
    edge_threshold: f64,
    drop_threshold: f64,
}

impl QualityFilter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            width: config.canonical_width,
            height: config.canonical_height,
            edge_threshold: config.edge_threshold,
            drop_threshold: config.quality_drop_threshold,
        }
    }

    /// Whether a canonical point lies strictly inside the outer band of the frame
    pub fn is_edge(&self, x: f64, y: f64) -> bool {
        let band_x = self.width * self.edge_threshold;
        let band_y = self.height * self.edge_threshold;
        x < band_x || x > self.width - band_x || y < band_y || y > self.height - band_y
    }

    /// Classify one `(userId, videoId)` key from the normalized samples of every
    /// survey sharing it.
    pub fn evaluate<'a>(
        &self,
        key: &SessionKey,
        samples: impl IntoIterator<Item = &'a NormalizedGazeSample>,
    ) -> SessionQuality {
        let (total_samples, edge_samples) = samples.into_iter().fold((0, 0), |(total, edge), s| {
            (total + 1, edge + usize::from(self.is_edge(s.x, s.y)))
        });

        if total_samples == 0 {
            warn!(
                user_id = %key.user_id,
                video_id = %key.video_id,
                "session has no gaze samples; rejecting"
            );
            return SessionQuality {
                user_id: key.user_id.clone(),
                video_id: key.video_id.clone(),
                total_samples,
                edge_samples: 0,
                edge_fraction: None,
                decision: QualityDecision::Empty,
            };
        }

        let edge_fraction = edge_samples as f64 / total_samples as f64;

        let decision = if edge_fraction <= self.drop_threshold {
            QualityDecision::Kept
        } else {
            warn!(
                user_id = %key.user_id,
                video_id = %key.video_id,
                edge_fraction,
                "dropping session due to excessive edge gazing"
            );
            QualityDecision::Rejected
        };

        SessionQuality {
            user_id: key.user_id.clone(),
            video_id: key.video_id.clone(),
            total_samples,
            edge_samples,
            edge_fraction: Some(edge_fraction),
            decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DisplayBox;

    fn make_test_sample(x: f64, y: f64) -> NormalizedGazeSample {
        NormalizedGazeSample {
            user_id: "u1".to_string(),
            video_id: "v1".to_string(),
            time: 0.0,
            x,
            y,
            original_x: x,
            original_y: y,
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

    fn make_session(edge: usize, total: usize) -> Vec<NormalizedGazeSample> {
        (0..total)
            .map(|i| {
                if i < edge {
                    make_test_sample(5.0, 480.0)
                } else {
                    make_test_sample(640.0, 480.0)
                }
            })
            .collect()
    }

    #[test]
    fn test_edge_band_is_strict() {
        let filter = QualityFilter::new(&PipelineConfig::default());
        assert!(!filter.is_edge(128.0, 96.0));
        assert!(!filter.is_edge(1152.0, 864.0));
        assert!(filter.is_edge(127.9, 480.0));
        assert!(filter.is_edge(640.0, 864.1));
        assert!(!filter.is_edge(640.0, 480.0));
    }

    #[test]
    fn test_half_edge_session_is_kept() {
        let filter = QualityFilter::new(&PipelineConfig::default());
        let quality = filter.evaluate(&SessionKey::new("u1", "v1"), &make_session(5, 10));

        assert_eq!(quality.edge_samples, 5);
        assert_eq!(quality.edge_fraction, Some(0.5));
        assert_eq!(quality.decision, QualityDecision::Kept);
    }

    #[test]
    fn test_majority_edge_session_is_rejected() {
        let filter = QualityFilter::new(&PipelineConfig::default());
        let quality = filter.evaluate(&SessionKey::new("u1", "v1"), &make_session(6, 10));

        assert_eq!(quality.decision, QualityDecision::Rejected);
    }

    #[test]
    fn test_empty_session() {
        let filter = QualityFilter::new(&PipelineConfig::default());
        let quality = filter.evaluate(&SessionKey::new("u1", "v1"), std::iter::empty());

        assert_eq!(quality.decision, QualityDecision::Empty);
        assert_eq!(quality.edge_fraction, None);
    }
}
