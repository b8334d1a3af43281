//! Time binning
//!
//! Buckets labeled samples into fixed-width windows of session time per video,
//! producing one supervised-learning row per `(videoId, bin)`.

use crate::config::PipelineConfig;
use crate::types::{LabeledGazeSample, TimeBin};
use std::collections::BTreeMap;

/// Fixed-width time binner
#[derive(Debug, Clone)]
pub struct TimeBinner {
    bin_width: f64,
}

#[derive(Default)]
struct BinAccumulator {
    sum_x: f64,
    sum_y: f64,
    hazard_count: usize,
    count: usize,
}

impl TimeBinner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            bin_width: config.time_bin_width,
        }
    }

    /// Index of the bin containing `time` (seconds)
    pub fn bin_index(&self, time: f64) -> i64 {
        (time / self.bin_width).floor() as i64
    }

    /// Bin samples, ordered by `(videoId, bin)`.
    ///
    /// A bin is hazardous when strictly more than half of its samples are.
    pub fn bin(&self, samples: &[LabeledGazeSample]) -> Vec<TimeBin> {
        let mut bins: BTreeMap<(&str, i64), BinAccumulator> = BTreeMap::new();

        for sample in samples {
            let key = (sample.video_id(), self.bin_index(sample.time()));
            let acc = bins.entry(key).or_default();
            acc.sum_x += sample.x();
            acc.sum_y += sample.y();
            acc.hazard_count += usize::from(sample.hazard());
            acc.count += 1;
        }

        bins.into_iter()
            .map(|((video_id, bin_index), acc)| {
                let n = acc.count as f64;
                TimeBin {
                    video_id: video_id.to_string(),
                    bin_index,
                    time: bin_index as f64 * self.bin_width,
                    x: acc.sum_x / n,
                    y: acc.sum_y / n,
                    hazard: acc.hazard_count as f64 / n > 0.5,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisplayBox, HazardLabeledSample, NormalizedGazeSample, SessionFeatures};

    fn make_test_sample(video_id: &str, time: f64, x: f64, hazard: bool) -> LabeledGazeSample {
        LabeledGazeSample {
            labeled: HazardLabeledSample {
                sample: NormalizedGazeSample {
                    user_id: "u1".to_string(),
                    video_id: video_id.to_string(),
                    time,
                    x,
                    y: x + 1.0,
                    original_x: x,
                    original_y: x + 1.0,
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
                },
                raw_time: time * 1000.0,
                hazard,
            },
            features: SessionFeatures {
                detection_confidence: 3.0,
                gaze_duration: 15.0,
                age: 30.0,
                license_age: 18.0,
                hazard_detected: true,
                hazard_severity: None,
                no_detection_no_to_subtle_hazard: false,
                attention_factors: BTreeMap::new(),
                categories: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_bin_indices_and_starts() {
        let binner = TimeBinner::new(&PipelineConfig::default());
        assert_eq!(binner.bin_index(0.0), 0);
        assert_eq!(binner.bin_index(0.1), 0);
        assert_eq!(binner.bin_index(0.3), 1);
        assert_eq!(binner.bin_index(0.5), 1);

        let samples = vec![
            make_test_sample("v1", 0.0, 10.0, true),
            make_test_sample("v1", 0.1, 20.0, true),
            make_test_sample("v1", 0.3, 30.0, false),
            make_test_sample("v1", 0.5, 50.0, false),
        ];

        let bins = binner.bin(&samples);
        assert_eq!(bins.len(), 2);

        assert_eq!(bins[0].time, 0.0);
        assert!((bins[0].x - 15.0).abs() < 1e-12);
        assert!((bins[0].y - 16.0).abs() < 1e-12);
        assert!(bins[0].hazard);

        assert!((bins[1].time - 0.28).abs() < 1e-12);
        assert!((bins[1].x - 40.0).abs() < 1e-12);
        assert!(!bins[1].hazard);
    }

    #[test]
    fn test_tie_is_not_hazard() {
        let binner = TimeBinner::new(&PipelineConfig::default());
        let samples = vec![
            make_test_sample("v1", 0.0, 10.0, true),
            make_test_sample("v1", 0.1, 20.0, false),
        ];

        let bins = binner.bin(&samples);
        assert_eq!(bins.len(), 1);
        assert!(!bins[0].hazard);
    }

    #[test]
    fn test_bins_are_grouped_per_video() {
        let binner = TimeBinner::new(&PipelineConfig::default());
        let samples = vec![
            make_test_sample("v2", 0.0, 10.0, false),
            make_test_sample("v1", 0.6, 20.0, true),
            make_test_sample("v1", 0.0, 30.0, false),
        ];

        let bins = binner.bin(&samples);
        let keys: Vec<(&str, i64)> = bins.iter().map(|b| (b.video_id.as_str(), b.bin_index)).collect();
        assert_eq!(keys, vec![("v1", 0), ("v1", 2), ("v2", 0)]);
    }
}
