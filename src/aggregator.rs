//! Per-video aggregation
//!
//! Reduces the labeled sample table to one row per video. Every reduction is taken
//! over samples, so sessions contribute in proportion to their sample count.

use crate::types::{LabeledGazeSample, VideoAggregate};
use std::collections::BTreeMap;

/// First-pass reducer grouping labeled samples by video
pub struct VideoAggregator;

impl VideoAggregator {
    /// Aggregate labeled samples, one row per `videoId` in ascending id order.
    pub fn aggregate(samples: &[LabeledGazeSample]) -> Vec<VideoAggregate> {
        let mut by_video: BTreeMap<&str, Vec<&LabeledGazeSample>> = BTreeMap::new();
        for sample in samples {
            by_video.entry(sample.video_id()).or_default().push(sample);
        }

        by_video
            .into_iter()
            .map(|(video_id, group)| aggregate_video(video_id, &group))
            .collect()
    }
}

fn aggregate_video(video_id: &str, group: &[&LabeledGazeSample]) -> VideoAggregate {
    let (x, y, time) = sorted_trajectory(group);

    let mut attention_factors: BTreeMap<String, bool> = BTreeMap::new();
    for sample in group {
        for (name, &flag) in &sample.features.attention_factors {
            let entry = attention_factors.entry(name.clone()).or_insert(false);
            *entry |= flag;
        }
    }

    VideoAggregate {
        video_id: video_id.to_string(),
        x,
        y,
        time,
        mean_detection_confidence: mean(group.iter().map(|s| s.features.detection_confidence)),
        min_gaze_duration: group
            .iter()
            .map(|s| s.features.gaze_duration)
            .fold(f64::INFINITY, f64::min),
        mean_age: mean(group.iter().map(|s| s.features.age)),
        hazard_detected: group.iter().any(|s| s.features.hazard_detected),
        mean_license_age: mean(group.iter().map(|s| s.features.license_age)),
        no_detection_no_to_subtle_hazard: group
            .iter()
            .any(|s| s.features.no_detection_no_to_subtle_hazard),
        weighted_hazard_severity: weighted_severity(group.iter().map(|s| s.hazard())),
        attention_factors,
    }
}

/// x, y and time re-sorted together by ascending time
fn sorted_trajectory(group: &[&LabeledGazeSample]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..group.len()).collect();
    order.sort_by(|&a, &b| group[a].time().total_cmp(&group[b].time()));

    let x = order.iter().map(|&i| group[i].x()).collect();
    let y = order.iter().map(|&i| group[i].y()).collect();
    let time = order.iter().map(|&i| group[i].time()).collect();
    (x, y, time)
}

/// Sum of `value * relative frequency` over the distinct hazard values
fn weighted_severity(labels: impl Iterator<Item = bool>) -> f64 {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    let mut total = 0usize;
    for label in labels {
        *counts.entry(u8::from(label)).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    counts
        .into_iter()
        .map(|(value, count)| f64::from(value) * (count as f64 / total as f64))
        .sum()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
