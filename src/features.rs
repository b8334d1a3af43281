//! Spatial feature derivation
//!
//! Second pass over the per-video aggregates: centroid, sample variances and two
//! dispersion measures of the gaze trajectory.
//!
//! All variances are Bessel-corrected (divide by n - 1). A video with fewer than two
//! samples has no defined sample variance; those statistics are reported as 0.0.

use crate::types::{VideoAggregate, VideoFeatures};

/// Deriver for per-video spatial statistics
pub struct SpatialFeatureDeriver;

impl SpatialFeatureDeriver {
    /// Derive spatial statistics for one video
    pub fn derive(aggregate: VideoAggregate) -> VideoFeatures {
        let num_gazes = aggregate.x.len();
        let mean_x = mean(&aggregate.x);
        let mean_y = mean(&aggregate.y);

        let variance_x = sample_variance(&aggregate.x);
        let variance_y = sample_variance(&aggregate.y);

        let distances: Vec<f64> = aggregate
            .x
            .iter()
            .zip(&aggregate.y)
            .map(|(x, y)| ((x - mean_x).powi(2) + (y - mean_y).powi(2)).sqrt())
            .collect();
        let gaze_variance = sample_variance(&distances);

        let spread_feature = trace(&covariance_matrix(&aggregate.x, &aggregate.y));

        VideoFeatures {
            aggregate,
            mean_x,
            mean_y,
            num_gazes,
            variance_x,
            variance_y,
            gaze_variance,
            spread_feature,
        }
    }

    /// Derive statistics for every aggregate, preserving order
    pub fn derive_all(aggregates: Vec<VideoAggregate>) -> Vec<VideoFeatures> {
        aggregates.into_iter().map(Self::derive).collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    covariance(values, values)
}

/// Sample covariance of two equal-length series
fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = mean(&a[..n]);
    let mean_b = mean(&b[..n]);

    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}

/// 2x2 sample covariance matrix of (x, y)
fn covariance_matrix(x: &[f64], y: &[f64]) -> [[f64; 2]; 2] {
    let cov_xy = covariance(x, y);
    [[covariance(x, x), cov_xy], [cov_xy, covariance(y, y)]]
}

fn trace(matrix: &[[f64; 2]; 2]) -> f64 {
    matrix[0][0] + matrix[1][1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn make_test_aggregate(x: Vec<f64>, y: Vec<f64>) -> VideoAggregate {
        let time = (0..x.len()).map(|i| i as f64 * 0.1).collect();
        VideoAggregate {
            video_id: "v1".to_string(),
            x,
            y,
            time,
            mean_detection_confidence: 3.0,
            min_gaze_duration: 15.0,
            mean_age: 30.0,
            hazard_detected: true,
            mean_license_age: 18.0,
            no_detection_no_to_subtle_hazard: false,
            weighted_hazard_severity: 0.5,
            attention_factors: BTreeMap::new(),
        }
    }

    #[test]
    fn test_bessel_corrected_variance() {
        let features =
            SpatialFeatureDeriver::derive(make_test_aggregate(vec![1.0, 2.0, 3.0], vec![5.0, 5.0, 5.0]));

        assert!((features.mean_x - 2.0).abs() < 1e-12);
        assert!((features.variance_x - 1.0).abs() < 1e-12);
        assert_eq!(features.variance_y, 0.0);
        assert_eq!(features.num_gazes, 3);
    }

    #[test]
    fn test_spread_is_covariance_trace() {
        let features = SpatialFeatureDeriver::derive(make_test_aggregate(
            vec![1.0, 4.0, 2.0, 7.0],
            vec![3.0, 1.0, 8.0, 2.0],
        ));

        let expected = features.variance_x + features.variance_y;
        assert!((features.spread_feature - expected).abs() < 1e-9);
        assert!(features.spread_feature > 0.0);
    }

    #[test]
    fn test_gaze_variance_of_centroid_distance() {
        // Points on a circle around the centroid have constant distance
        let features = SpatialFeatureDeriver::derive(make_test_aggregate(
            vec![1.0, -1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, -1.0],
        ));
        assert!(features.gaze_variance.abs() < 1e-12);

        // Centroid at the origin, distances sqrt(2), sqrt(2), 2
        let features = SpatialFeatureDeriver::derive(make_test_aggregate(
            vec![1.0, -1.0, 0.0],
            vec![1.0, 1.0, -2.0],
        ));
        let d = [2f64.sqrt(), 2f64.sqrt(), 2.0];
        let m = d.iter().sum::<f64>() / 3.0;
        let expected = d.iter().map(|v| (v - m).powi(2)).sum::<f64>() / 2.0;
        assert!((features.gaze_variance - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_sample_statistics_are_zero() {
        let features = SpatialFeatureDeriver::derive(make_test_aggregate(vec![10.0], vec![20.0]));

        assert_eq!(features.num_gazes, 1);
        assert_eq!(features.mean_x, 10.0);
        assert_eq!(features.variance_x, 0.0);
        assert_eq!(features.gaze_variance, 0.0);
        assert_eq!(features.spread_feature, 0.0);
        assert!(!features.spread_feature.is_nan());
    }
}
