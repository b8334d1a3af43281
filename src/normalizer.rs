//! Coordinate normalization
//!
//! Gaze points are captured in screen pixels on whatever screen the participant used.
//! The video is shown as the largest rectangle of the canonical aspect ratio that fits
//! the screen, centered, so each raw point is shifted by the letterbox/pillarbox offset
//! and rescaled from the display box into the canonical video space.

use crate::config::PipelineConfig;
use crate::error::ComputeError;
use crate::types::{DisplayBox, GazePoint, NormalizedGazeSample, ScreenDimensions, Session};

/// Normalizer mapping screen-space gaze into the canonical video space
#[derive(Debug, Clone)]
pub struct CoordinateNormalizer {
    width: f64,
    height: f64,
}

impl CoordinateNormalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            width: config.canonical_width,
            height: config.canonical_height,
        }
    }

    /// Largest video-aspect rectangle fitting `screen`, centered.
    pub fn display_box(&self, screen: ScreenDimensions) -> DisplayBox {
        let video_aspect = self.width / self.height;
        let screen_aspect = screen.width / screen.height;

        let (display_width, display_height) = if screen_aspect > video_aspect {
            // Pillarbox: screen is wider than the video
            (screen.height * video_aspect, screen.height)
        } else {
            // Letterbox
            (screen.width, screen.width / video_aspect)
        };

        DisplayBox {
            display_width,
            display_height,
            x_offset: (screen.width - display_width) / 2.0,
            y_offset: (screen.height - display_height) / 2.0,
        }
    }

    /// Map one raw point into canonical space, clipped to [0, W] x [0, H].
    pub fn normalize_point(&self, x: f64, y: f64, display: &DisplayBox) -> (f64, f64) {
        let video_x = (x - display.x_offset) / display.display_width * self.width;
        let video_y = (y - display.y_offset) / display.display_height * self.height;
        (
            video_x.clamp(0.0, self.width),
            video_y.clamp(0.0, self.height),
        )
    }

    /// Normalize every gaze point of a session, in input order.
    ///
    /// Fails when the capture screen has a non-positive or non-finite dimension, or
    /// when a gaze point has a non-finite coordinate or time.
    pub fn normalize_session(
        &self,
        session: &Session,
    ) -> Result<Vec<NormalizedGazeSample>, ComputeError> {
        let screen = session.window;
        if !(screen.width.is_finite() && screen.width > 0.0)
            || !(screen.height.is_finite() && screen.height > 0.0)
        {
            return Err(ComputeError::InvalidScreenDimensions {
                user_id: session.key.user_id.clone(),
                video_id: session.key.video_id.clone(),
                width: screen.width,
                height: screen.height,
            });
        }

        if let Some(index) = session
            .gaze
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.time.is_finite()))
        {
            return Err(ComputeError::InvalidGazeSample {
                user_id: session.key.user_id.clone(),
                video_id: session.key.video_id.clone(),
                index,
            });
        }

        let display = self.display_box(screen);

        Ok(session
            .gaze
            .iter()
            .map(|point| self.normalize_sample(session, point, &display))
            .collect())
    }

    fn normalize_sample(
        &self,
        session: &Session,
        point: &GazePoint,
        display: &DisplayBox,
    ) -> NormalizedGazeSample {
        let (x, y) = self.normalize_point(point.x, point.y, display);

        NormalizedGazeSample {
            user_id: session.key.user_id.clone(),
            video_id: session.key.video_id.clone(),
            time: point.time,
            x,
            y,
            original_x: point.x,
            original_y: point.y,
            original_width: session.window.width,
            original_height: session.window.height,
            display: *display,
            normalized_to_width: self.width,
            normalized_to_height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Demographics, SessionKey, SurveyAnswers};

    fn make_test_session(width: f64, height: f64, gaze: Vec<GazePoint>) -> Session {
        Session {
            key: SessionKey::new("u1", "v1"),
            window: ScreenDimensions { width, height },
            answers: SurveyAnswers::default(),
            demographics: Demographics::default(),
            form_data: serde_json::Map::new(),
            gaze,
        }
    }

    fn point(x: f64, y: f64) -> GazePoint {
        GazePoint { x, y, time: 0.0 }
    }

    #[test]
    fn test_same_aspect_has_no_offset() {
        let normalizer = CoordinateNormalizer::new(&PipelineConfig::default());
        let session = make_test_session(640.0, 480.0, vec![point(320.0, 120.0)]);

        let samples = normalizer.normalize_session(&session).unwrap();
        let sample = &samples[0];

        assert_eq!(sample.display.x_offset, 0.0);
        assert_eq!(sample.display.y_offset, 0.0);
        // Scaled by W / screenWidth = 2
        assert!((sample.x - 640.0).abs() < 1e-9);
        assert!((sample.y - 240.0).abs() < 1e-9);
        assert_eq!(sample.original_x, 320.0);
        assert_eq!(sample.normalized_to_width, 1280.0);
    }

    #[test]
    fn test_wide_screen_is_pillarboxed() {
        let normalizer = CoordinateNormalizer::new(&PipelineConfig::default());
        let display = normalizer.display_box(ScreenDimensions {
            width: 1920.0,
            height: 1080.0,
        });

        assert!((display.display_height - 1080.0).abs() < 1e-9);
        assert!((display.display_width - 1440.0).abs() < 1e-9);
        assert!((display.x_offset - 240.0).abs() < 1e-9);
        assert_eq!(display.y_offset, 0.0);

        // Center of the screen maps to the center of the video
        let (x, y) = normalizer.normalize_point(960.0, 540.0, &display);
        assert!((x - 640.0).abs() < 1e-9);
        assert!((y - 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_tall_screen_is_letterboxed() {
        let normalizer = CoordinateNormalizer::new(&PipelineConfig::default());
        let display = normalizer.display_box(ScreenDimensions {
            width: 800.0,
            height: 1000.0,
        });

        assert!((display.display_width - 800.0).abs() < 1e-9);
        assert!((display.display_height - 600.0).abs() < 1e-9);
        assert_eq!(display.x_offset, 0.0);
        assert!((display.y_offset - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_points_outside_video_are_clipped() {
        let normalizer = CoordinateNormalizer::new(&PipelineConfig::default());
        let session = make_test_session(
            1920.0,
            1080.0,
            vec![point(10.0, -5.0), point(1910.0, 2000.0)],
        );

        let samples = normalizer.normalize_session(&session).unwrap();
        assert_eq!((samples[0].x, samples[0].y), (0.0, 0.0));
        assert_eq!((samples[1].x, samples[1].y), (1280.0, 960.0));
    }

    #[test]
    fn test_zero_screen_fails_fast() {
        let normalizer = CoordinateNormalizer::new(&PipelineConfig::default());
        let session = make_test_session(0.0, 1080.0, vec![point(1.0, 1.0)]);

        let err = normalizer.normalize_session(&session).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidScreenDimensions { .. }));
    }

    #[test]
    fn test_non_finite_gaze_fails_fast() {
        let normalizer = CoordinateNormalizer::new(&PipelineConfig::default());

        let mut bad_x = point(1.0, 1.0);
        bad_x.x = f64::NAN;
        let session = make_test_session(1280.0, 960.0, vec![point(1.0, 1.0), bad_x]);
        let err = normalizer.normalize_session(&session).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidGazeSample { index: 1, .. }));

        let mut bad_time = point(1.0, 1.0);
        bad_time.time = f64::INFINITY;
        let session = make_test_session(1280.0, 960.0, vec![bad_time]);
        let err = normalizer.normalize_session(&session).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidGazeSample { index: 0, .. }));
    }
}
