//! Input record schemas
//!
//! Schema A (`SurveyRecord`) is one document-store survey result per session.
//! Schema B (`ProfileRecord`) is one user profile carrying demographics.
//!
//! Both are exported from a document store whose forms were filled in a browser, so
//! numeric fields are accepted either as JSON numbers or numeric strings, and the
//! survey form may be nested under `formData` instead of sitting at the top level.

use crate::types::{Demographics, GazePoint, ScreenDimensions, SessionKey, SurveyAnswers};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Survey result schema identifier
pub const SURVEY_SCHEMA: &str = "hazard.survey_result.v1";

/// User profile schema identifier
pub const PROFILE_SCHEMA: &str = "hazard.user_profile.v1";

/// Survey form keys consumed into [`SurveyAnswers`]; every other `formData` key
/// is carried through untouched.
const ANSWER_KEYS: [&str; 9] = [
    "hazardDetected",
    "noDetectionReason",
    "detectionConfidence",
    "hazardSeverity",
    "attentionFactors",
    "attentionFactor",
    "spacebarTimestamps",
    "startTime",
    "endTime",
];

/// Schema A: one survey result (one user watching one video)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub user_id: String,
    pub video_id: String,
    #[serde(default)]
    pub gaze: Vec<GazePoint>,
    #[serde(default)]
    pub window_dimensions: Option<ScreenDimensions>,
    #[serde(default)]
    pub hazard_detected: Option<bool>,
    #[serde(default)]
    pub no_detection_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub detection_confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hazard_severity: Option<f64>,
    #[serde(default, alias = "attentionFactor")]
    pub attention_factors: Option<Vec<String>>,
    #[serde(default)]
    pub spacebar_timestamps: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub start_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub form_data: Map<String, Value>,
}

impl SurveyRecord {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.user_id.clone(), self.video_id.clone())
    }

    /// Survey answers, preferring top-level fields over `formData` entries.
    pub fn answers(&self) -> SurveyAnswers {
        let form = &self.form_data;

        let attention_factors = self
            .attention_factors
            .clone()
            .or_else(|| form_string_vec(form, "attentionFactors"))
            .or_else(|| form_string_vec(form, "attentionFactor"))
            .unwrap_or_default();

        SurveyAnswers {
            hazard_detected: self
                .hazard_detected
                .or_else(|| form.get("hazardDetected").and_then(Value::as_bool))
                .unwrap_or(false),
            no_detection_reason: self.no_detection_reason.clone().or_else(|| {
                form.get("noDetectionReason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            detection_confidence: self
                .detection_confidence
                .or_else(|| form.get("detectionConfidence").and_then(value_as_f64)),
            hazard_severity: self
                .hazard_severity
                .or_else(|| form.get("hazardSeverity").and_then(value_as_f64)),
            attention_factors,
            spacebar_timestamps: self
                .spacebar_timestamps
                .clone()
                .or_else(|| form_f64_vec(form, "spacebarTimestamps"))
                .unwrap_or_default(),
            start_time: self
                .start_time
                .or_else(|| form.get("startTime").and_then(value_as_f64)),
            end_time: self
                .end_time
                .or_else(|| form.get("endTime").and_then(value_as_f64)),
        }
    }

    /// `formData` entries that are not survey answers
    pub fn extra_form_data(&self) -> Map<String, Value> {
        self.form_data
            .iter()
            .filter(|(k, _)| !ANSWER_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Validate the record structure
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() || self.video_id.trim().is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }

        let window = self
            .window_dimensions
            .ok_or(ValidationError::MissingWindowDimensions)?;
        if !(window.width.is_finite() && window.width > 0.0)
            || !(window.height.is_finite() && window.height > 0.0)
        {
            return Err(ValidationError::InvalidScreenDimensions {
                width: window.width,
                height: window.height,
            });
        }

        if let Some(index) = self
            .gaze
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.time.is_finite()))
        {
            return Err(ValidationError::NonFiniteGaze { index });
        }

        if let Some(index) = self
            .answers()
            .spacebar_timestamps
            .iter()
            .position(|t| !t.is_finite())
        {
            return Err(ValidationError::NonFiniteInterval { index });
        }

        Ok(())
    }
}

/// Demographic fields as they appear in a profile document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub age: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub license_age: Option<f64>,
    #[serde(default)]
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub visually_impaired: Option<bool>,
}

/// Schema B: one user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Identity key shared with schema A
    #[serde(default)]
    pub user_id: Option<String>,
    /// Fallback identity key for profiles keyed by e-mail address
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub fields: ProfileFields,
    /// Registration form, when demographics were stored nested
    #[serde(default)]
    pub form: Option<ProfileFields>,
}

impl ProfileRecord {
    /// Join key: `userId`, falling back to `email`. Blank values do not count.
    pub fn key(&self) -> Option<&str> {
        [self.user_id.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty())
    }

    /// Validate the profile has a join key
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.key() {
            Some(_) => Ok(()),
            None => Err(ValidationError::MissingProfileKey),
        }
    }

    /// Demographics with top-level fields taking precedence over the nested form
    pub fn demographics(&self) -> Demographics {
        let top = &self.fields;
        let nested = self.form.clone().unwrap_or_default();

        Demographics {
            age: top.age.or(nested.age),
            license_age: top.license_age.or(nested.license_age),
            ethnicity: top.ethnicity.clone().or(nested.ethnicity),
            gender: top.gender.clone().or(nested.gender),
            country: top.country.clone().or(nested.country),
            state: top.state.clone().or(nested.state),
            city: top.city.clone().or(nested.city),
            visually_impaired: top.visually_impaired.or(nested.visually_impaired),
        }
    }
}

/// Validation errors for survey and profile records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("userId and videoId must be non-empty")]
    EmptyIdentity,

    #[error("profile has neither userId nor email")]
    MissingProfileKey,

    #[error("windowDimensions is missing")]
    MissingWindowDimensions,

    #[error("screen dimensions {width}x{height} must be positive")]
    InvalidScreenDimensions { width: f64, height: f64 },

    #[error("gaze sample {index} has a non-finite coordinate or time")]
    NonFiniteGaze { index: usize },

    #[error("spacebar timestamp {index} is not finite")]
    NonFiniteInterval { index: usize },
}

/// Accept a JSON number, a numeric string, or null/empty string as `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn form_string_vec(form: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    form.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn form_f64_vec(form: &Map<String, Value>, key: &str) -> Option<Vec<f64>> {
    form.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(value_as_f64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_flat_survey_record() {
        let json = r#"{
            "userId": "a@example.com",
            "videoId": "video_001",
            "gaze": [{"x": 100, "y": 200, "time": 1000}],
            "windowDimensions": {"width": 1920, "height": 1080},
            "hazardDetected": true,
            "spacebarTimestamps": [1200, 1500],
            "attentionFactors": ["Pedestrian"],
            "detectionConfidence": "4",
            "startTime": 1000,
            "endTime": 16000
        }"#;

        let record: SurveyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key(), SessionKey::new("a@example.com", "video_001"));
        assert_eq!(record.gaze.len(), 1);
        assert!(record.validate().is_ok());

        let answers = record.answers();
        assert!(answers.hazard_detected);
        assert_eq!(answers.spacebar_timestamps, vec![1200.0, 1500.0]);
        assert_eq!(answers.detection_confidence, Some(4.0));
        assert_eq!(answers.attention_factors, vec!["Pedestrian".to_string()]);
    }

    #[test]
    fn test_answers_fall_back_to_form_data() {
        let json = r#"{
            "userId": "u1",
            "videoId": "v1",
            "windowDimensions": {"width": 1280, "height": 960},
            "formData": {
                "hazardDetected": true,
                "noDetectionReason": "",
                "detectionConfidence": 3,
                "hazardSeverity": 2,
                "attentionFactor": ["Vehicle", "Cyclist"],
                "spacebarTimestamps": [10, 20, 30, 40],
                "startTime": 0,
                "endTime": 15000,
                "browser": "firefox"
            }
        }"#;

        let record: SurveyRecord = serde_json::from_str(json).unwrap();
        let answers = record.answers();
        assert!(answers.hazard_detected);
        assert_eq!(answers.no_detection_reason.as_deref(), Some(""));
        assert_eq!(answers.hazard_severity, Some(2.0));
        assert_eq!(answers.attention_factors.len(), 2);
        assert_eq!(answers.spacebar_timestamps.len(), 4);
        assert_eq!(answers.end_time, Some(15000.0));

        let extra = record.extra_form_data();
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("browser"));
    }

    #[test]
    fn test_validation_errors() {
        let mut record: SurveyRecord = serde_json::from_str(
            r#"{"userId": "u1", "videoId": "v1", "windowDimensions": {"width": 0, "height": 960}}"#,
        )
        .unwrap();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidScreenDimensions { .. })
        ));

        record.window_dimensions = None;
        assert_eq!(
            record.validate(),
            Err(ValidationError::MissingWindowDimensions)
        );

        record.window_dimensions = Some(ScreenDimensions {
            width: 1280.0,
            height: 960.0,
        });
        record.gaze = vec![
            GazePoint { x: 1.0, y: 1.0, time: 0.0 },
            GazePoint { x: f64::NAN, y: 1.0, time: 1.0 },
        ];
        assert_eq!(
            record.validate(),
            Err(ValidationError::NonFiniteGaze { index: 1 })
        );
    }

    #[test]
    fn test_profile_accepts_email_and_nested_form() {
        let json = r#"{
            "email": "a@example.com",
            "age": 34,
            "form": {
                "age": 99,
                "licenseAge": "17",
                "ethnicity": "White",
                "gender": "female",
                "city": "Boca",
                "visuallyImpaired": false
            }
        }"#;

        let profile: ProfileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(profile.key(), Some("a@example.com"));

        let demographics = profile.demographics();
        assert_eq!(demographics.age, Some(34.0));
        assert_eq!(demographics.license_age, Some(17.0));
        assert_eq!(demographics.city.as_deref(), Some("Boca"));
        assert_eq!(demographics.visually_impaired, Some(false));
        assert_eq!(demographics.country, None);
    }

    #[test]
    fn test_empty_license_age_is_missing() {
        let profile: ProfileRecord =
            serde_json::from_str(r#"{"userId": "u1", "licenseAge": ""}"#).unwrap();
        assert_eq!(profile.demographics().license_age, None);
    }

    #[test]
    fn test_profile_with_user_id_and_email() {
        let profile: ProfileRecord = serde_json::from_str(
            r#"{"userId": "u1", "email": "u1@example.com", "age": 30}"#,
        )
        .unwrap();
        assert_eq!(profile.key(), Some("u1"));
        assert!(profile.validate().is_ok());
        assert_eq!(profile.demographics().age, Some(30.0));

        let profile: ProfileRecord =
            serde_json::from_str(r#"{"userId": " ", "email": "u2@example.com"}"#).unwrap();
        assert_eq!(profile.key(), Some("u2@example.com"));
    }

    #[test]
    fn test_profile_without_key_is_invalid() {
        let profile: ProfileRecord = serde_json::from_str(r#"{"age": 30}"#).unwrap();
        assert_eq!(profile.key(), None);
        assert_eq!(profile.validate(), Err(ValidationError::MissingProfileKey));
    }
}
