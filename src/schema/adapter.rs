//! Adapter for turning survey and profile records into joined sessions
//!
//! Survey results are left-joined to user profiles on `userId`. Every survey becomes
//! its own session with its own screen, answers and gaze stream, even when a user
//! watched the same video more than once.

use crate::error::ComputeError;
use crate::schema::records::*;
use crate::types::{Demographics, Session, SessionKey};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Adapter for converting input records to sessions
pub struct SessionAdapter;

impl SessionAdapter {
    /// Parse a JSON string containing an array of survey results
    pub fn parse_surveys_array(json: &str) -> Result<Vec<SurveyRecord>, ComputeError> {
        parse_array(json)
    }

    /// Parse NDJSON containing one survey result per line
    pub fn parse_surveys_ndjson(ndjson: &str) -> Result<Vec<SurveyRecord>, ComputeError> {
        parse_ndjson(ndjson)
    }

    /// Parse a JSON string containing an array of user profiles
    pub fn parse_profiles_array(json: &str) -> Result<Vec<ProfileRecord>, ComputeError> {
        parse_array(json)
    }

    /// Parse NDJSON containing one user profile per line
    pub fn parse_profiles_ndjson(ndjson: &str) -> Result<Vec<ProfileRecord>, ComputeError> {
        parse_ndjson(ndjson)
    }

    /// Join survey results to profiles, producing one session per survey in input order.
    ///
    /// A survey without a matching profile keeps empty demographics. When a user has
    /// several profiles, the first one wins; profiles without a join key are skipped.
    /// Any structurally invalid survey aborts the join.
    pub fn join(
        surveys: &[SurveyRecord],
        profiles: &[ProfileRecord],
    ) -> Result<Vec<Session>, ComputeError> {
        let mut by_user: HashMap<&str, &ProfileRecord> = HashMap::new();
        for (index, profile) in profiles.iter().enumerate() {
            let Some(user_id) = profile.key() else {
                warn!(index, "profile has neither userId nor email; skipped");
                continue;
            };
            if by_user.contains_key(user_id) {
                debug!(user_id, "duplicate profile ignored");
                continue;
            }
            by_user.insert(user_id, profile);
        }

        surveys
            .iter()
            .map(|survey| {
                let key = survey.key();
                survey
                    .validate()
                    .map_err(|e| validation_to_compute_error(&key, survey, e))?;

                let demographics = match by_user.get(survey.user_id.as_str()) {
                    Some(profile) => profile.demographics(),
                    None => {
                        debug!(user_id = %survey.user_id, "no profile for user");
                        Demographics::default()
                    }
                };

                // validate() guarantees window dimensions are present
                let window = survey
                    .window_dimensions
                    .ok_or_else(|| ComputeError::MissingField("windowDimensions".to_string()))?;

                Ok(Session {
                    key,
                    window,
                    answers: survey.answers(),
                    demographics,
                    form_data: survey.extra_form_data(),
                    gaze: survey.gaze.clone(),
                })
            })
            .collect()
    }

    /// Validate a batch of survey results
    pub fn validate_records(surveys: &[SurveyRecord]) -> Vec<ValidationResult> {
        surveys
            .iter()
            .enumerate()
            .filter_map(|(idx, survey)| {
                survey.validate().err().map(|error| ValidationResult {
                    index: idx,
                    key: survey.key(),
                    error,
                })
            })
            .collect()
    }

    /// Validate a batch of user profiles
    pub fn validate_profiles(profiles: &[ProfileRecord]) -> Vec<ProfileValidationResult> {
        profiles
            .iter()
            .enumerate()
            .filter_map(|(index, profile)| {
                profile
                    .validate()
                    .err()
                    .map(|error| ProfileValidationResult { index, error })
            })
            .collect()
    }
}

/// Result of survey validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub key: SessionKey,
    pub error: ValidationError,
}

/// Result of profile validation
#[derive(Debug)]
pub struct ProfileValidationResult {
    pub index: usize,
    pub error: ValidationError,
}

fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, ComputeError> {
    let records: Vec<T> = serde_json::from_str(json)?;
    Ok(records)
}

fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, ComputeError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                return Err(ComputeError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(records)
}

fn validation_to_compute_error(
    key: &SessionKey,
    survey: &SurveyRecord,
    error: ValidationError,
) -> ComputeError {
    match error {
        ValidationError::EmptyIdentity | ValidationError::MissingProfileKey => {
            ComputeError::ParseError(format!(
                "Invalid survey record: {} (userId {:?}, videoId {:?})",
                error, survey.user_id, survey.video_id
            ))
        }
        ValidationError::MissingWindowDimensions => ComputeError::MissingField(format!(
            "windowDimensions for user {}, video {}",
            key.user_id, key.video_id
        )),
        ValidationError::InvalidScreenDimensions { width, height } => {
            ComputeError::InvalidScreenDimensions {
                user_id: key.user_id.clone(),
                video_id: key.video_id.clone(),
                width,
                height,
            }
        }
        ValidationError::NonFiniteGaze { index } => ComputeError::InvalidGazeSample {
            user_id: key.user_id.clone(),
            video_id: key.video_id.clone(),
            index,
        },
        ValidationError::NonFiniteInterval { .. } => ComputeError::MalformedIntervals {
            user_id: key.user_id.clone(),
            video_id: key.video_id.clone(),
            reason: error.to_string(),
        },
    }
}
