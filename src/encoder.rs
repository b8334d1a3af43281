//! Categorical encoding
//!
//! Session-level categorical attributes are expanded into boolean flag columns
//! against a versioned [`CategoryVocabulary`], so the output schema does not depend
//! on which values happen to appear in a run:
//! - single-valued columns become mutually exclusive `{column}_{value}` flags
//! - `attentionFactors` becomes independent `attentionFactors_{value}` flags
//! - missing or blank values are `ignore` and set no flag
//! - values outside the vocabulary set the column's `other` flag
//!
//! Sessions missing a required numeric field are routed to the incomplete table.

use crate::error::ComputeError;
use crate::types::{
    HazardLabeledSample, IncompleteGazeSample, LabeledGazeSample, Session, SessionFeatures,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Category vocabulary version identifier
pub const CATEGORY_SCHEMA: &str = "hazard.categories.v1";

/// Category assigned to missing or blank values; never encoded
pub const IGNORE_CATEGORY: &str = "ignore";

/// Fallback category for values outside the vocabulary
pub const OTHER_CATEGORY: &str = "other";

/// Single-valued categorical columns, in encoding order
pub const CATEGORICAL_COLUMNS: [&str; 6] = [
    "noDetectionReason",
    "country",
    "state",
    "city",
    "ethnicity",
    "gender",
];

/// Multi-valued column prefix
pub const ATTENTION_FACTORS_COLUMN: &str = "attentionFactors";

/// Numeric fields a row must carry to reach the aggregate tables
pub const REQUIRED_FIELDS: [&str; 4] = ["detectionConfidence", "gazeDuration", "age", "licenseAge"];

/// Known category values per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub version: String,
    /// Known values per single-valued column; `other` is always implied
    pub columns: BTreeMap<String, Vec<String>>,
    /// Known attention factors; `other` is always implied
    pub attention_factors: Vec<String>,
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        let column = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

        let mut columns = BTreeMap::new();
        columns.insert(
            "noDetectionReason".to_string(),
            column(&["nohazards", "subtlehazards"]),
        );
        columns.insert("country".to_string(), column(&["ar", "fr", "tn", "us"]));
        columns.insert(
            "state".to_string(),
            column(&[
                "california",
                "florida",
                "massachusetts",
                "north carolina",
                "oregon",
                "south carolina",
                "washington",
            ]),
        );
        columns.insert(
            "city".to_string(),
            column(&[
                "boca raton",
                "boston",
                "chapel hill",
                "charlotte",
                "coconut creek",
                "delray beach",
                "durham",
                "los angeles",
                "miami",
                "olympia",
                "puyallup",
                "raleigh",
                "san diego",
                "seattle",
                "tega cay",
                "west linn",
                "woodland hills",
            ]),
        );
        columns.insert(
            "ethnicity".to_string(),
            column(&[
                "asian",
                "black or african american",
                "hispanic or latino",
                "middle eastern or north african",
                "multiracial",
                "native american or alaska native",
                "native hawaiian or other pacific islander",
                "prefer not to say",
                "white",
            ]),
        );
        columns.insert(
            "gender".to_string(),
            column(&["female", "male", "prefer-not-to-say"]),
        );

        Self {
            version: CATEGORY_SCHEMA.to_string(),
            columns,
            attention_factors: column(&[
                "pedestrian",
                "vehicle",
                "cyclist",
                "animal",
                "traffic signal",
                "road sign",
                "road condition",
                "obstacle",
            ]),
        }
    }
}

impl CategoryVocabulary {
    /// Parse a vocabulary from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let vocabulary: CategoryVocabulary = serde_json::from_str(json)?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Every categorical column must be present and values must already be clean.
    pub fn validate(&self) -> Result<(), ComputeError> {
        for column in CATEGORICAL_COLUMNS {
            if !self.columns.contains_key(column) {
                return Err(ComputeError::EncodingError(format!(
                    "vocabulary {} has no values for column {}",
                    self.version, column
                )));
            }
        }

        let lists = self
            .columns
            .iter()
            .map(|(column, values)| (column.as_str(), values))
            .chain(std::iter::once((
                ATTENTION_FACTORS_COLUMN,
                &self.attention_factors,
            )));

        for (column, values) in lists {
            if !CATEGORICAL_COLUMNS.contains(&column) && column != ATTENTION_FACTORS_COLUMN {
                return Err(ComputeError::EncodingError(format!(
                    "unknown categorical column {}",
                    column
                )));
            }
            for value in values {
                if value.is_empty() || value.as_str() == IGNORE_CATEGORY || *value != clean(value) {
                    return Err(ComputeError::EncodingError(format!(
                        "invalid category {:?} for column {}",
                        value, column
                    )));
                }
            }
        }

        Ok(())
    }

    /// Known values of a column followed by the `other` fallback
    pub fn values_with_fallback<'a>(&'a self, values: &'a [String]) -> Vec<&'a str> {
        let mut out: Vec<&str> = values.iter().map(String::as_str).collect();
        if !out.contains(&OTHER_CATEGORY) {
            out.push(OTHER_CATEGORY);
        }
        out
    }

    /// Output column names produced by this vocabulary, in encoding order
    pub fn flag_columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        for value in self.values_with_fallback(&self.attention_factors) {
            names.push(flag_name(ATTENTION_FACTORS_COLUMN, value));
        }
        for column in CATEGORICAL_COLUMNS {
            if let Some(values) = self.columns.get(column) {
                for value in self.values_with_fallback(values) {
                    names.push(flag_name(column, value));
                }
            }
        }
        names
    }
}

/// Outcome of encoding one session
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedSession {
    Complete(SessionFeatures),
    Incomplete { missing_fields: Vec<String> },
}

/// Encoder expanding session attributes into flag columns
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    vocabulary: CategoryVocabulary,
}

impl Default for CategoricalEncoder {
    fn default() -> Self {
        Self::new(CategoryVocabulary::default())
    }
}

impl CategoricalEncoder {
    pub fn new(vocabulary: CategoryVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &CategoryVocabulary {
        &self.vocabulary
    }

    /// Encode one session's attributes.
    pub fn encode(&self, session: &Session) -> EncodedSession {
        let answers = &session.answers;
        let demographics = &session.demographics;

        let required = [
            answers.detection_confidence,
            session.gaze_duration_sec(),
            demographics.age,
            demographics.license_age,
        ]
        .map(|value| value.filter(|v| v.is_finite()));

        let [Some(detection_confidence), Some(gaze_duration), Some(age), Some(license_age)] =
            required
        else {
            let missing_fields = REQUIRED_FIELDS
                .iter()
                .zip(required)
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return EncodedSession::Incomplete { missing_fields };
        };

        let mut categories = BTreeMap::new();
        for column in CATEGORICAL_COLUMNS {
            let raw = match column {
                "noDetectionReason" => answers.no_detection_reason.as_deref(),
                "country" => demographics.country.as_deref(),
                "state" => demographics.state.as_deref(),
                "city" => demographics.city.as_deref(),
                "ethnicity" => demographics.ethnicity.as_deref(),
                _ => demographics.gender.as_deref(),
            };
            self.one_hot(column, raw, &mut categories);
        }

        let no_detection_no_to_subtle_hazard = categories
            .get(&flag_name("noDetectionReason", "nohazards"))
            .copied()
            .unwrap_or(false)
            || categories
                .get(&flag_name("noDetectionReason", "subtlehazards"))
                .copied()
                .unwrap_or(false);

        EncodedSession::Complete(SessionFeatures {
            detection_confidence,
            gaze_duration,
            age,
            license_age,
            hazard_detected: answers.hazard_detected,
            hazard_severity: answers.hazard_severity,
            no_detection_no_to_subtle_hazard,
            attention_factors: self.multi_hot(&answers.attention_factors),
            categories,
        })
    }

    /// Attach encoded attributes to a session's labeled samples.
    ///
    /// Returns the complete rows and the incomplete rows; one of the two is empty.
    pub fn apply(
        &self,
        session: &Session,
        labeled: Vec<HazardLabeledSample>,
    ) -> (Vec<LabeledGazeSample>, Vec<IncompleteGazeSample>) {
        match self.encode(session) {
            EncodedSession::Complete(features) => (
                labeled
                    .into_iter()
                    .map(|labeled| LabeledGazeSample {
                        labeled,
                        features: features.clone(),
                    })
                    .collect(),
                Vec::new(),
            ),
            EncodedSession::Incomplete { missing_fields } => (
                Vec::new(),
                labeled
                    .into_iter()
                    .map(|labeled| IncompleteGazeSample {
                        labeled,
                        missing_fields: missing_fields.clone(),
                    })
                    .collect(),
            ),
        }
    }

    fn one_hot(&self, column: &str, raw: Option<&str>, flags: &mut BTreeMap<String, bool>) {
        let Some(known) = self.vocabulary.columns.get(column) else {
            return;
        };

        let mut value = clean(raw.unwrap_or(""));
        if column == "city" && value == "boca" {
            value = "boca raton".to_string();
        }

        let category = if value == IGNORE_CATEGORY || known.contains(&value) {
            value
        } else {
            debug!(column, value = %value, "unknown category mapped to other");
            OTHER_CATEGORY.to_string()
        };

        for known_value in self.vocabulary.values_with_fallback(known) {
            flags.insert(flag_name(column, known_value), known_value == category);
        }
    }

    fn multi_hot(&self, factors: &[String]) -> BTreeMap<String, bool> {
        let known = self.vocabulary.values_with_fallback(&self.vocabulary.attention_factors);
        let mut flags: BTreeMap<String, bool> = known
            .iter()
            .map(|value| (flag_name(ATTENTION_FACTORS_COLUMN, value), false))
            .collect();

        for factor in factors {
            let value = clean(factor);
            if value == IGNORE_CATEGORY {
                continue;
            }
            let category = if known.contains(&value.as_str()) {
                value.as_str()
            } else {
                debug!(value = %value, "unknown attention factor mapped to other");
                OTHER_CATEGORY
            };
            flags.insert(flag_name(ATTENTION_FACTORS_COLUMN, category), true);
        }

        flags
    }
}

/// Trim and lower-case a category; blank text becomes `ignore`.
fn clean(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        IGNORE_CATEGORY.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

fn flag_name(column: &str, value: &str) -> String {
    format!("{}_{}", column, value)
}
