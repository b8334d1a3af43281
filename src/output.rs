//! Table serialization
//!
//! Each output table is written to its own file in an output directory, alongside a
//! `report.json` describing the run.

use crate::error::ComputeError;
use crate::pipeline::PipelineOutput;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Normalized/good-quality samples (Output 1)
pub const NORMALIZED_TABLE: &str = "normalized_gaze_data";
/// Samples of rejected sessions (Output 2)
pub const REJECTED_TABLE: &str = "rejected_gaze_data";
pub const LABELED_TABLE: &str = "labeled_gaze_data";
pub const INCOMPLETE_TABLE: &str = "incomplete_gaze_data";
/// Per-video summary (Output 3)
pub const AGGREGATE_TABLE: &str = "aggregate_gaze_data_by_video";
/// Time-binned training rows (Output 4)
pub const BINNED_TABLE: &str = "binned_video_data";
pub const SESSION_QUALITY_TABLE: &str = "session_quality";
pub const REPORT_FILE: &str = "report.json";

/// Serialization format for tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Ndjson,
    /// JSON array
    Json,
    /// Pretty-printed JSON array
    JsonPretty,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Ndjson => "ndjson",
            OutputFormat::Json | OutputFormat::JsonPretty => "json",
        }
    }
}

/// Serialize rows in the given format
pub fn format_table<T: Serialize>(rows: &[T], format: OutputFormat) -> Result<String, ComputeError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for row in rows {
                out.push_str(&serde_json::to_string(row)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(rows)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(rows)?),
    }
}

/// Writer placing every table of a run into one directory
pub struct TableWriter {
    dir: PathBuf,
    format: OutputFormat,
}

impl TableWriter {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    /// Write every table and the run report; returns the written paths.
    pub fn write_all(&self, output: &PipelineOutput) -> Result<Vec<PathBuf>, ComputeError> {
        fs::create_dir_all(&self.dir)?;

        let paths = vec![
            self.write_table(NORMALIZED_TABLE, &output.normalized)?,
            self.write_table(REJECTED_TABLE, &output.rejected)?,
            self.write_table(LABELED_TABLE, &output.labeled)?,
            self.write_table(INCOMPLETE_TABLE, &output.incomplete)?,
            self.write_table(AGGREGATE_TABLE, &output.aggregates)?,
            self.write_table(BINNED_TABLE, &output.bins)?,
            self.write_table(SESSION_QUALITY_TABLE, &output.session_quality)?,
            self.write_report(output)?,
        ];

        Ok(paths)
    }

    /// Write one table as `{name}.{ext}`
    pub fn write_table<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf, ComputeError> {
        let path = self.dir.join(format!("{}.{}", name, self.format.extension()));
        write_file(&path, &format_table(rows, self.format)?)?;
        debug!(path = %path.display(), rows = rows.len(), "wrote table");
        Ok(path)
    }

    fn write_report(&self, output: &PipelineOutput) -> Result<PathBuf, ComputeError> {
        let path = self.dir.join(REPORT_FILE);
        write_file(&path, &serde_json::to_string_pretty(&output.report)?)?;
        Ok(path)
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), ComputeError> {
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeBin;

    fn make_test_bins() -> Vec<TimeBin> {
        vec![
            TimeBin {
                video_id: "v1".to_string(),
                bin_index: 0,
                time: 0.0,
                x: 10.0,
                y: 20.0,
                hazard: false,
            },
            TimeBin {
                video_id: "v1".to_string(),
                bin_index: 1,
                time: 0.28,
                x: 30.0,
                y: 40.0,
                hazard: true,
            },
        ]
    }

    #[test]
    fn test_ndjson_one_row_per_line() {
        let out = format_table(&make_test_bins(), OutputFormat::Ndjson).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let row: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(row["videoId"], "v1");
        assert_eq!(row["hazard"], true);
        assert!(row.get("bin_index").is_none());
    }

    #[test]
    fn test_json_array() {
        let out = format_table(&make_test_bins(), OutputFormat::Json).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_empty_ndjson_table() {
        let rows: Vec<TimeBin> = Vec::new();
        assert_eq!(format_table(&rows, OutputFormat::Ndjson).unwrap(), "");
    }

    #[test]
    fn test_extensions() {
        assert_eq!(OutputFormat::Ndjson.extension(), "ndjson");
        assert_eq!(OutputFormat::JsonPretty.extension(), "json");
    }
}
