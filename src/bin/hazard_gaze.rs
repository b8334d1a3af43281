//! Hazard Gaze CLI - Command-line interface for the gaze dataset pipeline
//!
//! Commands:
//! - transform: Run the full pipeline and write every output table
//! - validate: Validate survey results and user profiles
//! - schema: Print input/output schema and category vocabulary
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use hazard_gaze::encoder::{CategoryVocabulary, ATTENTION_FACTORS_COLUMN, CATEGORICAL_COLUMNS};
use hazard_gaze::output::{
    AGGREGATE_TABLE, BINNED_TABLE, INCOMPLETE_TABLE, LABELED_TABLE, NORMALIZED_TABLE,
    REJECTED_TABLE, SESSION_QUALITY_TABLE,
};
use hazard_gaze::schema::{ProfileRecord, SessionAdapter, SurveyRecord};
use hazard_gaze::{
    GazePipeline, OutputFormat, PipelineConfig, TableWriter, PRODUCER_NAME, PROFILE_SCHEMA,
    SURVEY_SCHEMA, VERSION,
};

/// Hazard Gaze - build hazard detection training tables from eye-tracking sessions
#[derive(Parser)]
#[command(name = "hazard-gaze")]
#[command(version = VERSION)]
#[command(about = "Normalize, label and aggregate driving-video gaze data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every output table
    Transform {
        /// Survey results file (use - for stdin)
        #[arg(short, long)]
        surveys: PathBuf,

        /// User profiles file
        #[arg(short, long)]
        profiles: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Input format for both input files
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output table format
        #[arg(long, default_value = "ndjson")]
        output_format: TableFormat,

        /// Pipeline configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Category vocabulary file (JSON)
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },

    /// Validate survey results and, optionally, user profiles
    Validate {
        /// Survey results file (use - for stdin)
        #[arg(short, long)]
        surveys: PathBuf,

        /// User profiles file to check for join keys
        #[arg(short, long)]
        profiles: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a pipeline configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a category vocabulary file
        #[arg(long)]
        vocabulary: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum TableFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl From<TableFormat> for OutputFormat {
    fn from(format: TableFormat) -> Self {
        match format {
            TableFormat::Ndjson => OutputFormat::Ndjson,
            TableFormat::Json => OutputFormat::Json,
            TableFormat::JsonPretty => OutputFormat::JsonPretty,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schemas (survey results and user profiles)
    Input,
    /// Output tables
    Output,
    /// Default category vocabulary
    Vocabulary,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hazard_gaze=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GazeCliError> {
    match cli.command {
        Commands::Transform {
            surveys,
            profiles,
            output_dir,
            input_format,
            output_format,
            config,
            vocabulary,
        } => cmd_transform(
            &surveys,
            profiles.as_deref(),
            &output_dir,
            input_format,
            output_format,
            config.as_deref(),
            vocabulary.as_deref(),
        ),

        Commands::Validate {
            surveys,
            profiles,
            input_format,
            json,
        } => cmd_validate(&surveys, profiles.as_deref(), input_format, json),

        Commands::Doctor {
            config,
            vocabulary,
            json,
        } => cmd_doctor(config.as_deref(), vocabulary.as_deref(), json),

        Commands::Schema { schema_type, json } => cmd_schema(schema_type, json),
    }
}

fn cmd_transform(
    surveys_path: &Path,
    profiles_path: Option<&Path>,
    output_dir: &Path,
    input_format: InputFormat,
    output_format: TableFormat,
    config_path: Option<&Path>,
    vocabulary_path: Option<&Path>,
) -> Result<(), GazeCliError> {
    let config = match config_path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let vocabulary = match vocabulary_path {
        Some(path) => CategoryVocabulary::from_json(&fs::read_to_string(path)?)?,
        None => CategoryVocabulary::default(),
    };

    let surveys = read_surveys(surveys_path, &input_format)?;
    if surveys.is_empty() {
        return Err(GazeCliError::NoRecords);
    }

    let profiles: Vec<ProfileRecord> = match profiles_path {
        Some(path) => read_profiles(path, &input_format)?,
        None => Vec::new(),
    };

    let pipeline = GazePipeline::with_vocabulary(config, vocabulary)?;
    let output = pipeline.run(&surveys, &profiles)?;

    let writer = TableWriter::new(output_dir, output_format.into());
    let paths = writer.write_all(&output)?;

    println!("{}", serde_json::to_string_pretty(&output.report)?);
    for path in paths {
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

fn cmd_validate(
    surveys_path: &Path,
    profiles_path: Option<&Path>,
    input_format: InputFormat,
    json: bool,
) -> Result<(), GazeCliError> {
    let surveys = read_surveys(surveys_path, &input_format)?;
    let profiles = match profiles_path {
        Some(path) => read_profiles(path, &input_format)?,
        None => Vec::new(),
    };

    let survey_results = SessionAdapter::validate_records(&surveys);
    let profile_results = SessionAdapter::validate_profiles(&profiles);

    let mut errors: Vec<ValidationErrorDetail> = survey_results
        .iter()
        .map(|r| ValidationErrorDetail {
            record: "survey",
            index: r.index,
            user_id: Some(r.key.user_id.clone()),
            video_id: Some(r.key.video_id.clone()),
            error: r.error.to_string(),
        })
        .collect();
    errors.extend(profile_results.iter().map(|r| ValidationErrorDetail {
        record: "profile",
        index: r.index,
        user_id: None,
        video_id: None,
        error: r.error.to_string(),
    }));

    let total_records = surveys.len() + profiles.len();
    let report = ValidationReport {
        total_records,
        valid_records: total_records - errors.len(),
        invalid_records: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                match (&err.user_id, &err.video_id) {
                    (Some(user_id), Some(video_id)) => println!(
                        "  - {} {} (user {}, video {}): {}",
                        err.record, err.index, user_id, video_id, err.error
                    ),
                    _ => println!("  - {} {}: {}", err.record, err.index, err.error),
                }
            }
        }
    }

    if report.invalid_records > 0 {
        Err(GazeCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config_path: Option<&Path>,
    vocabulary_path: Option<&Path>,
    json: bool,
) -> Result<(), GazeCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck::ok("version", format!("{} version {}", PRODUCER_NAME, VERSION)),
        DoctorCheck::ok(
            "schema_version",
            format!("Input schemas: {}, {}", SURVEY_SCHEMA, PROFILE_SCHEMA),
        ),
    ];

    match config_path {
        Some(path) if path.exists() => checks.push(match PipelineConfig::from_file(path) {
            Ok(config) => DoctorCheck::ok(
                "config",
                format!(
                    "Config valid ({}x{}, bin width {}s, {:?})",
                    config.canonical_width,
                    config.canonical_height,
                    config.time_bin_width,
                    config.interval_semantics
                ),
            ),
            Err(e) => DoctorCheck::error("config", format!("Invalid config: {}", e)),
        }),
        Some(_) => checks.push(DoctorCheck::warning("config", "Config file does not exist")),
        None => checks.push(DoctorCheck::ok("config", "Using default configuration")),
    }

    if let Some(path) = vocabulary_path {
        let check = match fs::read_to_string(path) {
            Ok(content) => match CategoryVocabulary::from_json(&content) {
                Ok(vocabulary) => DoctorCheck::ok(
                    "vocabulary",
                    format!(
                        "Vocabulary {} valid ({} flag columns)",
                        vocabulary.version,
                        vocabulary.flag_columns().len()
                    ),
                ),
                Err(e) => DoctorCheck::error("vocabulary", format!("Invalid vocabulary: {}", e)),
            },
            Err(e) => DoctorCheck::error("vocabulary", format!("Cannot read vocabulary file: {}", e)),
        };
        checks.push(check);
    }

    // Check stdin is available (for piped survey input)
    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)")
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (--surveys - ready)")
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Hazard Gaze Doctor Report");
        println!("=========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GazeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json: bool) -> Result<(), GazeCliError> {
    match schema_type {
        SchemaType::Input => {
            if json {
                println!("{}", serde_json::to_string_pretty(&input_schema())?);
            } else {
                println!("Input Schemas: {}, {}", SURVEY_SCHEMA, PROFILE_SCHEMA);
                println!();
                println!("{} - one survey result per session:", SURVEY_SCHEMA);
                println!("  - userId, videoId (session key)");
                println!("  - gaze: [{{ x, y, time }}] in screen pixels and milliseconds");
                println!("  - windowDimensions: {{ width, height }}");
                println!("  - hazardDetected, spacebarTimestamps, attentionFactors");
                println!("  - noDetectionReason, detectionConfidence, hazardSeverity");
                println!("  - startTime, endTime");
                println!("  - formData: survey fields nested instead of top-level");
                println!();
                println!("{} - one profile per user:", PROFILE_SCHEMA);
                println!("  - userId or email (join key)");
                println!("  - age, licenseAge, ethnicity, gender, country, state, city, visuallyImpaired");
                println!("  - form: demographics nested instead of top-level");
            }
        }
        SchemaType::Output => {
            if json {
                println!("{}", serde_json::to_string_pretty(&output_schema())?);
            } else {
                println!("Output Tables");
                println!();
                println!("- {}: normalized samples of kept sessions", NORMALIZED_TABLE);
                println!("- {}: normalized samples of rejected sessions", REJECTED_TABLE);
                println!("- {}: hazard-labeled, encoded samples", LABELED_TABLE);
                println!("- {}: labeled samples missing required fields", INCOMPLETE_TABLE);
                println!("- {}: per-video summary and spatial statistics", AGGREGATE_TABLE);
                println!("- {}: videoId, time, x, y, hazard per time bin", BINNED_TABLE);
                println!("- {}: per-session quality decision", SESSION_QUALITY_TABLE);
                println!("- report.json: run metadata and counts");
            }
        }
        SchemaType::Vocabulary => {
            let vocabulary = CategoryVocabulary::default();
            if json {
                println!("{}", serde_json::to_string_pretty(&vocabulary)?);
            } else {
                println!("Category Vocabulary: {}", vocabulary.version);
                println!();
                for column in CATEGORICAL_COLUMNS {
                    if let Some(values) = vocabulary.columns.get(column) {
                        println!("{}: {}", column, values.join(", "));
                    }
                }
                println!(
                    "{}: {}",
                    ATTENTION_FACTORS_COLUMN,
                    vocabulary.attention_factors.join(", ")
                );
                println!();
                println!("Unknown values map to 'other'; blank values set no flag.");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, GazeCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_surveys(path: &Path, input_format: &InputFormat) -> Result<Vec<SurveyRecord>, GazeCliError> {
    let data = read_input(path)?;
    let surveys = match input_format {
        InputFormat::Ndjson => SessionAdapter::parse_surveys_ndjson(&data)?,
        InputFormat::Json => SessionAdapter::parse_surveys_array(&data)?,
    };
    Ok(surveys)
}

fn read_profiles(
    path: &Path,
    input_format: &InputFormat,
) -> Result<Vec<ProfileRecord>, GazeCliError> {
    let data = read_input(path)?;
    let profiles = match input_format {
        InputFormat::Ndjson => SessionAdapter::parse_profiles_ndjson(&data)?,
        InputFormat::Json => SessionAdapter::parse_profiles_array(&data)?,
    };
    Ok(profiles)
}

fn input_schema() -> serde_json::Value {
    serde_json::json!({
        SURVEY_SCHEMA: {
            "type": "object",
            "required": ["userId", "videoId"],
            "properties": {
                "userId": { "type": "string" },
                "videoId": { "type": "string" },
                "gaze": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["x", "y", "time"],
                        "properties": {
                            "x": { "type": "number" },
                            "y": { "type": "number" },
                            "time": { "type": "number" }
                        }
                    }
                },
                "windowDimensions": {
                    "type": "object",
                    "required": ["width", "height"],
                    "properties": {
                        "width": { "type": "number" },
                        "height": { "type": "number" }
                    }
                },
                "hazardDetected": { "type": "boolean" },
                "spacebarTimestamps": { "type": "array", "items": { "type": "number" } },
                "attentionFactors": { "type": "array", "items": { "type": "string" } },
                "noDetectionReason": { "type": "string" },
                "detectionConfidence": { "type": ["number", "string"] },
                "hazardSeverity": { "type": ["number", "string"] },
                "startTime": { "type": ["number", "string"] },
                "endTime": { "type": ["number", "string"] },
                "formData": { "type": "object" }
            }
        },
        PROFILE_SCHEMA: {
            "type": "object",
            "properties": {
                "userId": { "type": "string" },
                "email": { "type": "string" },
                "age": { "type": ["number", "string"] },
                "licenseAge": { "type": ["number", "string"] },
                "ethnicity": { "type": "string" },
                "gender": { "type": "string" },
                "country": { "type": "string" },
                "state": { "type": "string" },
                "city": { "type": "string" },
                "visuallyImpaired": { "type": "boolean" },
                "form": { "type": "object" }
            }
        }
    })
}

fn output_schema() -> serde_json::Value {
    let sample_columns = serde_json::json!([
        "userId", "videoId", "time", "x", "y", "original_x", "original_y",
        "original_width", "original_height", "display_width", "display_height",
        "x_offset", "y_offset", "normalized_to_width", "normalized_to_height"
    ]);

    let mut encoded = vec![
        "detectionConfidence".to_string(),
        "gazeDuration".to_string(),
        "age".to_string(),
        "licenseAge".to_string(),
        "hazardDetected".to_string(),
        "hazardSeverity".to_string(),
        "noDetection_no_to_subtle_hazard".to_string(),
    ];
    encoded.extend(CategoryVocabulary::default().flag_columns());

    serde_json::json!({
        NORMALIZED_TABLE: sample_columns.clone(),
        REJECTED_TABLE: sample_columns.clone(),
        LABELED_TABLE: { "sample": sample_columns.clone(), "extra": ["raw_time", "hazard"], "encoded": encoded },
        INCOMPLETE_TABLE: { "sample": sample_columns, "extra": ["raw_time", "hazard", "missing_fields"] },
        AGGREGATE_TABLE: [
            "videoId", "x", "y", "time", "meanDetectionConfidence", "minGazeDuration",
            "meanAge", "hazardDetected", "meanLicenseAge", "noDetection_no_to_subtle_hazard",
            "weightedHazardSeverity", "attentionFactors_*", "mean_x", "mean_y", "numGazes",
            "variance_x", "variance_y", "gazeVariance", "spreadFeature"
        ],
        BINNED_TABLE: ["videoId", "time", "x", "y", "hazard"],
        SESSION_QUALITY_TABLE: [
            "userId", "videoId", "total_samples", "edge_samples", "edge_fraction", "decision"
        ]
    })
}

// Error types

#[derive(Debug)]
enum GazeCliError {
    Io(io::Error),
    Compute(hazard_gaze::ComputeError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for GazeCliError {
    fn from(e: io::Error) -> Self {
        GazeCliError::Io(e)
    }
}

impl From<hazard_gaze::ComputeError> for GazeCliError {
    fn from(e: hazard_gaze::ComputeError) -> Self {
        GazeCliError::Compute(e)
    }
}

impl From<serde_json::Error> for GazeCliError {
    fn from(e: serde_json::Error) -> Self {
        GazeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GazeCliError> for CliError {
    fn from(e: GazeCliError) -> Self {
        use hazard_gaze::ComputeError;

        match e {
            GazeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GazeCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'hazard-gaze doctor --config <file>'")
                    }
                    ComputeError::EncodingError(_) => (
                        "VOCABULARY_ERROR",
                        "Run 'hazard-gaze schema vocabulary --json' for a valid example",
                    ),
                    ComputeError::InvalidScreenDimensions { .. }
                    | ComputeError::InvalidGazeSample { .. }
                    | ComputeError::MalformedIntervals { .. }
                    | ComputeError::MissingField(_) => {
                        ("VALIDATION_ERROR", "Run 'hazard-gaze validate' for details")
                    }
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input matches the survey and profile schemas",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            GazeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GazeCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No survey records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            GazeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            GazeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    record: &'static str,
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Ok, message)
    }

    fn warning(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Warning, message)
    }

    fn error(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Error, message)
    }

    fn with_status(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
