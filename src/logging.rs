/// Structured logging for the CAMELS attribute extractor
///
/// Provides context-rich logging with data-source tags and gauge
/// identifiers, plus failure classification for remote sources. Events
/// are emitted through `tracing` and written to stderr and, optionally,
/// to a plain-text log file for long batch runs.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt, prelude::*};

use crate::model::{AttributeError, ComputeError, FetchError, ResolutionError};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Nldi,
    Nwis,
    Elevation,
    Daymet,
    Soil,
    Modis,
    LandCover,
    Geology,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Nldi => write!(f, "NLDI"),
            DataSource::Nwis => write!(f, "NWIS"),
            DataSource::Elevation => write!(f, "3DEP"),
            DataSource::Daymet => write!(f, "DAYMET"),
            DataSource::Soil => write!(f, "SOIL"),
            DataSource::Modis => write!(f, "MODIS"),
            DataSource::LandCover => write!(f, "NLCD"),
            DataSource::Geology => write!(f, "GEOL"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - layer not configured, record too short for the window
    Expected,
    /// Unexpected failure - indicates service degradation or a response format change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level` when set. Calling this
/// more than once keeps the first subscriber.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.filter_directive()));

    let timed = console_timestamps
        .then(|| subscriber_fmt::layer().with_writer(std::io::stderr).with_target(false));
    let untimed = (!console_timestamps).then(|| {
        subscriber_fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
    });

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                subscriber_fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // already-initialized is fine: tests and embedders may install their own
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(timed)
        .with(untimed)
        .with(file_layer)
        .try_init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn emit(level: LogLevel, source: DataSource, gauge_id: Option<&str>, message: &str) {
    let gauge = gauge_id.unwrap_or("-");
    match level {
        LogLevel::Debug => tracing::debug!(source = %source, gauge, "{}", message),
        LogLevel::Info => tracing::info!(source = %source, gauge, "{}", message),
        LogLevel::Warning => tracing::warn!(source = %source, gauge, "{}", message),
        LogLevel::Error => tracing::error!(source = %source, gauge, "{}", message),
    }
}

/// Log a general informational message
pub fn info(source: DataSource, gauge_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, gauge_id, message);
}

/// Log a warning message
pub fn warn(source: DataSource, gauge_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, gauge_id, message);
}

/// Log an error message
pub fn error(source: DataSource, gauge_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, gauge_id, message);
}

/// Log a debug message
pub fn debug(source: DataSource, gauge_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, gauge_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a remote-source failure
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        // Layer deliberately left out of the configuration
        FetchError::LayerUnavailable(_) => FailureType::Expected,
        // Empty responses happen for short records and basins outside coverage
        FetchError::NoData(_) => FailureType::Unknown,
        FetchError::Http { status: 404, .. } => FailureType::Unknown,
        // Server errors and parse errors suggest service degradation or API changes
        FetchError::Http { .. } | FetchError::Parse(_) | FetchError::Request(_) => FailureType::Unexpected,
    }
}

/// Classify the failure of a whole attribute fetcher
pub fn classify_attribute_failure(err: &AttributeError) -> FailureType {
    match err {
        AttributeError::Fetch(e) => classify_fetch_failure(e),
        AttributeError::Compute(ComputeError::InsufficientData { .. }) => FailureType::Expected,
        AttributeError::Compute(ComputeError::EmptyInput(_)) => FailureType::Unknown,
        AttributeError::Compute(ComputeError::Invalid(_)) => FailureType::Unexpected,
        AttributeError::Record(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a skipped extraction stage.
///
/// Logged as a warning whatever the classification: the gauge still
/// produces a row, only this stage's attributes are missing.
pub fn log_stage_failure(gauge_id: &str, source: DataSource, stage: &str, err: &AttributeError) {
    let failure_type = classify_attribute_failure(err);
    let message = format!("{} failed [{}]: {} - attributes omitted", stage, failure_type, err);
    warn(source, Some(gauge_id), &message);
}

/// Level for a sub-block that fell back to default values.
///
/// An unconfigured layer still warns: the row carries defaults where
/// measurements would be.
pub fn fallback_level(err: &AttributeError) -> LogLevel {
    match classify_attribute_failure(err) {
        FailureType::Unexpected => LogLevel::Error,
        FailureType::Expected | FailureType::Unknown => LogLevel::Warning,
    }
}

/// Log a sub-block that fell back to default values
pub fn log_fallback(gauge_id: &str, source: DataSource, block: &str, err: &AttributeError) {
    let failure_type = classify_attribute_failure(err);
    let message = format!("{} unavailable [{}]: {} - using imputed defaults", block, failure_type, err);
    emit(fallback_level(err), source, Some(gauge_id), &message);
}

/// Log a gauge that could not be resolved
pub fn log_resolution_failure(gauge_id: &str, err: &ResolutionError) {
    let failure_type = match err {
        ResolutionError::InvalidGaugeId(_) | ResolutionError::UnknownGauge(_) => FailureType::Expected,
        ResolutionError::Service(e) => classify_fetch_failure(e),
        ResolutionError::NoBasinGeometry(_) | ResolutionError::InvalidGeometry { .. } => FailureType::Unknown,
    };
    let message = format!("Delineation failed [{}]: {}", failure_type, err);
    error(DataSource::Nldi, Some(gauge_id), &message);
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a multi-gauge run
pub fn log_batch_summary(total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Batch complete: {}/{} successful, {} failed",
        successful,
        total,
        failed
    );

    if failed == 0 {
        info(DataSource::System, None, &message);
    } else if successful == 0 {
        error(DataSource::System, None, &message);
    } else {
        warn(DataSource::System, None, &message);
    }
}
