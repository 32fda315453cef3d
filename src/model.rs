/// Core data types for the CAMELS attribute extractor.
///
/// This module defines the shared domain model imported by all other modules:
/// gauge identity, basin geometry handles, attribute records, batch results
/// and the error tiers. It contains no I/O.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::geometry::BasinGeometry;

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// USGS parameter code for discharge (streamflow), in cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

/// USGS statistic code for daily mean values.
pub const STAT_DAILY_MEAN: &str = "00003";

/// Sentinel USGS uses for missing values in NWIS responses.
pub const NWIS_NO_DATA: f64 = -999999.0;

// ---------------------------------------------------------------------------
// Gauge identity
// ---------------------------------------------------------------------------

/// Station metadata resolved once per extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeIdentity {
    /// USGS site number, e.g. "01031500".
    pub gauge_id: String,
    /// Official station name.
    pub name: String,
    /// WGS84 latitude of the gauge.
    pub latitude: f64,
    /// WGS84 longitude of the gauge.
    pub longitude: f64,
    /// Two-digit hydrologic region (first two characters of the HUC).
    pub huc_02: String,
}

// ---------------------------------------------------------------------------
// Date windows
// ---------------------------------------------------------------------------

/// Inclusive date window used for climate and streamflow requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses two ISO 8601 dates ("2000-01-01").
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| DateRangeError::InvalidDate(s.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Number of calendar days in the window, both ends included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date range starts after it ends: {start} > {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },
}

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// A single scalar catchment descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Number(_) => None,
            AttributeValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

/// Whether a value was derived from source data or substituted from a
/// literal default after a source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Measured,
    Imputed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub value: AttributeValue,
    pub provenance: Provenance,
}

impl Attribute {
    pub fn measured(value: impl Into<AttributeValue>) -> Self {
        Self { value: value.into(), provenance: Provenance::Measured }
    }

    pub fn imputed(value: impl Into<AttributeValue>) -> Self {
        Self { value: value.into(), provenance: Provenance::Imputed }
    }

    pub fn is_imputed(&self) -> bool {
        self.provenance == Provenance::Imputed
    }
}

// ---------------------------------------------------------------------------
// Attribute records
// ---------------------------------------------------------------------------

/// Flat, insertion-ordered mapping from attribute name to value.
///
/// Keys are unique: inserting or merging a name that is already present is
/// an error rather than an overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeRecord {
    entries: Vec<(String, Attribute)>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) -> Result<(), RecordError> {
        let name = name.into();
        if self.contains_key(&name) {
            return Err(RecordError::DuplicateAttribute(name));
        }
        self.entries.push((name, attribute));
        Ok(())
    }

    pub fn insert_measured(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), RecordError> {
        self.insert(name, Attribute::measured(value))
    }

    pub fn insert_imputed(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), RecordError> {
        self.insert(name, Attribute::imputed(value))
    }

    /// Moves every entry of `other` into `self`. Fails on the first
    /// colliding key, leaving `self` unchanged.
    pub fn merge(&mut self, other: AttributeRecord) -> Result<(), RecordError> {
        if let Some((name, _)) = other.entries.iter().find(|(name, _)| self.contains_key(name)) {
            return Err(RecordError::DuplicateAttribute(name.clone()));
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|a| a.value.as_f64())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|a| a.value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Names of all attributes carrying imputed values, in record order.
    pub fn imputed_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, a)| a.is_imputed())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A gauge that was skipped during batch extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeFailure {
    pub gauge_id: String,
    pub reason: String,
}

/// Records of every gauge that extracted successfully, in submission order.
/// Failed gauges are listed separately and never appear as rows.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub records: Vec<AttributeRecord>,
    pub failures: Vec<GaugeFailure>,
}

impl BatchResult {
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Everything a fetcher may read while computing its attributes.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    pub gauge: &'a GaugeIdentity,
    pub basin: &'a BasinGeometry,
    pub climate_range: DateRange,
    pub hydro_range: DateRange,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while talking to a remote data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Non-2xx HTTP response.
    #[error("HTTP error: {status} from {url}")]
    Http { status: u16, url: String },
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Request failed: {0}")]
    Request(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The service answered but returned no usable values.
    #[error("No data available: {0}")]
    NoData(String),
    /// The raster layer is not configured or not served.
    #[error("Layer unavailable: {0}")]
    LayerUnavailable(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None if err.is_decode() => FetchError::Parse(err.to_string()),
            None => FetchError::Request(err.to_string()),
        }
    }
}

/// Errors raised while reducing fetched values to attributes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("no valid values for {0}")]
    EmptyInput(&'static str),
    #[error("insufficient data for {what}: need {needed}, got {got}")]
    InsufficientData { what: &'static str, needed: usize, got: usize },
    #[error("invalid input: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("attribute '{0}' is already present in the record")]
    DuplicateAttribute(String),
}

/// Failure of one attribute fetcher as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Failure to resolve a gauge to its station metadata and basin polygon.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("'{0}' is not a valid USGS site number")]
    InvalidGaugeId(String),
    #[error("gauge {0} is unknown to the hydrologic network service")]
    UnknownGauge(String),
    #[error("no basin polygon returned for gauge {0}")]
    NoBasinGeometry(String),
    #[error("basin geometry for gauge {gauge_id} is unusable: {reason}")]
    InvalidGeometry { gauge_id: String, reason: String },
    #[error("hydrologic network service failed: {0}")]
    Service(#[from] FetchError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("no gauges were successfully processed ({attempted} attempted)")]
    NoGaugesSucceeded { attempted: usize },
}
