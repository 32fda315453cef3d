/// USGS NWIS web services client
///
/// Two endpoints are used:
/// - Site service (RDB, tab-delimited) for station name, coordinates and HUC
/// - Daily values service (JSON) for daily-mean discharge
///
/// API Documentation: https://waterservices.usgs.gov/docs/

use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::ingest::get_checked;
use crate::model::{
    DateRange, FetchError, GaugeIdentity, NWIS_NO_DATA, PARAM_DISCHARGE, ResolutionError, STAT_DAILY_MEAN,
};
use crate::sources::{DailyFlow, StreamflowSource};

// ============================================================================
// NWIS Daily Values Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct DvResponse {
    value: DvValue,
}

#[derive(Debug, Deserialize)]
struct DvValue {
    #[serde(rename = "timeSeries", default)]
    time_series: Vec<DvTimeSeries>,
}

#[derive(Debug, Deserialize)]
struct DvTimeSeries {
    #[serde(default)]
    values: Vec<DvValueSet>,
}

#[derive(Debug, Deserialize)]
struct DvValueSet {
    #[serde(default)]
    value: Vec<DvPoint>,
}

#[derive(Debug, Deserialize)]
struct DvPoint {
    value: String,
    #[serde(rename = "dateTime")]
    date_time: String,
}

// ============================================================================
// URL Construction
// ============================================================================

/// Daily mean discharge for one site over `range`.
pub fn build_dv_url(base_url: &str, site_code: &str, range: DateRange) -> String {
    format!(
        "{}/dv/?format=json&sites={}&parameterCd={}&statCd={}&startDT={}&endDT={}&siteStatus=all",
        base_url.trim_end_matches('/'),
        site_code,
        PARAM_DISCHARGE,
        STAT_DAILY_MEAN,
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d"),
    )
}

/// Expanded site description (includes `huc_cd`).
pub fn build_site_url(base_url: &str, site_code: &str) -> String {
    format!(
        "{}/site/?format=rdb&sites={}&siteOutput=expanded&siteStatus=all",
        base_url.trim_end_matches('/'),
        site_code,
    )
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a daily-values JSON response into discharge values.
///
/// Sentinel values (-999999) and unparsable entries are dropped. The first
/// time series carrying values is used.
pub fn parse_dv_response(body: &str) -> Result<Vec<DailyFlow>, FetchError> {
    let response: DvResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let points = response
        .value
        .time_series
        .into_iter()
        .flat_map(|ts| ts.values)
        .map(|set| set.value)
        .find(|values| !values.is_empty())
        .ok_or_else(|| FetchError::NoData("No timeSeries entries in response".to_string()))?;

    let flows: Vec<DailyFlow> = points
        .iter()
        .filter_map(|p| {
            let discharge_cfs: f64 = p.value.trim().parse().ok()?;
            if discharge_cfs == NWIS_NO_DATA || !discharge_cfs.is_finite() {
                return None;
            }
            let date = NaiveDate::parse_from_str(p.date_time.get(..10)?, "%Y-%m-%d").ok()?;
            Some(DailyFlow { date, discharge_cfs })
        })
        .collect();

    if flows.is_empty() {
        return Err(FetchError::NoData("time series was empty or contained sentinel values".to_string()));
    }
    Ok(flows)
}

/// Parse an RDB site description into a `GaugeIdentity`.
pub fn parse_site_rdb(body: &str, gauge_id: &str) -> Result<GaugeIdentity, ResolutionError> {
    let mut lines = body
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty());

    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| ResolutionError::UnknownGauge(gauge_id.to_string()))?
        .split('\t')
        .collect();
    // second line holds column widths/types (e.g. "5s\t15s")
    lines.next();

    let row = lines
        .map(|line| {
            header
                .iter()
                .copied()
                .zip(line.split('\t').map(str::trim))
                .collect::<HashMap<&str, &str>>()
        })
        .find(|row| row.get("site_no").copied() == Some(gauge_id))
        .ok_or_else(|| ResolutionError::UnknownGauge(gauge_id.to_string()))?;

    Ok(GaugeIdentity {
        gauge_id: gauge_id.to_string(),
        name: rdb_field(&row, gauge_id, "station_nm")?.to_string(),
        latitude: rdb_coordinate(&row, gauge_id, "dec_lat_va")?,
        longitude: rdb_coordinate(&row, gauge_id, "dec_long_va")?,
        huc_02: rdb_field(&row, gauge_id, "huc_cd")?.chars().take(2).collect(),
    })
}

fn rdb_field<'a>(row: &HashMap<&str, &'a str>, gauge_id: &str, name: &str) -> Result<&'a str, ResolutionError> {
    match row.get(name).copied() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(FetchError::Parse(format!("site {} missing column {}", gauge_id, name)).into()),
    }
}

fn rdb_coordinate(row: &HashMap<&str, &str>, gauge_id: &str, name: &str) -> Result<f64, ResolutionError> {
    rdb_field(row, gauge_id, name)?
        .parse()
        .map_err(|_| FetchError::Parse(format!("site {} has invalid {}", gauge_id, name)).into())
}

// ============================================================================
// API Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct NwisClient {
    client: Client,
    base_url: String,
}

impl NwisClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    /// Fetch station metadata. A 404 means NWIS knows no such site.
    pub fn fetch_site(&self, gauge_id: &str) -> Result<GaugeIdentity, ResolutionError> {
        let url = build_site_url(&self.base_url, gauge_id);
        let body = match get_checked(&self.client, &url, "text/plain") {
            Ok(response) => response.text().map_err(FetchError::from)?,
            Err(FetchError::Http { status: 404, .. }) => {
                return Err(ResolutionError::UnknownGauge(gauge_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        parse_site_rdb(&body, gauge_id)
    }
}

impl StreamflowSource for NwisClient {
    fn daily_discharge(&self, gauge_id: &str, range: DateRange) -> Result<Vec<DailyFlow>, FetchError> {
        let url = build_dv_url(&self.base_url, gauge_id, range);
        let body = get_checked(&self.client, &url, "application/json")?.text()?;
        parse_dv_response(&body)
    }
}
