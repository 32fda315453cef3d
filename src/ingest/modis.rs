/// ORNL DAAC MODIS web service client
///
/// Pulls MODIS land products around the basin centroid through the
/// "subset" endpoint and keeps the pixels whose centres fall inside the
/// basin. Subsets are delivered on the MODIS sinusoidal grid; pixels are
/// listed row-major starting at the north-west corner.
///
/// API Documentation: https://modis.ornl.gov/data/modis_webservice.html

use chrono::{Datelike, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::geometry::{BasinGeometry, Projector};
use crate::ingest::get_checked;
use crate::model::FetchError;
use crate::sources::{VegetationIndexSource, VegetationProduct};

/// The service rejects subsets requesting more than 10 composites.
pub const MAX_DATES_PER_REQUEST: usize = 10;

/// Largest half extent, in km, the subset endpoint accepts.
pub const MAX_HALF_EXTENT_KM: u32 = 100;

// ============================================================================
// Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct DatesResponse {
    #[serde(default)]
    dates: Vec<ModisDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModisDate {
    /// Julian composite label, e.g. "A2020001".
    pub modis_date: String,
    pub calendar_date: String,
}

/// Corner coordinates arrive as strings from some deployments and as
/// numbers from others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Value(f64),
    Text(String),
}

impl Number {
    fn get(&self, field: &str) -> Result<f64, FetchError> {
        match self {
            Number::Value(v) => Ok(*v),
            Number::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| FetchError::Parse(format!("MODIS {} '{}' is not numeric", field, s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubsetResponse {
    xllcorner: Number,
    yllcorner: Number,
    cellsize: Number,
    nrows: usize,
    ncols: usize,
    #[serde(default)]
    subset: Vec<Composite>,
}

#[derive(Debug, Deserialize)]
struct Composite {
    #[serde(default)]
    data: Vec<f64>,
}

// ============================================================================
// URL Construction
// ============================================================================

pub fn build_dates_url(base_url: &str, product: &str, lat: f64, lon: f64) -> String {
    format!(
        "{}/{}/dates?latitude={:.6}&longitude={:.6}",
        base_url.trim_end_matches('/'),
        product,
        lat,
        lon
    )
}

#[allow(clippy::too_many_arguments)]
pub fn build_subset_url(
    base_url: &str,
    product: &str,
    band: &str,
    lat: f64,
    lon: f64,
    start: &str,
    end: &str,
    km_above_below: u32,
    km_left_right: u32,
) -> String {
    format!(
        "{}/{}/subset?latitude={:.6}&longitude={:.6}&band={}&startDate={}&endDate={}&kmAboveBelow={}&kmLeftRight={}",
        base_url.trim_end_matches('/'),
        product,
        lat,
        lon,
        band,
        start,
        end,
        km_above_below,
        km_left_right,
    )
}

// ============================================================================
// Parsing
// ============================================================================

pub fn parse_dates(body: &str) -> Result<Vec<ModisDate>, FetchError> {
    let response: DatesResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(response.dates)
}

/// Composites whose calendar date falls in `year`, in service order.
pub fn dates_in_year(dates: &[ModisDate], year: i32) -> Vec<ModisDate> {
    dates
        .iter()
        .filter(|d| {
            NaiveDate::parse_from_str(&d.calendar_date, "%Y-%m-%d")
                .map(|date| date.year() == year)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Raw values of every composite in a subset response whose pixel centre
/// lies inside `basin`.
pub fn parse_subset_pixels(body: &str, basin: &BasinGeometry) -> Result<Vec<f64>, FetchError> {
    let response: SubsetResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let xll = response.xllcorner.get("xllcorner")?;
    let yll = response.yllcorner.get("yllcorner")?;
    let cell = response.cellsize.get("cellsize")?;
    let (nrows, ncols) = (response.nrows, response.ncols);
    let grid = Projector::modis_inverse().map_err(|e| FetchError::Parse(e.to_string()))?;

    // The mask is shared by every composite in the response.
    let inside = (0..nrows * ncols)
        .map(|i| {
            let (row, col) = (i / ncols, i % ncols);
            let x = xll + (col as f64 + 0.5) * cell;
            let y = yll + (nrows as f64 - row as f64 - 0.5) * cell;
            let lonlat = grid.apply(geo::Coord { x, y }).map_err(|e| FetchError::Parse(e.to_string()))?;
            Ok(basin.contains(lonlat.x, lonlat.y))
        })
        .collect::<Result<Vec<bool>, FetchError>>()?;

    Ok(response
        .subset
        .iter()
        .flat_map(|composite| composite.data.iter().zip(&inside))
        .filter(|(_, inside)| **inside)
        .map(|(value, _)| *value)
        .collect())
}

/// Subset half extents covering the basin bounding box.
pub fn subset_extent_km(basin: &BasinGeometry) -> (u32, u32) {
    let (ns, ew) = basin.half_extent_km();
    let clamp = |km: f64| (km.ceil().max(1.0) as u32).min(MAX_HALF_EXTENT_KM);
    (clamp(ns), clamp(ew))
}

// ============================================================================
// API Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct ModisClient {
    client: Client,
    base_url: String,
}

impl ModisClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn fetch_dates(&self, product: &str, lat: f64, lon: f64) -> Result<Vec<ModisDate>, FetchError> {
        let url = build_dates_url(&self.base_url, product, lat, lon);
        let body = get_checked(&self.client, &url, "application/json")?.text()?;
        parse_dates(&body)
    }
}

impl VegetationIndexSource for ModisClient {
    fn pixel_values(
        &self,
        product: VegetationProduct,
        basin: &BasinGeometry,
        year: i32,
    ) -> Result<Vec<f64>, FetchError> {
        let centroid = basin.centroid();
        let (lat, lon) = (centroid.y(), centroid.x());

        let dates = dates_in_year(&self.fetch_dates(product.product(), lat, lon)?, year);
        if dates.is_empty() {
            return Err(FetchError::NoData(format!("no {} composites in {}", product.product(), year)));
        }

        let (km_ns, km_ew) = subset_extent_km(basin);
        let mut values = Vec::new();
        for chunk in dates.chunks(MAX_DATES_PER_REQUEST) {
            let (first, last) = (&chunk[0], &chunk[chunk.len() - 1]);
            let url = build_subset_url(
                &self.base_url,
                product.product(),
                product.band(),
                lat,
                lon,
                &first.modis_date,
                &last.modis_date,
                km_ns,
                km_ew,
            );
            let body = get_checked(&self.client, &url, "application/json")?.text()?;
            values.extend(parse_subset_pixels(&body, basin)?);
        }

        if values.is_empty() {
            return Err(FetchError::NoData(format!("no {} pixels inside the basin", product.product())));
        }
        Ok(values)
    }
}
