/// Climate indices from Daymet daily forcing
///
/// Computes the CAMELS climate block: mean precipitation and potential
/// evapotranspiration, aridity, precipitation seasonality, snow fraction
/// and the frequency, duration and timing of high- and low-precipitation
/// days. PET follows Hargreaves-Samani with extraterrestrial radiation from
/// FAO-56 at the basin centroid latitude. Errors bubble to the extractor.

use std::f64::consts::PI;

use chrono::Datelike;
use geo::Coord;

use crate::attributes::{AttributeFetcher, stats};
use crate::geometry::SampleGrid;
use crate::logging::{self, DataSource};
use crate::model::{AttributeError, AttributeRecord, ComputeError, FetchContext, RecordError};
use crate::sources::{ClimateSource, DailyForcing};

/// Days of forcing required before any index is computed.
pub const MIN_DAYS: usize = 365;

/// Days at or above this multiple of mean daily precipitation are "high".
pub const HIGH_PREC_FACTOR: f64 = 5.0;

/// Days below this amount (mm) are "low" (dry) days.
pub const LOW_PREC_THRESHOLD_MM: f64 = 1.0;

const TROPICAL_YEAR_DAYS: f64 = 365.25;
const SOLAR_CONSTANT: f64 = 0.0820; // MJ m-2 min-1
const MJ_TO_MM: f64 = 0.408;

// ---------------------------------------------------------------------------
// Indices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClimateIndices {
    pub p_mean: f64,
    pub pet_mean: f64,
    pub aridity: f64,
    pub p_seasonality: f64,
    pub frac_snow: f64,
    pub high_prec_freq: f64,
    pub high_prec_dur: f64,
    pub high_prec_timing: &'static str,
    pub low_prec_freq: f64,
    pub low_prec_dur: f64,
    pub low_prec_timing: &'static str,
}

impl ClimateIndices {
    pub fn into_record(self) -> Result<AttributeRecord, RecordError> {
        let mut record = AttributeRecord::new();
        record.insert_measured("p_mean", self.p_mean)?;
        record.insert_measured("pet_mean", self.pet_mean)?;
        record.insert_measured("aridity", self.aridity)?;
        record.insert_measured("p_seasonality", self.p_seasonality)?;
        record.insert_measured("frac_snow", self.frac_snow)?;
        record.insert_measured("high_prec_freq", self.high_prec_freq)?;
        record.insert_measured("high_prec_dur", self.high_prec_dur)?;
        record.insert_measured("high_prec_timing", self.high_prec_timing)?;
        record.insert_measured("low_prec_freq", self.low_prec_freq)?;
        record.insert_measured("low_prec_dur", self.low_prec_dur)?;
        record.insert_measured("low_prec_timing", self.low_prec_timing)?;
        Ok(record)
    }
}

/// Reduce a daily forcing series to climate indices.
pub fn compute_indices(series: &[DailyForcing], latitude_deg: f64) -> Result<ClimateIndices, ComputeError> {
    if series.len() < MIN_DAYS {
        return Err(ComputeError::InsufficientData { what: "climate", needed: MIN_DAYS, got: series.len() });
    }

    let prcp: Vec<f64> = series.iter().map(|d| d.prcp_mm).collect();
    let p_mean = stats::mean(&prcp).ok_or(ComputeError::EmptyInput("precipitation"))?;
    if p_mean <= 0.0 {
        return Err(ComputeError::Invalid("mean precipitation is zero".to_string()));
    }

    let pet: Vec<f64> = series.iter().map(|d| hargreaves_pet(d, latitude_deg)).collect();
    let pet_mean = stats::mean(&pet).ok_or(ComputeError::EmptyInput("pet"))?;

    let total_p: f64 = prcp.iter().sum();
    let snow_p: f64 = series.iter().filter(|d| d.tmean_c() < 0.0).map(|d| d.prcp_mm).sum();

    let first = series[0].date;
    let last = series[series.len() - 1].date;
    let years = ((last - first).num_days() + 1) as f64 / TROPICAL_YEAR_DAYS;

    let high: Vec<bool> = prcp.iter().map(|p| *p >= HIGH_PREC_FACTOR * p_mean).collect();
    let low: Vec<bool> = prcp.iter().map(|p| *p < LOW_PREC_THRESHOLD_MM).collect();

    Ok(ClimateIndices {
        p_mean,
        pet_mean,
        aridity: pet_mean / p_mean,
        p_seasonality: precipitation_seasonality(series),
        frac_snow: snow_p / total_p,
        high_prec_freq: high.iter().filter(|h| **h).count() as f64 / years,
        high_prec_dur: stats::mean_run_length(high.iter().copied()),
        high_prec_timing: dominant_season(series, &high),
        low_prec_freq: low.iter().filter(|l| **l).count() as f64 / years,
        low_prec_dur: stats::mean_run_length(low.iter().copied()),
        low_prec_timing: dominant_season(series, &low),
    })
}

/// Hargreaves-Samani reference evapotranspiration (mm/day).
pub fn hargreaves_pet(day: &DailyForcing, latitude_deg: f64) -> f64 {
    let ra = extraterrestrial_radiation(day.date.ordinal(), latitude_deg);
    let range = (day.tmax_c - day.tmin_c).max(0.0);
    (0.0023 * MJ_TO_MM * ra * (day.tmean_c() + 17.8) * range.sqrt()).max(0.0)
}

/// FAO-56 extraterrestrial radiation (MJ m-2 day-1), eq. 21.
pub fn extraterrestrial_radiation(day_of_year: u32, latitude_deg: f64) -> f64 {
    let j = day_of_year as f64;
    let phi = latitude_deg.to_radians();
    let dr = 1.0 + 0.033 * (2.0 * PI * j / 365.0).cos();
    let delta = 0.409 * (2.0 * PI * j / 365.0 - 1.39).sin();
    let ws = (-phi.tan() * delta.tan()).clamp(-1.0, 1.0).acos();
    let ra = 24.0 * 60.0 / PI
        * SOLAR_CONSTANT
        * dr
        * (ws * phi.sin() * delta.sin() + phi.cos() * delta.cos() * ws.sin());
    ra.max(0.0)
}

/// Woods (2009) seasonality index: `δp · sgn(δt) · cos(2π(sp − st)/τ)`.
///
/// Positive when precipitation peaks in summer, negative when it peaks in
/// winter, near zero when it is uniform.
pub fn precipitation_seasonality(series: &[DailyForcing]) -> f64 {
    let Some(first) = series.first().map(|d| d.date) else { return 0.0 };
    let t: Vec<f64> = series.iter().map(|d| (d.date - first).num_days() as f64).collect();
    let p: Vec<f64> = series.iter().map(|d| d.prcp_mm).collect();
    let temp: Vec<f64> = series.iter().map(DailyForcing::tmean_c).collect();

    let (Some(p_fit), Some(t_fit)) = (fit_annual_sine(&t, &p), fit_annual_sine(&t, &temp)) else {
        return 0.0;
    };
    if p_fit.mean <= 0.0 || t_fit.amplitude <= 0.0 {
        return 0.0;
    }
    let delta_p = p_fit.amplitude / p_fit.mean;
    let omega = 2.0 * PI / TROPICAL_YEAR_DAYS;
    delta_p * (omega * (p_fit.phase - t_fit.phase)).cos()
}

#[derive(Debug, Clone, Copy)]
struct SineFit {
    mean: f64,
    amplitude: f64,
    /// Phase shift in days: the series follows `mean + amplitude·sin(ω(t − phase))`.
    phase: f64,
}

/// Least-squares fit of `x = a + b·sin ωt + c·cos ωt` with ω = 2π/τ.
fn fit_annual_sine(t: &[f64], x: &[f64]) -> Option<SineFit> {
    let omega = 2.0 * PI / TROPICAL_YEAR_DAYS;
    let mut ata = [[0.0f64; 3]; 3];
    let mut atx = [0.0f64; 3];
    for (ti, xi) in t.iter().zip(x) {
        let row = [1.0, (omega * ti).sin(), (omega * ti).cos()];
        for i in 0..3 {
            for j in 0..3 {
                ata[i][j] += row[i] * row[j];
            }
            atx[i] += row[i] * xi;
        }
    }
    let [a, b, c] = solve3(ata, atx)?;
    let amplitude = b.hypot(c);
    let phase = (-c).atan2(b) / omega;
    Some(SineFit { mean: a, amplitude, phase })
}

/// Gaussian elimination with partial pivoting.
fn solve3(mut m: [[f64; 3]; 3], mut v: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);
        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }
    let mut out = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| m[row][k] * out[k]).sum();
        out[row] = (v[row] - tail) / m[row][row];
    }
    Some(out)
}

pub fn season_of(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "djf",
        3..=5 => "mam",
        6..=8 => "jja",
        _ => "son",
    }
}

/// Season holding the most flagged days; `none` when no day is flagged.
fn dominant_season(series: &[DailyForcing], flags: &[bool]) -> &'static str {
    const SEASONS: [&str; 4] = ["djf", "mam", "jja", "son"];
    let mut counts = [0usize; 4];
    for (day, _) in series.iter().zip(flags).filter(|(_, f)| **f) {
        let label = season_of(day.date.month());
        if let Some(i) = SEASONS.iter().position(|s| *s == label) {
            counts[i] += 1;
        }
    }
    let (best, count) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |acc, (i, &c)| if c > acc.1 { (i, c) } else { acc });
    if count == 0 { "none" } else { SEASONS[best] }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct ClimateFetcher<C> {
    source: C,
    sample_points: usize,
    climate_points: usize,
}

impl<C: ClimateSource> ClimateFetcher<C> {
    /// `climate_points` of 1 reads the basin centroid only; more spreads
    /// the requests through the basin lattice.
    pub fn new(source: C, sample_points: usize, climate_points: usize) -> Self {
        Self { source, sample_points, climate_points }
    }

    fn request_points(&self, ctx: &FetchContext<'_>) -> Vec<Coord<f64>> {
        if self.climate_points <= 1 {
            return vec![ctx.basin.centroid().0];
        }
        SampleGrid::over(ctx.basin, self.sample_points).spread(self.climate_points)
    }
}

impl<C: ClimateSource> AttributeFetcher for ClimateFetcher<C> {
    fn name(&self) -> &'static str {
        "climate"
    }

    fn source(&self) -> DataSource {
        DataSource::Daymet
    }

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError> {
        let points = self.request_points(ctx);
        let series = self.source.daily_forcing(&points, ctx.climate_range)?;
        logging::debug(
            DataSource::Daymet,
            Some(&ctx.gauge.gauge_id),
            &format!("{} days of forcing from {} pixel(s) for {}", series.len(), points.len(), ctx.climate_range),
        );

        let indices = compute_indices(&series, ctx.basin.centroid().y())?;
        Ok(indices.into_record()?)
    }
}
