/// Streamflow signatures from NWIS daily values
///
/// Daily mean discharge (cfs) is normalised by basin area to mm/day before
/// any signature is computed. Errors bubble to the extractor: there are no
/// typical values for streamflow.

use chrono::{Datelike, NaiveDate};

use crate::attributes::{AttributeFetcher, stats};
use crate::logging::{self, DataSource};
use crate::model::{AttributeError, AttributeRecord, ComputeError, FetchContext, RecordError};
use crate::sources::{DailyFlow, StreamflowSource};

/// Values required before any signature is computed.
pub const MIN_VALUES: usize = 365;

/// cfs to mm/day over 1 km²: 0.0283168466 m³/s · 86400 s / 10⁶ m² · 1000.
pub const CFS_TO_MM_DAY_KM2: f64 = 2.446575545;

/// Lyne-Hollick filter parameter.
pub const BASEFLOW_ALPHA: f64 = 0.925;
const BASEFLOW_PASSES: usize = 3;

const HIGH_FLOW_FACTOR: f64 = 9.0;
const LOW_FLOW_FACTOR: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct HydroSignatures {
    pub q_mean: f64,
    pub q5: f64,
    pub q95: f64,
    pub slope_fdc: f64,
    pub baseflow_index: f64,
    pub hfd_mean: f64,
    pub high_q_freq: f64,
    pub high_q_dur: f64,
    pub low_q_freq: f64,
    pub low_q_dur: f64,
    pub zero_q_freq: f64,
}

impl HydroSignatures {
    pub fn into_record(self) -> Result<AttributeRecord, RecordError> {
        let mut record = AttributeRecord::new();
        record.insert_measured("q_mean", self.q_mean)?;
        record.insert_measured("q5", self.q5)?;
        record.insert_measured("q95", self.q95)?;
        record.insert_measured("slope_fdc", self.slope_fdc)?;
        record.insert_measured("baseflow_index", self.baseflow_index)?;
        record.insert_measured("hfd_mean", self.hfd_mean)?;
        record.insert_measured("high_q_freq", self.high_q_freq)?;
        record.insert_measured("high_q_dur", self.high_q_dur)?;
        record.insert_measured("low_q_freq", self.low_q_freq)?;
        record.insert_measured("low_q_dur", self.low_q_dur)?;
        record.insert_measured("zero_q_freq", self.zero_q_freq)?;
        Ok(record)
    }
}

/// Compute streamflow signatures from daily discharge and basin area.
pub fn compute_signatures(flows: &[DailyFlow], area_km2: f64) -> Result<HydroSignatures, ComputeError> {
    if !(area_km2 > 0.0) {
        return Err(ComputeError::Invalid(format!("basin area must be positive, got {}", area_km2)));
    }

    let mut series: Vec<(NaiveDate, f64)> = flows
        .iter()
        .map(|f| (f.date, f.discharge_cfs * CFS_TO_MM_DAY_KM2 / area_km2))
        .filter(|(_, q)| q.is_finite() && *q >= 0.0)
        .collect();
    if series.len() < MIN_VALUES {
        return Err(ComputeError::InsufficientData { what: "streamflow", needed: MIN_VALUES, got: series.len() });
    }
    series.sort_by_key(|(date, _)| *date);

    let q: Vec<f64> = series.iter().map(|(_, q)| *q).collect();
    let sorted = stats::sorted(&q);
    let quantile = |p: f64| stats::quantile_sorted(&sorted, p).unwrap_or(f64::NAN);

    let q_mean = stats::mean(&q).ok_or(ComputeError::EmptyInput("streamflow"))?;
    let median = quantile(0.5);
    let years = q.len() as f64 / 365.25;

    let high = gap_aware_flags(&series, |v| v > HIGH_FLOW_FACTOR * median);
    let low = gap_aware_flags(&series, |v| v < LOW_FLOW_FACTOR * q_mean);
    let count = |flags: &[bool]| flags.iter().filter(|f| **f).count() as f64;

    Ok(HydroSignatures {
        q_mean,
        q5: quantile(0.05),
        q95: quantile(0.95),
        slope_fdc: slope_fdc(&sorted),
        baseflow_index: baseflow_index(&q, BASEFLOW_ALPHA, BASEFLOW_PASSES),
        hfd_mean: half_flow_date_mean(&series),
        high_q_freq: count(&high) / years,
        high_q_dur: stats::mean_run_length(high.iter().copied()),
        low_q_freq: count(&low) / years,
        low_q_dur: stats::mean_run_length(low.iter().copied()),
        zero_q_freq: q.iter().filter(|v| **v == 0.0).count() as f64 / q.len() as f64,
    })
}

/// Event flags with a `false` inserted at every gap in the record, so an
/// event never spans missing days.
fn gap_aware_flags(series: &[(NaiveDate, f64)], event: impl Fn(f64) -> bool) -> Vec<bool> {
    let mut flags = Vec::with_capacity(series.len());
    let mut previous: Option<NaiveDate> = None;
    for (date, q) in series {
        if previous.is_some_and(|p| (*date - p).num_days() > 1) {
            flags.push(false);
        }
        flags.push(event(*q));
        previous = Some(*date);
    }
    flags
}

/// Slope of the flow duration curve between the 33rd and 66th exceedance
/// percentiles of log flow (Sawicz et al. 2011). NaN when either flow is
/// zero.
pub fn slope_fdc(sorted: &[f64]) -> f64 {
    let (Some(q33), Some(q66)) = (stats::quantile_sorted(sorted, 0.67), stats::quantile_sorted(sorted, 0.34)) else {
        return f64::NAN;
    };
    if q33 <= 0.0 || q66 <= 0.0 {
        return f64::NAN;
    }
    (q33.ln() - q66.ln()) / (0.66 - 0.33)
}

/// Baseflow index from a multi-pass Lyne-Hollick digital filter,
/// alternating forward and backward passes.
pub fn baseflow_index(q: &[f64], alpha: f64, passes: usize) -> f64 {
    let total: f64 = q.iter().sum();
    if q.is_empty() || total <= 0.0 {
        return f64::NAN;
    }
    let mut baseflow = q.to_vec();
    for pass in 0..passes {
        if pass % 2 == 0 {
            baseflow = lyne_hollick_pass(&baseflow, alpha);
        } else {
            baseflow.reverse();
            baseflow = lyne_hollick_pass(&baseflow, alpha);
            baseflow.reverse();
        }
    }
    baseflow.iter().sum::<f64>() / total
}

fn lyne_hollick_pass(q: &[f64], alpha: f64) -> Vec<f64> {
    let mut baseflow = Vec::with_capacity(q.len());
    let mut quick = 0.0;
    for (t, &flow) in q.iter().enumerate() {
        if t > 0 {
            quick = (alpha * quick + (1.0 + alpha) / 2.0 * (flow - q[t - 1])).max(0.0).min(flow);
        }
        baseflow.push(flow - quick);
    }
    baseflow
}

/// Water year (starting 1 October) a date belongs to, labelled by the
/// calendar year in which it ends.
pub fn water_year(date: NaiveDate) -> i32 {
    if date.month() >= 10 { date.year() + 1 } else { date.year() }
}

/// Mean over complete water years of the number of days after 1 October
/// by which half of the year's flow has passed. NaN without a complete
/// water year.
pub fn half_flow_date_mean(series: &[(NaiveDate, f64)]) -> f64 {
    let mut hfds = Vec::new();
    let mut start = 0;
    while start < series.len() {
        let wy = water_year(series[start].0);
        let end = series[start..].iter().position(|(d, _)| water_year(*d) != wy).map_or(series.len(), |i| start + i);
        let year = &series[start..end];
        start = end;

        let (Some(first), Some(last)) = (NaiveDate::from_ymd_opt(wy - 1, 10, 1), NaiveDate::from_ymd_opt(wy, 9, 30))
        else {
            continue;
        };
        let expected = (last - first).num_days() as usize + 1;
        let total: f64 = year.iter().map(|(_, q)| q).sum();
        if year.len() != expected || total <= 0.0 {
            continue;
        }

        let mut cumulative = 0.0;
        if let Some(day) = year.iter().position(|(_, q)| {
            cumulative += q;
            cumulative >= total / 2.0
        }) {
            hfds.push(day as f64);
        }
    }
    stats::mean(&hfds).unwrap_or(f64::NAN)
}

pub struct HydrologyFetcher<Q> {
    source: Q,
}

impl<Q: StreamflowSource> HydrologyFetcher<Q> {
    pub fn new(source: Q) -> Self {
        Self { source }
    }
}

impl<Q: StreamflowSource> AttributeFetcher for HydrologyFetcher<Q> {
    fn name(&self) -> &'static str {
        "hydrology"
    }

    fn source(&self) -> DataSource {
        DataSource::Nwis
    }

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError> {
        let flows = self.source.daily_discharge(&ctx.gauge.gauge_id, ctx.hydro_range)?;
        logging::debug(
            DataSource::Nwis,
            Some(&ctx.gauge.gauge_id),
            &format!("{} daily values for {}", flows.len(), ctx.hydro_range),
        );
        let signatures = compute_signatures(&flows, ctx.basin.area_km2())?;
        Ok(signatures.into_record()?)
    }
}
