/// Vegetation attributes from MODIS and NLCD land cover
///
/// Three sub-blocks fall back independently to typical values: leaf area
/// index (MOD15A2H), green vegetation fraction (MOD13Q1 NDVI) and land
/// cover fractions. Root depths follow from the dominant land-cover class.

use std::collections::BTreeMap;

use crate::attributes::{AttributeFetcher, sample_valid, stats};
use crate::geometry::SampleGrid;
use crate::logging::{self, DataSource};
use crate::model::{Attribute, AttributeError, AttributeRecord, ComputeError, FetchContext, RecordError};
use crate::sources::{RasterSampler, VegetationIndexSource, VegetationProduct};

pub const LAND_COVER_LAYER: &str = "land_cover";

const LAI_SCALE: f64 = 0.1;
const LAI_MAX_VALID: f64 = 10.0;
const NDVI_SCALE: f64 = 1.0e-4;

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Display name of an NLCD class as used for `dom_land_cover`.
pub fn land_cover_name(code: i64) -> String {
    match code {
        41..=43 => "Forest".to_string(),
        81 | 82 => "Cropland".to_string(),
        71 => "Grassland".to_string(),
        52 => "Shrubland".to_string(),
        11 => "Water".to_string(),
        90 => "Wetland".to_string(),
        other => format!("Class{}", other),
    }
}

/// Rooting depths (m) holding 50 % and 99 % of roots for a land-cover name.
pub fn root_depth_for(land_cover: &str) -> (f64, f64) {
    match land_cover {
        "Forest" => (0.7, 2.0),
        "Cropland" => (0.3, 0.8),
        "Grassland" => (0.3, 1.0),
        "Shrubland" => (0.4, 1.2),
        "Wetland" => (0.2, 0.5),
        "Water" => (0.0, 0.0),
        _ => (0.4, 1.0),
    }
}

// ---------------------------------------------------------------------------
// Reductions
// ---------------------------------------------------------------------------

/// `(lai_max, lai_min, lai_diff)` from raw MOD15A2H values.
pub fn lai_stats(raw: &[f64]) -> Result<(f64, f64, f64), ComputeError> {
    let lai: Vec<f64> = raw
        .iter()
        .map(|v| v * LAI_SCALE)
        .filter(|v| (0.0..=LAI_MAX_VALID).contains(v))
        .collect();
    let (Some(max), Some(min)) = (stats::max(&lai), stats::min(&lai)) else {
        return Err(ComputeError::EmptyInput("leaf area index"));
    };
    Ok((max, min, max - min))
}

/// `(gvf_max, gvf_diff, gvf_mean)` from raw MOD13Q1 NDVI values.
pub fn gvf_stats(raw: &[f64]) -> Result<(f64, f64, f64), ComputeError> {
    let gvf: Vec<f64> = raw
        .iter()
        .map(|v| v * NDVI_SCALE)
        .filter(|v| (-1.0..=1.0).contains(v))
        .collect();
    let (Some(max), Some(min), Some(mean)) = (stats::max(&gvf), stats::min(&gvf), stats::mean(&gvf)) else {
        return Err(ComputeError::EmptyInput("green vegetation fraction"));
    };
    Ok((max, max - min, mean))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandCoverFractions {
    pub frac_forest: f64,
    pub frac_cropland: f64,
    pub water_frac: f64,
    pub dom_land_cover: String,
    pub dom_land_cover_frac: f64,
}

/// Class fractions over sampled NLCD codes.
pub fn land_cover_fractions(codes: &[f64]) -> Result<LandCoverFractions, ComputeError> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for code in codes {
        *counts.entry(code.round() as i64).or_default() += 1;
    }
    let total = codes.len() as f64;
    let share = |pred: fn(i64) -> bool| {
        counts.iter().filter(|(c, _)| pred(**c)).map(|(_, n)| *n).sum::<usize>() as f64 / total
    };

    // ties resolve to the lowest class code
    let (dom_code, dom_count) = counts
        .iter()
        .fold(None, |best: Option<(i64, usize)>, (&code, &n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((code, n)),
        })
        .ok_or(ComputeError::EmptyInput("land cover"))?;

    Ok(LandCoverFractions {
        frac_forest: share(|c| (41..=43).contains(&c)),
        frac_cropland: share(|c| c == 81 || c == 82),
        water_frac: share(|c| c == 11),
        dom_land_cover: land_cover_name(dom_code),
        dom_land_cover_frac: dom_count as f64 / total,
    })
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct VegetationFetcher<V, S> {
    modis: V,
    sampler: S,
    sample_points: usize,
    year: i32,
}

impl<V: VegetationIndexSource, S: RasterSampler> VegetationFetcher<V, S> {
    pub fn new(modis: V, sampler: S, sample_points: usize, year: i32) -> Self {
        Self { modis, sampler, sample_points, year }
    }

    fn lai(&self, ctx: &FetchContext<'_>) -> Result<(f64, f64, f64), AttributeError> {
        let raw = self.modis.pixel_values(VegetationProduct::LeafAreaIndex, ctx.basin, self.year)?;
        Ok(lai_stats(&raw)?)
    }

    fn gvf(&self, ctx: &FetchContext<'_>) -> Result<(f64, f64, f64), AttributeError> {
        let raw = self.modis.pixel_values(VegetationProduct::Ndvi, ctx.basin, self.year)?;
        Ok(gvf_stats(&raw)?)
    }

    fn land_cover(&self, ctx: &FetchContext<'_>) -> Result<LandCoverFractions, AttributeError> {
        let grid = SampleGrid::over(ctx.basin, self.sample_points);
        let codes = sample_valid(&self.sampler, LAND_COVER_LAYER, grid.points())?;
        Ok(land_cover_fractions(&codes)?)
    }

    fn assemble(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, RecordError> {
        let gauge_id = ctx.gauge.gauge_id.as_str();
        let mut record = AttributeRecord::new();

        match self.lai(ctx) {
            Ok((max, min, diff)) => {
                record.insert_measured("lai_max", max)?;
                record.insert_measured("lai_min", min)?;
                record.insert_measured("lai_diff", diff)?;
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::Modis, "leaf area index", &e);
                record.insert_imputed("lai_max", 3.0)?;
                record.insert_imputed("lai_min", 1.0)?;
                record.insert_imputed("lai_diff", 2.0)?;
            }
        }

        match self.gvf(ctx) {
            Ok((max, diff, mean)) => {
                record.insert_measured("gvf_max", max)?;
                record.insert_measured("gvf_diff", diff)?;
                record.insert_measured("gvf_mean", mean)?;
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::Modis, "green vegetation fraction", &e);
                record.insert_imputed("gvf_max", 0.7)?;
                record.insert_imputed("gvf_diff", 0.5)?;
                record.insert_imputed("gvf_mean", 0.45)?;
            }
        }

        let (dom_land_cover, measured) = match self.land_cover(ctx) {
            Ok(lc) => {
                record.insert_measured("frac_forest", lc.frac_forest)?;
                record.insert_measured("frac_cropland", lc.frac_cropland)?;
                record.insert_measured("water_frac", lc.water_frac)?;
                record.insert_measured("dom_land_cover", lc.dom_land_cover.as_str())?;
                record.insert_measured("dom_land_cover_frac", lc.dom_land_cover_frac)?;
                (lc.dom_land_cover, true)
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::LandCover, "land cover", &e);
                record.insert_imputed("frac_forest", 0.5)?;
                record.insert_imputed("frac_cropland", 0.1)?;
                record.insert_imputed("water_frac", 0.05)?;
                record.insert_imputed("dom_land_cover", "Forest")?;
                record.insert_imputed("dom_land_cover_frac", 0.5)?;
                ("Forest".to_string(), false)
            }
        };

        let (rd50, rd99) = root_depth_for(&dom_land_cover);
        let tag = |v: f64| if measured { Attribute::measured(v) } else { Attribute::imputed(v) };
        record.insert("root_depth_50", tag(rd50))?;
        record.insert("root_depth_99", tag(rd99))?;
        Ok(record)
    }
}

/// Literal table used when the vegetation record cannot be assembled.
pub fn default_record() -> Result<AttributeRecord, RecordError> {
    let mut record = AttributeRecord::new();
    let numbers = [
        ("lai_max", 3.0),
        ("lai_min", 1.0),
        ("lai_diff", 2.0),
        ("gvf_max", 0.7),
        ("gvf_diff", 0.5),
        ("gvf_mean", 0.45),
        ("frac_forest", 0.5),
        ("frac_cropland", 0.1),
        ("water_frac", 0.05),
    ];
    for (name, value) in numbers {
        record.insert_imputed(name, value)?;
    }
    record.insert_imputed("dom_land_cover", "Forest")?;
    record.insert_imputed("dom_land_cover_frac", 0.5)?;
    record.insert_imputed("root_depth_50", 0.4)?;
    record.insert_imputed("root_depth_99", 1.0)?;
    Ok(record)
}

impl<V: VegetationIndexSource, S: RasterSampler> AttributeFetcher for VegetationFetcher<V, S> {
    fn name(&self) -> &'static str {
        "vegetation"
    }

    fn source(&self) -> DataSource {
        DataSource::Modis
    }

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError> {
        match self.assemble(ctx) {
            Ok(record) => Ok(record),
            Err(e) => {
                logging::log_fallback(&ctx.gauge.gauge_id, DataSource::Modis, "vegetation record", &e.into());
                Ok(default_record()?)
            }
        }
    }
}
