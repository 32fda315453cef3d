/// Geologic attributes from GLiM lithology and GLHYMPS hydrogeology
///
/// Both sub-blocks fall back to typical values when their layers are not
/// configured or cannot be read.

use std::collections::BTreeMap;

use crate::attributes::{AttributeFetcher, basin_mean, sample_valid};
use crate::geometry::SampleGrid;
use crate::logging::{self, DataSource};
use crate::model::{AttributeError, AttributeRecord, ComputeError, FetchContext, RecordError};
use crate::sources::RasterSampler;

pub const LITHOLOGY_LAYER: &str = "glim_lithology";
pub const POROSITY_LAYER: &str = "glhymps_porosity";
/// log10 of intrinsic permeability (m²).
pub const PERMEABILITY_LAYER: &str = "glhymps_permeability";

/// GLiM code for carbonate sedimentary rocks.
pub const CARBONATE_CLASS: i64 = 6;
/// GLiM "No Data" class, excluded from fractions.
const NO_DATA_CLASS: i64 = 15;

/// GLiM first-level class names (Hartmann & Moosdorf 2012), codes 1-16.
const GLIM_CLASSES: [&str; 16] = [
    "Unconsolidated sediments",
    "Basic volcanic rocks",
    "Siliciclastic sedimentary rocks",
    "Basic plutonic rocks",
    "Mixed sedimentary rocks",
    "Carbonate sedimentary rocks",
    "Acid volcanic rocks",
    "Metamorphics",
    "Acid plutonic rocks",
    "Intermediate volcanic rocks",
    "Water Bodies",
    "Pyroclastics",
    "Intermediate plutonic rocks",
    "Evaporites",
    "No Data",
    "Ice and Glaciers",
];

pub fn glim_class_name(code: i64) -> Option<&'static str> {
    usize::try_from(code - 1).ok().and_then(|i| GLIM_CLASSES.get(i).copied())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lithology {
    pub first_class: &'static str,
    pub first_frac: f64,
    /// `None` when the basin holds a single class.
    pub second: Option<(&'static str, f64)>,
    pub carbonate_frac: f64,
}

/// Dominant and second lithology classes over sampled GLiM codes.
pub fn lithology_fractions(codes: &[f64]) -> Result<Lithology, ComputeError> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for code in codes {
        let code = code.round() as i64;
        if code != NO_DATA_CLASS && glim_class_name(code).is_some() {
            *counts.entry(code).or_default() += 1;
        }
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return Err(ComputeError::EmptyInput("lithology"));
    }

    let mut ranked: Vec<(i64, usize)> = counts.iter().map(|(c, n)| (*c, *n)).collect();
    // stable: equal counts keep ascending code order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let frac = |n: usize| n as f64 / total as f64;
    let name = |code: i64| glim_class_name(code).unwrap_or("Unknown");
    let (first_code, first_n) = ranked[0];

    Ok(Lithology {
        first_class: name(first_code),
        first_frac: frac(first_n),
        second: ranked.get(1).map(|&(code, n)| (name(code), frac(n))),
        carbonate_frac: frac(counts.get(&CARBONATE_CLASS).copied().unwrap_or(0)),
    })
}

pub struct GeologyFetcher<S> {
    sampler: S,
    sample_points: usize,
}

impl<S: RasterSampler> GeologyFetcher<S> {
    pub fn new(sampler: S, sample_points: usize) -> Self {
        Self { sampler, sample_points }
    }

    fn lithology(&self, grid: &SampleGrid) -> Result<Lithology, AttributeError> {
        let codes = sample_valid(&self.sampler, LITHOLOGY_LAYER, grid.points())?;
        Ok(lithology_fractions(&codes)?)
    }

    fn hydrogeology(&self, grid: &SampleGrid) -> Result<(f64, f64), AttributeError> {
        Ok((
            basin_mean(&self.sampler, POROSITY_LAYER, grid.points())?,
            basin_mean(&self.sampler, PERMEABILITY_LAYER, grid.points())?,
        ))
    }

    fn assemble(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, RecordError> {
        let gauge_id = ctx.gauge.gauge_id.as_str();
        let grid = SampleGrid::over(ctx.basin, self.sample_points);
        let mut record = AttributeRecord::new();

        match self.lithology(&grid) {
            Ok(lith) => {
                let (second_class, second_frac) = lith.second.unwrap_or(("none", 0.0));
                record.insert_measured("geol_1st_class", lith.first_class)?;
                record.insert_measured("glim_1st_class_frac", lith.first_frac)?;
                record.insert_measured("geol_2nd_class", second_class)?;
                record.insert_measured("glim_2nd_class_frac", second_frac)?;
                record.insert_measured("carbonate_rocks_frac", lith.carbonate_frac)?;
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::Geology, "lithology", &e);
                record.insert_imputed("geol_1st_class", "Siliciclastic sedimentary rocks")?;
                record.insert_imputed("glim_1st_class_frac", 0.5)?;
                record.insert_imputed("geol_2nd_class", "Unconsolidated sediments")?;
                record.insert_imputed("glim_2nd_class_frac", 0.2)?;
                record.insert_imputed("carbonate_rocks_frac", 0.1)?;
            }
        }

        match self.hydrogeology(&grid) {
            Ok((porosity, permeability)) => {
                record.insert_measured("geol_porosity", porosity)?;
                record.insert_measured("geol_permeability", permeability)?;
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::Geology, "hydrogeology", &e);
                record.insert_imputed("geol_porosity", 0.1)?;
                record.insert_imputed("geol_permeability", -14.0)?;
            }
        }
        Ok(record)
    }
}

impl<S: RasterSampler> AttributeFetcher for GeologyFetcher<S> {
    fn name(&self) -> &'static str {
        "geology"
    }

    fn source(&self) -> DataSource {
        DataSource::Geology
    }

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError> {
        Ok(self.assemble(ctx)?)
    }
}
