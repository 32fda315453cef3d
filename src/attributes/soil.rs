/// Soil attributes from gridded soil property rasters
///
/// Two sub-blocks fall back independently:
/// - pedotransfer properties (porosity, available water capacity, field
///   capacity) from gNATSGO-style layers
/// - texture and saturated conductivity from POLARIS-style layers at
///   5, 15 and 30 cm
///
/// Fallback values are literal typical values and are tagged imputed.

use crate::attributes::{AttributeFetcher, basin_mean, stats};
use crate::geometry::SampleGrid;
use crate::logging::{self, DataSource};
use crate::model::{AttributeError, AttributeRecord, ComputeError, FetchContext, FetchError, RecordError};
use crate::sources::RasterSampler;

pub const POROSITY_LAYER: &str = "porosity";
pub const AWC_LAYER: &str = "available_water_capacity";
pub const FIELD_CAPACITY_LAYER: &str = "field_capacity";

/// Texture layer names are `{variable}_{depth}`, e.g. `sand_5`.
pub const TEXTURE_DEPTHS_CM: [u32; 3] = [5, 15, 30];

pub const DEFAULT_POROSITY: f64 = 0.4;
pub const DEFAULT_AWC: f64 = 0.15;
pub const DEFAULT_FIELD_CAPACITY: f64 = 0.25;
pub const DEFAULT_SAND: f64 = 35.0;
pub const DEFAULT_SILT: f64 = 40.0;
pub const DEFAULT_CLAY: f64 = 25.0;
/// log10(mm/hr)
pub const DEFAULT_CONDUCTIVITY: f64 = 0.5;
/// Typical soil depth (m); no depth-to-bedrock layer is read.
pub const SOIL_DEPTH_M: f64 = 1.0;
pub const DEFAULT_MAX_WATER_CONTENT: f64 = 150.0;

const TEXTURE_LAYERS: [(&str, [&str; 3]); 4] = [
    ("sand", ["sand_5", "sand_15", "sand_30"]),
    ("silt", ["silt_5", "silt_15", "silt_30"]),
    ("clay", ["clay_5", "clay_15", "clay_30"]),
    ("ksat", ["ksat_5", "ksat_15", "ksat_30"]),
];

/// Convert mean saturated conductivity from cm/hr to log10(mm/hr).
pub fn conductivity_log10(mean_ksat_cm_hr: f64) -> Result<f64, ComputeError> {
    if !(mean_ksat_cm_hr > 0.0) {
        return Err(ComputeError::Invalid(format!(
            "saturated conductivity must be positive, got {}",
            mean_ksat_cm_hr
        )));
    }
    Ok((mean_ksat_cm_hr * 10.0).log10())
}

pub struct SoilFetcher<S> {
    sampler: S,
    sample_points: usize,
}

impl<S: RasterSampler> SoilFetcher<S> {
    pub fn new(sampler: S, sample_points: usize) -> Self {
        Self { sampler, sample_points }
    }

    fn pedotransfer(&self, grid: &SampleGrid) -> Result<[f64; 3], AttributeError> {
        Ok([
            basin_mean(&self.sampler, POROSITY_LAYER, grid.points())?,
            basin_mean(&self.sampler, AWC_LAYER, grid.points())?,
            basin_mean(&self.sampler, FIELD_CAPACITY_LAYER, grid.points())?,
        ])
    }

    /// Depth-averaged means per texture variable. A variable with no
    /// available depth is `None`.
    fn texture(&self, grid: &SampleGrid) -> Result<[Option<f64>; 4], AttributeError> {
        let mut means = [None; 4];
        for (slot, (_, layers)) in means.iter_mut().zip(TEXTURE_LAYERS) {
            let mut per_depth = Vec::new();
            for layer in layers {
                match basin_mean(&self.sampler, layer, grid.points()) {
                    Ok(v) => per_depth.push(v),
                    Err(AttributeError::Fetch(FetchError::LayerUnavailable(_)))
                    | Err(AttributeError::Compute(ComputeError::EmptyInput(_))) => {}
                    Err(e) => return Err(e),
                }
            }
            *slot = stats::mean(&per_depth);
        }
        Ok(means)
    }

    fn assemble(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, RecordError> {
        let gauge_id = ctx.gauge.gauge_id.as_str();
        let grid = SampleGrid::over(ctx.basin, self.sample_points);
        let mut record = AttributeRecord::new();

        let awc = match self.pedotransfer(&grid) {
            Ok([porosity, awc, field_capacity]) => {
                record.insert_measured("soil_porosity", porosity)?;
                record.insert_measured("awc_mean", awc)?;
                record.insert_measured("field_capacity", field_capacity)?;
                awc
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::Soil, "soil properties", &e);
                record.insert_imputed("soil_porosity", DEFAULT_POROSITY)?;
                record.insert_imputed("awc_mean", DEFAULT_AWC)?;
                record.insert_imputed("field_capacity", DEFAULT_FIELD_CAPACITY)?;
                DEFAULT_AWC
            }
        };

        let texture = self.texture(&grid).and_then(|[sand, silt, clay, ksat]| {
            let conductivity = ksat.map(conductivity_log10).transpose()?;
            Ok([sand, silt, clay, conductivity])
        });
        match texture {
            Ok([sand, silt, clay, conductivity]) => {
                insert_or_default(&mut record, "sand_frac", sand, DEFAULT_SAND)?;
                insert_or_default(&mut record, "silt_frac", silt, DEFAULT_SILT)?;
                insert_or_default(&mut record, "clay_frac", clay, DEFAULT_CLAY)?;
                insert_or_default(&mut record, "soil_conductivity", conductivity, DEFAULT_CONDUCTIVITY)?;
            }
            Err(e) => {
                logging::log_fallback(gauge_id, DataSource::Soil, "soil texture", &e);
                record.insert_imputed("sand_frac", DEFAULT_SAND)?;
                record.insert_imputed("silt_frac", DEFAULT_SILT)?;
                record.insert_imputed("clay_frac", DEFAULT_CLAY)?;
                record.insert_imputed("soil_conductivity", DEFAULT_CONDUCTIVITY)?;
            }
        }

        record.insert_imputed("soil_depth_statsgo", SOIL_DEPTH_M)?;
        // derived from the typical soil depth, so never a measurement
        record.insert_imputed("max_water_content", awc * SOIL_DEPTH_M * 1000.0)?;
        Ok(record)
    }
}

fn insert_or_default(
    record: &mut AttributeRecord,
    name: &str,
    value: Option<f64>,
    default: f64,
) -> Result<(), RecordError> {
    match value {
        Some(v) => record.insert_measured(name, v),
        None => record.insert_imputed(name, default),
    }
}

/// Literal table used when the soil record cannot be assembled at all.
pub fn default_record() -> Result<AttributeRecord, RecordError> {
    let mut record = AttributeRecord::new();
    let table = [
        ("soil_porosity", DEFAULT_POROSITY),
        ("awc_mean", DEFAULT_AWC),
        ("field_capacity", DEFAULT_FIELD_CAPACITY),
        ("sand_frac", DEFAULT_SAND),
        ("silt_frac", DEFAULT_SILT),
        ("clay_frac", DEFAULT_CLAY),
        ("soil_conductivity", DEFAULT_CONDUCTIVITY),
        ("soil_depth_statsgo", SOIL_DEPTH_M),
        ("max_water_content", DEFAULT_MAX_WATER_CONTENT),
    ];
    for (name, value) in table {
        record.insert_imputed(name, value)?;
    }
    Ok(record)
}

impl<S: RasterSampler> AttributeFetcher for SoilFetcher<S> {
    fn name(&self) -> &'static str {
        "soil"
    }

    fn source(&self) -> DataSource {
        DataSource::Soil
    }

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError> {
        match self.assemble(ctx) {
            Ok(record) => Ok(record),
            Err(e) => {
                logging::log_fallback(&ctx.gauge.gauge_id, DataSource::Soil, "soil record", &e.into());
                Ok(default_record()?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::testing::FakeSampler;
    use crate::geometry::tests::square_basin;
    use crate::model::{DateRange, GaugeIdentity};

    fn run(sampler: FakeSampler) -> AttributeRecord {
        let basin = square_basin(-69.5, 45.0, 0.5);
        let gauge = GaugeIdentity {
            gauge_id: "01031500".to_string(),
            name: "TEST".to_string(),
            latitude: 45.2,
            longitude: -69.3,
            huc_02: "01".to_string(),
        };
        let range = DateRange::parse("2000-01-01", "2000-12-31").unwrap();
        let ctx = FetchContext { gauge: &gauge, basin: &basin, climate_range: range, hydro_range: range };
        SoilFetcher::new(sampler, 64).fetch(&ctx).unwrap()
    }

    fn full_sampler() -> FakeSampler {
        FakeSampler::default()
            .with(POROSITY_LAYER, |_| Some(0.45))
            .with(AWC_LAYER, |_| Some(0.2))
            .with(FIELD_CAPACITY_LAYER, |_| Some(0.3))
            .with("sand_5", |_| Some(40.0))
            .with("sand_15", |_| Some(50.0))
            .with("silt_5", |_| Some(30.0))
            .with("clay_30", |_| Some(20.0))
            .with("ksat_5", |_| Some(2.0))
            .with("ksat_15", |_| Some(4.0))
    }

    fn assert_close(record: &AttributeRecord, name: &str, expected: f64) {
        let value = record.number(name).unwrap();
        assert!((value - expected).abs() < 1e-9, "{} = {}, expected {}", name, value, expected);
    }

    #[test]
    fn test_conductivity_formula() {
        assert!((conductivity_log10(3.0).unwrap() - 30.0f64.log10()).abs() < 1e-12);
        assert!(conductivity_log10(0.0).is_err());
    }

    #[test]
    fn test_measured_properties_and_depth_averaging() {
        let record = run(full_sampler());
        assert_close(&record, "soil_porosity", 0.45);
        assert!(!record.get("soil_porosity").unwrap().is_imputed());
        assert_close(&record, "sand_frac", 45.0);
        assert_close(&record, "silt_frac", 30.0);
        assert_close(&record, "clay_frac", 20.0);
        // mean ksat 3 cm/hr
        assert!((record.number("soil_conductivity").unwrap() - 30.0f64.log10()).abs() < 1e-12);
        assert!((record.number("max_water_content").unwrap() - 200.0).abs() < 1e-9);
        assert!(record.get("soil_depth_statsgo").unwrap().is_imputed());
    }

    #[test]
    fn test_no_soil_layers_imputes_defaults() {
        let record = run(FakeSampler::default());
        assert_eq!(record.number("soil_porosity"), Some(0.4));
        assert_eq!(record.number("awc_mean"), Some(0.15));
        assert_eq!(record.number("sand_frac"), Some(35.0));
        assert_eq!(record.number("silt_frac"), Some(40.0));
        assert_eq!(record.number("clay_frac"), Some(25.0));
        assert_eq!(record.number("soil_conductivity"), Some(0.5));
        assert!((record.number("max_water_content").unwrap() - 150.0).abs() < 1e-9);
        assert!(record.iter().all(|(_, a)| a.is_imputed()));
    }

    #[test]
    fn test_non_positive_ksat_imputes_whole_texture_block() {
        let sampler = full_sampler().with("ksat_5", |_| Some(0.0)).with("ksat_15", |_| Some(0.0));
        let record = run(sampler);
        assert_eq!(record.number("sand_frac"), Some(35.0));
        assert!(record.get("sand_frac").unwrap().is_imputed());
        assert_eq!(record.number("soil_conductivity"), Some(0.5));
        // the pedotransfer block is unaffected
        assert_close(&record, "soil_porosity", 0.45);
    }

    #[test]
    fn test_service_outage_imputes_both_blocks() {
        let record = run(FakeSampler::failing(FetchError::Request("connection reset".to_string())));
        assert_eq!(record.number("soil_porosity"), Some(0.4));
        assert_eq!(record.number("sand_frac"), Some(35.0));
        assert_eq!(record.len(), 9);
    }

    #[test]
    fn test_default_record_table() {
        let record = default_record().unwrap();
        assert_eq!(record.len(), 9);
        assert!(record.iter().all(|(_, a)| a.is_imputed()));
        assert_eq!(record.number("max_water_content"), Some(150.0));
    }
}
