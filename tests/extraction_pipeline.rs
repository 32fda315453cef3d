/// Offline tests of the full extraction pipeline
///
/// Every remote service is replaced by an in-memory source, so these run
/// without network access:
/// 1. A complete run yields metadata first, then all six stages
/// 2. Sub-blocks that cannot be fetched fall back to imputed defaults
/// 3. A failing stage drops only its own attributes
/// 4. Batch runs keep going past bad gauges and keep input order
/// 5. Batch records export to a CSV table
///
/// Run with: cargo test --test extraction_pipeline

use std::collections::HashMap;

use chrono::NaiveDate;
use geo::{Coord, LineString, MultiPolygon, Polygon};

use camels_attrs::attributes::AttributeFetcher;
use camels_attrs::attributes::climate::ClimateFetcher;
use camels_attrs::attributes::geology::GeologyFetcher;
use camels_attrs::attributes::hydrology::HydrologyFetcher;
use camels_attrs::attributes::soil::SoilFetcher;
use camels_attrs::attributes::topography::TopographyFetcher;
use camels_attrs::attributes::vegetation::VegetationFetcher;
use camels_attrs::export::{self, ExportOptions};
use camels_attrs::extractor::{CamelsExtractor, METADATA_KEYS, StageStatus};
use camels_attrs::geometry::BasinGeometry;
use camels_attrs::model::{DateRange, ExtractError, FetchError, GaugeIdentity, ResolutionError};
use camels_attrs::sources::{
    ClimateSource, DailyFlow, DailyForcing, RasterSampler, StreamflowSource, VegetationIndexSource,
    VegetationProduct, WatershedService,
};
use camels_attrs::watershed::BoundaryResolver;

// ---------------------------------------------------------------------------
// In-memory sources
// ---------------------------------------------------------------------------

/// Every gauge drains the same 0.5° square in Maine.
struct SquareBasin;

impl WatershedService for SquareBasin {
    fn site_metadata(&self, gauge_id: &str) -> Result<GaugeIdentity, ResolutionError> {
        Ok(GaugeIdentity {
            gauge_id: gauge_id.to_string(),
            name: format!("TEST RIVER {}", gauge_id),
            latitude: 45.2,
            longitude: -69.3,
            huc_02: gauge_id[..2].to_string(),
        })
    }

    fn basin_boundary(&self, _gauge_id: &str) -> Result<MultiPolygon<f64>, ResolutionError> {
        let ring = LineString::from(vec![(-69.5, 45.0), (-69.0, 45.0), (-69.0, 45.5), (-69.5, 45.5), (-69.5, 45.0)]);
        Ok(MultiPolygon(vec![Polygon::new(ring, vec![])]))
    }
}

/// Constant-valued raster layers; anything else is not served.
#[derive(Clone, Default)]
struct ConstantLayers(HashMap<&'static str, f64>);

impl ConstantLayers {
    fn with(mut self, layer: &'static str, value: f64) -> Self {
        self.0.insert(layer, value);
        self
    }
}

impl RasterSampler for ConstantLayers {
    fn sample(&self, layer: &str, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, FetchError> {
        match self.0.get(layer) {
            Some(v) => Ok(vec![Some(*v); points.len()]),
            None => Err(FetchError::LayerUnavailable(layer.to_string())),
        }
    }
}

/// Wet winters, dry summers, always above freezing.
struct SeasonalClimate;

impl ClimateSource for SeasonalClimate {
    fn daily_forcing(&self, _points: &[Coord<f64>], range: DateRange) -> Result<Vec<DailyForcing>, FetchError> {
        Ok(range
            .start
            .iter_days()
            .take_while(|d| *d <= range.end)
            .enumerate()
            .map(|(i, date)| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / 365.25;
                DailyForcing { date, prcp_mm: 3.0 + 2.0 * phase.cos(), tmax_c: 18.0, tmin_c: 6.0 }
            })
            .collect())
    }
}

/// MODIS subsets are never available.
struct NoModis;

impl VegetationIndexSource for NoModis {
    fn pixel_values(&self, _: VegetationProduct, _: &BasinGeometry, _: i32) -> Result<Vec<f64>, FetchError> {
        Err(FetchError::NoData("no composites for this tile".to_string()))
    }
}

struct SteadyFlow {
    available: bool,
}

impl StreamflowSource for SteadyFlow {
    fn daily_discharge(&self, _gauge_id: &str, range: DateRange) -> Result<Vec<DailyFlow>, FetchError> {
        if !self.available {
            return Err(FetchError::Http { status: 503, url: "https://example.org/nwis/dv".to_string() });
        }
        Ok(range
            .start
            .iter_days()
            .take_while(|d| *d <= range.end)
            .map(|date| DailyFlow { date, discharge_cfs: 850.0 })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SAMPLE_POINTS: usize = 64;

fn forested_layers() -> ConstantLayers {
    ConstantLayers::default()
        .with("elevation", 250.0)
        .with("porosity", 0.45)
        .with("available_water_capacity", 0.2)
        .with("field_capacity", 0.3)
        .with("sand_5", 40.0)
        .with("silt_5", 35.0)
        .with("clay_5", 25.0)
        .with("ksat_5", 2.0)
        .with("land_cover", 42.0)
        .with("glim_lithology", 6.0)
        .with("glhymps_porosity", 0.12)
        .with("glhymps_permeability", -13.5)
}

fn build_extractor(layers: ConstantLayers, soil_layers: ConstantLayers, flow_available: bool) -> CamelsExtractor<SquareBasin> {
    let fetchers: Vec<Box<dyn AttributeFetcher>> = vec![
        Box::new(TopographyFetcher::new(layers.clone(), SAMPLE_POINTS)),
        Box::new(ClimateFetcher::new(SeasonalClimate, SAMPLE_POINTS, 1)),
        Box::new(SoilFetcher::new(soil_layers, SAMPLE_POINTS)),
        Box::new(VegetationFetcher::new(NoModis, layers.clone(), SAMPLE_POINTS, 2020)),
        Box::new(GeologyFetcher::new(layers, SAMPLE_POINTS)),
        Box::new(HydrologyFetcher::new(SteadyFlow { available: flow_available })),
    ];
    let climate = DateRange::parse("2000-01-01", "2001-12-31").unwrap();
    let hydro = DateRange::parse("1999-10-01", "2001-09-30").unwrap();
    CamelsExtractor::new(BoundaryResolver::new(SquareBasin), fetchers, climate, hydro)
}

// ---------------------------------------------------------------------------
// Single gauge
// ---------------------------------------------------------------------------

#[test]
fn test_full_run_puts_metadata_first_and_runs_every_stage() {
    let extractor = build_extractor(forested_layers(), forested_layers(), true);
    let extraction = extractor.extract("01031500").unwrap();

    let keys: Vec<&str> = extraction.record.keys().collect();
    assert_eq!(&keys[..METADATA_KEYS.len()], &METADATA_KEYS[..]);
    assert_eq!(extraction.record.text("gauge_id"), Some("01031500"));
    assert_eq!(extraction.record.text("huc_02"), Some("01"));

    let stages: Vec<&str> = extraction.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec!["topography", "climate", "soil", "vegetation", "geology", "hydrology"]);
    assert!(extraction.stages.iter().all(|s| s.succeeded()));

    for key in ["elev_mean", "slope_mean", "area_gages2", "p_mean", "aridity", "q_mean", "baseflow_index"] {
        assert!(extraction.record.contains_key(key), "missing {}", key);
    }
    assert_eq!(extraction.record.number("elev_mean"), Some(250.0));
    assert_eq!(extraction.record.number("slope_mean"), Some(0.0));
}

#[test]
fn test_measured_soil_and_land_cover_values() {
    let extractor = build_extractor(forested_layers(), forested_layers(), true);
    let record = extractor.extract("01031500").unwrap().record;

    // ksat 2 cm/hr is 20 mm/hr
    let conductivity = record.number("soil_conductivity").unwrap();
    assert!((conductivity - 20.0f64.log10()).abs() < 1e-12);
    assert!(!record.get("soil_conductivity").unwrap().is_imputed());
    // max water content is awc x typical depth, so always imputed
    assert!((record.number("max_water_content").unwrap() - 200.0).abs() < 1e-9);
    assert!(record.get("max_water_content").unwrap().is_imputed());

    assert_eq!(record.text("dom_land_cover"), Some("Forest"));
    assert_eq!(record.number("frac_forest"), Some(1.0));
    assert_eq!(record.number("root_depth_50"), Some(0.7));
    assert_eq!(record.number("root_depth_99"), Some(2.0));
    assert!(!record.get("root_depth_50").unwrap().is_imputed());

    assert_eq!(record.number("carbonate_rocks_frac"), Some(1.0));
    assert_eq!(record.text("geol_2nd_class"), Some("none"));
}

#[test]
fn test_unavailable_sub_blocks_are_imputed() {
    let extractor = build_extractor(forested_layers(), ConstantLayers::default(), true);
    let extraction = extractor.extract("01031500").unwrap();
    let record = &extraction.record;

    // soil layers missing entirely
    assert_eq!(record.number("soil_porosity"), Some(0.4));
    assert_eq!(record.number("sand_frac"), Some(35.0));
    assert_eq!(record.number("soil_conductivity"), Some(0.5));
    assert!(record.get("soil_porosity").unwrap().is_imputed());

    // MODIS never answers
    assert_eq!(record.number("gvf_mean"), Some(0.45));
    assert_eq!(record.number("lai_max"), Some(3.0));
    assert!(record.get("lai_max").unwrap().is_imputed());

    let imputed = record.imputed_names();
    assert!(imputed.contains(&"soil_depth_statsgo"));
    assert!(!imputed.contains(&"elev_mean"));
    assert!(extraction.stages.iter().all(|s| s.succeeded()));
}

#[test]
fn test_failed_stage_drops_only_its_attributes() {
    let extractor = build_extractor(forested_layers(), forested_layers(), false);
    let extraction = extractor.extract("01031500").unwrap();

    let hydrology = extraction.stages.iter().find(|s| s.stage == "hydrology").unwrap();
    assert!(matches!(hydrology.status, StageStatus::Failed(_)));
    assert!(!extraction.record.contains_key("q_mean"));
    assert!(!extraction.record.contains_key("hfd_mean"));
    assert!(extraction.record.contains_key("p_mean"));
    assert!(extraction.record.contains_key("elev_mean"));
}

#[test]
fn test_invalid_gauge_id_fails_resolution() {
    let extractor = build_extractor(forested_layers(), forested_layers(), true);
    let err = extractor.extract("01A31500").unwrap_err();
    assert_eq!(err, ExtractError::Resolution(ResolutionError::InvalidGaugeId("01A31500".to_string())));
}

// ---------------------------------------------------------------------------
// Batch runs
// ---------------------------------------------------------------------------

#[test]
fn test_batch_skips_bad_gauges_and_keeps_order() {
    let extractor = build_extractor(forested_layers(), forested_layers(), true);
    let batch = extractor.extract_multiple(&["02177000", "not-a-gauge", "01031500"]).unwrap();

    let ids: Vec<&str> = batch.records.iter().map(|r| r.text("gauge_id").unwrap()).collect();
    assert_eq!(ids, vec!["02177000", "01031500"]);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].gauge_id, "not-a-gauge");
    assert_eq!(batch.attempted(), 3);
}

#[test]
fn test_batch_with_no_successes_is_an_error() {
    let extractor = build_extractor(forested_layers(), forested_layers(), true);
    let err = extractor.extract_multiple(&["x", "y"]).unwrap_err();
    assert_eq!(err, ExtractError::NoGaugesSucceeded { attempted: 2 });
}

#[test]
fn test_batch_exports_one_row_per_gauge() {
    let extractor = build_extractor(forested_layers(), ConstantLayers::default(), true);
    let batch = extractor.extract_multiple(&["01031500", "02177000"]).unwrap();

    let mut out = Vec::new();
    export::write_csv(&mut out, &batch.records, ExportOptions::default()).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("gauge_id,gauge_name,gauge_lat,gauge_lon,huc_02,"));
    assert!(lines[0].ends_with(",imputed_attributes"));
    assert!(lines[1].starts_with("01031500,TEST RIVER 01031500,"));
    assert!(lines[2].contains("soil_porosity;"));
}

#[test]
fn test_daily_sources_cover_the_requested_window() {
    let range = DateRange::parse("2000-01-01", "2000-12-31").unwrap();
    let days = SeasonalClimate.daily_forcing(&[], range).unwrap();
    assert_eq!(days.len() as i64, range.num_days());
    assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
}
