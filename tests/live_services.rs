//! Live service checks
//!
//! These tests hit the real NLDI, NWIS, Daymet, MODIS and 3DEP endpoints
//! for the regional sample gauges. They need internet access and are slow,
//! so they are ignored by default.
//!
//! Run with: cargo test --test live_services -- --ignored --test-threads=1

use camels_attrs::config::Config;
use camels_attrs::extractor::CamelsExtractor;
use camels_attrs::geometry::{BasinGeometry, SampleGrid};
use camels_attrs::ingest::daymet::DaymetClient;
use camels_attrs::ingest::image_server::ImageServerSampler;
use camels_attrs::ingest::modis::ModisClient;
use camels_attrs::ingest::nldi::NldiClient;
use camels_attrs::ingest::usgs::NwisClient;
use camels_attrs::model::DateRange;
use camels_attrs::sources::{
    ClimateSource, RasterSampler, StreamflowSource, VegetationIndexSource, VegetationProduct, WatershedService,
};
use camels_attrs::stations::SAMPLE_GAUGES;

const PISCATAQUIS: &str = "01031500";

fn config() -> Config {
    Config::default()
}

fn nldi(config: &Config) -> NldiClient {
    NldiClient::new(
        config.http_client().unwrap(),
        config.services.nldi_url.as_str(),
        config.services.nwis_url.as_str(),
    )
}

fn piscataquis_basin(config: &Config) -> BasinGeometry {
    let boundary = nldi(config).basin_boundary(PISCATAQUIS).unwrap();
    BasinGeometry::new(boundary).unwrap()
}

#[test]
#[ignore]
fn test_nldi_resolves_every_sample_gauge() {
    let config = config();
    let service = nldi(&config);

    let mut working = 0;
    for gauge in SAMPLE_GAUGES {
        match service.site_metadata(gauge.site_code).and_then(|id| {
            let boundary = service.basin_boundary(gauge.site_code)?;
            Ok((id, boundary))
        }) {
            Ok((identity, boundary)) => match BasinGeometry::new(boundary) {
                Ok(basin) => {
                    println!("{} {}: {:.0} km²", gauge.site_code, identity.name, basin.area_km2());
                    working += 1;
                }
                Err(e) => println!("{} {}: unusable geometry: {}", gauge.site_code, gauge.label, e),
            },
            Err(e) => println!("{} {}: {}", gauge.site_code, gauge.label, e),
        }
    }
    assert!(working > 0, "no sample gauge could be delineated");
}

#[test]
#[ignore]
fn test_piscataquis_area_matches_published() {
    // NWIS lists 298 mi², about 772 km²
    let basin = piscataquis_basin(&config());
    assert!((700.0..850.0).contains(&basin.area_km2()), "area = {}", basin.area_km2());
}

#[test]
#[ignore]
fn test_nwis_returns_two_years_of_daily_flow() {
    let config = config();
    let client = NwisClient::new(config.http_client().unwrap(), config.services.nwis_url.as_str());
    let range = DateRange::parse("2010-01-01", "2011-12-31").unwrap();
    let flows = client.daily_discharge(PISCATAQUIS, range).unwrap();
    assert!(flows.len() > 700, "got {} values", flows.len());
    assert!(flows.iter().all(|f| f.discharge_cfs >= 0.0));
}

#[test]
#[ignore]
fn test_daymet_returns_full_year() {
    let config = config();
    let basin = piscataquis_basin(&config);
    let client = DaymetClient::new(config.http_client().unwrap(), config.services.daymet_url.as_str());
    let range = DateRange::parse("2015-01-01", "2015-12-31").unwrap();
    let days = client.daily_forcing(&[basin.centroid().0], range).unwrap();
    // Daymet years have 365 days
    assert_eq!(days.len(), 365);
}

#[test]
#[ignore]
fn test_modis_lai_pixels_inside_basin() {
    let config = config();
    let basin = piscataquis_basin(&config);
    let client = ModisClient::new(config.http_client().unwrap(), config.services.modis_url.as_str());
    let values = client.pixel_values(VegetationProduct::LeafAreaIndex, &basin, 2020).unwrap();
    assert!(!values.is_empty());
}

#[test]
#[ignore]
fn test_3dep_elevation_samples() {
    let config = config();
    let basin = piscataquis_basin(&config);
    let sampler = ImageServerSampler::new(config.http_client().unwrap(), config.layers.clone());
    let grid = SampleGrid::over(&basin, 50);
    let values = sampler.sample("elevation", grid.points()).unwrap();
    assert_eq!(values.len(), grid.len());
    let valid: Vec<f64> = values.into_iter().flatten().collect();
    assert!(!valid.is_empty());
    // the basin spans roughly 100-900 m
    assert!(valid.iter().all(|z| (0.0..1500.0).contains(z)));
}

#[test]
#[ignore]
fn test_full_extraction_of_piscataquis() {
    let extractor = CamelsExtractor::from_config(&config()).unwrap();
    let extraction = extractor.extract(PISCATAQUIS).unwrap();
    for stage in &extraction.stages {
        println!("{:<11} {:?}", stage.stage, stage.status);
    }
    assert_eq!(extraction.record.text("gauge_id"), Some(PISCATAQUIS));
    assert!(extraction.record.contains_key("elev_mean"));
    assert!(extraction.record.contains_key("q_mean"));
}
