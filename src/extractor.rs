/// Extraction driver
///
/// Runs the seven stages for one gauge (delineation, then the six
/// attribute fetchers) and assembles the flat attribute record; the batch
/// driver loops over several gauges and keeps going past failures.
///
/// Only delineation is fatal for a gauge. A failing fetcher is logged,
/// reported in `Extraction::stages`, and contributes no attributes.

use crate::attributes::AttributeFetcher;
use crate::attributes::climate::ClimateFetcher;
use crate::attributes::geology::GeologyFetcher;
use crate::attributes::hydrology::HydrologyFetcher;
use crate::attributes::soil::SoilFetcher;
use crate::attributes::topography::TopographyFetcher;
use crate::attributes::vegetation::VegetationFetcher;
use crate::config::{Config, ConfigError};
use crate::geometry::BasinGeometry;
use crate::ingest::daymet::DaymetClient;
use crate::ingest::image_server::ImageServerSampler;
use crate::ingest::modis::ModisClient;
use crate::ingest::nldi::NldiClient;
use crate::ingest::usgs::NwisClient;
use crate::logging::{self, DataSource};
use crate::model::{
    AttributeError, AttributeRecord, BatchResult, DateRange, ExtractError, FetchContext, GaugeFailure,
    GaugeIdentity,
};
use crate::sources::WatershedService;
use crate::watershed::BoundaryResolver;

/// Names of the metadata attributes attached to every record.
pub const METADATA_KEYS: [&str; 5] = ["gauge_id", "gauge_name", "gauge_lat", "gauge_lon", "huc_02"];

// ---------------------------------------------------------------------------
// Stage reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed { attributes: usize, imputed: usize },
    Failed(AttributeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub source: DataSource,
    pub status: StageStatus,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, StageStatus::Completed { .. })
    }
}

/// Result of extracting one gauge.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub identity: GaugeIdentity,
    pub basin: BasinGeometry,
    /// Metadata followed by the attributes of every successful stage.
    pub record: AttributeRecord,
    /// One entry per attribute stage, in execution order.
    pub stages: Vec<StageOutcome>,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct CamelsExtractor<W> {
    resolver: BoundaryResolver<W>,
    fetchers: Vec<Box<dyn AttributeFetcher>>,
    climate_range: DateRange,
    hydro_range: DateRange,
}

impl CamelsExtractor<NldiClient> {
    /// Wire the HTTP clients for every stage from `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = config.http_client()?;
        let services = &config.services;
        let extraction = &config.extraction;
        let sampler = ImageServerSampler::new(client.clone(), config.layers.clone());

        let fetchers: Vec<Box<dyn AttributeFetcher>> = vec![
            Box::new(TopographyFetcher::new(sampler.clone(), extraction.sample_points)),
            Box::new(ClimateFetcher::new(
                DaymetClient::new(client.clone(), services.daymet_url.as_str()),
                extraction.sample_points,
                extraction.climate_points,
            )),
            Box::new(SoilFetcher::new(sampler.clone(), extraction.sample_points)),
            Box::new(VegetationFetcher::new(
                ModisClient::new(client.clone(), services.modis_url.as_str()),
                sampler.clone(),
                extraction.sample_points,
                extraction.vegetation_year,
            )),
            Box::new(GeologyFetcher::new(sampler, extraction.sample_points)),
            Box::new(HydrologyFetcher::new(NwisClient::new(client.clone(), services.nwis_url.as_str()))),
        ];

        let resolver = BoundaryResolver::new(NldiClient::new(
            client,
            services.nldi_url.as_str(),
            services.nwis_url.as_str(),
        ));
        Ok(Self::new(resolver, fetchers, config.climate_range()?, config.hydro_range()?))
    }
}

impl<W: WatershedService> CamelsExtractor<W> {
    /// Fetchers run in the order given.
    pub fn new(
        resolver: BoundaryResolver<W>,
        fetchers: Vec<Box<dyn AttributeFetcher>>,
        climate_range: DateRange,
        hydro_range: DateRange,
    ) -> Self {
        Self { resolver, fetchers, climate_range, hydro_range }
    }

    /// Extract the full attribute record of one gauge.
    pub fn extract(&self, gauge_id: &str) -> Result<Extraction, ExtractError> {
        logging::info(DataSource::System, Some(gauge_id), "Starting extraction");

        let (identity, basin) = self.resolver.resolve(gauge_id).inspect_err(|e| {
            logging::log_resolution_failure(gauge_id, e);
        })?;

        let ctx = FetchContext {
            gauge: &identity,
            basin: &basin,
            climate_range: self.climate_range,
            hydro_range: self.hydro_range,
        };

        let mut attributes = AttributeRecord::new();
        let mut stages = Vec::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            let status = match fetcher.fetch(&ctx) {
                Ok(record) => {
                    let status = StageStatus::Completed {
                        attributes: record.len(),
                        imputed: record.imputed_names().len(),
                    };
                    attributes.merge(record)?;
                    status
                }
                Err(e) => {
                    logging::log_stage_failure(gauge_id, fetcher.source(), fetcher.name(), &e);
                    StageStatus::Failed(e)
                }
            };
            stages.push(StageOutcome { stage: fetcher.name(), source: fetcher.source(), status });
        }

        let mut record = metadata_record(&identity)?;
        record.merge(attributes)?;

        let failed = stages.iter().filter(|s| !s.succeeded()).count();
        logging::info(
            DataSource::System,
            Some(gauge_id),
            &format!(
                "Extraction complete: {} attributes, {}/{} stages succeeded",
                record.len(),
                stages.len() - failed,
                stages.len()
            ),
        );

        Ok(Extraction { identity, basin, record, stages })
    }

    /// Extract several gauges in order, skipping those that fail.
    ///
    /// Fails only when no gauge succeeds.
    pub fn extract_multiple<S: AsRef<str>>(&self, gauge_ids: &[S]) -> Result<BatchResult, ExtractError> {
        let mut batch = BatchResult::default();
        for (i, gauge_id) in gauge_ids.iter().enumerate() {
            let gauge_id = gauge_id.as_ref();
            logging::info(
                DataSource::System,
                Some(gauge_id),
                &format!("Processing gauge {}/{}", i + 1, gauge_ids.len()),
            );
            match self.extract(gauge_id) {
                Ok(extraction) => batch.records.push(extraction.record),
                Err(e) => {
                    logging::error(DataSource::System, Some(gauge_id), &format!("Skipped: {}", e));
                    batch.failures.push(GaugeFailure { gauge_id: gauge_id.to_string(), reason: e.to_string() });
                }
            }
        }

        logging::log_batch_summary(batch.attempted(), batch.records.len(), batch.failures.len());
        if batch.records.is_empty() {
            return Err(ExtractError::NoGaugesSucceeded { attempted: batch.attempted() });
        }
        Ok(batch)
    }
}

fn metadata_record(identity: &GaugeIdentity) -> Result<AttributeRecord, ExtractError> {
    let mut record = AttributeRecord::new();
    record.insert_measured("gauge_id", identity.gauge_id.as_str())?;
    record.insert_measured("gauge_name", identity.name.as_str())?;
    record.insert_measured("gauge_lat", identity.latitude)?;
    record.insert_measured("gauge_lon", identity.longitude)?;
    record.insert_measured("huc_02", identity.huc_02.as_str())?;
    Ok(record)
}
