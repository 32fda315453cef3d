//! Seams between the attribute fetchers and the remote services they read.
//!
//! Each trait is one kind of collaborator. The HTTP implementations live in
//! `ingest`; tests substitute in-memory sources.

use chrono::NaiveDate;
use geo::{Coord, MultiPolygon};

use crate::geometry::BasinGeometry;
use crate::model::{DateRange, FetchError, GaugeIdentity, ResolutionError};

/// Hydrologic-network service resolving a gauge to metadata and a basin.
pub trait WatershedService {
    fn site_metadata(&self, gauge_id: &str) -> Result<GaugeIdentity, ResolutionError>;

    /// Drainage-basin boundary upstream of the gauge, WGS84 lon/lat.
    fn basin_boundary(&self, gauge_id: &str) -> Result<MultiPolygon<f64>, ResolutionError>;
}

/// Point sampling of named raster layers.
pub trait RasterSampler {
    /// Values of `layer` at each point, aligned with `points`. `None` marks
    /// NoData cells. A layer that is not served yields
    /// `FetchError::LayerUnavailable`.
    fn sample(&self, layer: &str, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, FetchError>;
}

/// One day of meteorological forcing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyForcing {
    pub date: NaiveDate,
    pub prcp_mm: f64,
    pub tmax_c: f64,
    pub tmin_c: f64,
}

impl DailyForcing {
    pub fn tmean_c(&self) -> f64 {
        (self.tmax_c + self.tmin_c) / 2.0
    }
}

/// Gridded daily climate series.
pub trait ClimateSource {
    /// Basin-average daily forcing over `range`, averaged across `points`.
    fn daily_forcing(&self, points: &[Coord<f64>], range: DateRange) -> Result<Vec<DailyForcing>, FetchError>;
}

/// Satellite vegetation-index products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VegetationProduct {
    /// MODIS MOD15A2H 8-day leaf area index, 500 m.
    LeafAreaIndex,
    /// MODIS MOD13Q1 16-day NDVI, 250 m.
    Ndvi,
}

impl VegetationProduct {
    pub fn product(&self) -> &'static str {
        match self {
            VegetationProduct::LeafAreaIndex => "MOD15A2H",
            VegetationProduct::Ndvi => "MOD13Q1",
        }
    }

    pub fn band(&self) -> &'static str {
        match self {
            VegetationProduct::LeafAreaIndex => "Lai_500m",
            VegetationProduct::Ndvi => "250m_16_days_NDVI",
        }
    }
}

pub trait VegetationIndexSource {
    /// Raw (unscaled) pixel values of every composite in `year` whose pixel
    /// centre lies inside the basin.
    fn pixel_values(
        &self,
        product: VegetationProduct,
        basin: &BasinGeometry,
        year: i32,
    ) -> Result<Vec<f64>, FetchError>;
}

/// One daily-mean discharge value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyFlow {
    pub date: NaiveDate,
    pub discharge_cfs: f64,
}

/// Observed streamflow records.
pub trait StreamflowSource {
    fn daily_discharge(&self, gauge_id: &str, range: DateRange) -> Result<Vec<DailyFlow>, FetchError>;
}
