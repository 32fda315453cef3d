/// Topographic attributes from the 3DEP elevation service
///
/// Elevation is sampled on the basin lattice; slope comes from finite
/// differences between neighbouring lattice cells. There is no fallback:
/// any failure leaves the topographic attributes out of the record.

use crate::attributes::{AttributeFetcher, stats};
use crate::geometry::SampleGrid;
use crate::logging::{self, DataSource};
use crate::model::{AttributeError, AttributeRecord, ComputeError, FetchContext};
use crate::sources::RasterSampler;

pub const ELEVATION_LAYER: &str = "elevation";

pub struct TopographyFetcher<S> {
    sampler: S,
    sample_points: usize,
}

impl<S: RasterSampler> TopographyFetcher<S> {
    pub fn new(sampler: S, sample_points: usize) -> Self {
        Self { sampler, sample_points }
    }
}

impl<S: RasterSampler> AttributeFetcher for TopographyFetcher<S> {
    fn name(&self) -> &'static str {
        "topography"
    }

    fn source(&self) -> DataSource {
        DataSource::Elevation
    }

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError> {
        let grid = SampleGrid::over(ctx.basin, self.sample_points);
        let samples = self.sampler.sample(ELEVATION_LAYER, grid.points())?;
        let valid: Vec<f64> = samples.iter().flatten().copied().filter(|v| v.is_finite()).collect();

        let (Some(elev_mean), Some(elev_min), Some(elev_max)) =
            (stats::mean(&valid), stats::min(&valid), stats::max(&valid))
        else {
            return Err(ComputeError::EmptyInput(ELEVATION_LAYER).into());
        };

        logging::debug(
            DataSource::Elevation,
            Some(&ctx.gauge.gauge_id),
            &format!("{} of {} lattice points returned elevation", valid.len(), grid.len()),
        );

        let mut record = AttributeRecord::new();
        record.insert_measured("elev_mean", elev_mean)?;
        record.insert_measured("elev_min", elev_min)?;
        record.insert_measured("elev_max", elev_max)?;
        match grid.slope_mean(&samples) {
            Some(slope) => record.insert_measured("slope_mean", slope)?,
            // a single lattice cell carries no gradient
            None => record.insert_imputed("slope_mean", 0.0)?,
        }
        record.insert_measured("area_gages2", ctx.basin.area_km2())?;
        Ok(record)
    }
}
