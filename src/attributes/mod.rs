/// Attribute fetchers
///
/// Each fetcher reads one family of remote datasets and reduces it over the
/// basin to a flat set of CAMELS descriptors:
/// - `topography`: elevation statistics, slope, area
/// - `climate`   : precipitation/temperature indices and signatures
/// - `soil`      : pedotransfer properties, texture, conductivity
/// - `vegetation`: LAI, green vegetation fraction, land cover, root depth
/// - `geology`   : dominant lithology, subsurface porosity/permeability
/// - `hydrology` : streamflow signatures
///
/// Fetchers never share mutable state; they all read the same
/// `FetchContext`.

pub mod climate;
pub mod geology;
pub mod hydrology;
pub mod soil;
pub mod stats;
pub mod topography;
pub mod vegetation;

use geo::Coord;

use crate::logging::DataSource;
use crate::model::{AttributeError, AttributeRecord, ComputeError, FetchContext};
use crate::sources::RasterSampler;

/// One extraction stage.
pub trait AttributeFetcher {
    /// Stage label used in logs and stage reports.
    fn name(&self) -> &'static str;

    fn source(&self) -> DataSource;

    fn fetch(&self, ctx: &FetchContext<'_>) -> Result<AttributeRecord, AttributeError>;
}

/// Valid (non-NoData, finite) samples of `layer` at `points`.
pub(crate) fn sample_valid<S: RasterSampler + ?Sized>(
    sampler: &S,
    layer: &'static str,
    points: &[Coord<f64>],
) -> Result<Vec<f64>, AttributeError> {
    let values: Vec<f64> = sampler
        .sample(layer, points)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(ComputeError::EmptyInput(layer).into());
    }
    Ok(values)
}

/// Basin mean of `layer`.
pub(crate) fn basin_mean<S: RasterSampler + ?Sized>(
    sampler: &S,
    layer: &'static str,
    points: &[Coord<f64>],
) -> Result<f64, AttributeError> {
    let values = sample_valid(sampler, layer, points)?;
    stats::mean(&values).ok_or_else(|| ComputeError::EmptyInput(layer).into())
}
