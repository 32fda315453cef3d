//! Boundary resolution: gauge id to station identity and basin geometry.

use crate::geometry::BasinGeometry;
use crate::logging::{self, DataSource};
use crate::model::{GaugeIdentity, ResolutionError};
use crate::sources::WatershedService;
use crate::stations::validate_gauge_id;

pub struct BoundaryResolver<W> {
    service: W,
}

impl<W: WatershedService> BoundaryResolver<W> {
    pub fn new(service: W) -> Self {
        Self { service }
    }

    /// Resolve a gauge to its identity and drainage basin.
    ///
    /// The id is validated before any request is made.
    pub fn resolve(&self, gauge_id: &str) -> Result<(GaugeIdentity, BasinGeometry), ResolutionError> {
        validate_gauge_id(gauge_id)?;

        let identity = self.service.site_metadata(gauge_id)?;
        let boundary = self.service.basin_boundary(gauge_id)?;
        let basin = BasinGeometry::new(boundary).map_err(|e| ResolutionError::InvalidGeometry {
            gauge_id: gauge_id.to_string(),
            reason: e.to_string(),
        })?;

        logging::info(
            DataSource::Nldi,
            Some(gauge_id),
            &format!("{} - basin area {:.1} km²", identity.name, basin.area_km2()),
        );
        Ok((identity, basin))
    }
}
