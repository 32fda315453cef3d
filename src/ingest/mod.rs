/// HTTP clients for the remote services behind the attribute fetchers.
///
/// Submodules:
/// - `usgs`        : NWIS site service (RDB) and daily values (JSON)
/// - `nldi`        : NLDI basin boundaries (GeoJSON)
/// - `daymet`      : Daymet single-pixel daily forcing (CSV)
/// - `image_server`: ArcGIS ImageServer `getSamples` raster sampling
/// - `modis`       : ORNL DAAC MODIS subsets

pub mod daymet;
pub mod image_server;
pub mod modis;
pub mod nldi;
pub mod usgs;

#[cfg(test)]
pub mod fixtures;

use reqwest::blocking::{Client, Response};

use crate::model::FetchError;

/// GET `url`, mapping transport failures and non-2xx statuses to
/// `FetchError`.
pub(crate) fn get_checked(client: &Client, url: &str, accept: &str) -> Result<Response, FetchError> {
    let response = client.get(url).header("Accept", accept).send()?;
    check_status(response, url)
}

pub(crate) fn check_status(response: Response, url: &str) -> Result<Response, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http { status: status.as_u16(), url: url.to_string() });
    }
    Ok(response)
}
