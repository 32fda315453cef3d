/// NLDI (Network-Linked Data Index) client
///
/// Resolves a USGS gauge to the drainage basin upstream of it. Station
/// metadata is read from the NWIS site service, since NLDI features carry
/// no HUC code.
///
/// API Documentation: https://waterdata.usgs.gov/blog/nldi-intro/

use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};
use geojson::GeoJson;
use reqwest::blocking::Client;

use crate::ingest::get_checked;
use crate::ingest::usgs::NwisClient;
use crate::model::{FetchError, GaugeIdentity, ResolutionError};
use crate::sources::WatershedService;

/// Basin boundary URL for a USGS gauge.
pub fn build_basin_url(base_url: &str, site_code: &str) -> String {
    format!(
        "{}/nwissite/USGS-{}/basin?simplified=false&splitCatchment=false",
        base_url.trim_end_matches('/'),
        site_code,
    )
}

/// Unions every polygon of a GeoJSON document into one multipolygon.
pub fn parse_basin_geojson(body: &str, gauge_id: &str) -> Result<MultiPolygon<f64>, ResolutionError> {
    let document: GeoJson = body
        .parse()
        .map_err(|e: geojson::Error| FetchError::Parse(e.to_string()))?;

    let geometries: Vec<geojson::Geometry> = match document {
        GeoJson::FeatureCollection(collection) => {
            collection.features.into_iter().filter_map(|f| f.geometry).collect()
        }
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry],
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        let converted = Geometry::<f64>::try_from(geometry.value)
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        match converted {
            Geometry::Polygon(polygon) => polygons.push(polygon),
            Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
            // outlet points and flowlines are not part of the boundary
            _ => {}
        }
    }

    if polygons.is_empty() {
        return Err(ResolutionError::NoBasinGeometry(gauge_id.to_string()));
    }
    Ok(union_all(polygons))
}

/// Overlapping parts count once.
fn union_all(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut parts = polygons.into_iter();
    let first = MultiPolygon(parts.next().into_iter().collect());
    parts.fold(first, |acc, polygon| acc.union(&MultiPolygon(vec![polygon])))
}

/// NLDI basins + NWIS site metadata.
#[derive(Debug, Clone)]
pub struct NldiClient {
    client: Client,
    nldi_url: String,
    nwis: NwisClient,
}

impl NldiClient {
    pub fn new(client: Client, nldi_url: impl Into<String>, nwis_url: impl Into<String>) -> Self {
        Self {
            nwis: NwisClient::new(client.clone(), nwis_url),
            client,
            nldi_url: nldi_url.into(),
        }
    }
}

impl WatershedService for NldiClient {
    fn site_metadata(&self, gauge_id: &str) -> Result<GaugeIdentity, ResolutionError> {
        self.nwis.fetch_site(gauge_id)
    }

    fn basin_boundary(&self, gauge_id: &str) -> Result<MultiPolygon<f64>, ResolutionError> {
        let url = build_basin_url(&self.nldi_url, gauge_id);
        let body = match get_checked(&self.client, &url, "application/json") {
            Ok(response) => response.text().map_err(FetchError::from)?,
            Err(FetchError::Http { status: 404, .. }) => {
                return Err(ResolutionError::UnknownGauge(gauge_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        parse_basin_geojson(&body, gauge_id)
    }
}
