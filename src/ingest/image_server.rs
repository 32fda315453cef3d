/// ArcGIS ImageServer raster sampling
///
/// Samples raster layers at basin lattice points through the `getSamples`
/// operation. Each named layer maps to one ImageServer root and a scale
/// factor in the configuration; the 3DEP elevation service is configured by
/// default, soil, land-cover and geology layers are supplied by the user.
///
/// API Documentation: https://developers.arcgis.com/rest/services-reference/enterprise/get-samples/

use std::collections::BTreeMap;

use geo::Coord;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::LayerConfig;
use crate::ingest::check_status;
use crate::model::FetchError;
use crate::sources::RasterSampler;

/// Points per `getSamples` request; keeps form bodies well under server limits.
pub const POINTS_PER_REQUEST: usize = 500;

#[derive(Debug, Deserialize)]
struct SamplesResponse {
    #[serde(default)]
    samples: Vec<Sample>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    #[serde(rename = "locationId")]
    location_id: usize,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<i64>,
    message: String,
}

/// Form parameters of a multipoint `getSamples` request in WGS84.
pub fn build_samples_form(points: &[Coord<f64>]) -> Vec<(&'static str, String)> {
    let coords: Vec<String> = points.iter().map(|p| format!("[{},{}]", p.x, p.y)).collect();
    let geometry = format!(r#"{{"points":[{}],"spatialReference":{{"wkid":4326}}}}"#, coords.join(","));
    vec![
        ("geometry", geometry),
        ("geometryType", "esriGeometryMultipoint".to_string()),
        ("returnFirstValueOnly", "true".to_string()),
        ("interpolation", "RSP_NearestNeighbor".to_string()),
        ("outFields", String::new()),
        ("f", "json".to_string()),
    ]
}

/// Parse a `getSamples` response into values aligned with the `n_points`
/// requested locations, multiplied by `scale`.
pub fn parse_samples(body: &str, n_points: usize, scale: f64) -> Result<Vec<Option<f64>>, FetchError> {
    let response: SamplesResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    if let Some(err) = response.error {
        return Err(FetchError::Request(format!(
            "ImageServer error {}: {}",
            err.code.unwrap_or_default(),
            err.message
        )));
    }

    let mut values = vec![None; n_points];
    for sample in response.samples {
        let Some(slot) = values.get_mut(sample.location_id) else { continue };
        // multiband rasters report "v1 v2 ..."; NoData cells report "NoData"
        *slot = sample
            .value
            .as_deref()
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v * scale);
    }
    Ok(values)
}

#[derive(Debug, Clone)]
pub struct ImageServerSampler {
    client: Client,
    layers: BTreeMap<String, LayerConfig>,
}

impl ImageServerSampler {
    pub fn new(client: Client, layers: BTreeMap<String, LayerConfig>) -> Self {
        Self { client, layers }
    }

    fn sample_chunk(&self, layer: &LayerConfig, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, FetchError> {
        let url = format!("{}/getSamples", layer.url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .form(&build_samples_form(points))
            .send()?;
        let body = check_status(response, &url)?.text()?;
        parse_samples(&body, points.len(), layer.scale)
    }
}

impl RasterSampler for ImageServerSampler {
    fn sample(&self, layer: &str, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, FetchError> {
        let config = self
            .layers
            .get(layer)
            .ok_or_else(|| FetchError::LayerUnavailable(layer.to_string()))?;

        let mut values = Vec::with_capacity(points.len());
        for chunk in points.chunks(POINTS_PER_REQUEST) {
            values.extend(self.sample_chunk(config, chunk)?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures;

    #[test]
    fn test_samples_form_encodes_multipoint() {
        let form = build_samples_form(&[Coord { x: -69.3, y: 45.2 }, Coord { x: -69.4, y: 45.1 }]);
        let geometry = &form.iter().find(|(k, _)| *k == "geometry").unwrap().1;
        assert_eq!(
            geometry,
            r#"{"points":[[-69.3,45.2],[-69.4,45.1]],"spatialReference":{"wkid":4326}}"#
        );
        assert!(form.contains(&("f", "json".to_string())));
    }

    #[test]
    fn test_parse_samples_aligns_by_location_id() {
        let values = parse_samples(fixtures::IMAGE_SERVER_SAMPLES_JSON, 4, 1.0).unwrap();
        assert_eq!(values, vec![Some(342.5), None, Some(298.0), None]);
    }

    #[test]
    fn test_parse_samples_applies_scale() {
        let values = parse_samples(fixtures::IMAGE_SERVER_SAMPLES_JSON, 3, 0.01).unwrap();
        assert!((values[0].unwrap() - 3.425).abs() < 1e-12);
    }

    #[test]
    fn test_parse_samples_surfaces_service_error() {
        let body = r#"{"error":{"code":400,"message":"Unable to complete operation.","details":[]}}"#;
        assert!(matches!(parse_samples(body, 1, 1.0), Err(FetchError::Request(_))));
    }

    #[test]
    fn test_unconfigured_layer_is_unavailable() {
        let sampler = ImageServerSampler::new(Client::new(), BTreeMap::new());
        let err = sampler.sample("ksat_5", &[Coord { x: 0.0, y: 0.0 }]).unwrap_err();
        assert_eq!(err, FetchError::LayerUnavailable("ksat_5".to_string()));
    }
}
