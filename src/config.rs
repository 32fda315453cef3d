//! Extractor configuration.
//!
//! Loaded from a TOML file (path given on the command line or through
//! `CAMELS_CONFIG`, optionally set in a `.env` file). Every field has a
//! default so an empty file, or no file at all, is a valid configuration.
//!
//! ```toml
//! [extraction]
//! climate_start = "2000-01-01"
//! climate_end = "2020-12-31"
//! sample_points = 400
//!
//! [layers.land_cover]
//! url = "https://example.org/arcgis/rest/services/NLCD_2021/ImageServer"
//!
//! [layers.ksat_5]
//! url = "https://example.org/arcgis/rest/services/POLARIS_ksat_0_5/ImageServer"
//! scale = 1.0
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DateRange, DateRangeError};

pub const CONFIG_ENV_VAR: &str = "CAMELS_CONFIG";
pub const TIMEOUT_ENV_VAR: &str = "CAMELS_HTTP_TIMEOUT";

const THREEDEP_IMAGE_SERVER: &str =
    "https://elevation.nationalmap.gov/arcgis/rest/services/3DEPElevation/ImageServer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid date range in config: {0}")]
    InvalidDate(#[from] DateRangeError),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Configuration sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub http: HttpConfig,
    pub services: ServiceConfig,
    pub logging: LoggingConfig,
    /// Raster layers served through ArcGIS ImageServer endpoints, keyed by
    /// layer name (`elevation`, `land_cover`, `sand_5`, ...). A file entry
    /// with a built-in name overrides it.
    pub layers: BTreeMap<String, LayerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            http: HttpConfig::default(),
            services: ServiceConfig::default(),
            logging: LoggingConfig::default(),
            layers: default_layers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub climate_start: String,
    pub climate_end: String,
    pub hydro_start: String,
    pub hydro_end: String,
    /// Target number of lattice points sampled inside each basin.
    pub sample_points: usize,
    /// Number of Daymet pixels averaged for the basin climate series.
    pub climate_points: usize,
    /// Calendar year of MODIS composites used for LAI and GVF.
    pub vegetation_year: i32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            climate_start: "2000-01-01".to_string(),
            climate_end: "2020-12-31".to_string(),
            hydro_start: "2000-01-01".to_string(),
            hydro_end: "2020-12-31".to_string(),
            sample_points: 400,
            climate_points: 1,
            vegetation_year: 2020,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            user_agent: format!("camels_attrs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub nldi_url: String,
    pub nwis_url: String,
    pub daymet_url: String,
    pub modis_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nldi_url: "https://api.water.usgs.gov/nldi/linked-data".to_string(),
            nwis_url: "https://waterservices.usgs.gov/nwis".to_string(),
            daymet_url: "https://daymet.ornl.gov/single-pixel/api/data".to_string(),
            modis_url: "https://modis.ornl.gov/rst/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: "debug", "info", "warn" or "error".
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None, timestamps: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// ImageServer root, without the trailing `/getSamples`.
    pub url: String,
    /// Multiplier applied to every sampled value.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

fn default_layers() -> BTreeMap<String, LayerConfig> {
    let mut layers = BTreeMap::new();
    layers.insert(
        "elevation".to_string(),
        LayerConfig { url: THREEDEP_IMAGE_SERVER.to_string(), scale: 1.0 },
    );
    layers
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text)?;
        // configured layers extend the built-in table
        for (name, layer) in default_layers() {
            config.layers.entry(name).or_insert(layer);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    /// Loads `.env`, then the file named by `CAMELS_CONFIG` (or the
    /// built-in defaults), then applies environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let mut config = match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `CAMELS_HTTP_TIMEOUT` on top of whichever file was loaded.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(TIMEOUT_ENV_VAR) {
            self.http.timeout_secs = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: TIMEOUT_ENV_VAR, value: raw.clone() })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.climate_range()?;
        self.hydro_range()?;
        if self.extraction.sample_points == 0 {
            return Err(ConfigError::InvalidValue { key: "extraction.sample_points", value: "0".into() });
        }
        if self.extraction.climate_points == 0 {
            return Err(ConfigError::InvalidValue { key: "extraction.climate_points", value: "0".into() });
        }
        for (name, layer) in &self.layers {
            if layer.url.trim().is_empty() {
                return Err(ConfigError::InvalidValue { key: "layers.url", value: name.clone() });
            }
        }
        Ok(())
    }

    pub fn climate_range(&self) -> Result<DateRange, ConfigError> {
        Ok(DateRange::parse(&self.extraction.climate_start, &self.extraction.climate_end)?)
    }

    pub fn hydro_range(&self) -> Result<DateRange, ConfigError> {
        Ok(DateRange::parse(&self.extraction.hydro_start, &self.extraction.hydro_end)?)
    }

    /// Blocking HTTP client shared by every remote source.
    pub fn http_client(&self) -> Result<reqwest::blocking::Client, ConfigError> {
        Ok(reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .user_agent(self.http.user_agent.clone())
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout_env(value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key| (key == TIMEOUT_ENV_VAR).then(|| value.to_string())
    }

    #[test]
    fn test_timeout_override_applies_to_loaded_file() {
        let mut config = Config::from_toml_str("[http]\ntimeout_secs = 30\n").unwrap();
        config.apply_overrides(timeout_env(" 5 ")).unwrap();
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn test_absent_override_keeps_file_value() {
        let mut config = Config::from_toml_str("[http]\ntimeout_secs = 30\n").unwrap();
        config.apply_overrides(|_| None).unwrap();
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_timeout_override_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_overrides(timeout_env("soon")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: TIMEOUT_ENV_VAR, .. }));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.extraction.climate_start, "2000-01-01");
        assert_eq!(config.extraction.sample_points, 400);
        assert_eq!(config.http.timeout_secs, 120);
        assert!(config.layers.contains_key("elevation"));
        assert_eq!(config.climate_range().unwrap().num_days(), 7671);
    }

    #[test]
    fn test_layers_parse_with_default_scale() {
        let config = Config::from_toml_str(
            r#"
            [extraction]
            hydro_start = "2010-10-01"
            hydro_end = "2015-09-30"

            [layers.land_cover]
            url = "https://example.org/nlcd/ImageServer"

            [layers.glhymps_permeability]
            url = "https://example.org/glhymps/ImageServer"
            scale = 0.01
            "#,
        )
        .unwrap();

        assert_eq!(config.layers["land_cover"].scale, 1.0);
        assert_eq!(config.layers["glhymps_permeability"].scale, 0.01);
        assert_eq!(config.hydro_range().unwrap().start.to_string(), "2010-10-01");
        assert!(config.layers.contains_key("elevation"));
    }

    #[test]
    fn test_reversed_dates_are_rejected() {
        let err = Config::from_toml_str(
            r#"
            [extraction]
            climate_start = "2020-01-01"
            climate_end = "2010-01-01"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate(_)));
    }

    #[test]
    fn test_zero_sample_points_is_rejected() {
        let err = Config::from_toml_str("[extraction]\nsample_points = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "extraction.sample_points", .. }));
    }
}
