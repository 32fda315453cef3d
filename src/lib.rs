//! CAMELS catchment attribute extraction
//!
//! Given a USGS gauge id, delineates the upstream drainage basin and
//! derives the CAMELS descriptor set (topography, climate, soil,
//! vegetation, geology, streamflow signatures) from public web services.
//!
//! Module layout:
//! - `model`     : identities, attribute records, date ranges, error tiers
//! - `geometry`  : basin polygon, equal-area projection, sample lattice
//! - `sources`   : traits for the remote collaborators
//! - `ingest`    : HTTP clients for NLDI, NWIS, Daymet, MODIS, ImageServer
//! - `attributes`: one fetcher per descriptor family
//! - `watershed` : gauge id to identity and basin
//! - `extractor` : per-gauge pipeline and batch driver
//! - `export`    : CSV/JSON attribute tables
//! - `stations`  : site-number validation and sample gauges
//! - `config`    : TOML/env configuration
//! - `logging`   : source-tagged structured logging

pub mod attributes;
pub mod config;
pub mod export;
pub mod extractor;
pub mod geometry;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod sources;
pub mod stations;
pub mod watershed;
