/// Gauge registry for the CAMELS attribute extractor.
///
/// Holds the USGS site-number format check used before any request is
/// made, and the regional sample gauges run by `camels-extract --samples`.
/// Station names and coordinates are never hardcoded beyond a short label:
/// the NWIS site service is the source of truth for gauge metadata.

use crate::model::ResolutionError;

/// Shortest and longest USGS site numbers; stream gauges use 8 digits,
/// groundwater and some newer sites up to 15.
pub const MIN_SITE_DIGITS: usize = 8;
pub const MAX_SITE_DIGITS: usize = 15;

// ---------------------------------------------------------------------------
// Site number format
// ---------------------------------------------------------------------------

/// Checks that `gauge_id` looks like a USGS site number. Surrounding
/// whitespace is rejected rather than trimmed.
pub fn validate_gauge_id(gauge_id: &str) -> Result<(), ResolutionError> {
    let len_ok = (MIN_SITE_DIGITS..=MAX_SITE_DIGITS).contains(&gauge_id.len());
    if len_ok && gauge_id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ResolutionError::InvalidGaugeId(gauge_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Sample gauges
// ---------------------------------------------------------------------------

/// A gauge from the regional demonstration set.
pub struct SampleGauge {
    /// 8-digit USGS site code.
    pub site_code: &'static str,
    /// Short river and state label.
    pub label: &'static str,
    /// Broad CONUS region the gauge represents.
    pub region: &'static str,
}

/// One gauge per broad CONUS climate region, spanning humid, snowy, semi-arid
/// and Mediterranean regimes.
pub static SAMPLE_GAUGES: &[SampleGauge] = &[
    SampleGauge { site_code: "01031500", label: "Piscataquis River, ME", region: "Northeastern" },
    SampleGauge { site_code: "02177000", label: "Edisto River, SC", region: "Southeastern" },
    SampleGauge { site_code: "06803530", label: "Salt Creek, NE", region: "Midwestern" },
    SampleGauge { site_code: "08324000", label: "Jemez River, NM", region: "Southwestern" },
    SampleGauge { site_code: "11266500", label: "Merced River, CA", region: "Western" },
];

/// Site codes of the sample gauges in registry order.
pub fn sample_site_codes() -> Vec<&'static str> {
    SAMPLE_GAUGES.iter().map(|g| g.site_code).collect()
}

/// Looks up a sample gauge by site code. Returns `None` if not found.
pub fn find_sample(site_code: &str) -> Option<&'static SampleGauge> {
    SAMPLE_GAUGES.iter().find(|g| g.site_code == site_code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
