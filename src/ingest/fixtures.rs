//! Canned service responses, trimmed from real payloads, for parser tests.

/// NWIS daily values for 01031500, four days, one sentinel.
pub const NWIS_DV_JSON: &str = r#"{
  "name": "ns1:timeSeriesResponseType",
  "value": {
    "queryInfo": {
      "queryURL": "http://waterservices.usgs.gov/nwis/dv/format=json&sites=01031500&parameterCd=00060&statCd=00003"
    },
    "timeSeries": [
      {
        "sourceInfo": {
          "siteName": "PISCATAQUIS RIVER NEAR DOVER-FOXCROFT, ME",
          "siteCode": [{"value": "01031500", "network": "NWIS", "agencyCode": "USGS"}]
        },
        "variable": {
          "variableCode": [{"value": "00060", "network": "NWIS"}],
          "noDataValue": -999999.0
        },
        "values": [
          {
            "value": [
              {"value": "1230", "qualifiers": ["A"], "dateTime": "2000-01-01T00:00:00.000"},
              {"value": "1180", "qualifiers": ["A"], "dateTime": "2000-01-02T00:00:00.000"},
              {"value": "-999999", "qualifiers": ["A", "Ice"], "dateTime": "2000-01-03T00:00:00.000"},
              {"value": "1105", "qualifiers": ["A"], "dateTime": "2000-01-04T00:00:00.000"}
            ]
          }
        ],
        "name": "USGS:01031500:00060:00003"
      }
    ]
  }
}"#;

/// NWIS expanded site description (RDB) for 01031500, columns trimmed.
pub const NWIS_SITE_RDB: &str = "#\n\
# US Geological Survey\n\
# retrieved: 2024-03-01 10:00:00 -05:00\n\
#\n\
# File-format description:  http://help.waterdata.usgs.gov/faq/about-tab-delimited-output\n\
#\n\
agency_cd\tsite_no\tstation_nm\tsite_tp_cd\tdec_lat_va\tdec_long_va\tcoord_datum_cd\thuc_cd\tdrain_area_va\n\
5s\t15s\t50s\t7s\t16s\t16s\t10s\t16s\t8s\n\
USGS\t01031500\tPISCATAQUIS RIVER NEAR DOVER-FOXCROFT, ME\tST\t45.17500000\t-69.3147222\tNAD83\t01020004\t298\n";

/// NLDI basin for a small square watershed.
pub const NLDI_BASIN_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {},
      "geometry": {
        "type": "Polygon",
        "coordinates": [[
          [-69.5, 45.0], [-69.0, 45.0], [-69.0, 45.5], [-69.5, 45.5], [-69.5, 45.0]
        ]]
      }
    }
  ]
}"#;

/// Daymet single-pixel CSV: metadata preamble followed by four days.
pub const DAYMET_CSV: &str = "Latitude: 45.175  Longitude: -69.3147\n\
X & Y on Lambert Conformal Conic: 2024520.6 924624.41\n\
Tile: 12118\n\
Elevation: 120 meters\n\
All years; all variables; Daymet Software Version 4.0; Daymet Data Version 4.0.\n\
How to cite: Thornton et al. Daymet: Daily Surface Weather Data on a 1-km Grid for North America, Version 4 R1.\n\
\n\
year,yday,prcp (mm/day),tmax (deg c),tmin (deg c)\n\
2000,1,0.0,-2.5,-12.0\n\
2000,2,12.5,1.0,-6.5\n\
2000,3,3.2,-4.0,-14.0\n\
2000,365,0.0,-6.0,-15.5\n";

/// getSamples response: location 1 is NoData, location 2 is multiband and
/// location 3 was not returned.
pub const IMAGE_SERVER_SAMPLES_JSON: &str = r#"{
  "samples": [
    {"location": {"x": -69.3, "y": 45.2, "spatialReference": {"wkid": 4326}}, "locationId": 0, "value": "342.5", "rasterId": 1, "resolution": 10},
    {"location": {"x": -69.2, "y": 45.2, "spatialReference": {"wkid": 4326}}, "locationId": 1, "value": "NoData", "rasterId": 1, "resolution": 10},
    {"location": {"x": -69.1, "y": 45.2, "spatialReference": {"wkid": 4326}}, "locationId": 2, "value": "298 17", "rasterId": 1, "resolution": 10}
  ]
}"#;

pub const MODIS_DATES_JSON: &str = r#"{
  "dates": [
    {"modis_date": "A2019361", "calendar_date": "2019-12-27"},
    {"modis_date": "A2020001", "calendar_date": "2020-01-01"},
    {"modis_date": "A2020009", "calendar_date": "2020-01-09"},
    {"modis_date": "A2021001", "calendar_date": "2021-01-01"}
  ]
}"#;

/// 3x4 subset centred on (-69.25, 45.25) with 15 km cells. Against the
/// square basin (-69.5..-69.0, 45.0..45.5) the pixels holding 99 fall
/// outside.
pub const MODIS_SUBSET_JSON: &str = r#"{
  "xllcorner": "-5443594.56",
  "yllcorner": 5009076.10,
  "cellsize": 15000.0,
  "nrows": 3,
  "ncols": 4,
  "band": "Lai_500m",
  "units": "m^2/m^2",
  "scale": "0.1",
  "latitude": 45.25,
  "longitude": -69.25,
  "header": "https://modis.ornl.gov/rst/api/v1/MOD15A2H/subset",
  "subset": [
    {
      "modis_date": "A2020001",
      "calendar_date": "2020-01-01",
      "band": "Lai_500m",
      "tile": "h12v04",
      "proc_date": "2020010000000",
      "data": [99, 1, 2, 3, 4, 5, 6, 99, 7, 8, 99, 99]
    }
  ]
}"#;
