/// Daymet single-pixel API client
///
/// Retrieves daily precipitation and temperature extremes from ORNL
/// DAAC's Daymet V4 single-pixel extraction service. Daymet years always
/// have 365 days: in leap years December 31 is omitted.
///
/// API Documentation: https://daymet.ornl.gov/single-pixel/

use std::collections::BTreeMap;

use chrono::NaiveDate;
use geo::Coord;
use reqwest::blocking::Client;

use crate::ingest::get_checked;
use crate::model::{DateRange, FetchError};
use crate::sources::{ClimateSource, DailyForcing};

const DAYMET_VARIABLES: &str = "prcp,tmax,tmin";

/// Daily forcing for a single pixel.
pub fn build_url(base_url: &str, lat: f64, lon: f64, range: DateRange) -> String {
    format!(
        "{}?lat={:.5}&lon={:.5}&vars={}&start={}&end={}",
        base_url.trim_end_matches('/'),
        lat,
        lon,
        DAYMET_VARIABLES,
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d"),
    )
}

/// Parse Daymet CSV output.
///
/// The body starts with free-form metadata lines ("Latitude: ...") followed
/// by a header line beginning with `year,yday`.
pub fn parse_csv(body: &str) -> Result<Vec<DailyForcing>, FetchError> {
    let table_start = body
        .match_indices("year,yday")
        .map(|(i, _)| i)
        .find(|&i| i == 0 || body[..i].ends_with('\n'))
        .ok_or_else(|| FetchError::Parse("Daymet header line not found".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body[table_start..].as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FetchError::Parse(format!("Daymet header: {}", e)))?
        .clone();
    let column = |prefix: &str| {
        headers
            .iter()
            .position(|h| h.starts_with(prefix))
            .ok_or_else(|| FetchError::Parse(format!("Daymet column '{}' missing", prefix)))
    };
    let (i_prcp, i_tmax, i_tmin) = (column("prcp")?, column("tmax")?, column("tmin")?);

    let mut series = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| FetchError::Parse(format!("Daymet row: {}", e)))?;
        if row.len() < headers.len() {
            continue; // Skip incomplete rows
        }

        let parse_field = |i: usize| -> Result<f64, FetchError> {
            row[i]
                .parse()
                .map_err(|_| FetchError::Parse(format!("invalid Daymet value '{}'", &row[i])))
        };
        let year: i32 = row[0]
            .parse()
            .map_err(|_| FetchError::Parse(format!("invalid Daymet year '{}'", &row[0])))?;
        let yday = parse_field(1)?;
        let date = NaiveDate::from_yo_opt(year, yday as u32)
            .ok_or_else(|| FetchError::Parse(format!("invalid day {} of {}", yday, year)))?;

        series.push(DailyForcing {
            date,
            prcp_mm: parse_field(i_prcp)?,
            tmax_c: parse_field(i_tmax)?,
            tmin_c: parse_field(i_tmin)?,
        });
    }

    if series.is_empty() {
        return Err(FetchError::NoData("Daymet returned no daily rows".to_string()));
    }
    Ok(series)
}

/// Day-by-day mean of several pixel series; days missing from some pixels
/// average over the pixels that have them.
pub fn average_series(series: &[Vec<DailyForcing>]) -> Vec<DailyForcing> {
    let mut sums: BTreeMap<NaiveDate, (f64, f64, f64, usize)> = BTreeMap::new();
    for day in series.iter().flatten() {
        let entry = sums.entry(day.date).or_insert((0.0, 0.0, 0.0, 0));
        entry.0 += day.prcp_mm;
        entry.1 += day.tmax_c;
        entry.2 += day.tmin_c;
        entry.3 += 1;
    }
    sums.into_iter()
        .map(|(date, (p, tx, tn, n))| {
            let n = n as f64;
            DailyForcing { date, prcp_mm: p / n, tmax_c: tx / n, tmin_c: tn / n }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DaymetClient {
    client: Client,
    base_url: String,
}

impl DaymetClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn fetch_pixel(&self, point: Coord<f64>, range: DateRange) -> Result<Vec<DailyForcing>, FetchError> {
        let url = build_url(&self.base_url, point.y, point.x, range);
        let body = get_checked(&self.client, &url, "text/csv")?.text()?;
        parse_csv(&body)
    }
}

impl ClimateSource for DaymetClient {
    fn daily_forcing(&self, points: &[Coord<f64>], range: DateRange) -> Result<Vec<DailyForcing>, FetchError> {
        let series = points
            .iter()
            .map(|p| self.fetch_pixel(*p, range))
            .collect::<Result<Vec<_>, _>>()?;
        let averaged = average_series(&series);
        if averaged.is_empty() {
            return Err(FetchError::NoData("no Daymet pixels requested".to_string()));
        }
        Ok(averaged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures;

    #[test]
    fn test_build_url_rounds_coordinates() {
        let range = DateRange::parse("2000-01-01", "2000-12-31").unwrap();
        let url = build_url("https://daymet.ornl.gov/single-pixel/api/data", 45.175, -69.3147222, range);
        assert_eq!(
            url,
            "https://daymet.ornl.gov/single-pixel/api/data?lat=45.17500&lon=-69.31472&vars=prcp,tmax,tmin&start=2000-01-01&end=2000-12-31"
        );
    }

    #[test]
    fn test_parse_csv_skips_metadata_lines() {
        let series = parse_csv(fixtures::DAYMET_CSV).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].date.to_string(), "2000-01-01");
        assert_eq!(series[0].prcp_mm, 0.0);
        assert_eq!(series[1].prcp_mm, 12.5);
        assert_eq!(series[3].tmin_c, -15.5);
        assert_eq!(series[3].date.to_string(), "2000-12-30");
    }

    #[test]
    fn test_parse_csv_without_header_is_parse_error() {
        assert!(matches!(parse_csv("Latitude: 45.1\n"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_average_series_by_date() {
        let d = NaiveDate::from_ymd_opt(2001, 5, 1).unwrap();
        let a = vec![DailyForcing { date: d, prcp_mm: 2.0, tmax_c: 20.0, tmin_c: 10.0 }];
        let b = vec![DailyForcing { date: d, prcp_mm: 4.0, tmax_c: 22.0, tmin_c: 8.0 }];
        let avg = average_series(&[a, b]);
        assert_eq!(avg.len(), 1);
        assert_eq!(avg[0].prcp_mm, 3.0);
        assert_eq!(avg[0].tmax_c, 21.0);
        assert_eq!(avg[0].tmin_c, 9.0);
    }
}
