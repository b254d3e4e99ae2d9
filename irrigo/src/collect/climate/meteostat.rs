//! Meteostat daily point data, served through RapidAPI.

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::ClimateGateway;
use crate::collect::http::{build_client, check_status, send_error};
use crate::commons::date_range::DateRange;
use crate::config::{HttpConfig, MeteostatConfig};
use crate::error::{IrrigoError, Result};
use crate::geo_core::Location;
use crate::series::{WeatherRecord, WeatherSeries};

const PROVIDER: &str = "Meteostat";
const KMH_TO_MS: f64 = 1.0 / 3.6;

#[derive(Debug, Deserialize)]
struct MeteostatResponse {
    #[serde(default)]
    data: Vec<MeteostatDay>,
}

#[derive(Debug, Deserialize)]
struct MeteostatDay {
    date: String,
    tmax: Option<f64>,
    tmin: Option<f64>,
    prcp: Option<f64>,
    /// km/h
    wspd: Option<f64>,
}

pub struct MeteostatGateway {
    client: Client,
    config: MeteostatConfig,
    api_key: String,
}

impl MeteostatGateway {
    /// Fails when no API key is configured
    pub fn new(config: &MeteostatConfig, http: &HttpConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                IrrigoError::Configuration("Meteostat requires an API key".to_string())
            })?;
        Ok(MeteostatGateway {
            client: build_client(http)?,
            config: config.clone(),
            api_key,
        })
    }

    /// Query by date-time bounds; only the calendar day of each bound is sent.
    pub fn fetch_between(
        &self,
        location: Location,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<WeatherSeries> {
        if end < start {
            return Err(IrrigoError::Configuration(format!(
                "end {} precedes start {}",
                end, start
            )));
        }
        info!(
            lon = location.lon,
            lat = location.lat,
            start = %start.date(),
            end = %end.date(),
            "fetching Meteostat daily data"
        );

        let response = self
            .client
            .get(&self.config.base_url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.config.host)
            .query(&[
                ("lat", location.lat.to_string()),
                ("lon", location.lon.to_string()),
                ("start", start.date().format("%Y-%m-%d").to_string()),
                ("end", end.date().format("%Y-%m-%d").to_string()),
            ])
            .send()
            .map_err(|e| send_error(PROVIDER, e))?;
        let body = check_status(PROVIDER, response)?
            .text()
            .map_err(|e| send_error(PROVIDER, e))?;

        let series = parse_meteostat_response(&body)?;
        debug!(days = series.len(), "Meteostat series parsed");
        Ok(series)
    }
}

impl ClimateGateway for MeteostatGateway {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn fetch_series(&self, location: Location, range: &DateRange) -> Result<WeatherSeries> {
        self.fetch_between(location, range.start_datetime(), range.end_datetime())
    }
}

/// Parse a Meteostat payload. Wind speed is converted from km/h to m/s.
pub fn parse_meteostat_response(body: &str) -> Result<WeatherSeries> {
    let response: MeteostatResponse = serde_json::from_str(body)
        .map_err(|e| IrrigoError::upstream(PROVIDER, format!("unexpected payload: {}", e)))?;

    let mut series = WeatherSeries::new();
    for day in response.data {
        // Some payloads carry a time part, "2023-06-01 00:00:00"
        let date_part = day.date.get(..10).unwrap_or(&day.date);
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
            IrrigoError::upstream(PROVIDER, format!("unexpected date '{}'", day.date))
        })?;
        let record = WeatherRecord {
            tmax: day.tmax,
            tmin: day.tmin,
            precipitation: day.prcp,
            wind_speed: day.wspd.map(|w| w * KMH_TO_MS),
            ..Default::default()
        };
        series
            .insert(date, record)
            .map_err(|e| IrrigoError::upstream(PROVIDER, e.to_string()))?;
    }
    if series.is_empty() {
        return Err(IrrigoError::DataUnavailable(format!(
            "{} has no daily data for this location and range",
            PROVIDER
        )));
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_converts_wind_to_metres_per_second() {
        let body = r#"{
            "meta": {"generated": "2023-07-01 10:00:00"},
            "data": [
                {"date": "2023-06-01", "tavg": 29.0, "tmin": 25.1, "tmax": 33.0,
                 "prcp": 1.2, "snow": null, "wdir": 180, "wspd": 7.2, "wpgt": null,
                 "pres": 1005.1, "tsun": null},
                {"date": "2023-06-02", "tavg": null, "tmin": null, "tmax": null,
                 "prcp": null, "snow": null, "wdir": null, "wspd": null, "wpgt": null,
                 "pres": null, "tsun": null}
            ]
        }"#;
        let series = parse_meteostat_response(body).unwrap();
        assert_eq!(series.len(), 1);
        let record = series
            .get(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap())
            .unwrap();
        assert_relative_eq!(record.wind_speed.unwrap(), 2.0, epsilon = 1e-12);
        assert_eq!(record.tmax, Some(33.0));
        assert!(record.et0.is_none());
    }

    #[test]
    fn test_empty_data_is_no_data() {
        let err = parse_meteostat_response(r#"{"meta": {}, "data": []}"#).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_duplicate_day_is_upstream_failure() {
        let body = r#"{"data": [
            {"date": "2023-06-01", "tmax": 30.0, "tmin": null, "prcp": null, "wspd": null},
            {"date": "2023-06-01", "tmax": 31.0, "tmin": null, "prcp": null, "wspd": null}
        ]}"#;
        assert!(matches!(
            parse_meteostat_response(body),
            Err(IrrigoError::UpstreamFailure { .. })
        ));
    }

    #[test]
    fn test_api_key_required() {
        let http = HttpConfig::default();
        assert!(matches!(
            MeteostatGateway::new(&MeteostatConfig::default(), &http),
            Err(IrrigoError::Configuration(_))
        ));
        let config = MeteostatConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(MeteostatGateway::new(&config, &http).is_ok());
    }
}
