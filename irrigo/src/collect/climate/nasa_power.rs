//! NASA POWER daily point API.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::{ClimateGateway, WeatherVariable};
use crate::collect::global_variables::NASA_POWER_FILL_VALUE;
use crate::collect::http::{build_client, check_status, send_error};
use crate::commons::date_range::DateRange;
use crate::config::{HttpConfig, NasaPowerConfig};
use crate::error::{IrrigoError, Result};
use crate::geo_core::Location;
use crate::series::{WeatherRecord, WeatherSeries};

const PROVIDER: &str = "NASA POWER";

impl WeatherVariable {
    /// POWER parameter code
    pub fn power_code(self) -> &'static str {
        match self {
            WeatherVariable::Tmax => "T2M_MAX",
            WeatherVariable::Tmin => "T2M_MIN",
            WeatherVariable::Precipitation => "PRECTOTCORR",
            WeatherVariable::WindSpeed => "WS2M",
            WeatherVariable::SolarRadiation => "SOLARAD",
            WeatherVariable::ReferenceEt => "PET",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
    #[serde(default)]
    header: Option<PowerHeader>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: HashMap<String, BTreeMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct PowerHeader {
    fill_value: Option<f64>,
}

/// Gateway to the POWER daily point endpoint.
///
/// One instance serves one parameter set: [`NasaPowerGateway::weather`]
/// for the weather table, [`NasaPowerGateway::reference_et`] for ET₀.
pub struct NasaPowerGateway {
    client: Client,
    config: NasaPowerConfig,
    variables: Vec<WeatherVariable>,
}

impl NasaPowerGateway {
    pub fn new(
        config: &NasaPowerConfig,
        http: &HttpConfig,
        variables: &[WeatherVariable],
    ) -> Result<Self> {
        if variables.is_empty() {
            return Err(IrrigoError::Configuration(
                "NASA POWER gateway needs at least one parameter".to_string(),
            ));
        }
        Ok(NasaPowerGateway {
            client: build_client(http)?,
            config: config.clone(),
            variables: variables.to_vec(),
        })
    }

    /// Tmax, Tmin, precipitation, wind and solar radiation
    pub fn weather(config: &NasaPowerConfig, http: &HttpConfig) -> Result<Self> {
        Self::new(config, http, &WeatherVariable::WEATHER)
    }

    /// Daily potential evapotranspiration, used as ET₀
    pub fn reference_et(config: &NasaPowerConfig, http: &HttpConfig) -> Result<Self> {
        Self::new(config, http, &[WeatherVariable::ReferenceEt])
    }

    pub fn variables(&self) -> &[WeatherVariable] {
        &self.variables
    }

    fn parameter_list(&self) -> String {
        self.variables
            .iter()
            .map(|v| v.power_code())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl ClimateGateway for NasaPowerGateway {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn fetch_series(&self, location: Location, range: &DateRange) -> Result<WeatherSeries> {
        let parameters = self.parameter_list();
        info!(
            parameters = %parameters,
            lon = location.lon,
            lat = location.lat,
            range = %range,
            "fetching NASA POWER daily data"
        );

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("parameters", parameters.clone()),
                ("community", self.config.community.clone()),
                ("longitude", location.lon.to_string()),
                ("latitude", location.lat.to_string()),
                ("start", range.start().format("%Y%m%d").to_string()),
                ("end", range.end().format("%Y%m%d").to_string()),
                ("format", "JSON".to_string()),
            ])
            .send()
            .map_err(|e| send_error(PROVIDER, e))?;
        let body = check_status(PROVIDER, response)?
            .text()
            .map_err(|e| send_error(PROVIDER, e))?;

        let series = parse_power_response(&body, &self.variables)?;
        debug!(days = series.len(), "NASA POWER series parsed");
        Ok(series)
    }
}

/// Parse a POWER JSON payload into a daily series.
///
/// Fill values are dropped per variable; a day where every requested
/// variable is missing does not appear at all.
pub fn parse_power_response(body: &str, variables: &[WeatherVariable]) -> Result<WeatherSeries> {
    let response: PowerResponse = serde_json::from_str(body)
        .map_err(|e| IrrigoError::upstream(PROVIDER, format!("unexpected payload: {}", e)))?;
    let fill_value = response
        .header
        .and_then(|h| h.fill_value)
        .unwrap_or(NASA_POWER_FILL_VALUE);

    let mut days: BTreeMap<NaiveDate, WeatherRecord> = BTreeMap::new();
    for variable in variables {
        let code = variable.power_code();
        let values = response.properties.parameter.get(code).ok_or_else(|| {
            IrrigoError::upstream(PROVIDER, format!("parameter {} missing from response", code))
        })?;
        for (key, value) in values {
            let date = NaiveDate::parse_from_str(key, "%Y%m%d").map_err(|_| {
                IrrigoError::upstream(PROVIDER, format!("unexpected date key '{}'", key))
            })?;
            let record = days.entry(date).or_default();
            match value {
                Some(v) if v.is_finite() && *v != fill_value => variable.assign(record, *v),
                _ => {}
            }
        }
    }

    let mut series = WeatherSeries::new();
    for (date, record) in days {
        series
            .insert(date, record)
            .map_err(|e| IrrigoError::upstream(PROVIDER, e.to_string()))?;
    }
    if series.is_empty() {
        return Err(IrrigoError::DataUnavailable(format!(
            "{} returned only fill values",
            PROVIDER
        )));
    }
    Ok(series)
}
