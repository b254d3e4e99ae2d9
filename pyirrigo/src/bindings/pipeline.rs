use irrigo::collect::climate::meteostat::MeteostatGateway;
use irrigo::collect::climate::nasa_power::NasaPowerGateway;
use irrigo::collect::climate::ClimateGateway;
use irrigo::config::{IrrigoConfig, WeatherProvider};
use irrigo::pipeline::{EstimateRequest, FieldInput, IrrigationPipeline, SimulationPlan};
use irrigo::{DateRange, Location};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::bindings::field::PyFieldGeometry;
use crate::bindings::to_python;

fn load_config(config_path: Option<&str>) -> PyResult<IrrigoConfig> {
    let mut config = match config_path {
        Some(path) => IrrigoConfig::from_yaml(path),
        None => Ok(IrrigoConfig::default()),
    }
    .map_err(|e| PyValueError::new_err(format!("Failed to load configuration: {}", e)))?;
    config
        .apply_overrides(|key| std::env::var(key).ok())
        .and_then(|_| config.validate())
        .map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e)))?;
    Ok(config)
}

fn date_range(start: &str, end: &str) -> PyResult<DateRange> {
    DateRange::parse(start, end).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Irrigation pipeline Python binding
///
/// Providers hold trait objects, so instances stay on the thread that made them.
#[pyclass(unsendable)]
pub struct PyIrrigationPipeline {
    inner: IrrigationPipeline,
}

#[pymethods]
impl PyIrrigationPipeline {
    /// Build from a YAML configuration file, then `IRRIGO_*` environment overrides
    #[new]
    #[pyo3(signature = (config_path = None))]
    fn new(config_path: Option<&str>) -> PyResult<Self> {
        let config = load_config(config_path)?;
        IrrigationPipeline::from_config(&config)
            .map(|inner| PyIrrigationPipeline { inner })
            .map_err(|e| PyValueError::new_err(format!("Failed to create pipeline: {}", e)))
    }

    /// Run an estimate for a drawn field, or for a manual area at a point.
    ///
    /// Passing `planting_date` (YYYY-MM-DD) asks for the spreadsheet crop
    /// simulation; `crop_parameters` overrides PaddyRice parameters by name.
    #[pyo3(signature = (
        start,
        end,
        field = None,
        area_ha = None,
        lon = None,
        lat = None,
        crop = None,
        efficiency_pct = None,
        planting_date = None,
        duration_days = 120,
        soil_type = "Loam",
        crop_parameters = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn estimate(
        &self,
        py: Python,
        start: &str,
        end: &str,
        field: Option<PyRef<PyFieldGeometry>>,
        area_ha: Option<f64>,
        lon: Option<f64>,
        lat: Option<f64>,
        crop: Option<String>,
        efficiency_pct: Option<f64>,
        planting_date: Option<&str>,
        duration_days: u32,
        soil_type: &str,
        crop_parameters: Option<HashMap<String, f64>>,
    ) -> PyResult<Py<PyAny>> {
        let range = date_range(start, end)?;
        let field = match (field, area_ha, lon, lat) {
            (Some(field), _, _, _) => FieldInput::Drawn(field.inner.clone()),
            (None, Some(area_ha), Some(lon), Some(lat)) => FieldInput::Manual {
                area_ha,
                location: Location::new(lon, lat)
                    .map_err(|e| PyValueError::new_err(e.to_string()))?,
            },
            _ => {
                return Err(PyValueError::new_err(
                    "Pass a field, or area_ha with lon and lat",
                ))
            }
        };
        let mut request = EstimateRequest::new(field, range);
        request.crop = crop;
        request.efficiency_pct = efficiency_pct;
        request.simulation = match planting_date {
            Some(date) => {
                let overrides = crop_parameters.unwrap_or_default();
                let plan = SimulationPlan::parse(
                    date,
                    duration_days,
                    soil_type,
                    overrides.iter().map(|(name, value)| (name.as_str(), *value)),
                )
                .map_err(|e| PyValueError::new_err(e.to_string()))?;
                Some(plan)
            }
            None if crop_parameters.is_some() => {
                return Err(PyValueError::new_err(
                    "crop_parameters needs a planting_date",
                ))
            }
            None => None,
        };

        let report = self
            .inner
            .run(&request)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        to_python(py, &report)
    }
}

/// Daily weather table as a dict keyed by date
#[pyfunction]
#[pyo3(signature = (lon, lat, start, end, provider = None, config_path = None))]
pub fn fetch_weather(
    py: Python,
    lon: f64,
    lat: f64,
    start: &str,
    end: &str,
    provider: Option<&str>,
    config_path: Option<&str>,
) -> PyResult<Py<PyAny>> {
    let config = load_config(config_path)?;
    let range = date_range(start, end)?;
    let location = Location::new(lon, lat).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let provider = match provider {
        Some(p) => p
            .parse::<WeatherProvider>()
            .map_err(|e| PyValueError::new_err(e.to_string()))?,
        None => config.pipeline.weather_provider,
    };

    let gateway: Box<dyn ClimateGateway> = match provider {
        WeatherProvider::NasaPower => Box::new(
            NasaPowerGateway::weather(&config.nasa_power, &config.http)
                .map_err(|e| PyValueError::new_err(e.to_string()))?,
        ),
        WeatherProvider::Meteostat => Box::new(
            MeteostatGateway::new(&config.meteostat, &config.http)
                .map_err(|e| PyValueError::new_err(e.to_string()))?,
        ),
    };
    let series = gateway
        .fetch_series(location, &range)
        .map_err(|e| PyValueError::new_err(format!("Failed to fetch weather: {}", e)))?;
    to_python(py, &series)
}
