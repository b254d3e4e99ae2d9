//! Field-to-irrigation pipeline.
//!
//! Area, weather, ET₀ and NDVI are fetched in that order; the first
//! missing input stops the run and is named in the error. A requested
//! crop simulation that cannot run falls back to `ET₀ × Kcb`.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use crate::agronomy::crop_parameters::CropParameters;
use crate::agronomy::crop_profile::CropCatalog;
use crate::agronomy::irrigation::{check_efficiency, IrrigationEstimate};
use crate::collect::catalog::Region;
use crate::collect::climate::ClimateGateway;
use crate::collect::global_variables::POINT_BUFFER_M;
use crate::commons::date_range::DateRange;
use crate::config::PipelineSettings;
use crate::error::IrrigoError;
use crate::geo_core::Location;
use crate::geometric::field::FieldGeometry;
use crate::geometric::vegetation::VegetationGateway;
use crate::series::{VegetationSeries, WeatherSeries};
use crate::simulation::{CropSimulator, SimulationInputs};

/// Inputs an estimate cannot be computed without
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredInput {
    FieldArea,
    WeatherData,
    ReferenceEvapotranspiration,
    Ndvi,
}

impl fmt::Display for RequiredInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequiredInput::FieldArea => "field area",
            RequiredInput::WeatherData => "weather data",
            RequiredInput::ReferenceEvapotranspiration => "reference evapotranspiration",
            RequiredInput::Ndvi => "NDVI",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("{input} missing: {source}")]
    MissingInput {
        input: RequiredInput,
        #[source]
        source: IrrigoError,
    },
    #[error(transparent)]
    Invalid(#[from] IrrigoError),
}

impl PipelineError {
    /// The missing precondition, if that is what stopped the run
    pub fn missing_input(&self) -> Option<RequiredInput> {
        match self {
            PipelineError::MissingInput { input, .. } => Some(*input),
            PipelineError::Invalid(_) => None,
        }
    }
}

fn missing(input: RequiredInput) -> impl FnOnce(IrrigoError) -> PipelineError {
    move |source| PipelineError::MissingInput { input, source }
}

/// The field a run is computed for
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    /// Boundary drawn on the map
    Drawn(FieldGeometry),
    /// Area typed in by hand, positioned by a point
    Manual { area_ha: f64, location: Location },
}

impl FieldInput {
    pub fn area_ha(&self) -> Result<f64, IrrigoError> {
        match self {
            FieldInput::Drawn(field) => Ok(field.area_ha()),
            FieldInput::Manual { area_ha, .. } => {
                if area_ha.is_finite() && *area_ha > 0.0 {
                    Ok(*area_ha)
                } else {
                    Err(IrrigoError::Geometry(format!(
                        "field area must be positive, got {} ha",
                        area_ha
                    )))
                }
            }
        }
    }

    /// Point used for the weather queries
    pub fn location(&self) -> Location {
        match self {
            FieldInput::Drawn(field) => {
                let c = field.centroid();
                Location {
                    lon: c.x(),
                    lat: c.y(),
                }
            }
            FieldInput::Manual { location, .. } => *location,
        }
    }

    /// Exact boundary when drawn, a buffered point otherwise
    pub fn region(&self, point_buffer_m: f64) -> Region {
        match self {
            FieldInput::Drawn(field) => Region::Field(field.clone()),
            FieldInput::Manual { location, .. } => Region::point(*location, point_buffer_m),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    pub planting_date: NaiveDate,
    pub duration_days: u32,
    pub soil_type: String,
    pub crop_parameters: Option<CropParameters>,
}

impl SimulationPlan {
    /// Plan from text inputs, `planting_date` as `YYYY-MM-DD`.
    /// Overrides apply to the PaddyRice parameter table; none keeps the
    /// workbook's own parameters.
    pub fn parse<'a, I>(
        planting_date: &str,
        duration_days: u32,
        soil_type: &str,
        overrides: I,
    ) -> Result<Self, IrrigoError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let planting_date = NaiveDate::parse_from_str(planting_date, "%Y-%m-%d").map_err(|e| {
            IrrigoError::Configuration(format!("invalid planting date '{}': {}", planting_date, e))
        })?;
        if duration_days == 0 {
            return Err(IrrigoError::Configuration(
                "simulation duration must be at least one day".to_string(),
            ));
        }
        let mut overrides = overrides.into_iter().peekable();
        let crop_parameters = match overrides.peek() {
            Some(_) => Some(CropParameters::paddy_rice().with_overrides(overrides)?),
            None => None,
        };
        Ok(SimulationPlan {
            planting_date,
            duration_days,
            soil_type: soil_type.to_string(),
            crop_parameters,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    pub field: FieldInput,
    pub range: DateRange,
    /// Falls back to the configured crop
    pub crop: Option<String>,
    /// Falls back to the configured efficiency
    pub efficiency_pct: Option<f64>,
    pub simulation: Option<SimulationPlan>,
}

impl EstimateRequest {
    pub fn new(field: FieldInput, range: DateRange) -> Self {
        EstimateRequest {
            field,
            range,
            crop: None,
            efficiency_pct: None,
            simulation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimulationOutcome {
    NotRequested,
    Simulated { et_crop: f64 },
    /// The estimate used `ET₀ × Kcb` instead
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSummary {
    pub area_ha: f64,
    pub centroid_lon: f64,
    pub centroid_lat: f64,
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrrigationReport {
    pub field: FieldSummary,
    pub range: DateRange,
    pub crop: String,
    pub ndvi: f64,
    pub estimate: IrrigationEstimate,
    pub simulation: SimulationOutcome,
    pub weather: WeatherSeries,
}

pub struct IrrigationPipeline {
    weather: Box<dyn ClimateGateway>,
    reference_et: Box<dyn ClimateGateway>,
    vegetation: Box<dyn VegetationGateway>,
    simulator: Option<Box<dyn CropSimulator>>,
    crops: CropCatalog,
    settings: PipelineSettings,
    point_buffer_m: f64,
}

impl IrrigationPipeline {
    pub fn new(
        weather: Box<dyn ClimateGateway>,
        reference_et: Box<dyn ClimateGateway>,
        vegetation: Box<dyn VegetationGateway>,
        settings: PipelineSettings,
    ) -> Self {
        IrrigationPipeline {
            weather,
            reference_et,
            vegetation,
            simulator: None,
            crops: CropCatalog::default(),
            settings,
            point_buffer_m: POINT_BUFFER_M,
        }
    }

    pub fn with_simulator(mut self, simulator: Box<dyn CropSimulator>) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn with_crops(mut self, crops: CropCatalog) -> Self {
        self.crops = crops;
        self
    }

    pub fn with_point_buffer(mut self, buffer_m: f64) -> Self {
        self.point_buffer_m = buffer_m;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn crops(&self) -> &CropCatalog {
        &self.crops
    }

    /// Wire the configured providers
    #[cfg(feature = "reqwest")]
    pub fn from_config(config: &crate::config::IrrigoConfig) -> Result<Self, IrrigoError> {
        use crate::collect::climate::meteostat::MeteostatGateway;
        use crate::collect::climate::nasa_power::NasaPowerGateway;
        use crate::collect::earth_engine::EarthEngineCatalog;
        use crate::config::WeatherProvider;
        use crate::geometric::vegetation::IndexGateway;
        use crate::simulation::SpreadsheetSimulator;

        let weather: Box<dyn ClimateGateway> = match config.pipeline.weather_provider {
            WeatherProvider::NasaPower => {
                Box::new(NasaPowerGateway::weather(&config.nasa_power, &config.http)?)
            }
            WeatherProvider::Meteostat => {
                Box::new(MeteostatGateway::new(&config.meteostat, &config.http)?)
            }
        };
        let reference_et = Box::new(NasaPowerGateway::reference_et(
            &config.nasa_power,
            &config.http,
        )?);
        let catalog = EarthEngineCatalog::new(&config.earth_engine, &config.http)?;
        let vegetation = Box::new(IndexGateway::ndvi(catalog, &config.earth_engine));

        let mut pipeline = Self::new(weather, reference_et, vegetation, config.pipeline.clone())
            .with_crops(CropCatalog::with_profiles(config.crops.iter().cloned()))
            .with_point_buffer(config.earth_engine.point_buffer_m);
        if let Some(spreadsheet) = &config.simulator {
            pipeline = pipeline.with_simulator(Box::new(SpreadsheetSimulator::new(spreadsheet.clone())));
        }
        Ok(pipeline)
    }

    pub fn run(&self, request: &EstimateRequest) -> Result<IrrigationReport, PipelineError> {
        let efficiency_pct = request.efficiency_pct.unwrap_or(self.settings.efficiency_pct);
        check_efficiency(efficiency_pct)?;
        let crop = request
            .crop
            .clone()
            .unwrap_or_else(|| self.settings.crop.clone());
        let profile = self.crops.get(&crop);

        let area_ha = request
            .field
            .area_ha()
            .map_err(missing(RequiredInput::FieldArea))?;
        let location = request.field.location();
        info!(
            area_ha,
            lon = location.lon,
            lat = location.lat,
            range = %request.range,
            crop = %crop,
            "estimating irrigation"
        );

        let weather = self
            .weather
            .fetch_series(location, &request.range)
            .map_err(missing(RequiredInput::WeatherData))?;
        info!(provider = self.weather.name(), days = weather.len(), "weather fetched");

        let et0 = self
            .reference_et
            .fetch_series(location, &request.range)
            .and_then(|series| {
                series.mean_et0().ok_or_else(|| {
                    IrrigoError::DataUnavailable(format!(
                        "{} returned no ET₀ values",
                        self.reference_et.name()
                    ))
                })
            })
            .map_err(missing(RequiredInput::ReferenceEvapotranspiration))?;

        let region = request.field.region(self.point_buffer_m);
        let ndvi = self
            .vegetation
            .fetch_value(&region, &request.range)
            .map_err(missing(RequiredInput::Ndvi))?;
        let kcb = profile.coefficient(ndvi);
        info!(et0, ndvi, kcb, profile = profile.name(), "inputs resolved");

        let (estimate, simulation) = match &request.simulation {
            None => (
                IrrigationEstimate::compute(et0, kcb, area_ha, efficiency_pct)?,
                SimulationOutcome::NotRequested,
            ),
            Some(plan) => match self.simulate(plan, &crop, &weather) {
                Ok(et_crop) => (
                    IrrigationEstimate::from_et_crop(et0, kcb, et_crop, area_ha, efficiency_pct)?,
                    SimulationOutcome::Simulated { et_crop },
                ),
                Err(e) => {
                    warn!(error = %e, "crop simulation unavailable, using ET₀ × Kcb");
                    (
                        IrrigationEstimate::compute(et0, kcb, area_ha, efficiency_pct)?,
                        SimulationOutcome::Unavailable {
                            reason: e.to_string(),
                        },
                    )
                }
            },
        };
        info!(
            net_m3_per_day = estimate.net_m3_per_day,
            gross_m3_per_day = estimate.gross_m3_per_day,
            "irrigation estimated"
        );

        Ok(IrrigationReport {
            field: FieldSummary {
                area_ha,
                centroid_lon: location.lon,
                centroid_lat: location.lat,
            },
            range: request.range,
            crop,
            ndvi,
            estimate,
            simulation,
            weather,
        })
    }

    /// NDVI series over the field, in the vegetation gateway's series strategy
    pub fn vegetation_series(
        &self,
        field: &FieldInput,
        range: &DateRange,
    ) -> Result<VegetationSeries, PipelineError> {
        let region = field.region(self.point_buffer_m);
        let series = self
            .vegetation
            .fetch_series(&region, range)
            .map_err(missing(RequiredInput::Ndvi))?;
        info!(provider = self.vegetation.name(), records = series.len(), "NDVI series fetched");
        Ok(series)
    }

    fn simulate(
        &self,
        plan: &SimulationPlan,
        crop: &str,
        weather: &WeatherSeries,
    ) -> Result<f64, IrrigoError> {
        let simulator = self.simulator.as_ref().ok_or_else(|| {
            IrrigoError::SimulationUnavailable("no crop simulator configured".to_string())
        })?;
        let output = simulator.simulate(&SimulationInputs {
            weather: weather.clone(),
            planting_date: plan.planting_date,
            duration_days: plan.duration_days,
            crop: crop.to_string(),
            soil_type: plan.soil_type.clone(),
            crop_parameters: plan.crop_parameters.clone(),
        })?;
        Ok(output.et_crop)
    }
}
