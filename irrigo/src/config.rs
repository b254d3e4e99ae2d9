//! Runtime configuration.
//!
//! Credentials and provider settings are plain values handed to the
//! gateways at construction. Every field has a default, so an empty YAML
//! file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::agronomy::crop_profile::CropProfile;
use crate::collect::global_variables::*;
use crate::error::{IrrigoError, Result};
use crate::geo_core::Projection;
use crate::geometric::vegetation::SeriesStrategy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigoConfig {
    pub http: HttpConfig,
    pub nasa_power: NasaPowerConfig,
    pub meteostat: MeteostatConfig,
    pub earth_engine: EarthEngineConfig,
    pub soil_moisture: SoilMoistureConfig,
    /// External spreadsheet crop model; absent means no simulation
    pub simulator: Option<SpreadsheetConfig>,
    pub pipeline: PipelineSettings,
    /// Extra crop profiles on top of the built-in "Rice" and "Custom"
    pub crops: Vec<CropProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: HTTP_TIMEOUT_SECS,
            user_agent: format!("irrigo/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NasaPowerConfig {
    pub base_url: String,
    pub community: String,
}

impl Default for NasaPowerConfig {
    fn default() -> Self {
        NasaPowerConfig {
            base_url: NASA_POWER_DAILY_URL.to_string(),
            community: NASA_POWER_COMMUNITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteostatConfig {
    pub base_url: String,
    pub host: String,
    pub api_key: Option<String>,
}

impl Default for MeteostatConfig {
    fn default() -> Self {
        MeteostatConfig {
            base_url: METEOSTAT_DAILY_URL.to_string(),
            host: METEOSTAT_HOST.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthEngineConfig {
    pub base_url: String,
    /// Cloud project billed for computations
    pub project: Option<String>,
    /// OAuth2 bearer token
    pub access_token: Option<String>,
    pub collection: String,
    pub nir_band: String,
    pub red_band: String,
    pub cloud_property: String,
    pub cloud_ceiling_pct: f64,
    pub scale_m: f64,
    pub point_buffer_m: f64,
    pub series_strategy: SeriesStrategy,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        EarthEngineConfig {
            base_url: EARTH_ENGINE_URL.to_string(),
            project: None,
            access_token: None,
            collection: SENTINEL2_COLLECTION.to_string(),
            nir_band: SENTINEL2_NIR_BAND.to_string(),
            red_band: SENTINEL2_RED_BAND.to_string(),
            cloud_property: SENTINEL2_CLOUD_PROPERTY.to_string(),
            cloud_ceiling_pct: CLOUD_COVER_CEILING_PCT,
            scale_m: SENTINEL2_SCALE_M,
            point_buffer_m: POINT_BUFFER_M,
            series_strategy: SeriesStrategy::PerDayComposite,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilMoistureConfig {
    pub collection: String,
    pub band: String,
    pub scale_m: f64,
}

impl Default for SoilMoistureConfig {
    fn default() -> Self {
        SoilMoistureConfig {
            collection: SOIL_MOISTURE_COLLECTION.to_string(),
            band: SOIL_MOISTURE_BAND.to_string(),
            scale_m: SOIL_MOISTURE_SCALE_M,
        }
    }
}

/// A sheet/cell address in the simulation workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub sheet: String,
    pub cell: String,
}

impl CellRef {
    pub fn new(sheet: &str, cell: &str) -> Self {
        CellRef {
            sheet: sheet.to_string(),
            cell: cell.to_string(),
        }
    }
}

/// Fixed input/output addresses of the crop-model workbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellLayout {
    pub planting_date: CellRef,
    pub crop_type: CellRef,
    pub weather_csv: CellRef,
    pub soil_type: CellRef,
    pub simulation_end: CellRef,
    pub et_crop: CellRef,
    /// Sheet receiving crop parameter name/value rows, if any
    pub crop_parameters_sheet: Option<String>,
}

impl Default for CellLayout {
    fn default() -> Self {
        CellLayout {
            planting_date: CellRef::new("Inputs", "B2"),
            crop_type: CellRef::new("Inputs", "B3"),
            weather_csv: CellRef::new("Inputs", "B4"),
            soil_type: CellRef::new("Inputs", "B5"),
            simulation_end: CellRef::new("Inputs", "B6"),
            et_crop: CellRef::new("Outputs", "B2"),
            crop_parameters_sheet: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    /// Automation program driving the desktop spreadsheet application
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub workbook: PathBuf,
    #[serde(default)]
    pub layout: CellLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherProvider {
    #[default]
    NasaPower,
    Meteostat,
}

impl std::str::FromStr for WeatherProvider {
    type Err = IrrigoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "nasa_power" | "power" => Ok(WeatherProvider::NasaPower),
            "meteostat" => Ok(WeatherProvider::Meteostat),
            other => Err(IrrigoError::Configuration(format!(
                "unknown weather provider '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub crop: String,
    pub efficiency_pct: f64,
    pub weather_provider: WeatherProvider,
    pub projection: Projection,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            crop: "Rice".to_string(),
            efficiency_pct: 75.0,
            weather_provider: WeatherProvider::NasaPower,
            projection: Projection::WebMercator,
        }
    }
}

impl IrrigoConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IrrigoError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: IrrigoConfig = serde_yaml::from_str(content)
            .map_err(|e| IrrigoError::Configuration(format!("invalid YAML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `IRRIGO_CONFIG` (if set) and apply `IRRIGO_*` overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("IRRIGO_CONFIG") {
            Ok(path) => Self::from_yaml(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IRRIGO_EE_PROJECT") {
            self.earth_engine.project = Some(v);
        }
        if let Some(v) = lookup("IRRIGO_EE_TOKEN") {
            self.earth_engine.access_token = Some(v);
        }
        if let Some(v) = lookup("IRRIGO_METEOSTAT_KEY") {
            self.meteostat.api_key = Some(v);
        }
        if let Some(v) = lookup("IRRIGO_WEATHER_PROVIDER") {
            self.pipeline.weather_provider = v.parse()?;
        }
        if let Some(v) = lookup("IRRIGO_CROP") {
            self.pipeline.crop = v;
        }
        if let Some(v) = lookup("IRRIGO_EFFICIENCY") {
            self.pipeline.efficiency_pct = v.trim().parse().map_err(|_| {
                IrrigoError::Configuration(format!("IRRIGO_EFFICIENCY is not a number: {}", v))
            })?;
        }
        if let Some(v) = lookup("IRRIGO_HTTP_TIMEOUT") {
            self.http.timeout_secs = v.trim().parse().map_err(|_| {
                IrrigoError::Configuration(format!("IRRIGO_HTTP_TIMEOUT is not an integer: {}", v))
            })?;
        }
        match (
            lookup("IRRIGO_SIMULATOR_PROGRAM"),
            lookup("IRRIGO_SIMULATOR_WORKBOOK"),
        ) {
            (Some(program), Some(workbook)) => {
                let layout = self
                    .simulator
                    .as_ref()
                    .map(|s| s.layout.clone())
                    .unwrap_or_default();
                self.simulator = Some(SpreadsheetConfig {
                    program: PathBuf::from(program),
                    args: Vec::new(),
                    workbook: PathBuf::from(workbook),
                    layout,
                });
            }
            (None, None) => {}
            _ => {
                return Err(IrrigoError::Configuration(
                    "IRRIGO_SIMULATOR_PROGRAM and IRRIGO_SIMULATOR_WORKBOOK must be set together"
                        .to_string(),
                ))
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let eff = self.pipeline.efficiency_pct;
        if !(eff > 0.0 && eff <= 100.0) {
            return Err(IrrigoError::Configuration(format!(
                "efficiency must be in (0, 100] %, got {}",
                eff
            )));
        }
        let ee = &self.earth_engine;
        if !(ee.cloud_ceiling_pct > 0.0 && ee.cloud_ceiling_pct <= 100.0) {
            return Err(IrrigoError::Configuration(format!(
                "cloud ceiling must be in (0, 100] %, got {}",
                ee.cloud_ceiling_pct
            )));
        }
        for (name, value) in [
            ("earth_engine.scale_m", ee.scale_m),
            ("earth_engine.point_buffer_m", ee.point_buffer_m),
            ("soil_moisture.scale_m", self.soil_moisture.scale_m),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(IrrigoError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.http.timeout_secs == 0 {
            return Err(IrrigoError::Configuration(
                "http.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
