//! Command-line front end: every subcommand prints JSON on stdout, logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use irrigo::collect::catalog::Region;
use irrigo::collect::climate::meteostat::MeteostatGateway;
use irrigo::collect::climate::nasa_power::NasaPowerGateway;
use irrigo::collect::climate::ClimateGateway;
use irrigo::collect::earth_engine::EarthEngineCatalog;
use irrigo::config::WeatherProvider;
use irrigo::geometric::vegetation::{IndexGateway, SeriesStrategy, VegetationGateway};
use irrigo::pipeline::SimulationPlan;
use irrigo::{
    CropCatalog, DateRange, EstimateRequest, FieldGeometry, FieldInput, IrrigationPipeline,
    IrrigoConfig, Location, Projection,
};

#[derive(Parser, Debug)]
#[command(name = "irrigo")]
#[command(about = "Irrigation estimate for a field from weather, ET₀ and NDVI")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "IRRIGO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Area and centroid of a GeoJSON field
    Area {
        geojson: PathBuf,
        #[arg(long, value_enum)]
        projection: Option<ProjectionArg>,
    },
    /// Daily weather table at a point
    Weather {
        #[command(flatten)]
        point: PointArgs,
        #[command(flatten)]
        dates: DateArgs,
        #[arg(long)]
        provider: Option<String>,
        /// Print CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// NDVI value or series over a field or buffered point
    Ndvi {
        #[command(flatten)]
        region: RegionArgs,
        #[command(flatten)]
        dates: DateArgs,
        /// Full series instead of the first qualifying scene
        #[arg(long)]
        series: bool,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Surface soil moisture series
    SoilMoisture {
        #[command(flatten)]
        region: RegionArgs,
        #[command(flatten)]
        dates: DateArgs,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Crop coefficient for an NDVI value
    Kcb {
        #[arg(long, allow_negative_numbers = true)]
        ndvi: f64,
        #[arg(long)]
        crop: Option<String>,
    },
    /// Known crop profiles
    Crops,
    /// Full irrigation estimate
    Estimate {
        #[command(flatten)]
        region: RegionArgs,
        /// Field area when no boundary is given
        #[arg(long)]
        area_ha: Option<f64>,
        #[command(flatten)]
        dates: DateArgs,
        #[arg(long)]
        crop: Option<String>,
        /// System efficiency (%)
        #[arg(long)]
        efficiency: Option<f64>,
        /// Planting date; enables the crop simulation
        #[arg(long)]
        planting_date: Option<String>,
        #[arg(long, default_value_t = 120)]
        duration_days: u32,
        #[arg(long, default_value = "Loam")]
        soil_type: String,
    },
}

#[derive(Args, Debug)]
struct DateArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: String,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    end: String,
}

#[derive(Args, Debug)]
struct PointArgs {
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
}

#[derive(Args, Debug)]
struct RegionArgs {
    /// GeoJSON field boundary
    #[arg(long, conflicts_with_all = ["lon", "lat"])]
    geojson: Option<PathBuf>,
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProjectionArg {
    WebMercator,
    CylindricalEqualArea,
}

impl From<ProjectionArg> for Projection {
    fn from(arg: ProjectionArg) -> Self {
        match arg {
            ProjectionArg::WebMercator => Projection::WebMercator,
            ProjectionArg::CylindricalEqualArea => Projection::CylindricalEqualArea,
        }
    }
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_field(path: &Path, projection: Projection) -> Result<FieldGeometry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(FieldGeometry::from_geojson_str(&content, projection)?)
}

impl RegionArgs {
    fn field(&self, projection: Projection) -> Result<Option<FieldGeometry>> {
        self.geojson
            .as_deref()
            .map(|path| load_field(path, projection))
            .transpose()
    }

    fn location(&self) -> Result<Option<Location>> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Ok(Some(Location::new(lon, lat)?)),
            _ => Ok(None),
        }
    }

    fn region(&self, config: &IrrigoConfig) -> Result<Region> {
        if let Some(field) = self.field(config.pipeline.projection)? {
            return Ok(Region::Field(field));
        }
        match self.location()? {
            Some(location) => Ok(Region::point(location, config.earth_engine.point_buffer_m)),
            None => bail!("give either --geojson or --lon/--lat"),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let mut config = match &cli.config {
        Some(path) => IrrigoConfig::from_yaml(path)?,
        None => IrrigoConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;

    match cli.command {
        Command::Area { geojson, projection } => {
            let projection = projection
                .map(Projection::from)
                .unwrap_or(config.pipeline.projection);
            let field = load_field(&geojson, projection)?;
            info!(area_ha = field.area_ha(), "field measured");
            print_json(&field.measure())?;
        }
        Command::Weather {
            point,
            dates,
            provider,
            csv,
        } => {
            let range = DateRange::parse(&dates.start, &dates.end)?;
            let provider = match provider {
                Some(p) => p.parse()?,
                None => config.pipeline.weather_provider,
            };
            let gateway: Box<dyn ClimateGateway> = match provider {
                WeatherProvider::NasaPower => {
                    Box::new(NasaPowerGateway::weather(&config.nasa_power, &config.http)?)
                }
                WeatherProvider::Meteostat => {
                    Box::new(MeteostatGateway::new(&config.meteostat, &config.http)?)
                }
            };
            let series = gateway.fetch_series(Location::new(point.lon, point.lat)?, &range)?;
            if csv {
                print!("{}", series.to_csv()?);
            } else {
                print_json(&series)?;
            }
        }
        Command::Ndvi {
            region,
            dates,
            series,
            strategy,
        } => {
            let range = DateRange::parse(&dates.start, &dates.end)?;
            let region = region.region(&config)?;
            let catalog = EarthEngineCatalog::new(&config.earth_engine, &config.http)?;
            let mut gateway = IndexGateway::ndvi(catalog, &config.earth_engine);
            if let Some(strategy) = strategy {
                gateway = gateway.with_strategy(strategy.parse::<SeriesStrategy>()?);
            }
            if series {
                print_json(&gateway.fetch_series(&region, &range)?)?;
            } else {
                let ndvi = gateway.fetch_value(&region, &range)?;
                print_json(&json!({ "ndvi": ndvi }))?;
            }
        }
        Command::SoilMoisture {
            region,
            dates,
            strategy,
        } => {
            let range = DateRange::parse(&dates.start, &dates.end)?;
            let region = region.region(&config)?;
            let catalog = EarthEngineCatalog::new(&config.earth_engine, &config.http)?;
            let mut gateway = IndexGateway::soil_moisture(catalog, &config.soil_moisture);
            if let Some(strategy) = strategy {
                gateway = gateway.with_strategy(strategy.parse::<SeriesStrategy>()?);
            }
            print_json(&gateway.fetch_series(&region, &range)?)?;
        }
        Command::Kcb { ndvi, crop } => {
            let catalog = CropCatalog::with_profiles(config.crops.iter().cloned());
            let crop = crop.unwrap_or_else(|| config.pipeline.crop.clone());
            let profile = catalog.get(&crop);
            print_json(&json!({
                "crop": profile.name(),
                "ndvi": ndvi,
                "kcb": profile.coefficient(ndvi),
            }))?;
        }
        Command::Crops => {
            let catalog = CropCatalog::with_profiles(config.crops.iter().cloned());
            print_json(&catalog.names())?;
        }
        Command::Estimate {
            region,
            area_ha,
            dates,
            crop,
            efficiency,
            planting_date,
            duration_days,
            soil_type,
        } => {
            let range = DateRange::parse(&dates.start, &dates.end)?;
            let field = match (region.field(config.pipeline.projection)?, area_ha) {
                (Some(field), _) => FieldInput::Drawn(field),
                (None, Some(area_ha)) => match region.location()? {
                    Some(location) => FieldInput::Manual { area_ha, location },
                    None => bail!("--area-ha needs --lon/--lat"),
                },
                (None, None) => bail!("give --geojson, or --area-ha with --lon/--lat"),
            };
            let simulation = planting_date
                .map(|date| SimulationPlan::parse(&date, duration_days, &soil_type, []))
                .transpose()
                .context("invalid simulation plan")?;

            let pipeline = IrrigationPipeline::from_config(&config)?;
            let mut request = EstimateRequest::new(field, range);
            request.crop = crop;
            request.efficiency_pct = efficiency;
            request.simulation = simulation;
            let report = pipeline.run(&request)?;
            print_json(&report)?;
        }
    }
    Ok(())
}
