/// NASA POWER daily point endpoint (historical reanalysis)
pub const NASA_POWER_DAILY_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";
/// POWER community the parameters are requested for
pub const NASA_POWER_COMMUNITY: &str = "RE";
/// POWER marks missing values with this fill value
pub const NASA_POWER_FILL_VALUE: f64 = -999.0;

/// Meteostat station-interpolated daily point data (RapidAPI)
pub const METEOSTAT_DAILY_URL: &str = "https://meteostat.p.rapidapi.com/point/daily";
pub const METEOSTAT_HOST: &str = "meteostat.p.rapidapi.com";

/// Earth Engine REST API root
pub const EARTH_ENGINE_URL: &str = "https://earthengine.googleapis.com";
/// Project hosting the public data catalog
pub const EARTH_ENGINE_PUBLIC_PROJECT: &str = "earthengine-public";

/// Sentinel-2 surface reflectance collection and its NIR/red bands
pub const SENTINEL2_COLLECTION: &str = "COPERNICUS/S2_SR";
pub const SENTINEL2_NIR_BAND: &str = "B8";
pub const SENTINEL2_RED_BAND: &str = "B4";
pub const SENTINEL2_CLOUD_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";
/// Scenes at or above this cloudy-pixel percentage are discarded
pub const CLOUD_COVER_CEILING_PCT: f64 = 20.0;
/// Native Sentinel-2 resolution for the spatial mean (m)
pub const SENTINEL2_SCALE_M: f64 = 10.0;
/// Buffer around a point location when no field is drawn (m)
pub const POINT_BUFFER_M: f64 = 500.0;

/// SMAP L4 surface soil moisture (hydrological reanalysis)
pub const SOIL_MOISTURE_COLLECTION: &str = "NASA/SMAP/SPL4SMGP/007";
pub const SOIL_MOISTURE_BAND: &str = "sm_surface";
pub const SOIL_MOISTURE_SCALE_M: f64 = 11_000.0;

/// Default HTTP timeout for provider calls (s)
pub const HTTP_TIMEOUT_SECS: u64 = 120;
