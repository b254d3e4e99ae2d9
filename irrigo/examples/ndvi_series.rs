// Example: per-day NDVI series over a buffered point
// Needs IRRIGO_EE_PROJECT and IRRIGO_EE_TOKEN (an OAuth2 access token).
use anyhow::Result;
use irrigo::collect::catalog::Region;
use irrigo::collect::earth_engine::EarthEngineCatalog;
use irrigo::geometric::vegetation::{IndexGateway, SeriesStrategy, VegetationGateway};
use irrigo::{DateRange, IrrigoConfig, Location};

fn main() -> Result<()> {
    println!("=== Example: Sentinel-2 NDVI series ===\n");

    let config = IrrigoConfig::from_env()?;
    let catalog = EarthEngineCatalog::new(&config.earth_engine, &config.http)?;
    let gateway = IndexGateway::ndvi(catalog, &config.earth_engine)
        .with_strategy(SeriesStrategy::PerDayComposite);

    let region = Region::point(Location::new(105.805, 21.005)?, 500.0);
    let range = DateRange::parse("2023-06-01", "2023-08-31")?;

    let series = gateway.fetch_series(&region, &range)?;
    if series.is_empty() {
        println!("No cloud-free scene in {}", range);
        return Ok(());
    }
    for record in series.records() {
        println!("{}  {:.3}", record.date, record.value);
    }
    if let Some(mean) = series.mean() {
        println!("\nMean NDVI: {:.3} over {} days", mean, series.len());
    }

    Ok(())
}
