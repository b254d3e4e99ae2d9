// Example: measuring a drawn field and estimating irrigation offline
// No network access needed: ET₀ and NDVI are given by hand.
use anyhow::Result;
use irrigo::agronomy::irrigation::IrrigationEstimate;
use irrigo::{CropCatalog, FieldGeometry, Projection};

fn main() -> Result<()> {
    println!("=== Example: field area and irrigation estimate ===\n");

    let geojson_data = r#"
    {
        "type": "Feature",
        "properties": {"name": "North paddy"},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [105.800, 21.000],
                [105.812, 21.000],
                [105.812, 21.010],
                [105.800, 21.010],
                [105.800, 21.000]
            ]]
        }
    }"#;

    for projection in [Projection::WebMercator, Projection::CylindricalEqualArea] {
        let field = FieldGeometry::from_geojson_str(geojson_data, projection)?;
        let measure = field.measure();
        println!(
            "{:?}: {:.2} ha, centroid ({:.5}, {:.5})",
            projection, measure.area_ha, measure.centroid_lon, measure.centroid_lat
        );
    }

    let field = FieldGeometry::from_geojson_str(geojson_data, Projection::default())?;
    let catalog = CropCatalog::new();
    let rice = catalog.get("Rice");

    let et0 = 5.0;
    for ndvi in [0.2, 0.5, 0.8] {
        let kcb = rice.coefficient(ndvi);
        let estimate = IrrigationEstimate::compute(et0, kcb, field.area_ha(), 75.0)?;
        println!(
            "NDVI {:.2} -> Kcb {:.3}, ETc {:.2} mm/day, net {:.1} m³/day, gross {:.1} m³/day",
            ndvi, kcb, estimate.et_crop, estimate.net_m3_per_day, estimate.gross_m3_per_day
        );
    }

    Ok(())
}
