use irrigo::agronomy::crop_profile::{CropCatalog, CropProfile};
use irrigo::agronomy::irrigation::IrrigationEstimate;
use irrigo::geo_core::Projection;
use irrigo::geometric::field::{FieldGeometry, FieldMeasure};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module with panic hook
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn parse_projection(name: Option<String>) -> Result<Projection, String> {
    match name.as_deref() {
        None | Some("web_mercator") => Ok(Projection::WebMercator),
        Some("cylindrical_equal_area") => Ok(Projection::CylindricalEqualArea),
        Some(other) => Err(format!("unknown projection '{}'", other)),
    }
}

/// Drawn field boundary
#[wasm_bindgen]
pub struct WasmField {
    inner: FieldGeometry,
}

impl WasmField {
    fn parse(geojson_str: &str, projection: Option<String>) -> Result<Self, String> {
        let projection = parse_projection(projection)?;
        FieldGeometry::from_geojson_str(geojson_str, projection)
            .map(|inner| WasmField { inner })
            .map_err(|e| e.to_string())
    }
}

#[wasm_bindgen]
impl WasmField {
    /// Parse a GeoJSON Geometry, Feature or FeatureCollection
    #[wasm_bindgen]
    pub fn from_geojson(geojson_str: &str, projection: Option<String>) -> Result<WasmField, JsValue> {
        Self::parse(geojson_str, projection).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen]
    pub fn area_ha(&self) -> f64 {
        self.inner.area_ha()
    }

    #[wasm_bindgen]
    pub fn area_m2(&self) -> f64 {
        self.inner.area_m2()
    }

    /// [lon, lat]
    #[wasm_bindgen]
    pub fn centroid(&self) -> Vec<f64> {
        let c = self.inner.centroid();
        vec![c.x(), c.y()]
    }

    /// { area_m2, area_ha, centroid_lon, centroid_lat }
    #[wasm_bindgen]
    pub fn measure(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.measure())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen]
    pub fn to_geojson(&self) -> String {
        geojson::GeoJson::Geometry(self.inner.to_geojson()).to_string()
    }
}

/// Profile given as JSON, or a built-in crop by name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CropSpec {
    Profile(CropProfile),
    Name(String),
}

fn resolve_crop(crop: Option<&str>) -> Result<CropProfile, String> {
    let catalog = CropCatalog::new();
    match crop {
        None => Ok(catalog.get("Rice").clone()),
        Some(text) => match serde_json::from_str::<CropSpec>(text) {
            Ok(CropSpec::Profile(profile)) => Ok(profile),
            Ok(CropSpec::Name(name)) => Ok(catalog.get(&name).clone()),
            // A bare name is not valid JSON
            Err(_) if !text.trim_start().starts_with('{') => Ok(catalog.get(text.trim()).clone()),
            Err(e) => Err(format!("invalid crop profile: {}", e)),
        },
    }
}

/// Crop coefficient for an NDVI value; `crop` is a name or a profile JSON
#[wasm_bindgen]
pub fn crop_coefficient(ndvi: f64, crop: Option<String>) -> Result<f64, JsValue> {
    resolve_crop(crop.as_deref())
        .map(|profile| profile.coefficient(ndvi))
        .map_err(|e| JsValue::from_str(&e))
}

#[derive(Debug, Serialize)]
struct FieldEstimate {
    field: FieldMeasure,
    crop: String,
    ndvi: f64,
    estimate: IrrigationEstimate,
}

fn field_estimate(
    field: &FieldGeometry,
    et0: f64,
    ndvi: f64,
    efficiency_pct: f64,
    crop: Option<&str>,
) -> Result<FieldEstimate, String> {
    let profile = resolve_crop(crop)?;
    let kcb = profile.coefficient(ndvi);
    let estimate = IrrigationEstimate::compute(et0, kcb, field.area_ha(), efficiency_pct)
        .map_err(|e| e.to_string())?;
    Ok(FieldEstimate {
        field: field.measure(),
        crop: profile.name().to_string(),
        ndvi,
        estimate,
    })
}

/// Irrigation estimate from values already fetched by the page
#[wasm_bindgen]
pub fn irrigation_estimate(
    field: &WasmField,
    et0: f64,
    ndvi: f64,
    efficiency_pct: f64,
    crop: Option<String>,
) -> Result<JsValue, JsValue> {
    let result = field_estimate(&field.inner, et0, ndvi, efficiency_pct, crop.as_deref())
        .map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&result).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SQUARE: &str = r#"{"type": "Polygon", "coordinates": [[
        [105.80, 21.00], [105.81, 21.00], [105.81, 21.01], [105.80, 21.01], [105.80, 21.00]
    ]]}"#;

    #[test]
    fn test_parse_field() {
        let field = WasmField::parse(SQUARE, None).unwrap();
        assert!(field.area_ha() > 0.0);
        assert_relative_eq!(field.centroid()[0], 105.805, epsilon = 1e-9);
        assert!(WasmField::parse(SQUARE, Some("plate_carree".to_string())).is_err());
        assert!(WasmField::parse(r#"{"type": "Point", "coordinates": [0, 0]}"#, None).is_err());
    }

    #[test]
    fn test_resolve_crop() {
        assert_eq!(resolve_crop(None).unwrap().name(), "Rice");
        assert_eq!(resolve_crop(Some("Quinoa")).unwrap().name(), "Custom");
        assert_eq!(resolve_crop(Some("\"Rice\"")).unwrap().name(), "Rice");
        let maize = r#"{"name": "Maize", "kcb_max": 1.15, "kcb_min": 0.15,
                        "vi_max": 0.85, "vi_min": 0.15, "eta": 1.2}"#;
        assert_eq!(resolve_crop(Some(maize)).unwrap().name(), "Maize");
        let flat = r#"{"name": "Flat", "kcb_max": 1.0, "kcb_min": 0.15,
                       "vi_max": 0.5, "vi_min": 0.5, "eta": 1.0}"#;
        assert!(resolve_crop(Some(flat)).is_err());
    }

    #[test]
    fn test_field_estimate() {
        let field = WasmField::parse(SQUARE, None).unwrap();
        let result = field_estimate(&field.inner, 5.0, 0.5, 75.0, None).unwrap();
        assert_relative_eq!(result.estimate.kcb, 0.575, epsilon = 1e-12);
        assert_relative_eq!(
            result.estimate.gross_m3_per_day,
            result.estimate.net_m3_per_day / 0.75,
            epsilon = 1e-9
        );
        assert!(field_estimate(&field.inner, 5.0, 0.5, 0.0, None).is_err());
    }
}
