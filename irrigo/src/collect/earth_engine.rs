//! Earth Engine REST backend for [`ImageCatalog`].
//!
//! Scenes are listed with `assets:listImages`; reductions are sent as
//! serialized expressions to `value:compute`.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::collect::catalog::{
    Composite, ImageCatalog, PixelIndex, ReductionRequest, Region, SceneQuery, SceneSummary,
};
use crate::collect::global_variables::EARTH_ENGINE_PUBLIC_PROJECT;
use crate::collect::http::{build_client, check_status, send_error};
use crate::config::{EarthEngineConfig, HttpConfig};
use crate::error::{IrrigoError, Result};

const PROVIDER: &str = "Earth Engine";
const PAGE_SIZE: u32 = 1000;
const MAX_PIXELS: f64 = 1e9;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesResponse {
    #[serde(default)]
    images: Vec<EeImage>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EeImage {
    name: String,
    id: Option<String>,
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ComputeResponse {
    result: Value,
}

pub struct EarthEngineCatalog {
    client: Client,
    base_url: String,
    project: String,
    access_token: String,
}

impl EarthEngineCatalog {
    /// Both a cloud project and an access token are required
    pub fn new(config: &EarthEngineConfig, http: &HttpConfig) -> Result<Self> {
        let project = config.project.clone().ok_or_else(|| {
            IrrigoError::Configuration("Earth Engine needs a cloud project".to_string())
        })?;
        let access_token = config.access_token.clone().ok_or_else(|| {
            IrrigoError::Configuration("Earth Engine needs an access token".to_string())
        })?;
        Ok(EarthEngineCatalog {
            client: build_client(http)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project,
            access_token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header("x-goog-user-project", &self.project)
    }

    fn list_images_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/projects/{}/assets/{}:listImages",
            self.base_url,
            EARTH_ENGINE_PUBLIC_PROJECT,
            encode_asset_path(collection)
        )
    }

    fn compute_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/value:compute",
            self.base_url,
            urlencoding::encode(&self.project)
        )
    }
}

impl ImageCatalog for EarthEngineCatalog {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn list_scenes(&self, query: &SceneQuery) -> Result<Vec<SceneSummary>> {
        let url = self.list_images_url(&query.collection);
        let region = region_geojson(&query.region)?.to_string();
        let cloud_property = query.cloud_filter.as_ref().map(|f| f.property.as_str());
        info!(
            collection = %query.collection,
            range = %query.range,
            "listing Earth Engine scenes"
        );

        let mut scenes = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params: Vec<(&str, String)> = vec![
                (
                    "startTime",
                    rfc3339(query.range.start_datetime().and_utc()),
                ),
                (
                    "endTime",
                    rfc3339(query.range.end_exclusive_datetime().and_utc()),
                ),
                ("region", region.clone()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(filter) = &query.cloud_filter {
                params.push((
                    "filter",
                    format!("{} < {}", filter.property, filter.ceiling_pct),
                ));
            }
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response = self
                .authorized(self.client.get(&url))
                .query(&params)
                .send()
                .map_err(|e| send_error(PROVIDER, e))?;
            let body = check_status(PROVIDER, response)?
                .text()
                .map_err(|e| send_error(PROVIDER, e))?;
            let (page, next) = parse_list_images(&body, cloud_property)?;
            scenes.extend(page);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(scenes = scenes.len(), "Earth Engine scenes listed");
        Ok(scenes)
    }

    fn reduce_mean(&self, request: &ReductionRequest) -> Result<Option<f64>> {
        let body = json!({ "expression": reduction_expression(request)? });
        let response = self
            .authorized(self.client.post(self.compute_url()))
            .json(&body)
            .send()
            .map_err(|e| send_error(PROVIDER, e))?;
        let text = check_status(PROVIDER, response)?
            .text()
            .map_err(|e| send_error(PROVIDER, e))?;
        parse_compute_result(&text)
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Percent-encode each segment of an asset id, keeping the separators
fn encode_asset_path(asset: &str) -> String {
    asset
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Region as a GeoJSON geometry for catalog filtering
fn region_geojson(region: &Region) -> Result<Value> {
    match region {
        Region::Point { location, .. } => Ok(json!({
            "type": "Point",
            "coordinates": [location.lon, location.lat],
        })),
        Region::Field(field) => serde_json::to_value(field.to_geojson()).map_err(|e| {
            IrrigoError::Configuration(format!("field cannot be encoded as GeoJSON: {}", e))
        }),
    }
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

fn invoke(function: &str, arguments: Value) -> Value {
    json!({
        "functionInvocationValue": {
            "functionName": function,
            "arguments": arguments,
        }
    })
}

fn region_node(region: &Region) -> Value {
    match region {
        Region::Point { location, buffer_m } => invoke(
            "Geometry.buffer",
            json!({
                "geometry": invoke(
                    "GeometryConstructors.Point",
                    json!({ "coordinates": constant(json!([location.lon, location.lat])) }),
                ),
                "distance": constant(json!(buffer_m)),
            }),
        ),
        Region::Field(field) => {
            let coordinates: Vec<Vec<Vec<[f64; 2]>>> = field
                .geometry()
                .0
                .iter()
                .map(|polygon| {
                    std::iter::once(polygon.exterior())
                        .chain(polygon.interiors())
                        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                        .collect()
                })
                .collect();
            invoke(
                "GeometryConstructors.MultiPolygon",
                json!({ "coordinates": constant(json!(coordinates)) }),
            )
        }
    }
}

/// Band name after compositing; the median reducer suffixes every band
fn composite_band(band: &str, composite: Composite) -> String {
    match composite {
        Composite::Single => band.to_string(),
        Composite::Median => format!("{}_median", band),
    }
}

/// Serialized `value:compute` expression for a spatial-mean reduction
pub fn reduction_expression(request: &ReductionRequest) -> Result<Value> {
    let load = |id: &String| invoke("Image.load", json!({ "id": constant(json!(id)) }));
    let image = match (request.composite, request.scene_ids.as_slice()) {
        (_, []) => {
            return Err(IrrigoError::Configuration(
                "reduction needs at least one scene".to_string(),
            ))
        }
        (Composite::Single, [id]) => load(id),
        (Composite::Single, _) => {
            return Err(IrrigoError::Configuration(
                "a single-scene reduction takes exactly one scene".to_string(),
            ))
        }
        (Composite::Median, ids) => invoke(
            "ImageCollection.reduce",
            json!({
                "collection": invoke(
                    "ImageCollection.fromImages",
                    json!({ "images": { "arrayValue": { "values": ids.iter().map(load).collect::<Vec<_>>() } } }),
                ),
                "reducer": invoke("Reducer.median", json!({})),
            }),
        ),
    };

    let pixels = match &request.index {
        PixelIndex::NormalizedDifference { nir, red } => invoke(
            "Image.normalizedDifference",
            json!({
                "input": image,
                "bandNames": constant(json!([
                    composite_band(nir, request.composite),
                    composite_band(red, request.composite),
                ])),
            }),
        ),
        PixelIndex::Band(band) => invoke(
            "Image.select",
            json!({
                "input": image,
                "bandSelectors": constant(json!([composite_band(band, request.composite)])),
            }),
        ),
    };

    let reduced = invoke(
        "Image.reduceRegion",
        json!({
            "image": pixels,
            "reducer": invoke("Reducer.mean", json!({})),
            "geometry": region_node(&request.region),
            "scale": constant(json!(request.scale_m)),
            "maxPixels": constant(json!(MAX_PIXELS)),
        }),
    );
    Ok(json!({ "result": "0", "values": { "0": reduced } }))
}

/// Scenes of one `listImages` page plus the next page token
fn parse_list_images(
    body: &str,
    cloud_property: Option<&str>,
) -> Result<(Vec<SceneSummary>, Option<String>)> {
    let response: ListImagesResponse = serde_json::from_str(body)
        .map_err(|e| IrrigoError::upstream(PROVIDER, format!("unexpected listImages payload: {}", e)))?;

    let mut scenes = Vec::with_capacity(response.images.len());
    for image in response.images {
        let Some(acquired) = image.start_time else {
            debug!(image = %image.name, "skipping image without start time");
            continue;
        };
        let id = image.id.unwrap_or_else(|| asset_id(&image.name));
        let cloud_cover = cloud_property
            .and_then(|p| image.properties.get(p))
            .and_then(Value::as_f64);
        scenes.push(SceneSummary {
            id,
            acquired,
            cloud_cover,
        });
    }
    Ok((scenes, response.next_page_token))
}

/// `projects/<p>/assets/<id>` to `<id>`
fn asset_id(name: &str) -> String {
    match name.split_once("/assets/") {
        Some((_, id)) => id.to_string(),
        None => name.to_string(),
    }
}

/// First numeric value of the reduced dictionary; nulls mean no valid pixel
pub fn parse_compute_result(body: &str) -> Result<Option<f64>> {
    let response: ComputeResponse = serde_json::from_str(body)
        .map_err(|e| IrrigoError::upstream(PROVIDER, format!("unexpected compute payload: {}", e)))?;
    match response.result {
        Value::Number(n) => Ok(n.as_f64()),
        Value::Null => Ok(None),
        Value::Object(values) => Ok(values.values().find_map(Value::as_f64)),
        other => Err(IrrigoError::upstream(
            PROVIDER,
            format!("compute returned a non-numeric result: {}", other),
        )),
    }
}
