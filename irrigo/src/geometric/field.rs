use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{
    BoundingRect, Centroid, Contains, Coord, Geometry as GeoGeometry, Line, LineString,
    MultiPolygon, Point, Polygon, Relate,
};
use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IrrigoError, Result};
use crate::geo_core::{planar_area_m2, BoundingBox, GeoCore, Projection};

/// Square meters per hectare
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// A field boundary drawn on the map, in WGS84 lon/lat.
///
/// Immutable once built: a redraw produces a new `FieldGeometry`. The
/// boundary is validated on construction so a `FieldGeometry` always has
/// a strictly positive projected area.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGeometry {
    geometry: MultiPolygon<f64>,
    geo_core: GeoCore,
    area_m2: f64,
    centroid: Point<f64>,
}

/// Area and centroid of a field, as returned to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldMeasure {
    pub area_m2: f64,
    pub area_ha: f64,
    pub centroid_lon: f64,
    pub centroid_lat: f64,
}

impl FieldGeometry {
    /// Build a field from a lon/lat multipolygon, measured with the given projection
    pub fn new(geometry: MultiPolygon<f64>, projection: Projection) -> Result<Self> {
        let geo_core = GeoCore::new(projection);
        validate(&geometry)?;

        let projected = geo_core.project_multipolygon(&geometry)?;
        let area_m2 = planar_area_m2(&projected);
        if !area_m2.is_finite() || area_m2 <= f64::EPSILON {
            return Err(IrrigoError::Geometry(format!(
                "field has no measurable area ({} m²)",
                area_m2
            )));
        }

        // The centroid stays geographic: it only positions point queries
        let centroid = geometry
            .centroid()
            .ok_or_else(|| IrrigoError::Geometry("field has no centroid".to_string()))?;

        debug!(
            parts = geometry.0.len(),
            area_m2,
            lon = centroid.x(),
            lat = centroid.y(),
            "field measured"
        );

        Ok(FieldGeometry {
            geometry,
            geo_core,
            area_m2,
            centroid,
        })
    }

    pub fn from_polygon(polygon: Polygon<f64>, projection: Projection) -> Result<Self> {
        Self::new(MultiPolygon::new(vec![polygon]), projection)
    }

    /// Parse a drawn boundary.
    ///
    /// Accepts a bare Geometry, a Feature, or a FeatureCollection (the
    /// first feature carrying a polygon is used).
    pub fn from_geojson(geojson: &GeoJson, projection: Projection) -> Result<Self> {
        let geometry = match geojson {
            GeoJson::Geometry(geometry) => geometry.clone(),
            GeoJson::Feature(feature) => feature
                .geometry
                .clone()
                .ok_or_else(|| IrrigoError::Geometry("feature has no geometry".to_string()))?,
            GeoJson::FeatureCollection(fc) => fc
                .features
                .iter()
                .filter_map(|feature| feature.geometry.as_ref())
                .find(|geometry| {
                    matches!(
                        geometry.value,
                        geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
                    )
                })
                .cloned()
                .ok_or_else(|| {
                    IrrigoError::Geometry("feature collection holds no polygon".to_string())
                })?,
        };

        let geo_geom: GeoGeometry<f64> = geometry
            .value
            .try_into()
            .map_err(|e| IrrigoError::Geometry(format!("unreadable GeoJSON geometry: {}", e)))?;

        let multipolygon = match geo_geom {
            GeoGeometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            GeoGeometry::MultiPolygon(mp) => mp,
            other => {
                return Err(IrrigoError::Geometry(format!(
                    "expected a Polygon or MultiPolygon, got {}",
                    geometry_kind(&other)
                )))
            }
        };

        Self::new(multipolygon, projection)
    }

    pub fn from_geojson_str(content: &str, projection: Projection) -> Result<Self> {
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| IrrigoError::Geometry(format!("invalid GeoJSON: {}", e)))?;
        Self::from_geojson(&geojson, projection)
    }

    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    pub fn area_ha(&self) -> f64 {
        self.area_m2 / M2_PER_HECTARE
    }

    /// Geographic centroid (lon/lat)
    pub fn centroid(&self) -> Point<f64> {
        self.centroid
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn projection(&self) -> Projection {
        self.geo_core.get_projection()
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.geometry.bounding_rect().map(BoundingBox::from)
    }

    pub fn measure(&self) -> FieldMeasure {
        FieldMeasure {
            area_m2: self.area_m2,
            area_ha: self.area_ha(),
            centroid_lon: self.centroid.x(),
            centroid_lat: self.centroid.y(),
        }
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.geometry))
    }
}

fn geometry_kind(geometry: &GeoGeometry<f64>) -> &'static str {
    match geometry {
        GeoGeometry::Point(_) => "Point",
        GeoGeometry::Line(_) => "Line",
        GeoGeometry::LineString(_) => "LineString",
        GeoGeometry::Polygon(_) => "Polygon",
        GeoGeometry::MultiPoint(_) => "MultiPoint",
        GeoGeometry::MultiLineString(_) => "MultiLineString",
        GeoGeometry::MultiPolygon(_) => "MultiPolygon",
        GeoGeometry::GeometryCollection(_) => "GeometryCollection",
        GeoGeometry::Rect(_) => "Rect",
        GeoGeometry::Triangle(_) => "Triangle",
    }
}

fn validate(geometry: &MultiPolygon<f64>) -> Result<()> {
    if geometry.0.is_empty() {
        return Err(IrrigoError::Geometry("empty geometry".to_string()));
    }
    for (index, polygon) in geometry.iter().enumerate() {
        validate_ring(polygon.exterior(), index)?;
        for interior in polygon.interiors() {
            validate_ring(interior, index)?;
        }
        validate_holes(polygon, index)?;
    }

    // Parts may share a boundary but never land (DE-9IM interior/interior)
    for (i, first) in geometry.iter().enumerate() {
        for (j, second) in geometry.iter().enumerate().skip(i + 1) {
            let overlapping = first
                .relate(second)
                .matches("T********")
                .unwrap_or(true);
            if overlapping {
                return Err(IrrigoError::Geometry(format!(
                    "parts {} and {} overlap",
                    i, j
                )));
            }
        }
    }
    Ok(())
}

/// Holes must lie strictly inside the exterior and apart from each other.
/// Rings may not touch, not even at a single vertex.
fn validate_holes(polygon: &Polygon<f64>, part: usize) -> Result<()> {
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();

    for (i, first) in rings.iter().enumerate() {
        for (j, second) in rings.iter().enumerate().skip(i + 1) {
            let crossing = first.lines().any(|a| {
                second
                    .lines()
                    .any(|b| line_intersection(a, b).is_some())
            });
            if crossing {
                return Err(IrrigoError::Geometry(format!(
                    "part {} is self-intersecting (rings {} and {} cross)",
                    part, i, j
                )));
            }
        }
    }

    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    let shells: Vec<Polygon<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| Polygon::new(ring.clone(), vec![]))
        .collect();
    for (i, hole) in polygon.interiors().iter().enumerate() {
        // Rings do not cross, so one vertex decides containment
        let Some(vertex) = hole.0.first().copied().map(Point::from) else {
            continue;
        };
        if !shell.contains(&vertex) {
            return Err(IrrigoError::Geometry(format!(
                "part {} has hole {} outside its boundary",
                part, i
            )));
        }
        if shells
            .iter()
            .enumerate()
            .any(|(k, other)| k != i && other.contains(&vertex))
        {
            return Err(IrrigoError::Geometry(format!(
                "part {} has hole {} nested in another hole",
                part, i
            )));
        }
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>, part: usize) -> Result<()> {
    for c in ring.coords() {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(IrrigoError::Geometry(format!(
                "part {} has a non-finite coordinate",
                part
            )));
        }
        if c.x.abs() > 180.0 || c.y.abs() > 90.0 {
            return Err(IrrigoError::Geometry(format!(
                "part {} has coordinate ({}, {}) outside lon/lat range",
                part, c.x, c.y
            )));
        }
    }

    // Closed ring with repeated vertices collapsed
    let mut vertices: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if vertices.last() != Some(c) {
            vertices.push(*c);
        }
    }
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 3 {
        return Err(IrrigoError::Geometry(format!(
            "part {} has {} distinct vertices, at least 3 are needed",
            part,
            vertices.len()
        )));
    }

    if let Some((i, j)) = first_self_intersection(&vertices) {
        return Err(IrrigoError::Geometry(format!(
            "part {} is self-intersecting (edges {} and {})",
            part, i, j
        )));
    }
    Ok(())
}

/// First pair of ring edges that cross or overlap, if any.
/// Neighbouring edges may only touch at their shared vertex.
fn first_self_intersection(vertices: &[Coord<f64>]) -> Option<(usize, usize)> {
    let n = vertices.len();
    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(vertices[i], vertices[(i + 1) % n]))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return Some((i, j)),
            }
        }
    }
    None
}
