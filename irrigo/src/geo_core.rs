use geo::{Area, Coord, MapCoords, MultiPolygon, Point, Rect};
#[cfg(feature = "proj")]
use proj::Proj;
use serde::{Deserialize, Serialize};

use crate::error::{IrrigoError, Result};

/// WGS84 semi-major axis, used as the sphere radius of EPSG:3857
pub const WEB_MERCATOR_RADIUS_M: f64 = 6_378_137.0;
/// Radius of the sphere with the same surface as the WGS84 ellipsoid
pub const AUTHALIC_RADIUS_M: f64 = 6_371_007.181;
/// Latitude where EPSG:3857 is cut off
pub const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;
/// Standard parallel of the cylindrical equal-area projection (as EASE-Grid 2.0)
pub const EQUAL_AREA_STANDARD_PARALLEL: f64 = 30.0;

/// Planar reference system a field is measured in.
///
/// Areas are never measured in geographic degrees: the boundary is
/// first projected, then measured in square meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Spherical Web Mercator (EPSG:3857)
    #[default]
    WebMercator,
    /// Lambert cylindrical equal-area on the authalic sphere, standard parallel 30°
    CylindricalEqualArea,
    /// Any EPSG code known to libproj
    #[cfg(feature = "proj")]
    Epsg(i32),
}

/// CRS handling for field geometries.
/// Input coordinates are always WGS84 longitude/latitude (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoCore {
    pub projection: Projection,
}

impl GeoCore {
    pub fn new(projection: Projection) -> Self {
        GeoCore { projection }
    }

    pub fn get_projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    /// Project a single lon/lat coordinate to planar meters
    pub fn project(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        match self.projection {
            Projection::WebMercator => web_mercator(coord),
            Projection::CylindricalEqualArea => cylindrical_equal_area(coord),
            #[cfg(feature = "proj")]
            Projection::Epsg(code) => {
                let (x, y) = Self::transform_coords(4326, code, coord.x, coord.y)?;
                Ok(Coord { x, y })
            }
        }
    }

    /// Project every vertex of a lon/lat multipolygon to planar meters
    pub fn project_multipolygon(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        match self.projection {
            #[cfg(feature = "proj")]
            Projection::Epsg(code) => {
                let proj = epsg_transformer(4326, code)?;
                geometry.try_map_coords(|c| {
                    proj.convert((c.x, c.y))
                        .map(|(x, y)| Coord { x, y })
                        .map_err(|e| IrrigoError::Geometry(format!("reprojection failed: {}", e)))
                })
            }
            _ => {
                let core = *self;
                geometry.try_map_coords(move |c| core.project(c))
            }
        }
    }

    /// Transform coordinates from one CRS to another
    #[cfg(feature = "proj")]
    pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
        let proj = epsg_transformer(from_epsg, to_epsg)?;
        proj.convert((x, y))
            .map_err(|e| IrrigoError::Geometry(format!("failed to transform coordinates: {}", e)))
    }
}

#[cfg(feature = "proj")]
fn epsg_transformer(from_epsg: i32, to_epsg: i32) -> Result<Proj> {
    let from_crs = format!("EPSG:{}", from_epsg);
    let to_crs = format!("EPSG:{}", to_epsg);
    Proj::new_known_crs(&from_crs, &to_crs, None).map_err(|e| {
        IrrigoError::Configuration(format!(
            "failed to create transformation {} -> {}: {}",
            from_crs, to_crs, e
        ))
    })
}

fn web_mercator(coord: Coord<f64>) -> Result<Coord<f64>> {
    if coord.y.abs() > WEB_MERCATOR_MAX_LAT {
        return Err(IrrigoError::Geometry(format!(
            "latitude {} is outside the Web Mercator domain",
            coord.y
        )));
    }
    let lambda = coord.x.to_radians();
    let phi = coord.y.to_radians();
    Ok(Coord {
        x: WEB_MERCATOR_RADIUS_M * lambda,
        y: WEB_MERCATOR_RADIUS_M * (std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln(),
    })
}

fn cylindrical_equal_area(coord: Coord<f64>) -> Result<Coord<f64>> {
    let cos_ts = EQUAL_AREA_STANDARD_PARALLEL.to_radians().cos();
    Ok(Coord {
        x: AUTHALIC_RADIUS_M * coord.x.to_radians() * cos_ts,
        y: AUTHALIC_RADIUS_M * coord.y.to_radians().sin() / cos_ts,
    })
}

/// Planar area of an already projected multipolygon; parts are summed.
pub fn planar_area_m2(projected: &MultiPolygon<f64>) -> f64 {
    projected.iter().map(|polygon| polygon.unsigned_area()).sum()
}

/// A WGS84 point used to position point queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !(lon.is_finite() && lat.is_finite()) || lon.abs() > 180.0 || lat.abs() > 90.0 {
            return Err(IrrigoError::Configuration(format!(
                "location ({}, {}) is not a valid lon/lat pair",
                lon, lat
            )));
        }
        Ok(Location { lon, lat })
    }
}

impl From<Location> for Point<f64> {
    fn from(location: Location) -> Self {
        Point::new(location.lon, location.lat)
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Polygon};

    fn square(size: f64) -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: size, y: 0.0),
            (x: size, y: size),
            (x: 0.0, y: size),
        ]
    }

    #[test]
    fn test_geo_core_default() {
        let gc = GeoCore::default();
        assert_eq!(gc.get_projection(), Projection::WebMercator);
    }

    #[test]
    fn test_web_mercator_origin_and_known_point() {
        let gc = GeoCore::default();
        let origin = gc.project(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert_relative_eq!(origin.x, 0.0);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-6);

        // 180°E sits on the half circumference
        let east = gc.project(Coord { x: 180.0, y: 0.0 }).unwrap();
        assert_relative_eq!(east.x, 20_037_508.342_789_244, epsilon = 1e-6);
    }

    #[test]
    fn test_web_mercator_rejects_poles() {
        let gc = GeoCore::default();
        assert!(matches!(
            gc.project(Coord { x: 0.0, y: 89.0 }),
            Err(IrrigoError::Geometry(_))
        ));
    }

    #[test]
    fn test_equal_area_preserves_cell_area_across_latitudes() {
        let gc = GeoCore::new(Projection::CylindricalEqualArea);
        let cell = |lat: f64| {
            let mp = MultiPolygon::new(vec![polygon![
                (x: 10.0, y: lat),
                (x: 10.01, y: lat),
                (x: 10.01, y: lat + 0.01),
                (x: 10.0, y: lat + 0.01),
            ]]);
            planar_area_m2(&gc.project_multipolygon(&mp).unwrap())
        };
        // Same angular cell shrinks with cos(lat) on the sphere, not with 1/cos²
        let ratio = cell(60.0) / cell(0.0);
        assert_relative_eq!(ratio, 60f64.to_radians().cos(), epsilon = 1e-3);
    }

    #[test]
    fn test_planar_area_scales_quadratically() {
        let small = MultiPolygon::new(vec![square(100.0)]);
        let large = MultiPolygon::new(vec![square(200.0)]);
        assert_relative_eq!(planar_area_m2(&small), 10_000.0);
        assert_relative_eq!(planar_area_m2(&large), 4.0 * planar_area_m2(&small));
    }

    #[test]
    fn test_planar_area_sums_parts() {
        let mut second = square(50.0);
        second.exterior_mut(|ring| {
            for c in ring.0.iter_mut() {
                c.x += 1000.0;
            }
        });
        let mp = MultiPolygon::new(vec![square(100.0), second]);
        assert_relative_eq!(planar_area_m2(&mp), 10_000.0 + 2_500.0);
    }

    #[test]
    fn test_location_range() {
        assert!(Location::new(105.0, 10.0).is_ok());
        assert!(Location::new(200.0, 10.0).is_err());
        assert!(Location::new(105.0, f64::NAN).is_err());
    }

    #[test]
    fn test_bounding_box() {
        let bbox: BoundingBox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(bbox.min_x, 0.0);
        assert_eq!(bbox.max_x, 1.0);
        assert_eq!(bbox.as_array(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[cfg(feature = "proj")]
    #[test]
    fn test_transform_coords() {
        // May fail if proj data is not installed
        let result = GeoCore::transform_coords(4326, 3857, 2.0, 48.0);
        if let Ok((x, y)) = result {
            assert!(x.is_finite());
            assert!(y.is_finite());
        }
    }
}
