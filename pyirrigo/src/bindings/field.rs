use irrigo::geo_core::Projection;
use irrigo::geometric::field::FieldGeometry;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::bindings::to_python;

pub(crate) fn parse_projection(name: &str) -> PyResult<Projection> {
    match name {
        "web_mercator" => Ok(Projection::WebMercator),
        "cylindrical_equal_area" => Ok(Projection::CylindricalEqualArea),
        other => Err(PyValueError::new_err(format!(
            "Unknown projection '{}', expected 'web_mercator' or 'cylindrical_equal_area'",
            other
        ))),
    }
}

/// Field boundary Python binding
#[pyclass]
pub struct PyFieldGeometry {
    pub(crate) inner: FieldGeometry,
}

#[pymethods]
impl PyFieldGeometry {
    /// Build from a GeoJSON string (Geometry, Feature or FeatureCollection)
    #[new]
    #[pyo3(signature = (geojson, projection = "web_mercator"))]
    fn new(geojson: &str, projection: &str) -> PyResult<Self> {
        let projection = parse_projection(projection)?;
        FieldGeometry::from_geojson_str(geojson, projection)
            .map(|inner| PyFieldGeometry { inner })
            .map_err(|e| PyValueError::new_err(format!("Invalid field: {}", e)))
    }

    #[getter]
    fn area_ha(&self) -> f64 {
        self.inner.area_ha()
    }

    #[getter]
    fn area_m2(&self) -> f64 {
        self.inner.area_m2()
    }

    /// (lon, lat)
    #[getter]
    fn centroid(&self) -> (f64, f64) {
        let c = self.inner.centroid();
        (c.x(), c.y())
    }

    /// (min_x, min_y, max_x, max_y) in degrees
    #[getter]
    fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.inner
            .bbox()
            .map(|b| (b.min_x, b.min_y, b.max_x, b.max_y))
    }

    fn measure(&self, py: Python) -> PyResult<Py<PyAny>> {
        to_python(py, &self.inner.measure())
    }

    fn get_geojson(&self, py: Python) -> PyResult<Py<PyAny>> {
        to_python(py, &self.inner.to_geojson())
    }

    fn __repr__(&self) -> String {
        let c = self.inner.centroid();
        format!(
            "FieldGeometry(area_ha={:.4}, centroid=({:.6}, {:.6}))",
            self.inner.area_ha(),
            c.x(),
            c.y()
        )
    }
}
