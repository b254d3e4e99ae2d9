use irrigo::agronomy::crop_profile::CropProfile;
use irrigo::agronomy::irrigation;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Crop profile Python binding
#[pyclass]
#[derive(Clone)]
pub struct PyCropProfile {
    pub(crate) inner: CropProfile,
}

#[pymethods]
impl PyCropProfile {
    #[new]
    #[pyo3(signature = (name, kcb_max, kcb_min, vi_max, vi_min, eta = 1.0))]
    fn new(
        name: String,
        kcb_max: f64,
        kcb_min: f64,
        vi_max: f64,
        vi_min: f64,
        eta: f64,
    ) -> PyResult<Self> {
        CropProfile::new(name, kcb_max, kcb_min, vi_max, vi_min, eta)
            .map(|inner| PyCropProfile { inner })
            .map_err(|e| PyValueError::new_err(format!("Invalid crop profile: {}", e)))
    }

    #[staticmethod]
    fn rice() -> Self {
        PyCropProfile {
            inner: CropProfile::rice(),
        }
    }

    #[staticmethod]
    fn custom() -> Self {
        PyCropProfile {
            inner: CropProfile::custom(),
        }
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name().to_string()
    }

    #[getter]
    fn kcb_max(&self) -> f64 {
        self.inner.kcb_max()
    }

    #[getter]
    fn kcb_min(&self) -> f64 {
        self.inner.kcb_min()
    }

    #[getter]
    fn vi_max(&self) -> f64 {
        self.inner.vi_max()
    }

    #[getter]
    fn vi_min(&self) -> f64 {
        self.inner.vi_min()
    }

    #[getter]
    fn eta(&self) -> f64 {
        self.inner.eta()
    }

    /// Basal crop coefficient for an NDVI value
    fn coefficient(&self, ndvi: f64) -> f64 {
        self.inner.coefficient(ndvi)
    }

    fn __repr__(&self) -> String {
        format!(
            "CropProfile(name='{}', kcb=[{}, {}], vi=[{}, {}], eta={})",
            self.inner.name(),
            self.inner.kcb_min(),
            self.inner.kcb_max(),
            self.inner.vi_min(),
            self.inner.vi_max(),
            self.inner.eta()
        )
    }
}

/// (et_crop, net_m3_per_day, gross_m3_per_day)
#[pyfunction]
#[pyo3(signature = (et0, kcb, area_ha, efficiency_pct = 75.0))]
pub fn estimate(et0: f64, kcb: f64, area_ha: f64, efficiency_pct: f64) -> PyResult<(f64, f64, f64)> {
    irrigation::estimate(et0, kcb, area_ha, efficiency_pct)
        .map(|b| (b.et_crop, b.net_m3_per_day, b.gross_m3_per_day))
        .map_err(|e| PyValueError::new_err(format!("Failed to estimate irrigation: {}", e)))
}
