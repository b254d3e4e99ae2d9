// Python bindings module
// Each file contains one or more PyO3 #[pyclass] definitions

pub mod crop;
pub mod field;
pub mod pipeline;

pub use crop::PyCropProfile;
pub use field::PyFieldGeometry;
pub use pipeline::PyIrrigationPipeline;

use pyo3::prelude::*;

/// Serialize through JSON and decode with Python's `json` module
pub(crate) fn to_python<T: serde::Serialize>(py: Python, value: &T) -> PyResult<Py<PyAny>> {
    let json_str = serde_json::to_string(value).map_err(|e| {
        pyo3::exceptions::PyValueError::new_err(format!("Failed to encode result: {}", e))
    })?;
    let json = py.import("json")?;
    let decoded: Bound<PyAny> = json.call_method1("loads", (json_str,))?;
    Ok(decoded.unbind())
}
