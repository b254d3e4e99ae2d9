use pyo3::prelude::*;

mod bindings;

use bindings::{PyCropProfile, PyFieldGeometry, PyIrrigationPipeline};

/// Python bindings for irrigo

#[pymodule]
fn pyirrigo(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFieldGeometry>()?;
    m.add_class::<PyCropProfile>()?;
    m.add_class::<PyIrrigationPipeline>()?;
    // Add aliases for Pythonic API
    m.setattr("FieldGeometry", m.getattr("PyFieldGeometry")?)?;
    m.setattr("CropProfile", m.getattr("PyCropProfile")?)?;
    m.setattr("IrrigationPipeline", m.getattr("PyIrrigationPipeline")?)?;

    m.add_function(wrap_pyfunction!(bindings::crop::estimate, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::pipeline::fetch_weather, m)?)?;

    m.add(
        "__doc__",
        "Python bindings for irrigo - field area, NDVI crop coefficient and irrigation estimates",
    )?;

    Ok(())
}
