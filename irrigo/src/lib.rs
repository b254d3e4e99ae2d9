//! Irrigation planning for a drawn field.
//!
//! A field boundary becomes an area; weather, reference evapotranspiration
//! and NDVI are fetched from pluggable providers; NDVI maps to a crop
//! coefficient; the result is a net and gross daily irrigation volume.

pub mod agronomy;
pub mod collect;
pub mod commons;
pub mod config;
pub mod error;
pub mod geo_core;
pub mod geometric;
pub mod pipeline;
pub mod series;
pub mod session;
pub mod simulation;

pub use agronomy::crop_profile::{coefficient, CropCatalog, CropProfile};
pub use agronomy::irrigation::{estimate, IrrigationEstimate};
pub use commons::date_range::DateRange;
pub use config::IrrigoConfig;
pub use error::{IrrigoError, Result};
pub use geo_core::{Location, Projection};
pub use geometric::field::FieldGeometry;
pub use pipeline::{EstimateRequest, FieldInput, IrrigationPipeline, IrrigationReport, PipelineError};
pub use series::{VegetationSeries, WeatherSeries};
