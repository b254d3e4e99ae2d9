//! Crop-growth simulation seam.
//!
//! The pipeline only needs a simulated crop evapotranspiration; any model
//! that can produce one implements [`CropSimulator`].

pub mod spreadsheet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::agronomy::crop_parameters::CropParameters;
use crate::error::Result;
use crate::series::WeatherSeries;

pub use spreadsheet::SpreadsheetSimulator;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationInputs {
    pub weather: WeatherSeries,
    pub planting_date: NaiveDate,
    pub duration_days: u32,
    pub crop: String,
    pub soil_type: String,
    /// Growth-model parameters written alongside the inputs, if the model takes them
    pub crop_parameters: Option<CropParameters>,
}

impl SimulationInputs {
    /// Last simulated day
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.planting_date
            .checked_add_days(chrono::Days::new(u64::from(self.duration_days)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    /// Simulated crop evapotranspiration (mm/day)
    pub et_crop: f64,
}

/// Opaque crop model: inputs in, crop evapotranspiration out.
///
/// An unreachable or misbehaving model is reported as
/// [`IrrigoError::SimulationUnavailable`](crate::error::IrrigoError::SimulationUnavailable).
pub trait CropSimulator {
    fn simulate(&self, inputs: &SimulationInputs) -> Result<SimulationOutput>;
}

impl<T: CropSimulator + ?Sized> CropSimulator for Box<T> {
    fn simulate(&self, inputs: &SimulationInputs) -> Result<SimulationOutput> {
        (**self).simulate(inputs)
    }
}
