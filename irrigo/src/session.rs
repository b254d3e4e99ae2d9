//! Per-user session record.
//!
//! Holds the drawn field, the last fetched series and the current view.
//! Redrawing the field discards everything derived from the old one.

use serde::{Deserialize, Serialize};

use crate::commons::date_range::DateRange;
use crate::error::IrrigoError;
use crate::geometric::field::FieldGeometry;
use crate::pipeline::{
    EstimateRequest, FieldInput, IrrigationPipeline, IrrigationReport, PipelineError,
    RequiredInput, SimulationPlan,
};
use crate::series::{VegetationSeries, WeatherSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Map,
    Results,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    field: Option<FieldGeometry>,
    weather: Option<WeatherSeries>,
    vegetation: Option<VegetationSeries>,
    last_report: Option<IrrigationReport>,
    view: View,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the field; derived data from the previous one is dropped
    pub fn draw(&mut self, field: FieldGeometry) {
        self.field = Some(field);
        self.weather = None;
        self.vegetation = None;
        self.last_report = None;
        self.view = View::Map;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn field(&self) -> Option<&FieldGeometry> {
        self.field.as_ref()
    }

    pub fn weather(&self) -> Option<&WeatherSeries> {
        self.weather.as_ref()
    }

    pub fn vegetation(&self) -> Option<&VegetationSeries> {
        self.vegetation.as_ref()
    }

    pub fn last_report(&self) -> Option<&IrrigationReport> {
        self.last_report.as_ref()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn show_map(&mut self) {
        self.view = View::Map;
    }

    /// Switch to results; only possible once a report exists
    pub fn show_results(&mut self) -> bool {
        if self.last_report.is_some() {
            self.view = View::Results;
        }
        self.view == View::Results
    }

    fn drawn_field(&self) -> Result<FieldInput, PipelineError> {
        let field = self.field.clone().ok_or_else(|| PipelineError::MissingInput {
            input: RequiredInput::FieldArea,
            source: IrrigoError::Geometry("no field has been drawn".to_string()),
        })?;
        Ok(FieldInput::Drawn(field))
    }

    /// Fetch and keep the NDVI series of the drawn field
    pub fn fetch_vegetation(
        &mut self,
        pipeline: &IrrigationPipeline,
        range: DateRange,
    ) -> Result<&VegetationSeries, PipelineError> {
        let series = pipeline.vegetation_series(&self.drawn_field()?, &range)?;
        Ok(&*self.vegetation.insert(series))
    }

    /// Run the pipeline on the drawn field and keep the report.
    /// A failed run leaves the previous report and view untouched.
    pub fn estimate(
        &mut self,
        pipeline: &IrrigationPipeline,
        range: DateRange,
        simulation: Option<SimulationPlan>,
    ) -> Result<&IrrigationReport, PipelineError> {
        let mut request = EstimateRequest::new(self.drawn_field()?, range);
        request.simulation = simulation;

        let report = pipeline.run(&request)?;
        self.weather = Some(report.weather.clone());
        self.view = View::Results;
        Ok(&*self.last_report.insert(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::catalog::Region;
    use crate::collect::climate::ClimateGateway;
    use crate::config::PipelineSettings;
    use crate::error::Result;
    use crate::geo_core::{Location, Projection};
    use crate::geometric::vegetation::VegetationGateway;
    use crate::series::WeatherRecord;
    use chrono::NaiveDate;
    use geo::polygon;

    struct Constant(f64);

    impl ClimateGateway for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn fetch_series(&self, _location: Location, range: &DateRange) -> Result<WeatherSeries> {
            let mut series = WeatherSeries::new();
            for day in range.days() {
                series.insert(
                    day,
                    WeatherRecord {
                        tmax: Some(30.0),
                        et0: Some(self.0),
                        ..Default::default()
                    },
                )?;
            }
            Ok(series)
        }
    }

    impl VegetationGateway for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn fetch_series(&self, _region: &Region, range: &DateRange) -> Result<VegetationSeries> {
            let mut series = VegetationSeries::new();
            for day in range.days().step_by(3) {
                series.push(day, self.0);
            }
            Ok(series)
        }

        fn fetch_value(&self, _region: &Region, _range: &DateRange) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn pipeline() -> IrrigationPipeline {
        IrrigationPipeline::new(
            Box::new(Constant(5.0)),
            Box::new(Constant(5.0)),
            Box::new(Constant(0.5)),
            PipelineSettings::default(),
        )
    }

    fn field(offset: f64) -> FieldGeometry {
        FieldGeometry::from_polygon(
            polygon![
                (x: 105.80 + offset, y: 21.00),
                (x: 105.81 + offset, y: 21.00),
                (x: 105.81 + offset, y: 21.01),
                (x: 105.80 + offset, y: 21.01),
            ],
            Projection::WebMercator,
        )
        .unwrap()
    }

    fn june() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 7).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_estimate_requires_a_field() {
        let mut session = Session::new();
        let err = session.estimate(&pipeline(), june(), None).unwrap_err();
        assert_eq!(err.missing_input(), Some(RequiredInput::FieldArea));
        assert_eq!(session.view(), View::Map);
        assert!(!session.show_results());
    }

    #[test]
    fn test_estimate_then_redraw_clears_results() {
        let mut session = Session::new();
        session.draw(field(0.0));
        let area = session.estimate(&pipeline(), june(), None).unwrap().field.area_ha;
        assert!(area > 0.0);
        assert_eq!(session.view(), View::Results);
        assert_eq!(session.weather().map(|w| w.len()), Some(7));

        session.show_map();
        assert!(session.show_results());

        session.draw(field(0.1));
        assert!(session.last_report().is_none());
        assert!(session.weather().is_none());
        assert_eq!(session.view(), View::Map);
    }

    #[test]
    fn test_fetched_vegetation_is_kept_until_redraw() {
        let mut session = Session::new();
        let err = session.fetch_vegetation(&pipeline(), june()).unwrap_err();
        assert_eq!(err.missing_input(), Some(RequiredInput::FieldArea));

        session.draw(field(0.0));
        let records = session.fetch_vegetation(&pipeline(), june()).unwrap().len();
        assert_eq!(records, 3);
        assert_eq!(session.vegetation().and_then(|s| s.mean()), Some(0.5));

        session.draw(field(0.1));
        assert!(session.vegetation().is_none());
    }
}
