//! Spreadsheet crop model driven through an external automation program.
//!
//! The program receives one JSON request on stdin: the workbook path, the
//! cells to write, a recalculation flag and the cell to read back. It
//! answers `{"value": <number>}` on stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::{CropSimulator, SimulationInputs, SimulationOutput};
use crate::config::{CellRef, SpreadsheetConfig};
use crate::error::{IrrigoError, Result};

/// One workbook application instance; concurrent runs would clobber each other's cells
static WORKBOOK_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWrite {
    pub sheet: String,
    pub cell: String,
    pub value: Value,
}

impl CellWrite {
    fn new(target: &CellRef, value: impl Into<Value>) -> Self {
        CellWrite {
            sheet: target.sheet.clone(),
            cell: target.cell.clone(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationRequest<'a> {
    pub workbook: &'a Path,
    pub writes: Vec<CellWrite>,
    pub recalculate: bool,
    pub read: &'a CellRef,
}

#[derive(Debug, Deserialize)]
struct AutomationResponse {
    value: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpreadsheetSimulator {
    config: SpreadsheetConfig,
}

impl SpreadsheetSimulator {
    pub fn new(config: SpreadsheetConfig) -> Self {
        SpreadsheetSimulator { config }
    }

    pub fn workbook(&self) -> &PathBuf {
        &self.config.workbook
    }

    /// Cell writes for one run, in the workbook's fixed layout
    pub fn build_request(&self, inputs: &SimulationInputs) -> Result<AutomationRequest<'_>> {
        let layout = &self.config.layout;
        let end = inputs.end_date().ok_or_else(|| {
            IrrigoError::Configuration(format!(
                "simulation end overflows after {} + {} days",
                inputs.planting_date, inputs.duration_days
            ))
        })?;
        let weather_csv = inputs.weather.to_csv()?;

        let mut writes = vec![
            CellWrite::new(
                &layout.planting_date,
                inputs.planting_date.format("%Y/%m/%d").to_string(),
            ),
            CellWrite::new(&layout.crop_type, inputs.crop.clone()),
            CellWrite::new(&layout.weather_csv, weather_csv),
            CellWrite::new(&layout.soil_type, inputs.soil_type.clone()),
            CellWrite::new(&layout.simulation_end, end.format("%Y/%m/%d").to_string()),
        ];

        if let (Some(sheet), Some(parameters)) =
            (&layout.crop_parameters_sheet, &inputs.crop_parameters)
        {
            writes.push(CellWrite::new(&CellRef::new(sheet, "A1"), "Parameter"));
            writes.push(CellWrite::new(&CellRef::new(sheet, "B1"), "Value"));
            for (row, (name, value)) in parameters.iter().enumerate() {
                let row = row + 2;
                writes.push(CellWrite::new(&CellRef::new(sheet, &format!("A{}", row)), name));
                writes.push(CellWrite::new(&CellRef::new(sheet, &format!("B{}", row)), value));
            }
        }

        Ok(AutomationRequest {
            workbook: &self.config.workbook,
            writes,
            recalculate: true,
            read: &layout.et_crop,
        })
    }

    fn run(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let program = &self.config.program;
        let unavailable = |what: String| IrrigoError::SimulationUnavailable(what);

        let mut child = Command::new(program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(format!("cannot start {}: {}", program.display(), e)))?;

        // Stdin is fed from its own thread; the program may write stdout before reading
        let stdin = child.stdin.take();
        let (output, sent) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => match stdin.write_all(payload) {
                    // Program quit without reading; its exit status is checked below
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                },
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output = output
            .map_err(|e| unavailable(format!("{} did not finish: {}", program.display(), e)))?;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(unavailable(format!("cannot send request: {}", e))),
            Err(_) => return Err(unavailable("request writer panicked".to_string())),
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

/// Crop evapotranspiration from the automation program's answer
pub fn parse_response(stdout: &[u8]) -> Result<SimulationOutput> {
    let response: AutomationResponse = serde_json::from_slice(stdout).map_err(|e| {
        IrrigoError::SimulationUnavailable(format!("malformed simulator answer: {}", e))
    })?;
    if let Some(message) = response.error {
        return Err(IrrigoError::SimulationUnavailable(message));
    }
    match response.value {
        Some(et_crop) if et_crop.is_finite() && et_crop >= 0.0 => Ok(SimulationOutput { et_crop }),
        Some(other) => Err(IrrigoError::SimulationUnavailable(format!(
            "simulated crop evapotranspiration is not usable: {}",
            other
        ))),
        None => Err(IrrigoError::SimulationUnavailable(
            "output cell is empty".to_string(),
        )),
    }
}

impl CropSimulator for SpreadsheetSimulator {
    fn simulate(&self, inputs: &SimulationInputs) -> Result<SimulationOutput> {
        if !self.config.workbook.is_file() {
            return Err(IrrigoError::SimulationUnavailable(format!(
                "workbook {} not found",
                self.config.workbook.display()
            )));
        }
        let request = self.build_request(inputs)?;
        let payload = serde_json::to_vec(&request).map_err(|e| {
            IrrigoError::SimulationUnavailable(format!("cannot encode request: {}", e))
        })?;

        let _guard = WORKBOOK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        info!(
            workbook = %self.config.workbook.display(),
            crop = %inputs.crop,
            planting = %inputs.planting_date,
            days = inputs.duration_days,
            "running spreadsheet crop model"
        );
        let stdout = self.run(&payload)?;
        let output = parse_response(&stdout)?;
        debug!(et_crop = output.et_crop, "spreadsheet crop model answered");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agronomy::crop_parameters::CropParameters;
    use crate::config::CellLayout;
    use crate::series::{WeatherRecord, WeatherSeries};
    use chrono::NaiveDate;

    fn inputs() -> SimulationInputs {
        let mut weather = WeatherSeries::new();
        weather
            .insert(
                NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                WeatherRecord {
                    tmax: Some(33.0),
                    tmin: Some(25.0),
                    ..Default::default()
                },
            )
            .unwrap();
        SimulationInputs {
            weather,
            planting_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            duration_days: 120,
            crop: "Rice".to_string(),
            soil_type: "Loam".to_string(),
            crop_parameters: None,
        }
    }

    fn simulator(program: &str, args: &[&str], workbook: PathBuf) -> SpreadsheetSimulator {
        SpreadsheetSimulator::new(SpreadsheetConfig {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
            workbook,
            layout: CellLayout::default(),
        })
    }

    #[test]
    fn test_request_layout() {
        let sim = simulator("runner", &[], PathBuf::from("Aquacrop_Model.xlsx"));
        let inputs = inputs();
        let request = sim.build_request(&inputs).unwrap();

        assert!(request.recalculate);
        assert_eq!(request.read, &CellRef::new("Outputs", "B2"));
        assert_eq!(request.writes.len(), 5);
        assert_eq!(request.writes[0].cell, "B2");
        assert_eq!(request.writes[0].value, Value::from("2023/06/01"));
        assert_eq!(request.writes[1].value, Value::from("Rice"));
        assert!(request.writes[2]
            .value
            .as_str()
            .unwrap()
            .starts_with("Date,Tmax,Tmin"));
        assert_eq!(request.writes[3].value, Value::from("Loam"));
        assert_eq!(request.writes[4].value, Value::from("2023/09/29"));
    }

    #[test]
    fn test_crop_parameter_rows() {
        let mut config = SpreadsheetConfig {
            program: PathBuf::from("runner"),
            args: Vec::new(),
            workbook: PathBuf::from("model.xlsx"),
            layout: CellLayout::default(),
        };
        config.layout.crop_parameters_sheet = Some("Crop".to_string());
        let sim = SpreadsheetSimulator::new(config);

        let mut inputs = inputs();
        inputs.crop_parameters = Some(CropParameters::paddy_rice());
        let request = sim.build_request(&inputs).unwrap();
        let rows = inputs.crop_parameters.as_ref().unwrap().len();
        assert_eq!(request.writes.len(), 5 + 2 + 2 * rows);
        assert!(request
            .writes
            .iter()
            .any(|w| w.sheet == "Crop" && w.value == Value::from("Kcb")));
    }

    #[test]
    fn test_missing_workbook_is_unavailable() {
        let sim = simulator("runner", &[], PathBuf::from("/nonexistent/model.xlsx"));
        assert!(matches!(
            sim.simulate(&inputs()),
            Err(IrrigoError::SimulationUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let workbook = tempfile::NamedTempFile::new().unwrap();
        let sim = simulator(
            "/nonexistent/spreadsheet-runner",
            &[],
            workbook.path().to_path_buf(),
        );
        assert!(matches!(
            sim.simulate(&inputs()),
            Err(IrrigoError::SimulationUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_answer_is_read_back() {
        let workbook = tempfile::NamedTempFile::new().unwrap();
        let sim = simulator(
            "/bin/sh",
            &["-c", r#"cat > /dev/null; echo '{"value": 4.2}'"#],
            workbook.path().to_path_buf(),
        );
        let output = sim.simulate(&inputs()).unwrap();
        assert_eq!(output.et_crop, 4.2);
    }

    #[cfg(unix)]
    #[test]
    fn test_large_request_with_chatty_program() {
        let workbook = tempfile::NamedTempFile::new().unwrap();
        let sim = simulator(
            "/bin/sh",
            &[
                "-c",
                r#"head -c 300000 /dev/zero | tr '\000' ' '; cat > /dev/null; echo '{"value": 2.5}'"#,
            ],
            workbook.path().to_path_buf(),
        );

        let mut inputs = inputs();
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        for day in start.iter_days().take(5000) {
            inputs
                .weather
                .insert(
                    day,
                    WeatherRecord {
                        tmax: Some(31.5),
                        tmin: Some(24.5),
                        precipitation: Some(1.25),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let payload = serde_json::to_vec(&sim.build_request(&inputs).unwrap()).unwrap();
        assert!(payload.len() > 128 * 1024);

        let output = sim.simulate(&inputs).unwrap();
        assert_eq!(output.et_crop, 2.5);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_unavailable() {
        let workbook = tempfile::NamedTempFile::new().unwrap();
        let sim = simulator(
            "/bin/sh",
            &["-c", "cat > /dev/null; echo 'Excel not found' >&2; exit 3"],
            workbook.path().to_path_buf(),
        );
        let err = sim.simulate(&inputs()).unwrap_err();
        assert!(matches!(err, IrrigoError::SimulationUnavailable(ref m) if m.contains("Excel not found")));
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(parse_response(br#"{"value": 3.5}"#).unwrap().et_crop, 3.5);
        assert!(parse_response(br#"{"value": null}"#).is_err());
        assert!(parse_response(br#"{"value": -1.0}"#).is_err());
        assert!(parse_response(br#"{"error": "sheet Outputs missing"}"#).is_err());
        assert!(parse_response(b"Traceback (most recent call last)").is_err());
    }
}
