use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::commons::basic_functions::mean;
use crate::error::{IrrigoError, Result};

/// Daily weather variables. Every field is optional: providers only
/// deliver a subset and fill values are dropped rather than stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Daily maximum air temperature (°C)
    pub tmax: Option<f64>,
    /// Daily minimum air temperature (°C)
    pub tmin: Option<f64>,
    /// Precipitation (mm/day)
    pub precipitation: Option<f64>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Solar radiation, in the provider's unit
    pub solar_radiation: Option<f64>,
    /// Reference evapotranspiration ET₀ (mm/day)
    pub et0: Option<f64>,
}

impl WeatherRecord {
    pub fn is_empty(&self) -> bool {
        self.tmax.is_none()
            && self.tmin.is_none()
            && self.precipitation.is_none()
            && self.wind_speed.is_none()
            && self.solar_radiation.is_none()
            && self.et0.is_none()
    }
}

/// Daily weather table keyed by calendar date.
///
/// One record per day; days a provider did not deliver are absent, never
/// null-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSeries {
    records: BTreeMap<NaiveDate, WeatherRecord>,
}

impl WeatherSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a day; empty records are skipped. A second record for the
    /// same day is a provider error.
    pub fn insert(&mut self, date: NaiveDate, record: WeatherRecord) -> Result<()> {
        if record.is_empty() {
            return Ok(());
        }
        if self.records.contains_key(&date) {
            return Err(IrrigoError::Configuration(format!(
                "duplicate weather record for {}",
                date
            )));
        }
        self.records.insert(date, record);
        Ok(())
    }

    pub fn get(&self, date: NaiveDate) -> Option<&WeatherRecord> {
        self.records.get(&date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &WeatherRecord)> {
        self.records.iter()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.keys().next_back().copied()
    }

    /// Mean daily ET₀ over the days that carry one
    pub fn mean_et0(&self) -> Option<f64> {
        mean(self.records.values().filter_map(|r| r.et0))
    }

    /// Write the table as CSV with a `Date` index column
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let fmt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        let encode_err = |e: csv::Error| IrrigoError::Configuration(format!("CSV encoding failed: {}", e));

        writer
            .write_record(["Date", "Tmax", "Tmin", "Precip", "Wind", "SolarRad", "ET0"])
            .map_err(encode_err)?;
        for (date, r) in &self.records {
            writer
                .write_record([
                    date.format("%Y-%m-%d").to_string(),
                    fmt(r.tmax),
                    fmt(r.tmin),
                    fmt(r.precipitation),
                    fmt(r.wind_speed),
                    fmt(r.solar_radiation),
                    fmt(r.et0),
                ])
                .map_err(encode_err)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| IrrigoError::Configuration(format!("CSV encoding failed: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| IrrigoError::Configuration(format!("CSV is not UTF-8: {}", e)))
    }
}

/// One vegetation-index (or soil-moisture) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VegetationRecord {
    pub date: NaiveDate,
    pub value: f64,
}

/// Date-ordered scalar series (NDVI or soil moisture).
///
/// Days without a qualifying scene are absent, not interpolated. A
/// per-scene series may hold several records for the same day; a
/// per-day composite series holds at most one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VegetationSeries {
    records: Vec<VegetationRecord>,
}

impl VegetationSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from unordered records; order is by date, stable within a day.
    /// Non-finite values are dropped.
    pub fn from_records(mut records: Vec<VegetationRecord>) -> Self {
        records.retain(|r| r.value.is_finite());
        records.sort_by_key(|r| r.date);
        VegetationSeries { records }
    }

    pub fn push(&mut self, date: NaiveDate, value: f64) {
        if !value.is_finite() {
            return;
        }
        let index = self.records.partition_point(|r| r.date <= date);
        self.records.insert(index, VegetationRecord { date, value });
    }

    pub fn records(&self) -> &[VegetationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when no calendar day appears twice
    pub fn is_daily_unique(&self) -> bool {
        self.records.windows(2).all(|w| w[0].date != w[1].date)
    }

    pub fn mean(&self) -> Option<f64> {
        mean(self.records.iter().map(|r| r.value))
    }

    pub fn latest(&self) -> Option<&VegetationRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, day).unwrap()
    }

    #[test]
    fn test_weather_series_rejects_duplicates_and_skips_empty() {
        let mut series = WeatherSeries::new();
        series.insert(d(1), WeatherRecord::default()).unwrap();
        assert!(series.is_empty());

        let record = WeatherRecord {
            tmax: Some(31.0),
            ..Default::default()
        };
        series.insert(d(1), record).unwrap();
        assert!(series.insert(d(1), record).is_err());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_rejected_duplicate_keeps_first_record() {
        let mut series = WeatherSeries::new();
        series
            .insert(d(1), WeatherRecord { tmax: Some(30.0), ..Default::default() })
            .unwrap();
        let err = series
            .insert(d(1), WeatherRecord { tmax: Some(31.0), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, IrrigoError::Configuration(_)));
        assert_eq!(series.get(d(1)).and_then(|r| r.tmax), Some(30.0));
    }

    #[test]
    fn test_mean_et0_ignores_days_without_et0() {
        let mut series = WeatherSeries::new();
        series
            .insert(d(1), WeatherRecord { et0: Some(4.0), ..Default::default() })
            .unwrap();
        series
            .insert(d(2), WeatherRecord { et0: Some(6.0), ..Default::default() })
            .unwrap();
        series
            .insert(d(3), WeatherRecord { tmax: Some(30.0), ..Default::default() })
            .unwrap();
        assert_relative_eq!(series.mean_et0().unwrap(), 5.0);
        assert_eq!(series.first_date(), Some(d(1)));
        assert_eq!(series.last_date(), Some(d(3)));
    }

    #[test]
    fn test_weather_csv_layout() {
        let mut series = WeatherSeries::new();
        series
            .insert(
                d(2),
                WeatherRecord {
                    tmax: Some(31.5),
                    tmin: Some(24.0),
                    precipitation: Some(0.0),
                    ..Default::default()
                },
            )
            .unwrap();
        let csv = series.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,Tmax,Tmin,Precip,Wind,SolarRad,ET0"));
        assert_eq!(lines.next(), Some("2023-06-02,31.5,24,0,,,"));
    }

    #[test]
    fn test_vegetation_series_ordering_and_uniqueness() {
        let mut series = VegetationSeries::from_records(vec![
            VegetationRecord { date: d(5), value: 0.6 },
            VegetationRecord { date: d(1), value: 0.4 },
            VegetationRecord { date: d(3), value: f64::NAN },
        ]);
        assert_eq!(series.len(), 2);
        assert!(series.is_daily_unique());

        series.push(d(5), 0.7);
        assert!(!series.is_daily_unique());
        assert_eq!(series.records()[2].value, 0.7);
        assert_eq!(series.latest().map(|r| r.date), Some(d(5)));
    }
}
