use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{IrrigoError, Result};

/// Inclusive calendar date range bounding every external query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = IrrigoError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Fails with a configuration error when `end < start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(IrrigoError::Configuration(format!(
                "date range ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(DateRange { start, end })
    }

    /// Range of `days` days starting at `start` (`days >= 1`)
    pub fn starting_at(start: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(IrrigoError::Configuration(
                "date range must cover at least one day".to_string(),
            ));
        }
        let end = start
            .checked_add_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| IrrigoError::Configuration(format!("date overflow after {}", start)))?;
        DateRange::new(start, end)
    }

    /// Parse two `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| IrrigoError::Configuration(format!("invalid date '{}': {}", s, e)))
        };
        DateRange::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days, both ends included
    pub fn num_days(&self) -> u32 {
        // Bounded by the NaiveDate range, fits in u32
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// First instant of the range
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN)
    }

    /// First instant of the last day
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.end.and_time(chrono::NaiveTime::MIN)
    }

    /// First instant after the range, for APIs with exclusive upper bounds
    pub fn end_exclusive_datetime(&self) -> NaiveDateTime {
        self.end
            .succ_opt()
            .unwrap_or(self.end)
            .and_time(chrono::NaiveTime::MIN)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        assert!(matches!(
            DateRange::new(d(2023, 6, 10), d(2023, 6, 1)),
            Err(IrrigoError::Configuration(_))
        ));
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(d(2023, 6, 1), d(2023, 6, 1)).unwrap();
        assert_eq!(range.num_days(), 1);
        assert_eq!(range.days().collect::<Vec<_>>(), vec![d(2023, 6, 1)]);
    }

    #[test]
    fn test_days_are_inclusive() {
        let range = DateRange::parse("2023-06-01", "2023-06-10").unwrap();
        assert_eq!(range.num_days(), 10);
        assert_eq!(range.days().count(), 10);
        assert_eq!(range.days().last(), Some(d(2023, 6, 10)));
        assert!(range.contains(d(2023, 6, 10)));
        assert!(!range.contains(d(2023, 6, 11)));
    }

    #[test]
    fn test_starting_at() {
        let range = DateRange::starting_at(d(2023, 6, 1), 120).unwrap();
        assert_eq!(range.end(), d(2023, 9, 28));
        assert!(DateRange::starting_at(d(2023, 6, 1), 0).is_err());
    }

    #[test]
    fn test_exclusive_end_is_next_midnight() {
        let range = DateRange::parse("2023-06-01", "2023-06-10").unwrap();
        assert_eq!(
            range.end_exclusive_datetime(),
            d(2023, 6, 11).and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: DateRange =
            serde_json::from_str(r#"{"start": "2023-06-01", "end": "2023-06-02"}"#).unwrap();
        assert_eq!(ok.num_days(), 2);
        let bad: std::result::Result<DateRange, _> =
            serde_json::from_str(r#"{"start": "2023-06-03", "end": "2023-06-02"}"#);
        assert!(bad.is_err());
    }
}
