//! Daily weather providers.
//!
//! Both backends return the same [`WeatherSeries`] shape; swapping one for
//! the other does not change anything downstream.

#[cfg(feature = "reqwest")]
pub mod meteostat;
#[cfg(feature = "reqwest")]
pub mod nasa_power;

use crate::commons::date_range::DateRange;
use crate::error::Result;
use crate::geo_core::Location;
use crate::series::WeatherSeries;

/// A source of daily weather at a point.
///
/// Implementations return a non-empty series,
/// [`IrrigoError::DataUnavailable`](crate::error::IrrigoError::DataUnavailable)
/// when the provider had nothing for the range, or
/// [`IrrigoError::UpstreamFailure`](crate::error::IrrigoError::UpstreamFailure)
/// when the request or its payload failed.
pub trait ClimateGateway {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    fn fetch_series(&self, location: Location, range: &DateRange) -> Result<WeatherSeries>;
}

impl<T: ClimateGateway + ?Sized> ClimateGateway for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fetch_series(&self, location: Location, range: &DateRange) -> Result<WeatherSeries> {
        (**self).fetch_series(location, range)
    }
}

/// Daily variables a provider can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherVariable {
    Tmax,
    Tmin,
    Precipitation,
    WindSpeed,
    SolarRadiation,
    ReferenceEt,
}

impl WeatherVariable {
    /// Temperature, precipitation, wind and radiation
    pub const WEATHER: [WeatherVariable; 5] = [
        WeatherVariable::Tmax,
        WeatherVariable::Tmin,
        WeatherVariable::Precipitation,
        WeatherVariable::WindSpeed,
        WeatherVariable::SolarRadiation,
    ];

    pub(crate) fn assign(self, record: &mut crate::series::WeatherRecord, value: f64) {
        let slot = match self {
            WeatherVariable::Tmax => &mut record.tmax,
            WeatherVariable::Tmin => &mut record.tmin,
            WeatherVariable::Precipitation => &mut record.precipitation,
            WeatherVariable::WindSpeed => &mut record.wind_speed,
            WeatherVariable::SolarRadiation => &mut record.solar_radiation,
            WeatherVariable::ReferenceEt => &mut record.et0,
        };
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::WeatherRecord;

    #[test]
    fn test_assign_sets_only_one_field() {
        let mut record = WeatherRecord::default();
        WeatherVariable::ReferenceEt.assign(&mut record, 4.5);
        assert_eq!(record.et0, Some(4.5));
        assert!(record.tmax.is_none());
        assert!(!record.is_empty());
    }
}
