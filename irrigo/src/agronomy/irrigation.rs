use serde::{Deserialize, Serialize};

use crate::error::{IrrigoError, Result};

/// 1 mm of water over 1 ha is 10 m³
pub const MM_HA_TO_M3: f64 = 10.0;

/// Crop water use and the irrigation volumes it implies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrigationBreakdown {
    /// Crop evapotranspiration (mm/day)
    pub et_crop: f64,
    /// Water the crop needs (m³/day)
    pub net_m3_per_day: f64,
    /// Net volume adjusted for delivery losses (m³/day)
    pub gross_m3_per_day: f64,
}

/// Full water-balance result, recomputed on every run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrigationEstimate {
    /// Reference evapotranspiration ET₀ (mm/day)
    pub et0: f64,
    /// Basal crop coefficient
    pub kcb: f64,
    /// Crop evapotranspiration (mm/day)
    pub et_crop: f64,
    pub area_ha: f64,
    pub net_m3_per_day: f64,
    pub gross_m3_per_day: f64,
    pub efficiency_pct: f64,
}

/// Efficiency must lie in (0, 100] %
pub fn check_efficiency(efficiency_pct: f64) -> Result<()> {
    if !(efficiency_pct.is_finite() && efficiency_pct > 0.0 && efficiency_pct <= 100.0) {
        return Err(IrrigoError::Configuration(format!(
            "system efficiency must be in (0, 100] %, got {}",
            efficiency_pct
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(IrrigoError::Configuration(format!(
            "{} must be a finite non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Net and gross volumes for a known crop evapotranspiration
pub fn volumes(et_crop: f64, area_ha: f64, efficiency_pct: f64) -> Result<IrrigationBreakdown> {
    check_efficiency(efficiency_pct)?;
    check_non_negative("crop evapotranspiration", et_crop)?;
    check_non_negative("field area", area_ha)?;

    let net = et_crop * area_ha * MM_HA_TO_M3;
    let gross = net / (efficiency_pct / 100.0);
    Ok(IrrigationBreakdown {
        et_crop,
        net_m3_per_day: net,
        gross_m3_per_day: gross,
    })
}

/// `et_crop = et0 * kcb`, then net and gross volumes over the field
pub fn estimate(et0: f64, kcb: f64, area_ha: f64, efficiency_pct: f64) -> Result<IrrigationBreakdown> {
    check_non_negative("reference evapotranspiration", et0)?;
    check_non_negative("crop coefficient", kcb)?;
    volumes(et0 * kcb, area_ha, efficiency_pct)
}

impl IrrigationEstimate {
    pub fn compute(et0: f64, kcb: f64, area_ha: f64, efficiency_pct: f64) -> Result<Self> {
        let breakdown = estimate(et0, kcb, area_ha, efficiency_pct)?;
        Ok(Self::from_breakdown(et0, kcb, area_ha, efficiency_pct, breakdown))
    }

    /// Build from a crop evapotranspiration that did not come from `et0 * kcb`
    /// (a simulated value); `kcb` is still reported for reference.
    pub fn from_et_crop(
        et0: f64,
        kcb: f64,
        et_crop: f64,
        area_ha: f64,
        efficiency_pct: f64,
    ) -> Result<Self> {
        let breakdown = volumes(et_crop, area_ha, efficiency_pct)?;
        Ok(Self::from_breakdown(et0, kcb, area_ha, efficiency_pct, breakdown))
    }

    fn from_breakdown(
        et0: f64,
        kcb: f64,
        area_ha: f64,
        efficiency_pct: f64,
        breakdown: IrrigationBreakdown,
    ) -> Self {
        IrrigationEstimate {
            et0,
            kcb,
            et_crop: breakdown.et_crop,
            area_ha,
            net_m3_per_day: breakdown.net_m3_per_day,
            gross_m3_per_day: breakdown.gross_m3_per_day,
            efficiency_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_worked_example() {
        let b = estimate(5.0, 0.575, 2.0, 75.0).unwrap();
        assert_relative_eq!(b.et_crop, 2.875, epsilon = 1e-12);
        assert_relative_eq!(b.net_m3_per_day, 57.5, epsilon = 1e-9);
        assert_relative_eq!(b.gross_m3_per_day, 76.666_666_666_666_67, epsilon = 1e-9);
    }

    #[test]
    fn test_full_efficiency_is_identity() {
        let b = estimate(4.2, 0.8, 3.5, 100.0).unwrap();
        assert_eq!(b.net_m3_per_day, b.gross_m3_per_day);
    }

    #[test]
    fn test_half_efficiency_doubles_gross() {
        let b = estimate(4.2, 0.8, 3.5, 50.0).unwrap();
        assert_relative_eq!(b.gross_m3_per_day, 2.0 * b.net_m3_per_day);
    }

    #[test]
    fn test_zero_or_negative_efficiency_is_a_configuration_error() {
        for eff in [0.0, -10.0, f64::NAN, 150.0] {
            assert!(matches!(
                estimate(5.0, 0.5, 1.0, eff),
                Err(IrrigoError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_negative_inputs_are_rejected() {
        assert!(estimate(-1.0, 0.5, 1.0, 75.0).is_err());
        assert!(estimate(5.0, 0.5, -1.0, 75.0).is_err());
        assert!(volumes(f64::INFINITY, 1.0, 75.0).is_err());
    }

    #[test]
    fn test_estimate_from_simulated_et_crop() {
        let e = IrrigationEstimate::from_et_crop(5.0, 0.575, 3.2, 1.0, 75.0).unwrap();
        assert_relative_eq!(e.et_crop, 3.2);
        assert_relative_eq!(e.net_m3_per_day, 32.0);
        assert_relative_eq!(e.gross_m3_per_day, 32.0 / 0.75);

        let c = IrrigationEstimate::compute(5.0, 0.575, 2.0, 75.0).unwrap();
        assert_relative_eq!(c.et_crop, 2.875, epsilon = 1e-12);
        assert_eq!(c.efficiency_pct, 75.0);
    }
}
