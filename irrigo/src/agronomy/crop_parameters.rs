use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{IrrigoError, Result};

/// AquaCrop paddy rice defaults, by parameter name
const PADDY_RICE_DEFAULTS: &[(&str, f64)] = &[
    ("Aer", -1e10),
    ("LagAer", 1e10),
    ("CCx", 0.95),
    ("CDC", -9.0),
    ("CDC_CD", 0.0933),
    ("CGC", -9.0),
    ("CGC_CD", 0.12257),
    ("CalendarType", 1.0),
    ("CropType", 3.0),
    ("Determinant", 1.0),
    ("ETadj", 1.0),
    ("Emergence", -9.0),
    ("EmergenceCD", 3.0),
    ("Flowering", -9.0),
    ("FloweringCD", 19.0),
    ("GDD_lo", 0.0),
    ("GDD_up", 10.0),
    ("GDDmethod", 3.0),
    ("HI0", 0.43),
    ("HIstart", -9.0),
    ("HIstartCD", 65.0),
    ("Kcb", 1.1),
    ("Maturity", -9.0),
    ("MaturityCD", 104.0),
    ("MaxRooting", -9.0),
    ("MaxRootingCD", 21.0),
    ("PlantMethod", 0.0),
    ("PlantPop", 1_000_000.0),
    ("PolColdStress", 1.0),
    ("PolHeatStress", 1.0),
    ("SeedSize", 6.0),
    ("Senescence", -9.0),
    ("SenescenceCD", 73.0),
    ("SwitchGDD", 0.0),
    ("SxBotQ", 0.012),
    ("SxTopQ", 0.048),
    ("Tbase", 8.0),
    ("Tmax_lo", 40.0),
    ("Tmax_up", 35.0),
    ("Tmin_lo", 3.0),
    ("Tmin_up", 8.0),
    ("TrColdStress", 1.0),
    ("Tupp", 30.0),
    ("WP", 19.0),
    ("WPy", 100.0),
    ("YldForm", -9.0),
    ("YldFormCD", 36.0),
    ("YldWC", 90.0),
    ("Zmax", 0.5),
    ("Zmin", 0.3),
    ("a_HI", 10.0),
    ("b_HI", 7.0),
    ("dHI0", 15.0),
    ("dHI_pre", 0.0),
    ("exc", 100.0),
    ("fage", 0.15),
    ("fshape_r", 2.5),
    ("fshape_w1", 3.0),
    ("fshape_w2", 3.0),
    ("fshape_w3", 3.0),
    ("fshape_w4", 1.0),
    ("fsink", 0.5),
    ("p_lo1", 0.4),
    ("p_lo2", 1.0),
    ("p_lo3", 1.0),
    ("p_lo4", 1.0),
    ("p_up1", 0.0),
    ("p_up2", 0.5),
    ("p_up3", 0.55),
    ("p_up4", 0.75),
];

/// Growth-model crop parameter set handed to the external simulator.
///
/// Starts from a known default table; only parameters of that table can
/// be overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropParameters {
    pub name: String,
    values: BTreeMap<String, f64>,
}

impl CropParameters {
    pub fn paddy_rice() -> Self {
        CropParameters {
            name: "PaddyRice".to_string(),
            values: PADDY_RICE_DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn set(&mut self, key: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(IrrigoError::Configuration(format!(
                "crop parameter {} must be finite",
                key
            )));
        }
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(IrrigoError::Configuration(format!(
                "unknown crop parameter '{}' for {}",
                key, self.name
            ))),
        }
    }

    /// Apply several overrides, all or nothing
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (key, value) in overrides {
            self.set(key, value)?;
        }
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
