use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{IrrigoError, Result};

/// Name of the fallback profile used for unknown crops
pub const CUSTOM_CROP: &str = "Custom";
/// Name of the default profile
pub const RICE_CROP: &str = "Rice";

/// Parameters mapping a vegetation index to a basal crop coefficient.
///
/// `Kcb = (Kcb_max - Kcb_min) * ratio^eta + Kcb_min`, with
/// `ratio = (VI - VI_min) / (VI_max - VI_min)` and VI clamped into
/// `[VI_min, VI_max]`. A profile can only be built with
/// `VI_max > VI_min` and `eta > 0`, so the mapping is total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCropProfile")]
pub struct CropProfile {
    name: String,
    kcb_max: f64,
    kcb_min: f64,
    vi_max: f64,
    vi_min: f64,
    eta: f64,
}

#[derive(Deserialize)]
struct RawCropProfile {
    name: String,
    kcb_max: f64,
    kcb_min: f64,
    vi_max: f64,
    vi_min: f64,
    eta: f64,
}

impl TryFrom<RawCropProfile> for CropProfile {
    type Error = IrrigoError;

    fn try_from(raw: RawCropProfile) -> Result<Self> {
        CropProfile::new(raw.name, raw.kcb_max, raw.kcb_min, raw.vi_max, raw.vi_min, raw.eta)
    }
}

impl CropProfile {
    pub fn new(
        name: impl Into<String>,
        kcb_max: f64,
        kcb_min: f64,
        vi_max: f64,
        vi_min: f64,
        eta: f64,
    ) -> Result<Self> {
        let name = name.into();
        for (field, value) in [
            ("kcb_max", kcb_max),
            ("kcb_min", kcb_min),
            ("vi_max", vi_max),
            ("vi_min", vi_min),
            ("eta", eta),
        ] {
            if !value.is_finite() {
                return Err(IrrigoError::Configuration(format!(
                    "crop profile '{}': {} is not finite",
                    name, field
                )));
            }
        }
        if vi_max <= vi_min {
            return Err(IrrigoError::Configuration(format!(
                "crop profile '{}': VI_max ({}) must be greater than VI_min ({})",
                name, vi_max, vi_min
            )));
        }
        if eta <= 0.0 {
            return Err(IrrigoError::Configuration(format!(
                "crop profile '{}': eta must be positive, got {}",
                name, eta
            )));
        }
        Ok(CropProfile {
            name,
            kcb_max,
            kcb_min,
            vi_max,
            vi_min,
            eta,
        })
    }

    /// Paddy rice reference points
    pub fn rice() -> Self {
        Self::builtin(RICE_CROP)
    }

    /// Generic fallback, same reference points as rice
    pub fn custom() -> Self {
        Self::builtin(CUSTOM_CROP)
    }

    fn builtin(name: &str) -> Self {
        CropProfile {
            name: name.to_string(),
            kcb_max: 1.00,
            kcb_min: 0.15,
            vi_max: 0.90,
            vi_min: 0.10,
            eta: 1.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kcb_max(&self) -> f64 {
        self.kcb_max
    }

    pub fn kcb_min(&self) -> f64 {
        self.kcb_min
    }

    pub fn vi_max(&self) -> f64 {
        self.vi_max
    }

    pub fn vi_min(&self) -> f64 {
        self.vi_min
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// Basal crop coefficient for an NDVI value.
    /// NaN propagates; every real input is clamped into range.
    pub fn coefficient(&self, ndvi: f64) -> f64 {
        let clamped = ndvi.clamp(self.vi_min, self.vi_max);
        let ratio = (clamped - self.vi_min) / (self.vi_max - self.vi_min);
        (self.kcb_max - self.kcb_min) * ratio.powf(self.eta) + self.kcb_min
    }
}

/// Free-function form of [`CropProfile::coefficient`]
pub fn coefficient(ndvi: f64, profile: &CropProfile) -> f64 {
    profile.coefficient(ndvi)
}

/// Named crop profiles; lookups of unknown names fall back to "Custom".
#[derive(Debug, Clone)]
pub struct CropCatalog {
    custom: CropProfile,
    profiles: BTreeMap<String, CropProfile>,
}

impl Default for CropCatalog {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(RICE_CROP.to_string(), CropProfile::rice());
        CropCatalog {
            custom: CropProfile::custom(),
            profiles,
        }
    }
}

impl CropCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in profiles plus `extra`; an extra profile replaces a built-in of the same name
    pub fn with_profiles<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = CropProfile>,
    {
        let mut catalog = Self::default();
        for profile in extra {
            catalog.insert(profile);
        }
        catalog
    }

    pub fn insert(&mut self, profile: CropProfile) {
        if profile.name == CUSTOM_CROP {
            self.custom = profile;
        } else {
            self.profiles.insert(profile.name.clone(), profile);
        }
    }

    /// Exact-name lookup
    pub fn find(&self, name: &str) -> Option<&CropProfile> {
        if name == CUSTOM_CROP {
            return Some(&self.custom);
        }
        self.profiles.get(name)
    }

    /// Profile for `name`, or the "Custom" profile when the crop is unknown
    pub fn get(&self, name: &str) -> &CropProfile {
        self.find(name).unwrap_or_else(|| {
            tracing::debug!(crop = name, "unknown crop, using the Custom profile");
            &self.custom
        })
    }

    /// Sorted profile names, "Custom" included
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.push(CUSTOM_CROP);
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rice_midpoint() {
        let rice = CropProfile::rice();
        assert_relative_eq!(rice.coefficient(0.50), 0.575, epsilon = 1e-12);
        assert_relative_eq!(coefficient(0.50, &rice), 0.15 + 0.85 * (0.40 / 0.80));
    }

    #[test]
    fn test_clamped_at_both_ends() {
        let rice = CropProfile::rice();
        assert_eq!(rice.coefficient(0.10), rice.kcb_min());
        assert_eq!(rice.coefficient(-0.4), rice.kcb_min());
        assert_relative_eq!(rice.coefficient(0.90), rice.kcb_max());
        assert_relative_eq!(rice.coefficient(1.0), rice.kcb_max());
        assert_relative_eq!(rice.coefficient(f64::INFINITY), rice.kcb_max());
    }

    #[test]
    fn test_monotonic_for_positive_eta() {
        for eta in [0.5, 1.0, 2.3] {
            let profile = CropProfile::new("Test", 1.2, 0.2, 0.85, 0.15, eta).unwrap();
            let mut previous = f64::NEG_INFINITY;
            for step in -10..=110 {
                let kcb = profile.coefficient(step as f64 / 100.0);
                assert!(kcb >= previous, "eta {} not monotonic at {}", eta, step);
                previous = kcb;
            }
        }
    }

    #[test]
    fn test_degenerate_profiles_are_configuration_errors() {
        assert!(matches!(
            CropProfile::new("Flat", 1.0, 0.15, 0.5, 0.5, 1.0),
            Err(IrrigoError::Configuration(_))
        ));
        assert!(CropProfile::new("Inverted", 1.0, 0.15, 0.1, 0.9, 1.0).is_err());
        assert!(CropProfile::new("NoShape", 1.0, 0.15, 0.9, 0.1, 0.0).is_err());
        assert!(CropProfile::new("Nan", f64::NAN, 0.15, 0.9, 0.1, 1.0).is_err());
    }

    #[test]
    fn test_unknown_crop_falls_back_to_custom() {
        let catalog = CropCatalog::new();
        assert_eq!(catalog.get("Rice").name(), "Rice");
        assert_eq!(catalog.get("Quinoa").name(), "Custom");
        assert!(catalog.find("Quinoa").is_none());
    }

    #[test]
    fn test_extra_profiles() {
        let maize = CropProfile::new("Maize", 1.15, 0.15, 0.85, 0.15, 1.2).unwrap();
        let catalog = CropCatalog::with_profiles(vec![maize.clone()]);
        assert_eq!(catalog.get("Maize"), &maize);
        assert_eq!(catalog.names(), vec!["Custom", "Maize", "Rice"]);
    }
}
