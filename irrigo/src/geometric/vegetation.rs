//! Vegetation index and soil moisture series from an image catalog.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::collect::catalog::{
    CloudFilter, Composite, ImageCatalog, PixelIndex, ReductionRequest, Region, SceneQuery,
    SceneSummary,
};
use crate::commons::date_range::DateRange;
use crate::config::{EarthEngineConfig, SoilMoistureConfig};
use crate::error::{IrrigoError, Result};
use crate::series::VegetationSeries;

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// How a time series is built from the surviving scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStrategy {
    /// Median composite of each day's scenes, at most one value per day
    #[default]
    PerDayComposite,
    /// One value per scene, same-day scenes kept side by side
    PerScene,
}

impl FromStr for SeriesStrategy {
    type Err = IrrigoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_day_composite" | "per_day" | "composite" => Ok(SeriesStrategy::PerDayComposite),
            "per_scene" | "scene" => Ok(SeriesStrategy::PerScene),
            other => Err(IrrigoError::Configuration(format!(
                "unknown series strategy '{}'",
                other
            ))),
        }
    }
}

/// Source of a scalar index series over a region.
///
/// `fetch_series` distinguishes "nothing matched" (an empty series) from
/// a failed query (an error). `fetch_value` needs a value, so an empty
/// match is [`IrrigoError::DataUnavailable`] there.
pub trait VegetationGateway {
    fn name(&self) -> &'static str;

    fn fetch_series(&self, region: &Region, range: &DateRange) -> Result<VegetationSeries>;

    /// Mean over the region of the first qualifying scene in the range
    fn fetch_value(&self, region: &Region, range: &DateRange) -> Result<f64>;
}

impl<T: VegetationGateway + ?Sized> VegetationGateway for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fetch_series(&self, region: &Region, range: &DateRange) -> Result<VegetationSeries> {
        (**self).fetch_series(region, range)
    }

    fn fetch_value(&self, region: &Region, range: &DateRange) -> Result<f64> {
        (**self).fetch_value(region, range)
    }
}

/// What is measured, and from which collection
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSource {
    pub label: &'static str,
    pub collection: String,
    pub index: PixelIndex,
    pub cloud_filter: Option<CloudFilter>,
    pub scale_m: f64,
}

impl IndexSource {
    /// Sentinel-2 NDVI with the cloudy-pixel filter
    pub fn ndvi(config: &EarthEngineConfig) -> Self {
        IndexSource {
            label: "NDVI",
            collection: config.collection.clone(),
            index: PixelIndex::NormalizedDifference {
                nir: config.nir_band.clone(),
                red: config.red_band.clone(),
            },
            cloud_filter: Some(CloudFilter {
                property: config.cloud_property.clone(),
                ceiling_pct: config.cloud_ceiling_pct,
            }),
            scale_m: config.scale_m,
        }
    }

    /// Single soil-moisture band, no cloud filter
    pub fn soil_moisture(config: &SoilMoistureConfig) -> Self {
        IndexSource {
            label: "soil moisture",
            collection: config.collection.clone(),
            index: PixelIndex::Band(config.band.clone()),
            cloud_filter: None,
            scale_m: config.scale_m,
        }
    }
}

/// [`VegetationGateway`] over any [`ImageCatalog`]
pub struct IndexGateway<C> {
    catalog: C,
    source: IndexSource,
    strategy: SeriesStrategy,
}

impl<C: ImageCatalog> IndexGateway<C> {
    pub fn new(catalog: C, source: IndexSource) -> Self {
        IndexGateway {
            catalog,
            source,
            strategy: SeriesStrategy::default(),
        }
    }

    pub fn ndvi(catalog: C, config: &EarthEngineConfig) -> Self {
        Self::new(catalog, IndexSource::ndvi(config)).with_strategy(config.series_strategy)
    }

    pub fn soil_moisture(catalog: C, config: &SoilMoistureConfig) -> Self {
        Self::new(catalog, IndexSource::soil_moisture(config))
    }

    pub fn with_strategy(mut self, strategy: SeriesStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> SeriesStrategy {
        self.strategy
    }

    pub fn source(&self) -> &IndexSource {
        &self.source
    }

    /// Qualifying scenes ordered by acquisition time
    fn scenes(&self, region: &Region, range: &DateRange) -> Result<Vec<SceneSummary>> {
        let query = SceneQuery {
            collection: self.source.collection.clone(),
            region: region.clone(),
            range: *range,
            cloud_filter: self.source.cloud_filter.clone(),
        };
        let mut scenes = self.catalog.list_scenes(&query)?;
        let listed = scenes.len();
        scenes.retain(|s| range.contains(s.date()));
        if let Some(filter) = &self.source.cloud_filter {
            scenes.retain(|s| filter.accepts(s.cloud_cover));
        }
        scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
        debug!(
            index = self.source.label,
            listed,
            kept = scenes.len(),
            "scenes filtered"
        );
        Ok(scenes)
    }

    fn reduce(&self, scene_ids: Vec<String>, composite: Composite, region: &Region) -> Result<Option<f64>> {
        self.catalog.reduce_mean(&ReductionRequest {
            scene_ids,
            composite,
            index: self.source.index.clone(),
            region: region.clone(),
            scale_m: self.source.scale_m,
        })
    }

    /// One reduction per (day, scenes) group; groups reducing to nothing are omitted
    fn reduce_groups(
        &self,
        groups: Vec<(NaiveDate, Vec<String>)>,
        region: &Region,
    ) -> Result<VegetationSeries> {
        #[cfg(feature = "indicatif")]
        let pb = {
            let pb = ProgressBar::new(groups.len() as u64);
            pb.set_style(progress_style());
            pb.set_message(self.source.label);
            pb
        };

        let mut series = VegetationSeries::new();
        for (date, ids) in groups {
            let composite = if ids.len() == 1 {
                Composite::Single
            } else {
                Composite::Median
            };
            match self.reduce(ids, composite, region)? {
                Some(value) => series.push(date, value),
                None => debug!(%date, "no valid pixels, day omitted"),
            }
            #[cfg(feature = "indicatif")]
            pb.inc(1);
        }

        #[cfg(feature = "indicatif")]
        pb.finish_and_clear();
        Ok(series)
    }
}

impl<C: ImageCatalog> VegetationGateway for IndexGateway<C> {
    fn name(&self) -> &'static str {
        self.catalog.name()
    }

    fn fetch_series(&self, region: &Region, range: &DateRange) -> Result<VegetationSeries> {
        info!(
            index = self.source.label,
            strategy = ?self.strategy,
            range = %range,
            "building series"
        );
        let scenes = self.scenes(region, range)?;
        if scenes.is_empty() {
            warn!(index = self.source.label, range = %range, "no qualifying scene");
            return Ok(VegetationSeries::new());
        }

        let groups: Vec<(NaiveDate, Vec<String>)> = match self.strategy {
            SeriesStrategy::PerScene => scenes
                .into_iter()
                .map(|s| (s.date(), vec![s.id]))
                .collect(),
            SeriesStrategy::PerDayComposite => {
                let mut by_day: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
                for scene in scenes {
                    by_day.entry(scene.date()).or_default().push(scene.id);
                }
                by_day.into_iter().collect()
            }
        };
        self.reduce_groups(groups, region)
    }

    fn fetch_value(&self, region: &Region, range: &DateRange) -> Result<f64> {
        let scenes = self.scenes(region, range)?;
        let first = scenes.into_iter().next().ok_or_else(|| {
            IrrigoError::DataUnavailable(format!(
                "no qualifying {} scene for {}",
                self.source.label, range
            ))
        })?;
        info!(index = self.source.label, scene = %first.id, "reducing first scene");
        self.reduce(vec![first.id.clone()], Composite::Single, region)?
            .ok_or_else(|| {
                IrrigoError::DataUnavailable(format!(
                    "scene {} has no valid {} pixels over the region",
                    first.id, self.source.label
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_core::Location;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory catalog: one value per scene, composites average their scenes
    struct FakeCatalog {
        scenes: Vec<SceneSummary>,
        values: HashMap<String, Option<f64>>,
        fail_listing: bool,
        requests: RefCell<Vec<ReductionRequest>>,
    }

    impl FakeCatalog {
        fn new(scenes: &[(&str, u32, u32, Option<f64>, Option<f64>)]) -> Self {
            FakeCatalog {
                scenes: scenes
                    .iter()
                    .map(|(id, day, hour, cloud, _)| SceneSummary {
                        id: id.to_string(),
                        acquired: Utc.with_ymd_and_hms(2023, 6, *day, *hour, 0, 0).unwrap(),
                        cloud_cover: *cloud,
                    })
                    .collect(),
                values: scenes
                    .iter()
                    .map(|(id, _, _, _, value)| (id.to_string(), *value))
                    .collect(),
                fail_listing: false,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImageCatalog for FakeCatalog {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn list_scenes(&self, _query: &SceneQuery) -> Result<Vec<SceneSummary>> {
            if self.fail_listing {
                return Err(IrrigoError::upstream("fake", "HTTP 401"));
            }
            Ok(self.scenes.clone())
        }

        fn reduce_mean(&self, request: &ReductionRequest) -> Result<Option<f64>> {
            self.requests.borrow_mut().push(request.clone());
            let values: Vec<f64> = request
                .scene_ids
                .iter()
                .filter_map(|id| self.values.get(id).copied().flatten())
                .collect();
            if values.is_empty() {
                return Ok(None);
            }
            Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, day).unwrap()
    }

    fn region() -> Region {
        Region::point(Location::new(105.8, 21.0).unwrap(), 500.0)
    }

    fn june() -> DateRange {
        DateRange::new(d(1), d(10)).unwrap()
    }

    fn sample_catalog() -> FakeCatalog {
        FakeCatalog::new(&[
            ("s2-01a", 1, 3, Some(5.0), Some(0.40)),
            ("s2-01b", 1, 4, Some(10.0), Some(0.60)),
            ("s2-03", 3, 3, Some(50.0), Some(0.10)),
            ("s2-04", 4, 3, None, Some(0.10)),
            ("s2-06", 6, 3, Some(19.9), Some(0.70)),
            ("s2-08", 8, 3, Some(20.0), Some(0.20)),
        ])
    }

    #[test]
    fn test_per_day_composite_omits_days_without_scenes() {
        let gateway = IndexGateway::ndvi(sample_catalog(), &EarthEngineConfig::default());
        let series = gateway.fetch_series(&region(), &june()).unwrap();

        let dates: Vec<NaiveDate> = series.records().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(1), d(6)]);
        assert!(series.is_daily_unique());
        assert!((series.records()[0].value - 0.50).abs() < 1e-12);

        let requests = gateway.catalog.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].composite, Composite::Median);
        assert_eq!(requests[0].scene_ids, vec!["s2-01a", "s2-01b"]);
        assert_eq!(requests[1].composite, Composite::Single);
    }

    #[test]
    fn test_per_scene_keeps_same_day_scenes() {
        let gateway = IndexGateway::ndvi(sample_catalog(), &EarthEngineConfig::default())
            .with_strategy(SeriesStrategy::PerScene);
        let series = gateway.fetch_series(&region(), &june()).unwrap();
        assert_eq!(series.len(), 3);
        assert!(!series.is_daily_unique());
        assert!(gateway
            .catalog
            .requests
            .borrow()
            .iter()
            .all(|r| r.composite == Composite::Single));
    }

    #[test]
    fn test_day_without_valid_pixels_is_omitted() {
        let catalog = FakeCatalog::new(&[
            ("a", 2, 3, Some(1.0), None),
            ("b", 5, 3, Some(1.0), Some(0.3)),
        ]);
        let gateway = IndexGateway::ndvi(catalog, &EarthEngineConfig::default());
        let series = gateway.fetch_series(&region(), &june()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.records()[0].date, d(5));
    }

    #[test]
    fn test_nothing_matched_is_an_empty_series() {
        let catalog = FakeCatalog::new(&[("cloudy", 2, 3, Some(80.0), Some(0.3))]);
        let gateway = IndexGateway::ndvi(catalog, &EarthEngineConfig::default());
        let series = gateway.fetch_series(&region(), &june()).unwrap();
        assert!(series.is_empty());
        assert!(gateway.catalog.requests.borrow().is_empty());

        let err = gateway.fetch_value(&region(), &june()).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_listing_failure_is_an_error() {
        let mut catalog = sample_catalog();
        catalog.fail_listing = true;
        let gateway = IndexGateway::ndvi(catalog, &EarthEngineConfig::default());
        assert!(matches!(
            gateway.fetch_series(&region(), &june()),
            Err(IrrigoError::UpstreamFailure { .. })
        ));
    }

    #[test]
    fn test_single_value_uses_first_qualifying_scene() {
        let gateway = IndexGateway::ndvi(sample_catalog(), &EarthEngineConfig::default());
        let value = gateway.fetch_value(&region(), &june()).unwrap();
        assert!((value - 0.40).abs() < 1e-12);
        let requests = gateway.catalog.requests.borrow();
        assert_eq!(requests[0].scene_ids, vec!["s2-01a"]);
        assert_eq!(
            requests[0].index,
            PixelIndex::NormalizedDifference {
                nir: "B8".to_string(),
                red: "B4".to_string()
            }
        );
    }

    #[test]
    fn test_soil_moisture_ignores_cloud_cover() {
        let catalog = FakeCatalog::new(&[
            ("smap-1", 1, 0, None, Some(0.21)),
            ("smap-2", 1, 3, None, Some(0.25)),
            ("smap-3", 2, 0, None, Some(0.30)),
        ]);
        let gateway = IndexGateway::soil_moisture(catalog, &SoilMoistureConfig::default());
        let series = gateway.fetch_series(&region(), &june()).unwrap();
        assert_eq!(series.len(), 2);
        assert!((series.records()[0].value - 0.23).abs() < 1e-12);
        assert_eq!(
            gateway.catalog.requests.borrow()[0].index,
            PixelIndex::Band("sm_surface".to_string())
        );
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "per-scene".parse::<SeriesStrategy>().unwrap(),
            SeriesStrategy::PerScene
        );
        assert_eq!(
            "composite".parse::<SeriesStrategy>().unwrap(),
            SeriesStrategy::PerDayComposite
        );
        assert!("weekly".parse::<SeriesStrategy>().is_err());
    }
}
