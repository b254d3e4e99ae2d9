//! Earth-observation image catalog seam.
//!
//! A catalog lists scenes and reduces a scene (or a composite of scenes)
//! to a spatial mean over a region. Compositing, cloud masking and pixel
//! math all happen on the provider side.

use chrono::{DateTime, NaiveDate, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::commons::date_range::DateRange;
use crate::error::Result;
use crate::geo_core::Location;
use crate::geometric::field::FieldGeometry;

/// Area a vegetation or soil-moisture query is reduced over
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Circle of `buffer_m` metres around a point
    Point { location: Location, buffer_m: f64 },
    /// Exact drawn field boundary
    Field(FieldGeometry),
}

impl Region {
    pub fn point(location: Location, buffer_m: f64) -> Self {
        Region::Point { location, buffer_m }
    }

    /// Point used for point-only queries
    pub fn anchor(&self) -> Location {
        match self {
            Region::Point { location, .. } => *location,
            Region::Field(field) => {
                let c = field.centroid();
                Location {
                    lon: c.x(),
                    lat: c.y(),
                }
            }
        }
    }

    pub fn polygons(&self) -> Option<&MultiPolygon<f64>> {
        match self {
            Region::Point { .. } => None,
            Region::Field(field) => Some(field.geometry()),
        }
    }
}

/// Scene property used for the cloud filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudFilter {
    pub property: String,
    /// Scenes must be strictly below this percentage
    pub ceiling_pct: f64,
}

impl CloudFilter {
    /// Scenes without the property are rejected
    pub fn accepts(&self, cloud_cover: Option<f64>) -> bool {
        matches!(cloud_cover, Some(c) if c < self.ceiling_pct)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneQuery {
    pub collection: String,
    pub region: Region,
    pub range: DateRange,
    pub cloud_filter: Option<CloudFilter>,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSummary {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub cloud_cover: Option<f64>,
}

impl SceneSummary {
    /// Calendar day of acquisition (UTC)
    pub fn date(&self) -> NaiveDate {
        self.acquired.date_naive()
    }
}

/// How the scenes of a reduction are combined before the mean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    /// Exactly one scene
    Single,
    /// Per-pixel median across the scenes
    Median,
}

/// Per-pixel value that is averaged over the region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelIndex {
    /// (nir - red) / (nir + red)
    NormalizedDifference { nir: String, red: String },
    Band(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReductionRequest {
    pub scene_ids: Vec<String>,
    pub composite: Composite,
    pub index: PixelIndex,
    pub region: Region,
    pub scale_m: f64,
}

pub trait ImageCatalog {
    fn name(&self) -> &'static str;

    /// Scenes intersecting the region within the range, in any order
    fn list_scenes(&self, query: &SceneQuery) -> Result<Vec<SceneSummary>>;

    /// Spatial mean of the index; `None` when no valid pixel falls in the region
    fn reduce_mean(&self, request: &ReductionRequest) -> Result<Option<f64>>;
}

impl<T: ImageCatalog + ?Sized> ImageCatalog for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn list_scenes(&self, query: &SceneQuery) -> Result<Vec<SceneSummary>> {
        (**self).list_scenes(query)
    }

    fn reduce_mean(&self, request: &ReductionRequest) -> Result<Option<f64>> {
        (**self).reduce_mean(request)
    }
}
