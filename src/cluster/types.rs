//! Input and output types of the cluster index.

use crate::compute::validation::{geometry_type_name, validate_position};
use crate::error::{Result, SpatioError};
use geo::Point;
use geojson::feature::Id;
use geojson::{Feature, Geometry, JsonObject, Value};
use serde_json::json;

/// A point to be clustered: position in degrees plus opaque properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    pub id: Option<Id>,
    /// `x` is longitude, `y` is latitude.
    pub point: Point,
    pub properties: JsonObject,
}

impl ClusterPoint {
    pub fn new(point: Point) -> Self {
        Self {
            id: None,
            point,
            properties: JsonObject::new(),
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_properties(mut self, properties: JsonObject) -> Self {
        self.properties = properties;
        self
    }

    /// Render as a GeoJSON Point feature.
    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.point.x(),
                self.point.y(),
            ]))),
            id: self.id.clone(),
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

impl TryFrom<Feature> for ClusterPoint {
    type Error = SpatioError;

    fn try_from(feature: Feature) -> Result<Self> {
        let geometry = feature.geometry.ok_or_else(|| {
            SpatioError::InvalidGeoJson("Feature has no geometry".to_string())
        })?;

        match geometry.value {
            Value::Point(coords) => {
                let (lng, lat) = validate_position(&coords)?;
                Ok(ClusterPoint {
                    id: feature.id,
                    point: Point::new(lng, lat),
                    properties: feature.properties.unwrap_or_default(),
                })
            }
            other => Err(SpatioError::InvalidGeoJson(format!(
                "Only Point features can be clustered, got {}",
                geometry_type_name(&other)
            ))),
        }
    }
}

/// A synthesized cluster of two or more points.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: u64,
    /// Weighted centroid of the merged points, in degrees.
    pub point: Point,
    pub point_count: u32,
    /// Reduced user properties plus `cluster`, `cluster_id`, `point_count`
    /// and `point_count_abbreviated`.
    pub properties: JsonObject,
}

impl Cluster {
    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.point.x(),
                self.point.y(),
            ]))),
            id: Some(Id::Number(self.id.into())),
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

/// One result of a cluster query: a cluster, or an input point that was not
/// merged at the requested zoom.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterFeature<'a> {
    Cluster(Cluster),
    Point(&'a ClusterPoint),
}

impl ClusterFeature<'_> {
    pub fn is_cluster(&self) -> bool {
        matches!(self, ClusterFeature::Cluster(_))
    }

    /// Number of input points represented by this feature.
    pub fn point_count(&self) -> u32 {
        match self {
            ClusterFeature::Cluster(cluster) => cluster.point_count,
            ClusterFeature::Point(_) => 1,
        }
    }

    pub fn cluster_id(&self) -> Option<u64> {
        match self {
            ClusterFeature::Cluster(cluster) => Some(cluster.id),
            ClusterFeature::Point(_) => None,
        }
    }

    pub fn point(&self) -> Point {
        match self {
            ClusterFeature::Cluster(cluster) => cluster.point,
            ClusterFeature::Point(point) => point.point,
        }
    }

    pub fn properties(&self) -> &JsonObject {
        match self {
            ClusterFeature::Cluster(cluster) => &cluster.properties,
            ClusterFeature::Point(point) => &point.properties,
        }
    }

    pub fn to_feature(&self) -> Feature {
        match self {
            ClusterFeature::Cluster(cluster) => cluster.to_feature(),
            ClusterFeature::Point(point) => point.to_feature(),
        }
    }
}

/// A point feature of a cluster tile, in tile-local pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTileFeature {
    pub id: Option<Id>,
    pub point: [i32; 2],
    pub tags: JsonObject,
}

/// Clusters and points falling in (or buffering into) one `(z, x, y)` tile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterTile {
    pub features: Vec<ClusterTileFeature>,
}

/// Human-readable point count: `"12k"`, `"1.3k"`, or the plain number.
pub fn abbreviate_count(count: u32) -> serde_json::Value {
    if count >= 10_000 {
        json!(format!("{}k", (count as f64 / 1000.0).round()))
    } else if count >= 1000 {
        json!(format!("{}k", (count as f64 / 100.0).round() / 10.0))
    } else {
        json!(count)
    }
}
