//! Geometry records flowing through the tiling pipeline.
//!
//! Projected features live in normalized Web-Mercator space (`[0, 1]²` for
//! the primary world copy) until a tile is read, at which point its features
//! are remapped to tile-local pixels once.

use geojson::JsonObject;
use geojson::feature::Id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A projected vertex. `z` is the squared distance at which the Douglas-Peucker
/// pass would drop this vertex; endpoints and clip intersections carry `1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A line or polygon ring plus its measures.
///
/// `size` is the line length or absolute ring area. `start`/`end` locate a
/// clipped slice along the original line for line metrics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ring {
    pub points: Vec<Vertex>,
    pub size: f64,
    pub start: f64,
    pub end: f64,
}

impl Ring {
    /// An empty ring carrying the measures of `other`.
    pub(crate) fn empty_like(other: &Ring) -> Self {
        Self {
            points: Vec::new(),
            size: other.size,
            start: other.start,
            end: other.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedGeometry {
    Point(Vec<Vertex>),
    MultiPoint(Vec<Vertex>),
    LineString(Ring),
    MultiLineString(Vec<Ring>),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl ProjectedGeometry {
    fn for_each_vertex_mut(&mut self, f: impl FnMut(&mut Vertex)) {
        match self {
            ProjectedGeometry::Point(points) | ProjectedGeometry::MultiPoint(points) => {
                points.iter_mut().for_each(f)
            }
            ProjectedGeometry::LineString(ring) => ring.points.iter_mut().for_each(f),
            ProjectedGeometry::MultiLineString(rings) | ProjectedGeometry::Polygon(rings) => rings
                .iter_mut()
                .flat_map(|r| r.points.iter_mut())
                .for_each(f),
            ProjectedGeometry::MultiPolygon(polygons) => polygons
                .iter_mut()
                .flatten()
                .flat_map(|r| r.points.iter_mut())
                .for_each(f),
        }
    }
}

/// A converted input feature with its projected bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedFeature {
    pub id: Option<Id>,
    pub geometry: ProjectedGeometry,
    pub tags: Arc<JsonObject>,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ProjectedFeature {
    pub fn new(id: Option<Id>, geometry: ProjectedGeometry, tags: Arc<JsonObject>) -> Self {
        let mut feature = Self {
            id,
            geometry,
            tags,
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        feature.update_bbox();
        feature
    }

    /// Polygons are bounded by their outer rings only.
    fn update_bbox(&mut self) {
        let mut bbox = [
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        ];
        let mut extend = |points: &[Vertex]| {
            for p in points {
                bbox[0] = bbox[0].min(p.x);
                bbox[1] = bbox[1].min(p.y);
                bbox[2] = bbox[2].max(p.x);
                bbox[3] = bbox[3].max(p.y);
            }
        };

        match &self.geometry {
            ProjectedGeometry::Point(points) | ProjectedGeometry::MultiPoint(points) => {
                extend(points)
            }
            ProjectedGeometry::LineString(line) => extend(&line.points),
            ProjectedGeometry::MultiLineString(lines) => {
                lines.iter().for_each(|l| extend(&l.points))
            }
            ProjectedGeometry::Polygon(rings) => {
                if let Some(outer) = rings.first() {
                    extend(&outer.points);
                }
            }
            ProjectedGeometry::MultiPolygon(polygons) => {
                for outer in polygons.iter().filter_map(|p| p.first()) {
                    extend(&outer.points);
                }
            }
        }

        [self.min_x, self.min_y, self.max_x, self.max_y] = bbox;
    }

    /// Move the feature by `offset` world widths along x.
    pub(crate) fn shifted(mut self, offset: f64) -> Self {
        self.geometry.for_each_vertex_mut(|v| v.x += offset);
        self.update_bbox();
        self
    }
}

/// Vector tile geometry type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeomType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

/// Geometry of a tile feature. Points are flat; lines and polygon rings
/// are nested, with polygon outer rings wound clockwise in tile space.
#[derive(Debug, Clone, PartialEq)]
pub enum TileGeometry {
    Points(Vec<[f64; 2]>),
    Rings(Vec<Vec<[f64; 2]>>),
}

impl TileGeometry {
    pub fn is_empty(&self) -> bool {
        match self {
            TileGeometry::Points(points) => points.is_empty(),
            TileGeometry::Rings(rings) => rings.is_empty(),
        }
    }

    pub(crate) fn for_each_point_mut(&mut self, f: impl FnMut(&mut [f64; 2])) {
        match self {
            TileGeometry::Points(points) => points.iter_mut().for_each(f),
            TileGeometry::Rings(rings) => rings.iter_mut().flatten().for_each(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub id: Option<Id>,
    pub geom_type: GeomType,
    pub geometry: TileGeometry,
    pub tags: Arc<JsonObject>,
}

/// A generated tile.
///
/// Coordinates are projected until the tile is first returned by
/// [`TileIndex::get_tile`](super::TileIndex::get_tile), integral tile pixels
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub features: Vec<TileFeature>,
    pub num_points: usize,
    pub num_simplified: usize,
    pub num_features: usize,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub z: u8,
    pub x: u32,
    pub y: u32,
    /// Unclipped input, kept while the tile may still be subdivided.
    pub(crate) source: Option<Vec<ProjectedFeature>>,
    pub(crate) transformed: bool,
}

impl Tile {
    pub fn is_transformed(&self) -> bool {
        self.transformed
    }
}

/// Address of a generated tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}
