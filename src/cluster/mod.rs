//! Hierarchical point clustering over a pyramid of k-d trees.
//!
//! Loading builds one [`KdTree`] per zoom level, top-down: the leaf level
//! (`max_zoom + 1`) holds every input point, and each level below merges
//! the nodes of the level above that fall within `radius` pixels of each
//! other into weighted-centroid clusters.
//!
//! Clusters are identified by a packed id that encodes the level and slot of
//! the node the cluster grew from:
//!
//! ```text
//! id = (origin_index << 5) + (origin_zoom + 1) + total_points
//! ```
//!
//! so `get_children` can jump straight to the right level and position.
//! Ids are only meaningful for the point set they were produced from; a new
//! `load` invalidates them.
//!
//! ```rust
//! use spatio_tiles::cluster::{ClusterIndex, ClusterPoint};
//! use spatio_tiles::ClusterOptions;
//! use geo::Point;
//!
//! let mut index = ClusterIndex::new(ClusterOptions::default())?;
//! index.load(vec![
//!     ClusterPoint::new(Point::new(-74.0060, 40.7128)),
//!     ClusterPoint::new(Point::new(-74.0050, 40.7130)),
//!     ClusterPoint::new(Point::new(2.3522, 48.8566)),
//! ])?;
//!
//! let world = index.get_clusters([-180.0, -85.0, 180.0, 85.0], 2.0);
//! assert_eq!(world.len(), 2);
//! # Ok::<(), spatio_tiles::SpatioError>(())
//! ```

mod builder;
mod types;

pub use builder::{ClusterIndexBuilder, MapFn, ReduceFn};
pub use types::{
    Cluster, ClusterFeature, ClusterPoint, ClusterTile, ClusterTileFeature, abbreviate_count,
};

use crate::compute::projection::{lat_y, lng_x, round_half_up, x_lng, y_lat};
use crate::compute::validation::validate_points;
use crate::config::ClusterOptions;
use crate::error::{Result, SpatioError};
use crate::kdtree::KdTree;
use geo::Point;
use geojson::feature::Id;
use geojson::{Feature, JsonObject};
use serde_json::json;
use std::time::Instant;

/// Largest input for which `origin_index << 5` stays within 31 bits.
pub const MAX_CLUSTER_POINTS: usize = (1 << 26) - 1;

/// Zoom marker of a node no level has consumed yet.
const UNVISITED: u8 = u8::MAX;

/// A leaf point or a cluster on one zoom level.
#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    /// Last zoom at which this node was consumed.
    zoom: u8,
    /// Input index for leaves, packed cluster id for clusters.
    id: u64,
    parent_id: Option<u64>,
    num_points: u32,
    /// Slot in `cluster_props` holding reduced properties.
    props: Option<usize>,
}

impl Node {
    fn is_cluster(&self) -> bool {
        self.num_points > 1
    }
}

/// The nodes of one zoom level and the tree indexing them.
#[derive(Debug)]
struct Level {
    tree: KdTree<f32>,
    nodes: Vec<Node>,
}

impl Level {
    fn new(nodes: Vec<Node>, node_size: usize) -> Self {
        let tree = KdTree::build(&nodes, |n| n.x, |n| n.y, node_size);
        Self { tree, nodes }
    }
}

/// Multi-resolution point clustering index.
///
/// Owns the loaded points; results borrow from the index.
pub struct ClusterIndex {
    options: ClusterOptions,
    map: Option<MapFn>,
    reduce: Option<ReduceFn>,
    points: Vec<ClusterPoint>,
    /// Indexed by zoom; levels below `min_zoom` stay `None`.
    levels: Vec<Option<Level>>,
    cluster_props: Vec<JsonObject>,
}

impl ClusterIndex {
    /// Create an empty index without property aggregation.
    pub fn new(options: ClusterOptions) -> Result<Self> {
        ClusterIndexBuilder::new().options(options).build()
    }

    pub fn builder() -> ClusterIndexBuilder {
        ClusterIndexBuilder::new()
    }

    pub(crate) fn from_parts(
        options: ClusterOptions,
        map: Option<MapFn>,
        reduce: Option<ReduceFn>,
    ) -> Self {
        Self {
            options,
            map,
            reduce,
            points: Vec::new(),
            levels: Vec::new(),
            cluster_props: Vec::new(),
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// The loaded input points, in load order.
    pub fn points(&self) -> &[ClusterPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Replace the index contents with `points` and cluster every zoom level.
    ///
    /// Fails without modifying the index if a point has non-finite
    /// coordinates or the set is too large for the cluster id packing.
    pub fn load(&mut self, points: Vec<ClusterPoint>) -> Result<()> {
        if points.len() > MAX_CLUSTER_POINTS {
            return Err(SpatioError::ClusterIdOverflow {
                points: points.len(),
                limit: MAX_CLUSTER_POINTS,
            });
        }
        validate_points(points.iter().map(|p| &p.point))?;

        let started = Instant::now();
        let (min_zoom, max_zoom) = (self.options.min_zoom, self.options.max_zoom);
        let node_size = self.options.node_size;

        self.points = points;
        self.cluster_props.clear();
        self.levels = (0..=max_zoom as usize + 1).map(|_| None).collect();

        let leaves = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                x: fround(lng_x(p.point.x())),
                y: fround(lat_y(p.point.y())),
                zoom: UNVISITED,
                id: i as u64,
                parent_id: None,
                num_points: 1,
                props: None,
            })
            .collect();

        let mut level = Level::new(leaves, node_size);
        log::debug!(
            "prepared {} points in {:?}",
            self.points.len(),
            started.elapsed()
        );

        for zoom in (min_zoom..=max_zoom).rev() {
            let now = Instant::now();
            let next = self.cluster(&mut level, zoom);
            let finished = std::mem::replace(&mut level, Level::new(next, node_size));
            self.levels[zoom as usize + 1] = Some(finished);

            log::debug!(
                "z{}: {} clusters in {:?}",
                zoom,
                level.nodes.len(),
                now.elapsed()
            );
        }
        self.levels[min_zoom as usize] = Some(level);

        log::debug!("total time: {:?}", started.elapsed());
        Ok(())
    }

    /// Load GeoJSON Point features. Features without geometry are skipped.
    pub fn load_features(&mut self, features: impl IntoIterator<Item = Feature>) -> Result<()> {
        let points = features
            .into_iter()
            .filter(|f| f.geometry.is_some())
            .map(ClusterPoint::try_from)
            .collect::<Result<Vec<_>>>()?;
        self.load(points)
    }

    /// Clusters and points inside `bbox = [west, south, east, north]` (degrees)
    /// at `zoom`.
    ///
    /// Boxes crossing the antimeridian (`west > east` after normalization) are
    /// answered as their eastern and western halves.
    pub fn get_clusters(&self, bbox: [f64; 4], zoom: f64) -> Vec<ClusterFeature<'_>> {
        if !bbox.iter().all(|v| v.is_finite()) {
            log::warn!("Rejecting cluster query with non-finite bounding box");
            return Vec::new();
        }

        let [west, south, east, north] = bbox;
        let mut min_lng = ((west + 180.0) % 360.0 + 360.0) % 360.0 - 180.0;
        let min_lat = south.clamp(-90.0, 90.0);
        let mut max_lng = if east == 180.0 {
            180.0
        } else {
            ((east + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
        };
        let max_lat = north.clamp(-90.0, 90.0);

        if east - west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut eastern = self.get_clusters([min_lng, min_lat, 180.0, max_lat], zoom);
            eastern.extend(self.get_clusters([-180.0, min_lat, max_lng, max_lat], zoom));
            return eastern;
        }

        let Some(level) = self.level(zoom) else {
            return Vec::new();
        };

        level
            .tree
            .range(lng_x(min_lng), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat))
            .into_iter()
            .map(|i| self.feature_of(&level.nodes[i]))
            .collect()
    }

    /// The clusters and points merged directly into `cluster_id`.
    pub fn get_children(&self, cluster_id: u64) -> Result<Vec<ClusterFeature<'_>>> {
        let (origin_index, origin_zoom) = self.decode_cluster_id(cluster_id)?;
        let not_found = || SpatioError::ClusterNotFound(cluster_id);

        if origin_zoom == 0 {
            return Err(not_found());
        }
        let level = self
            .levels
            .get(origin_zoom)
            .and_then(Option::as_ref)
            .ok_or_else(not_found)?;
        let origin = level.nodes.get(origin_index).ok_or_else(not_found)?;

        let r = self.options.radius
            / (self.options.extent * 2f64.powi(origin_zoom as i32 - 1));

        let children: Vec<_> = level
            .tree
            .within(origin.x, origin.y, r)
            .into_iter()
            .filter(|&k| level.nodes[k].parent_id == Some(cluster_id))
            .map(|k| self.feature_of(&level.nodes[k]))
            .collect();

        if children.is_empty() {
            return Err(not_found());
        }
        Ok(children)
    }

    /// Input points under `cluster_id`, depth-first, paginated by
    /// `limit`/`offset`.
    pub fn get_leaves(
        &self,
        cluster_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<&ClusterPoint>> {
        let mut leaves = Vec::new();
        if limit == 0 {
            // Still report unknown ids
            self.get_children(cluster_id)?;
            return Ok(leaves);
        }
        self.append_leaves(&mut leaves, cluster_id, limit, offset, 0)?;
        Ok(leaves)
    }

    /// Every input point under `cluster_id`.
    pub fn get_all_leaves(&self, cluster_id: u64) -> Result<Vec<&ClusterPoint>> {
        self.get_leaves(cluster_id, usize::MAX, 0)
    }

    /// Clusters and points of tile `(z, x, y)` in tile-local pixels, including
    /// those within `radius` pixels outside the tile edges.
    pub fn get_tile(&self, z: u8, x: u32, y: u32) -> Option<ClusterTile> {
        let level = self.level(z as f64)?;
        let z2 = 2f64.powi(z as i32);
        let p = self.options.radius / self.options.extent;
        let (xf, yf) = (x as f64, y as f64);
        let top = (yf - p) / z2;
        let bottom = (yf + 1.0 + p) / z2;

        let mut tile = ClusterTile::default();
        let ids = level.tree.range((xf - p) / z2, top, (xf + 1.0 + p) / z2, bottom);
        self.add_tile_features(&mut tile, level, ids, xf, yf, z2);

        if x == 0 {
            let ids = level.tree.range(1.0 - p / z2, top, 1.0, bottom);
            self.add_tile_features(&mut tile, level, ids, z2, yf, z2);
        }
        if xf == z2 - 1.0 {
            let ids = level.tree.range(0.0, top, p / z2, bottom);
            self.add_tile_features(&mut tile, level, ids, -1.0, yf, z2);
        }

        (!tile.features.is_empty()).then_some(tile)
    }

    /// The zoom at which `cluster_id` first splits into more than one child.
    pub fn get_cluster_expansion_zoom(&self, cluster_id: u64) -> Result<u8> {
        let (_, origin_zoom) = self.decode_cluster_id(cluster_id)?;
        let mut expansion_zoom = origin_zoom as i32 - 1;
        let mut cluster_id = cluster_id;

        while expansion_zoom <= self.options.max_zoom as i32 {
            let children = self.get_children(cluster_id)?;
            expansion_zoom += 1;
            if children.len() != 1 {
                break;
            }
            match children[0].cluster_id() {
                Some(id) => cluster_id = id,
                None => break,
            }
        }

        Ok(expansion_zoom as u8)
    }

    fn level(&self, zoom: f64) -> Option<&Level> {
        let z = self.limit_zoom(zoom);
        self.levels.get(z).and_then(Option::as_ref)
    }

    fn limit_zoom(&self, zoom: f64) -> usize {
        let min = self.options.min_zoom as i64;
        let max = self.options.max_zoom as i64 + 1;
        (zoom.floor() as i64).clamp(min, max) as usize
    }

    fn decode_cluster_id(&self, cluster_id: u64) -> Result<(usize, usize)> {
        let total = self.points.len() as u64;
        let offset = cluster_id
            .checked_sub(total)
            .ok_or(SpatioError::ClusterNotFound(cluster_id))?;
        Ok(((offset >> 5) as usize, (offset % 32) as usize))
    }

    /// Merge the unconsumed nodes of `level` into the node set of `zoom`.
    fn cluster(&mut self, level: &mut Level, zoom: u8) -> Vec<Node> {
        let r = self.options.radius / (self.options.extent * 2f64.powi(zoom as i32));
        let total = self.points.len() as u64;
        let min_points = self.options.min_points;
        let Level { tree, nodes } = level;

        let mut next = Vec::new();
        for i in 0..nodes.len() {
            if nodes[i].zoom <= zoom {
                continue;
            }
            nodes[i].zoom = zoom;

            let (x, y) = (nodes[i].x, nodes[i].y);
            let neighbor_ids = tree.within(x, y, r);

            let num_points_origin = nodes[i].num_points;
            let mut num_points = num_points_origin;
            for &k in &neighbor_ids {
                if nodes[k].zoom > zoom {
                    num_points += nodes[k].num_points;
                }
            }

            if num_points > num_points_origin && num_points as usize >= min_points {
                let mut wx = x * num_points_origin as f64;
                let mut wy = y * num_points_origin as f64;
                let id = ((i as u64) << 5) + (zoom as u64 + 1) + total;
                let mut reduced: Option<JsonObject> = None;

                for &k in &neighbor_ids {
                    if nodes[k].zoom <= zoom {
                        continue;
                    }
                    nodes[k].zoom = zoom;

                    let weight = nodes[k].num_points as f64;
                    wx += nodes[k].x * weight;
                    wy += nodes[k].y * weight;
                    nodes[k].parent_id = Some(id);

                    if let Some(reduce) = &self.reduce {
                        let acc = reduced.get_or_insert_with(|| self.map_props(&nodes[i]));
                        reduce(acc, &self.map_props(&nodes[k]));
                    }
                }

                nodes[i].parent_id = Some(id);
                let props = reduced.map(|p| {
                    self.cluster_props.push(p);
                    self.cluster_props.len() - 1
                });

                next.push(Node {
                    x: wx / num_points as f64,
                    y: wy / num_points as f64,
                    zoom: UNVISITED,
                    id,
                    parent_id: None,
                    num_points,
                    props,
                });
            } else {
                next.push(nodes[i].clone());

                if num_points > 1 {
                    for &k in &neighbor_ids {
                        if nodes[k].zoom <= zoom {
                            continue;
                        }
                        nodes[k].zoom = zoom;
                        next.push(nodes[k].clone());
                    }
                }
            }
        }

        next
    }

    fn map_props(&self, node: &Node) -> JsonObject {
        if node.is_cluster() {
            return node
                .props
                .map(|i| self.cluster_props[i].clone())
                .unwrap_or_default();
        }

        let original = &self.points[node.id as usize].properties;
        match &self.map {
            Some(map) => map(original),
            None => original.clone(),
        }
    }

    fn feature_of(&self, node: &Node) -> ClusterFeature<'_> {
        if node.is_cluster() {
            ClusterFeature::Cluster(self.cluster_of(node))
        } else {
            ClusterFeature::Point(&self.points[node.id as usize])
        }
    }

    fn cluster_of(&self, node: &Node) -> Cluster {
        let mut properties = node
            .props
            .map(|i| self.cluster_props[i].clone())
            .unwrap_or_default();
        properties.insert("cluster".into(), json!(true));
        properties.insert("cluster_id".into(), json!(node.id));
        properties.insert("point_count".into(), json!(node.num_points));
        properties.insert(
            "point_count_abbreviated".into(),
            abbreviate_count(node.num_points),
        );

        Cluster {
            id: node.id,
            point: Point::new(x_lng(node.x), y_lat(node.y)),
            point_count: node.num_points,
            properties,
        }
    }

    fn append_leaves<'a>(
        &'a self,
        result: &mut Vec<&'a ClusterPoint>,
        cluster_id: u64,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize> {
        for child in self.get_children(cluster_id)? {
            match child {
                ClusterFeature::Cluster(cluster) => {
                    let count = cluster.point_count as usize;
                    if skipped + count <= offset {
                        skipped += count;
                    } else {
                        skipped = self.append_leaves(result, cluster.id, limit, offset, skipped)?;
                    }
                }
                ClusterFeature::Point(point) => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        result.push(point);
                    }
                }
            }

            if result.len() == limit {
                break;
            }
        }

        Ok(skipped)
    }

    fn add_tile_features(
        &self,
        tile: &mut ClusterTile,
        level: &Level,
        ids: Vec<usize>,
        x: f64,
        y: f64,
        z2: f64,
    ) {
        let extent = self.options.extent;

        for i in ids {
            let node = &level.nodes[i];
            let (tags, px, py, id) = if node.is_cluster() {
                let cluster = self.cluster_of(node);
                let id = Some(Id::Number(node.id.into()));
                (cluster.properties, node.x, node.y, id)
            } else {
                let point = &self.points[node.id as usize];
                let id = if self.options.generate_id {
                    Some(Id::Number(node.id.into()))
                } else {
                    point.id.clone()
                };
                let (px, py) = (lng_x(point.point.x()), lat_y(point.point.y()));
                (point.properties.clone(), px, py, id)
            };

            tile.features.push(ClusterTileFeature {
                id,
                point: [
                    round_half_up(extent * (px * z2 - x)) as i32,
                    round_half_up(extent * (py * z2 - y)) as i32,
                ],
                tags,
            });
        }
    }
}

impl std::fmt::Debug for ClusterIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterIndex")
            .field("options", &self.options)
            .field("points", &self.points.len())
            .field("clusters", &self.cluster_props.len())
            .field("reduce", &self.reduce.is_some())
            .finish()
    }
}

/// Round to single precision, keeping the index stable across platforms.
#[inline]
fn fround(v: f64) -> f64 {
    v as f32 as f64
}
