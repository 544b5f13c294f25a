//! On-demand vector tile slicing of GeoJSON.
//!
//! [`TileIndex::new`] projects and simplifies the input once, then builds the
//! top of the tile pyramid eagerly: every tile down to `index_max_zoom`, or
//! until a tile holds at most `index_max_points` points. Deeper tiles are cut
//! on first request from the nearest generated ancestor that still retains
//! its source geometry, and are cached from then on.
//!
//! ```rust
//! use spatio_tiles::tile::{TileGeometry, TileIndex};
//! use spatio_tiles::TileOptions;
//!
//! let data = r#"{"type":"Point","coordinates":[0,0]}"#.parse()?;
//! let mut index = TileIndex::new(&data, TileOptions::default())?;
//!
//! let tile = index.get_tile(0, 0, 0).expect("tile with the point");
//! assert_eq!(
//!     tile.features[0].geometry,
//!     TileGeometry::Points(vec![[2048.0, 2048.0]])
//! );
//! # Ok::<(), spatio_tiles::SpatioError>(())
//! ```

mod clip;
mod convert;
mod create;
mod simplify;
mod types;
mod wrap;

pub use types::{
    GeomType, ProjectedFeature, ProjectedGeometry, Ring, Tile, TileCoord, TileFeature,
    TileGeometry, Vertex,
};

use crate::config::{MAX_TILE_ZOOM, TileOptions};
use crate::error::{Result, SpatioError};
use clip::{Axis, clip};
use convert::convert;
use create::{create_tile, transform_tile};
use geojson::GeoJson;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::hash_map::Entry;
use std::time::Instant;
use wrap::wrap;

/// Tile generation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TileStats {
    /// Tiles generated per zoom level.
    pub per_zoom: BTreeMap<u8, usize>,
    pub total: usize,
}

/// A lazily generated tile pyramid over one GeoJSON source.
#[derive(Debug)]
pub struct TileIndex {
    options: TileOptions,
    tiles: FxHashMap<u64, Tile>,
    tile_coords: Vec<TileCoord>,
    stats: TileStats,
}

impl TileIndex {
    /// Convert `data` and generate the initial tile pyramid.
    ///
    /// Fails on invalid options or malformed geometry, with nothing built.
    pub fn new(data: &GeoJson, options: TileOptions) -> Result<Self> {
        options.validate().map_err(SpatioError::InvalidConfig)?;

        let started = Instant::now();
        log::debug!(
            "index: max_zoom: {}, index_max_zoom: {}, index_max_points: {}",
            options.max_zoom,
            options.index_max_zoom,
            options.index_max_points
        );

        let features = convert(data, &options)?;
        let features = wrap(features, &options);
        log::debug!(
            "preprocessed {} features in {:?}",
            features.len(),
            started.elapsed()
        );

        let mut index = Self {
            options,
            tiles: FxHashMap::default(),
            tile_coords: Vec::new(),
            stats: TileStats::default(),
        };

        if !features.is_empty() {
            let now = Instant::now();
            index.split_tile(features, 0, 0, 0, None);

            if let Some(root) = index.tiles.get(&to_id(0, 0, 0)) {
                log::debug!(
                    "features: {}, points: {}",
                    root.num_features,
                    root.num_points
                );
            }
            log::debug!(
                "generated {} tiles in {:?}",
                index.stats.total,
                now.elapsed()
            );
        }

        Ok(index)
    }

    /// Parse a GeoJSON document and index it.
    pub fn from_json_str(json: &str, options: TileOptions) -> Result<Self> {
        let data: GeoJson = json.parse()?;
        Self::new(&data, options)
    }

    pub fn options(&self) -> &TileOptions {
        &self.options
    }

    /// Tile `(z, x, y)` in tile-local pixels, generating it if needed.
    ///
    /// `x` wraps around the antimeridian. Returns `None` past zoom 24, for
    /// rows outside the pyramid, and for tiles without features.
    pub fn get_tile(&mut self, z: u8, x: u32, y: u32) -> Option<&Tile> {
        if z > MAX_TILE_ZOOM {
            return None;
        }

        let z2 = 1u32 << z;
        let x = x & (z2 - 1);
        if y >= z2 {
            return None;
        }

        let id = to_id(z, x, y);
        if self.tiles.contains_key(&id) {
            return self.transformed(id);
        }

        let (mut z0, mut x0, mut y0) = (z, x, y);
        loop {
            if z0 == 0 {
                return None;
            }
            z0 -= 1;
            x0 >>= 1;
            y0 >>= 1;
            if self.tiles.contains_key(&to_id(z0, x0, y0)) {
                break;
            }
        }

        let source = self.tiles.get_mut(&to_id(z0, x0, y0))?.source.take()?;
        log::debug!("drilling down to z{}-{}-{}", z0, x0, y0);

        let now = Instant::now();
        self.split_tile(source, z0, x0, y0, Some(TileCoord { z, x, y }));
        log::debug!("drilled down in {:?}", now.elapsed());

        self.transformed(id)
    }

    /// Every tile generated so far, in generation order.
    pub fn tile_coords(&self) -> &[TileCoord] {
        &self.tile_coords
    }

    pub fn stats(&self) -> &TileStats {
        &self.stats
    }

    /// Number of tiles generated so far.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    fn transformed(&mut self, id: u64) -> Option<&Tile> {
        let extent = self.options.extent;
        let tile = self.tiles.get_mut(&id)?;
        transform_tile(tile, extent);
        if tile.features.is_empty() {
            None
        } else {
            Some(tile)
        }
    }

    /// Split `features` down the pyramid from `(z, x, y)`.
    ///
    /// Without a `target` this builds the initial index; with one it only
    /// descends through the target's ancestors.
    fn split_tile(
        &mut self,
        features: Vec<ProjectedFeature>,
        z: u8,
        x: u32,
        y: u32,
        target: Option<TileCoord>,
    ) {
        let options = &self.options;
        let mut stack = vec![(features, z, x, y)];

        while let Some((features, z, x, y)) = stack.pop() {
            let z2 = (1u64 << z) as f64;
            let id = to_id(z, x, y);

            let tile = match self.tiles.entry(id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    self.tile_coords.push(TileCoord { z, x, y });
                    *self.stats.per_zoom.entry(z).or_default() += 1;
                    self.stats.total += 1;
                    entry.insert(create_tile(&features, z, x, y, options))
                }
            };

            let stop = match target {
                None => z == options.index_max_zoom || tile.num_points <= options.index_max_points,
                Some(target) if z == options.max_zoom || z == target.z => true,
                Some(target) => {
                    let steps = target.z - z;
                    x != target.x >> steps || y != target.y >> steps
                }
            };
            if stop {
                tile.source = Some(features);
                continue;
            }

            tile.source = None;
            if features.is_empty() {
                continue;
            }

            let (min_x, min_y, max_x, max_y) = (tile.min_x, tile.min_y, tile.max_x, tile.max_y);
            let k1 = 0.5 * options.buffer as f64 / options.extent as f64;
            let k2 = 0.5 - k1;
            let k3 = 0.5 + k1;
            let k4 = 1.0 + k1;
            let (xf, yf) = (x as f64, y as f64);
            let metrics = options.line_metrics;

            let left = clip(&features, z2, xf - k1, xf + k3, Axis::X, min_x, max_x, metrics);
            let right = clip(&features, z2, xf + k2, xf + k4, Axis::X, min_x, max_x, metrics);
            drop(features);

            let (mut tl, mut bl, mut tr, mut br) = (None, None, None, None);
            if let Some(left) = left {
                tl = clip(&left, z2, yf - k1, yf + k3, Axis::Y, min_y, max_y, metrics);
                bl = clip(&left, z2, yf + k2, yf + k4, Axis::Y, min_y, max_y, metrics);
            }
            if let Some(right) = right {
                tr = clip(&right, z2, yf - k1, yf + k3, Axis::Y, min_y, max_y, metrics);
                br = clip(&right, z2, yf + k2, yf + k4, Axis::Y, min_y, max_y, metrics);
            }

            stack.push((tl.unwrap_or_default(), z + 1, x * 2, y * 2));
            stack.push((bl.unwrap_or_default(), z + 1, x * 2, y * 2 + 1));
            stack.push((tr.unwrap_or_default(), z + 1, x * 2 + 1, y * 2));
            stack.push((br.unwrap_or_default(), z + 1, x * 2 + 1, y * 2 + 1));
        }
    }
}

/// Cache key of tile `(z, x, y)`.
fn to_id(z: u8, x: u32, y: u32) -> u64 {
    (((1u64 << z) * y as u64 + x as u64) << 5) + z as u64
}
