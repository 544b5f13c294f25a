//! Mapbox Vector Tile (protobuf) encoding.
//!
//! A [`Layer`] is a named set of features in integer tile coordinates;
//! [`encode`] writes one or more layers as a `Tile` message. Property keys
//! and values are deduplicated per layer.
//!
//! ```rust
//! use spatio_tiles::codec::{encode, Layer};
//! use spatio_tiles::tile::TileIndex;
//! use spatio_tiles::TileOptions;
//!
//! let mut index = TileIndex::from_json_str(
//!     r#"{"type":"Point","coordinates":[0,0]}"#,
//!     TileOptions::default(),
//! )?;
//! let tile = index.get_tile(0, 0, 0).expect("tile");
//! let bytes = encode(&[Layer::from_tile("points", tile, 4096)]);
//! assert!(!bytes.is_empty());
//! # Ok::<(), spatio_tiles::SpatioError>(())
//! ```

use crate::cluster::ClusterTile;
use crate::tile::{GeomType, Tile, TileGeometry};
use bytes::Bytes;
use geojson::JsonObject;
use geojson::feature::Id;
use geozero::mvt::{self, Message};
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Layer version written when none is set.
pub const DEFAULT_LAYER_VERSION: u32 = 2;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

// Integral doubles outside these bounds stay doubles
const SINT_MIN: f64 = i64::MIN as f64;
const UINT_END: f64 = 18_446_744_073_709_551_616.0;

/// A feature ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Written only when a non-negative integer.
    pub id: Option<Id>,
    pub geom_type: GeomType,
    /// Points hold a single ring with every point; lines and polygons one
    /// ring per part. Polygon rings are closed.
    pub geometry: Vec<Vec<[i32; 2]>>,
    pub properties: Arc<JsonObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub version: u32,
    pub extent: u32,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, extent: u32) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_LAYER_VERSION,
            extent,
            features: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Layer from a tile returned by [`TileIndex::get_tile`](crate::tile::TileIndex::get_tile).
    pub fn from_tile(name: impl Into<String>, tile: &Tile, extent: u32) -> Self {
        let mut layer = Self::new(name, extent);

        for feature in &tile.features {
            let geometry = match &feature.geometry {
                TileGeometry::Points(points) => vec![points.iter().map(to_pixel).collect()],
                TileGeometry::Rings(rings) => rings
                    .iter()
                    .map(|ring| ring.iter().map(to_pixel).collect())
                    .collect(),
            };

            layer.push(Feature {
                id: feature.id.clone(),
                geom_type: feature.geom_type,
                geometry,
                properties: feature.tags.clone(),
            });
        }

        layer
    }

    /// Layer from a cluster tile returned by
    /// [`ClusterIndex::get_tile`](crate::cluster::ClusterIndex::get_tile).
    pub fn from_cluster_tile(name: impl Into<String>, tile: &ClusterTile, extent: u32) -> Self {
        let mut layer = Self::new(name, extent);

        for feature in &tile.features {
            layer.push(Feature {
                id: feature.id.clone(),
                geom_type: GeomType::Point,
                geometry: vec![vec![feature.point]],
                properties: Arc::new(feature.tags.clone()),
            });
        }

        layer
    }
}

#[inline]
fn to_pixel(p: &[f64; 2]) -> [i32; 2] {
    [p[0] as i32, p[1] as i32]
}

/// Encode `layers` as a vector tile.
pub fn encode(layers: &[Layer]) -> Bytes {
    let tile = mvt::Tile {
        layers: layers.iter().map(build_layer).collect(),
    };
    Bytes::from(tile.encode_to_vec())
}

/// A property value in vector tile terms.
#[derive(Debug, Clone, PartialEq)]
enum TileValue {
    String(String),
    Double(f64),
    Uint(u64),
    Sint(i64),
    Bool(bool),
}

impl TileValue {
    /// `None` for nulls, which are never encoded. Arrays and objects are
    /// written as their JSON text.
    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(TileValue::Bool(*b)),
            JsonValue::String(s) => Some(TileValue::String(s.clone())),
            JsonValue::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Some(TileValue::Uint(u))
                } else if let Some(i) = n.as_i64() {
                    Some(TileValue::Sint(i))
                } else {
                    n.as_f64().map(Self::from_f64)
                }
            }
            JsonValue::Array(_) | JsonValue::Object(_) => {
                Some(TileValue::String(value.to_string()))
            }
        }
    }

    fn from_f64(f: f64) -> Self {
        if f.fract() != 0.0 {
            TileValue::Double(f)
        } else if (SINT_MIN..0.0).contains(&f) {
            TileValue::Sint(f as i64)
        } else if (0.0..UINT_END).contains(&f) {
            TileValue::Uint(f as u64)
        } else {
            TileValue::Double(f)
        }
    }

    fn cache_key(&self) -> String {
        match self {
            TileValue::String(s) => format!("string:{s}"),
            TileValue::Double(f) => format!("double:{f}"),
            TileValue::Uint(u) => format!("uint:{u}"),
            TileValue::Sint(i) => format!("sint:{i}"),
            TileValue::Bool(b) => format!("bool:{b}"),
        }
    }

    fn to_message(&self) -> mvt::tile::Value {
        let mut value = mvt::tile::Value::default();
        match self {
            TileValue::String(s) => value.string_value = Some(s.clone()),
            TileValue::Double(f) => value.double_value = Some(*f),
            TileValue::Uint(u) => value.uint_value = Some(*u),
            TileValue::Sint(i) => value.sint_value = Some(*i),
            TileValue::Bool(b) => value.bool_value = Some(*b),
        }
        value
    }
}

/// Per-layer key and value tables.
#[derive(Default)]
struct LayerTables {
    keys: Vec<String>,
    key_cache: FxHashMap<String, u32>,
    values: Vec<TileValue>,
    value_cache: FxHashMap<String, u32>,
}

impl LayerTables {
    fn key_index(&mut self, key: &str) -> u32 {
        if let Some(&index) = self.key_cache.get(key) {
            return index;
        }
        let index = self.keys.len() as u32;
        self.keys.push(key.to_string());
        self.key_cache.insert(key.to_string(), index);
        index
    }

    fn value_index(&mut self, value: TileValue) -> u32 {
        let cache_key = value.cache_key();
        if let Some(&index) = self.value_cache.get(&cache_key) {
            return index;
        }
        let index = self.values.len() as u32;
        self.values.push(value);
        self.value_cache.insert(cache_key, index);
        index
    }
}

fn build_layer(layer: &Layer) -> mvt::tile::Layer {
    let mut tables = LayerTables::default();
    let features = layer
        .features
        .iter()
        .map(|feature| build_feature(feature, &mut tables))
        .collect();

    mvt::tile::Layer {
        version: layer.version,
        name: layer.name.clone(),
        features,
        keys: tables.keys,
        values: tables.values.iter().map(TileValue::to_message).collect(),
        extent: Some(layer.extent),
    }
}

fn build_feature(feature: &Feature, tables: &mut LayerTables) -> mvt::tile::Feature {
    let id = feature.id.as_ref().and_then(|id| {
        let numeric = match id {
            Id::Number(n) => n.as_u64(),
            Id::String(_) => None,
        };
        if numeric.is_none() {
            log::warn!("Skipping feature id {:?}: not a non-negative integer", id);
        }
        numeric
    });

    let mut tags = Vec::with_capacity(feature.properties.len() * 2);
    for (key, value) in feature.properties.iter() {
        let Some(value) = TileValue::from_json(value) else {
            continue;
        };
        tags.push(tables.key_index(key));
        tags.push(tables.value_index(value));
    }

    mvt::tile::Feature {
        id,
        tags,
        r#type: Some(geom_type(feature.geom_type) as i32),
        geometry: encode_geometry(feature),
    }
}

fn geom_type(geom_type: GeomType) -> mvt::tile::GeomType {
    match geom_type {
        GeomType::Point => mvt::tile::GeomType::Point,
        GeomType::LineString => mvt::tile::GeomType::Linestring,
        GeomType::Polygon => mvt::tile::GeomType::Polygon,
    }
}

#[inline]
fn command(cmd: u32, len: u32) -> u32 {
    (len << 3) | cmd
}

#[inline]
fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Command stream for a feature's geometry, delta-encoded from the
/// previous cursor position.
fn encode_geometry(feature: &Feature) -> Vec<u32> {
    let geom_type = feature.geom_type;
    let mut out = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);

    for ring in &feature.geometry {
        // Polygons drop the closing vertex in favor of closepath
        let line_count = match geom_type {
            GeomType::Polygon => ring.len().saturating_sub(1),
            _ => ring.len(),
        };
        if line_count == 0 {
            continue;
        }

        let move_count = if geom_type == GeomType::Point {
            ring.len() as u32
        } else {
            1
        };
        out.push(command(CMD_MOVE_TO, move_count));

        for (i, p) in ring.iter().take(line_count).enumerate() {
            if i == 1 && geom_type != GeomType::Point {
                out.push(command(CMD_LINE_TO, line_count as u32 - 1));
            }
            let dx = p[0].wrapping_sub(x);
            let dy = p[1].wrapping_sub(y);
            out.push(zigzag32(dx));
            out.push(zigzag32(dy));
            x = p[0];
            y = p[1];
        }

        if geom_type == GeomType::Polygon {
            out.push(command(CMD_CLOSE_PATH, 1));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn geometry_stream(feature: &Feature) -> Vec<u32> {
        encode_geometry(feature)
    }

    fn feature(geom_type: GeomType, geometry: Vec<Vec<[i32; 2]>>) -> Feature {
        Feature {
            id: None,
            geom_type,
            geometry,
            properties: Arc::default(),
        }
    }

    #[test]
    fn test_point_geometry() {
        let f = feature(GeomType::Point, vec![vec![[25, 17]]]);
        assert_eq!(geometry_stream(&f), [9, 50, 34]);
    }

    #[test]
    fn test_multipoint_single_moveto() {
        let f = feature(GeomType::Point, vec![vec![[5, 7], [3, 2]]]);
        assert_eq!(geometry_stream(&f), [17, 10, 14, 3, 9]);
    }

    #[test]
    fn test_linestring_geometry() {
        let f = feature(GeomType::LineString, vec![vec![[2, 2], [2, 10], [10, 10]]]);
        assert_eq!(geometry_stream(&f), [9, 4, 4, 18, 0, 16, 16, 0]);
    }

    #[test]
    fn test_polygon_geometry() {
        let f = feature(
            GeomType::Polygon,
            vec![vec![[3, 6], [8, 12], [20, 34], [3, 6]]],
        );
        assert_eq!(geometry_stream(&f), [9, 6, 12, 18, 10, 12, 24, 44, 15]);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag32(-2), 3);
        assert_eq!(zigzag32(i32::MAX), u32::MAX - 1);
        assert_eq!(zigzag32(i32::MIN), u32::MAX);
    }

    #[test]
    fn test_value_typing() {
        assert_eq!(TileValue::from_json(&json!(null)), None);
        assert_eq!(
            TileValue::from_json(&json!("a")),
            Some(TileValue::String("a".into()))
        );
        assert_eq!(TileValue::from_json(&json!(3)), Some(TileValue::Uint(3)));
        assert_eq!(TileValue::from_json(&json!(-3)), Some(TileValue::Sint(-3)));
        assert_eq!(
            TileValue::from_json(&json!(1.5)),
            Some(TileValue::Double(1.5))
        );
        assert_eq!(TileValue::from_json(&json!(2.0)), Some(TileValue::Uint(2)));
        assert_eq!(
            TileValue::from_json(&json!([1, 2])),
            Some(TileValue::String("[1,2]".into()))
        );
    }

    #[test]
    fn test_integral_doubles_outside_integer_range() {
        assert_eq!(
            TileValue::from_json(&json!(1e20)),
            Some(TileValue::Double(1e20))
        );
        assert_eq!(
            TileValue::from_json(&json!(-1e20)),
            Some(TileValue::Double(-1e20))
        );
        assert_eq!(
            TileValue::from_json(&json!(-9.223372036854775808e18)),
            Some(TileValue::Sint(i64::MIN))
        );
        assert_eq!(
            TileValue::from_json(&json!(1.8446744073709552e19)),
            Some(TileValue::Double(1.8446744073709552e19))
        );
        assert_eq!(
            TileValue::from_json(&json!(f64::MAX)),
            Some(TileValue::Double(f64::MAX))
        );
    }

    #[test]
    fn test_tables_deduplicate() {
        let mut tables = LayerTables::default();
        assert_eq!(tables.key_index("a"), 0);
        assert_eq!(tables.key_index("b"), 1);
        assert_eq!(tables.key_index("a"), 0);

        assert_eq!(tables.value_index(TileValue::Uint(1)), 0);
        assert_eq!(tables.value_index(TileValue::String("1".into())), 1);
        assert_eq!(tables.value_index(TileValue::Uint(1)), 0);
    }

    #[test]
    fn test_empty_layers() {
        assert!(encode(&[]).is_empty());
        let bytes = encode(&[Layer::new("empty", 4096)]);
        let decoded = mvt::Tile::decode(bytes.as_ref()).expect("valid tile");
        assert_eq!(decoded.layers.len(), 1);
        assert_eq!(decoded.layers[0].name, "empty");
        assert_eq!(decoded.layers[0].version, DEFAULT_LAYER_VERSION);
        assert_eq!(decoded.layers[0].extent, Some(4096));
        assert!(decoded.layers[0].features.is_empty());
    }
}
