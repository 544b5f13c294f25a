use geozero::mvt::tile::{Feature as MvtFeature, GeomType as MvtGeomType, Layer as MvtLayer};
use geozero::mvt::{Message, Tile as MvtTile};
use serde_json::json;
use spatio_tiles::cluster::ClusterPoint;
use spatio_tiles::codec::{Feature, Layer, encode};
use spatio_tiles::tile::GeomType;
use spatio_tiles::{ClusterIndex, ClusterOptions, Point, TileIndex, TileOptions};
use std::sync::Arc;

fn decode(bytes: &[u8]) -> MvtTile {
    MvtTile::decode(bytes).expect("Failed to decode vector tile")
}

fn decode_zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Rebuild absolute paths from a command stream. Closepath repeats the
/// ring's first vertex.
fn decode_paths(commands: &[u32]) -> Vec<Vec<[i32; 2]>> {
    let mut paths = Vec::new();
    let mut path: Vec<[i32; 2]> = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut cursor = 0;

    while cursor < commands.len() {
        let id = commands[cursor] & 0x7;
        let count = commands[cursor] >> 3;
        cursor += 1;

        match id {
            1 | 2 => {
                for _ in 0..count {
                    x += decode_zigzag(commands[cursor]);
                    y += decode_zigzag(commands[cursor + 1]);
                    cursor += 2;
                    if id == 1 && !path.is_empty() {
                        paths.push(std::mem::take(&mut path));
                    }
                    path.push([x, y]);
                }
            }
            7 => {
                if let Some(&first) = path.first() {
                    path.push(first);
                }
            }
            other => panic!("unexpected command {other}"),
        }
    }
    if !path.is_empty() {
        paths.push(path);
    }
    paths
}

fn properties(layer: &MvtLayer, feature: &MvtFeature) -> serde_json::Map<String, serde_json::Value> {
    feature
        .tags
        .chunks(2)
        .map(|pair| {
            let key = layer.keys[pair[0] as usize].clone();
            let value = &layer.values[pair[1] as usize];
            let value = if let Some(s) = &value.string_value {
                json!(s)
            } else if let Some(b) = value.bool_value {
                json!(b)
            } else if let Some(u) = value.uint_value {
                json!(u)
            } else if let Some(i) = value.sint_value {
                json!(i)
            } else if let Some(d) = value.double_value {
                json!(d)
            } else {
                panic!("unexpected value {:?}", value)
            };
            (key, value)
        })
        .collect()
}

#[test]
fn test_tile_layer_roundtrip() {
    let geojson = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","id":1,"properties":{"name":"point","rank":3},
         "geometry":{"type":"Point","coordinates":[0,0]}},
        {"type":"Feature","id":2,"properties":{"name":"line","width":-2,"ratio":0.5},
         "geometry":{"type":"LineString","coordinates":[[-45,-20],[0,10],[45,20]]}},
        {"type":"Feature","id":3,"properties":{"name":"area","open":true},
         "geometry":{"type":"Polygon","coordinates":[[[-20,-20],[20,-20],[20,20],[-20,20],[-20,-20]]]}}
    ]}"#;
    let mut index = TileIndex::from_json_str(geojson, TileOptions::default())
        .expect("Failed to build tile index");
    let tile = index.get_tile(0, 0, 0).expect("Tile 0/0/0 should exist");
    let layer = Layer::from_tile("features", tile, 4096);

    let decoded = decode(&encode(std::slice::from_ref(&layer)));
    assert_eq!(decoded.layers.len(), 1);

    let mvt_layer = &decoded.layers[0];
    assert_eq!(mvt_layer.name, "features");
    assert_eq!(mvt_layer.version, 2);
    assert_eq!(mvt_layer.extent, Some(4096));
    assert_eq!(mvt_layer.features.len(), layer.features.len());

    for (expected, actual) in layer.features.iter().zip(&mvt_layer.features) {
        let expected_type = match expected.geom_type {
            GeomType::Point => MvtGeomType::Point,
            GeomType::LineString => MvtGeomType::Linestring,
            GeomType::Polygon => MvtGeomType::Polygon,
        };
        assert_eq!(actual.r#type, Some(expected_type as i32));
        assert_eq!(decode_paths(&actual.geometry), expected.geometry);
        assert_eq!(&properties(mvt_layer, actual), expected.properties.as_ref());
    }

    let ids: Vec<_> = mvt_layer.features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn test_point_at_tile_center() {
    let mut index = TileIndex::from_json_str(
        r#"{"type":"Point","coordinates":[0,0]}"#,
        TileOptions::default(),
    )
    .expect("Failed to build tile index");
    let tile = index.get_tile(0, 0, 0).expect("Tile should exist");

    let decoded = decode(&encode(&[Layer::from_tile("p", tile, 4096)]));
    let feature = &decoded.layers[0].features[0];
    assert_eq!(decode_paths(&feature.geometry), vec![vec![[2048, 2048]]]);
    assert_eq!(feature.id, None);
}

#[test]
fn test_values_deduplicated_per_layer() {
    let mut layer = Layer::new("dedup", 4096);
    for i in 0..10 {
        let mut properties = serde_json::Map::new();
        properties.insert("kind".into(), json!("shop"));
        properties.insert("index".into(), json!(i % 2));
        properties.insert("skip".into(), json!(null));
        layer.push(Feature {
            id: Some(geojson::feature::Id::Number(i.into())),
            geom_type: GeomType::Point,
            geometry: vec![vec![[i, i]]],
            properties: Arc::new(properties),
        });
    }

    let decoded = decode(&encode(&[layer]));
    let mvt_layer = &decoded.layers[0];

    assert_eq!(mvt_layer.keys.len(), 2);
    assert_eq!(mvt_layer.values.len(), 3);
    assert!(!mvt_layer.keys.contains(&"skip".to_string()));
}

#[test]
fn test_non_integer_ids_skipped() {
    let mut layer = Layer::new("ids", 4096);
    for id in [
        geojson::feature::Id::String("abc".into()),
        geojson::feature::Id::Number((-4).into()),
        geojson::feature::Id::Number(7.into()),
    ] {
        layer.push(Feature {
            id: Some(id),
            geom_type: GeomType::Point,
            geometry: vec![vec![[1, 1]]],
            properties: Arc::default(),
        });
    }

    let decoded = decode(&encode(&[layer]));
    let ids: Vec<_> = decoded.layers[0].features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![None, None, Some(7)]);
}

#[test]
fn test_huge_integral_numbers_stay_doubles() {
    let mut props = serde_json::Map::new();
    props.insert("big".into(), json!(1e20));
    props.insert("small".into(), json!(-1e20));
    props.insert("whole".into(), json!(42.0));

    let mut layer = Layer::new("numbers", 4096);
    layer.push(Feature {
        id: None,
        geom_type: GeomType::Point,
        geometry: vec![vec![[0, 0]]],
        properties: Arc::new(props),
    });

    let decoded = decode(&encode(&[layer]));
    let layer = &decoded.layers[0];
    let value = |key: &str| {
        let feature = &layer.features[0];
        let pair = feature
            .tags
            .chunks(2)
            .find(|pair| layer.keys[pair[0] as usize] == key)
            .expect("Key should be tagged");
        layer.values[pair[1] as usize].clone()
    };

    assert_eq!(value("big").double_value, Some(1e20));
    assert_eq!(value("big").uint_value, None);
    assert_eq!(value("small").double_value, Some(-1e20));
    assert_eq!(value("small").sint_value, None);
    assert_eq!(value("whole").uint_value, Some(42));
}

#[test]
fn test_cluster_layer_roundtrip() {
    let mut index = ClusterIndex::new(ClusterOptions::default()).expect("Failed to create index");
    index
        .load(vec![
            ClusterPoint::new(Point::new(10.0, 10.0)),
            ClusterPoint::new(Point::new(10.001, 10.001)),
            ClusterPoint::new(Point::new(-100.0, -40.0)),
        ])
        .expect("Failed to load points");

    let tile = index.get_tile(0, 0, 0).expect("Tile should have features");
    let layer = Layer::from_cluster_tile("clusters", &tile, 512);
    let decoded = decode(&encode(&[layer]));

    let mvt_layer = &decoded.layers[0];
    assert_eq!(mvt_layer.extent, Some(512));
    assert_eq!(mvt_layer.features.len(), 2);

    let counts: Vec<_> = mvt_layer
        .features
        .iter()
        .filter_map(|f| properties(mvt_layer, f).get("point_count").cloned())
        .collect();
    assert_eq!(counts, vec![json!(2)]);
}

#[test]
fn test_multiple_layers() {
    let layers = [Layer::new("a", 4096), Layer::new("b", 256).with_version(1)];
    let decoded = decode(&encode(&layers));

    assert_eq!(decoded.layers.len(), 2);
    assert_eq!(decoded.layers[1].name, "b");
    assert_eq!(decoded.layers[1].version, 1);
    assert_eq!(decoded.layers[1].extent, Some(256));
}
