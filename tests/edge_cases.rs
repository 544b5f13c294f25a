use geozero::mvt::{Message, Tile as MvtTile};
use serde_json::json;
use spatio_tiles::cluster::ClusterPoint;
use spatio_tiles::codec::{Feature, Layer, encode};
use spatio_tiles::tile::{GeomType, TileGeometry};
use spatio_tiles::{ClusterIndex, ClusterOptions, Point, TileIndex, TileOptions};
use std::sync::Arc;

const WORLD: [f64; 4] = [-180.0, -85.0, 180.0, 85.0];

fn cluster_index(options: ClusterOptions, points: Vec<ClusterPoint>) -> ClusterIndex {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut index = ClusterIndex::new(options).expect("Failed to create index");
    index.load(points).expect("Failed to load points");
    index
}

/// Test 1: Large dataset stress test
#[test]
fn test_large_dataset_clustering() {
    // 10K points spread over a small region (keeping it reasonable for CI)
    let points = (0..10_000)
        .map(|i| {
            let lng = -74.0 + (i % 100) as f64 * 0.001;
            let lat = 40.0 + (i / 100) as f64 * 0.001;
            ClusterPoint::new(Point::new(lng, lat))
        })
        .collect();
    let index = cluster_index(ClusterOptions::default(), points);

    let clusters = index.get_clusters(WORLD, 0.0);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].point_count(), 10_000);
    assert_eq!(clusters[0].properties()["point_count_abbreviated"], json!("10k"));

    let id = clusters[0].cluster_id().expect("Expected a cluster");
    let leaves = index.get_all_leaves(id).expect("Failed to get leaves");
    assert_eq!(leaves.len(), 10_000);
}

/// Test 2: Identical points never split
#[test]
fn test_duplicate_points() {
    let points = (0..100)
        .map(|_| ClusterPoint::new(Point::new(2.3522, 48.8566)))
        .collect();
    let index = cluster_index(ClusterOptions::default(), points);

    let deepest = index.get_clusters(WORLD, 16.0);
    assert_eq!(deepest.len(), 1);
    assert_eq!(deepest[0].point_count(), 100);

    let id = deepest[0].cluster_id().expect("Expected a cluster");
    let zoom = index
        .get_cluster_expansion_zoom(id)
        .expect("Failed to get expansion zoom");
    assert_eq!(zoom, 17);
}

/// Test 3: Extreme coordinate values
#[test]
fn test_extreme_coordinates() {
    let points = vec![
        ClusterPoint::new(Point::new(0.0, 90.0)),
        ClusterPoint::new(Point::new(0.0, -90.0)),
        ClusterPoint::new(Point::new(180.0, 0.0)),
        ClusterPoint::new(Point::new(-180.0, 0.0)),
    ];
    let index = cluster_index(ClusterOptions::default(), points);

    // Poles are clamped onto the map edges
    let everything = index.get_clusters([-180.0, -90.0, 180.0, 90.0], 17.0);
    assert_eq!(everything.len(), 4);

    let mut tiles = TileIndex::from_json_str(
        r#"{"type":"Point","coordinates":[0,89]}"#,
        TileOptions::default(),
    )
    .expect("Failed to build tile index");
    let tile = tiles.get_tile(0, 0, 0).expect("Tile should exist");
    assert_eq!(
        tile.features[0].geometry,
        TileGeometry::Points(vec![[2048.0, 0.0]])
    );
}

/// Test 4: Empty inputs
#[test]
fn test_empty_indexes() {
    let index = cluster_index(ClusterOptions::default(), Vec::new());
    assert!(index.is_empty());
    assert!(index.get_clusters(WORLD, 3.0).is_empty());
    assert!(index.get_tile(0, 0, 0).is_none());

    let mut tiles = TileIndex::from_json_str(
        r#"{"type":"MultiPoint","coordinates":[]}"#,
        TileOptions::default(),
    )
    .expect("Failed to build tile index");
    assert!(tiles.get_tile(0, 0, 0).is_none());
}

/// Test 5: Non-finite query boxes
#[test]
fn test_non_finite_queries() {
    let index = cluster_index(
        ClusterOptions::default(),
        vec![ClusterPoint::new(Point::new(1.0, 1.0))],
    );

    assert!(index.get_clusters([f64::NAN, -10.0, 10.0, 10.0], 0.0).is_empty());
    assert!(index.get_clusters([-10.0, -10.0, f64::INFINITY, 10.0], 0.0).is_empty());
}

/// Test 6: Zero radius and high min_points
#[test]
fn test_clustering_thresholds() {
    let close = || {
        vec![
            ClusterPoint::new(Point::new(10.0, 10.0)),
            ClusterPoint::new(Point::new(10.0001, 10.0)),
        ]
    };

    let no_radius = cluster_index(ClusterOptions::default().with_radius(0.0), close());
    assert_eq!(no_radius.get_clusters(WORLD, 0.0).len(), 2);

    let strict = cluster_index(ClusterOptions::default().with_min_points(3), close());
    let found = strict.get_clusters(WORLD, 0.0);
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|f| !f.is_cluster()));
}

/// Test 7: Polygon covering a whole tile
#[test]
fn test_polygon_covering_tile() {
    let mut tiles = TileIndex::from_json_str(
        r#"{"type":"Polygon","coordinates":[[[-180,-85],[180,-85],[180,85],[-180,85],[-180,-85]]]}"#,
        TileOptions::default(),
    )
    .expect("Failed to build tile index");

    let tile = tiles.get_tile(3, 2, 3).expect("Covered tile should exist");
    assert_eq!(tile.features.len(), 1);
    assert_eq!(tile.features[0].geom_type, GeomType::Polygon);

    let TileGeometry::Rings(rings) = &tile.features[0].geometry else {
        panic!("expected rings");
    };
    assert_eq!(rings.len(), 1);
    for point in &rings[0] {
        for v in point {
            assert!(*v == -64.0 || *v == 4160.0, "unexpected coordinate {v}");
        }
    }
}

/// Test 8: Degenerate geometry
#[test]
fn test_degenerate_geometry() {
    let mut tiles = TileIndex::from_json_str(
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[5,5],[5,5]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[0.0001,0],[0.0001,0.0001],[0,0]]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[-30,-30]}}
        ]}"#,
        TileOptions::default(),
    )
    .expect("Failed to build tile index");

    // Slivers vanish at low zoom; the point survives
    let tile = tiles.get_tile(0, 0, 0).expect("Tile should exist");
    assert_eq!(tile.features.len(), 1);
    assert_eq!(tile.features[0].geom_type, GeomType::Point);
}

/// Test 9: Long string values
#[test]
fn test_long_property_values() {
    let long = "x".repeat(100_000);
    let mut properties = serde_json::Map::new();
    properties.insert("blob".into(), json!(long.as_str()));
    properties.insert("nested".into(), json!({"a": [1, 2, 3]}));

    let mut layer = Layer::new("big", 4096);
    layer.push(Feature {
        id: None,
        geom_type: GeomType::Point,
        geometry: vec![vec![[0, 0]]],
        properties: Arc::new(properties),
    });

    let bytes = encode(&[layer]);
    let decoded = MvtTile::decode(bytes.as_ref()).expect("Failed to decode vector tile");
    let values = &decoded.layers[0].values;

    assert_eq!(values.len(), 2);
    assert!(values.iter().any(|v| v.string_value.as_deref() == Some(long.as_str())));
    // Objects are stored as their JSON text
    assert!(values
        .iter()
        .any(|v| v.string_value.as_deref() == Some(r#"{"a":[1,2,3]}"#)));
}

/// Test 10: Out-of-range tile requests
#[test]
fn test_out_of_range_tiles() {
    let mut tiles = TileIndex::from_json_str(
        r#"{"type":"Point","coordinates":[0,0]}"#,
        TileOptions::default(),
    )
    .expect("Failed to build tile index");

    assert!(tiles.get_tile(30, 0, 0).is_none());
    assert!(tiles.get_tile(1, 0, 2).is_none());
    assert!(tiles.get_tile(0, 0, 1).is_none());

    let index = cluster_index(
        ClusterOptions::default(),
        vec![ClusterPoint::new(Point::new(0.0, 0.0))],
    );
    assert!(index.get_tile(2, 0, 9).is_none());
}
