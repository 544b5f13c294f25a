//! Tile creation from clipped features, and the pixel transform.

use super::types::{
    GeomType, ProjectedFeature, ProjectedGeometry, Ring, Tile, TileFeature, TileGeometry,
};
use crate::compute::projection::round_half_up;
use crate::config::TileOptions;
use serde_json::json;
use std::sync::Arc;

/// Build tile `(z, x, y)` from the features clipped to it, dropping vertices
/// and rings that are insignificant at this zoom.
pub(crate) fn create_tile(
    features: &[ProjectedFeature],
    z: u8,
    x: u32,
    y: u32,
    options: &TileOptions,
) -> Tile {
    let tolerance = if z == options.max_zoom {
        0.0
    } else {
        options.tolerance / ((1u64 << z) as f64 * options.extent as f64)
    };

    let mut tile = Tile {
        features: Vec::new(),
        num_points: 0,
        num_simplified: 0,
        num_features: features.len(),
        min_x: 2.0,
        min_y: 1.0,
        max_x: -1.0,
        max_y: 0.0,
        z,
        x,
        y,
        source: None,
        transformed: false,
    };

    for feature in features {
        add_feature(&mut tile, feature, tolerance, options);
    }

    log::trace!(
        "tile z{}-{}-{}: {} features, {} of {} points kept",
        z,
        x,
        y,
        tile.num_features,
        tile.num_simplified,
        tile.num_points
    );
    tile
}

fn add_feature(tile: &mut Tile, feature: &ProjectedFeature, tolerance: f64, options: &TileOptions) {
    tile.min_x = tile.min_x.min(feature.min_x);
    tile.min_y = tile.min_y.min(feature.min_y);
    tile.max_x = tile.max_x.max(feature.max_x);
    tile.max_y = tile.max_y.max(feature.max_y);

    let mut rings = Vec::new();
    let (geom_type, geometry) = match &feature.geometry {
        ProjectedGeometry::Point(points) | ProjectedGeometry::MultiPoint(points) => {
            tile.num_points += points.len();
            tile.num_simplified += points.len();
            let points = points.iter().map(|p| [p.x, p.y]).collect();
            (GeomType::Point, TileGeometry::Points(points))
        }
        ProjectedGeometry::LineString(line) => {
            add_line(&mut rings, tile, line, tolerance, false, false);
            (GeomType::LineString, TileGeometry::Rings(rings))
        }
        ProjectedGeometry::MultiLineString(lines) => {
            for line in lines {
                add_line(&mut rings, tile, line, tolerance, false, false);
            }
            (GeomType::LineString, TileGeometry::Rings(rings))
        }
        ProjectedGeometry::Polygon(polygon) => {
            for (i, ring) in polygon.iter().enumerate() {
                add_line(&mut rings, tile, ring, tolerance, true, i == 0);
            }
            (GeomType::Polygon, TileGeometry::Rings(rings))
        }
        ProjectedGeometry::MultiPolygon(polygons) => {
            for polygon in polygons {
                for (i, ring) in polygon.iter().enumerate() {
                    add_line(&mut rings, tile, ring, tolerance, true, i == 0);
                }
            }
            (GeomType::Polygon, TileGeometry::Rings(rings))
        }
    };

    if geometry.is_empty() {
        return;
    }

    let tags = match &feature.geometry {
        ProjectedGeometry::LineString(line) if options.line_metrics => {
            let mut tags = (*feature.tags).clone();
            tags.insert("mapbox_clip_start".into(), json!(line.start / line.size));
            tags.insert("mapbox_clip_end".into(), json!(line.end / line.size));
            Arc::new(tags)
        }
        _ => feature.tags.clone(),
    };

    tile.features.push(TileFeature {
        id: feature.id.clone(),
        geom_type,
        geometry,
        tags,
    });
}

fn add_line(
    out: &mut Vec<Vec<[f64; 2]>>,
    tile: &mut Tile,
    line: &Ring,
    tolerance: f64,
    is_polygon: bool,
    is_outer: bool,
) {
    let sq_tolerance = tolerance * tolerance;
    let min_size = if is_polygon { sq_tolerance } else { tolerance };

    if tolerance > 0.0 && line.size < min_size {
        tile.num_points += line.points.len();
        return;
    }

    let mut ring = Vec::with_capacity(line.points.len());
    for p in &line.points {
        if tolerance == 0.0 || p.z > sq_tolerance {
            tile.num_simplified += 1;
            ring.push([p.x, p.y]);
        }
        tile.num_points += 1;
    }

    if is_polygon {
        rewind(&mut ring, is_outer);
    }
    out.push(ring);
}

/// Orient a ring clockwise (outer) or counter-clockwise (hole), in a
/// y-down plane.
pub(crate) fn rewind(ring: &mut [[f64; 2]], clockwise: bool) {
    let len = ring.len();
    if len == 0 {
        return;
    }

    let mut area = 0.0;
    let mut j = len - 1;
    for i in 0..len {
        area += (ring[i][0] - ring[j][0]) * (ring[i][1] + ring[j][1]);
        j = i;
    }

    if (area > 0.0) == clockwise {
        ring.reverse();
    }
}

/// Remap a tile from projected space to integral tile pixels, once.
pub(crate) fn transform_tile(tile: &mut Tile, extent: u32) {
    if tile.transformed {
        return;
    }

    let extent = extent as f64;
    let z2 = (1u64 << tile.z) as f64;
    let (tx, ty) = (tile.x as f64, tile.y as f64);

    for feature in &mut tile.features {
        feature.geometry.for_each_point_mut(|p| {
            p[0] = round_half_up(extent * (p[0] * z2 - tx));
            p[1] = round_half_up(extent * (p[1] * z2 - ty));
        });
    }

    tile.transformed = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::types::Vertex;

    fn ring(coords: &[(f64, f64)], z: f64, size: f64) -> Ring {
        Ring {
            points: coords.iter().map(|&(x, y)| Vertex::new(x, y, z)).collect(),
            size,
            start: 0.0,
            end: size,
        }
    }

    fn feature(geometry: ProjectedGeometry) -> ProjectedFeature {
        ProjectedFeature::new(None, geometry, Arc::default())
    }

    fn signed_area(ring: &[[f64; 2]]) -> f64 {
        let mut area = 0.0;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            area += (ring[i][0] - ring[j][0]) * (ring[i][1] + ring[j][1]);
            j = i;
        }
        area
    }

    #[test]
    fn test_point_tile() {
        let point = feature(ProjectedGeometry::Point(vec![Vertex::new(0.5, 0.5, 0.0)]));
        let mut tile = create_tile(&[point], 0, 0, 0, &TileOptions::default());

        assert_eq!(tile.num_points, 1);
        assert_eq!(tile.num_features, 1);
        assert_eq!(tile.features[0].geom_type, GeomType::Point);

        transform_tile(&mut tile, 4096);
        assert_eq!(
            tile.features[0].geometry,
            TileGeometry::Points(vec![[2048.0, 2048.0]])
        );
    }

    #[test]
    fn test_transform_once() {
        let point = feature(ProjectedGeometry::Point(vec![Vertex::new(0.25, 0.75, 0.0)]));
        let mut tile = create_tile(&[point], 1, 0, 1, &TileOptions::default());

        transform_tile(&mut tile, 4096);
        let first = tile.clone();
        transform_tile(&mut tile, 4096);

        assert_eq!(tile, first);
        assert_eq!(
            tile.features[0].geometry,
            TileGeometry::Points(vec![[2048.0, 2048.0]])
        );
    }

    #[test]
    fn test_tiny_ring_dropped_below_max_zoom() {
        let options = TileOptions::default();
        let tiny = ring(
            &[(0.5, 0.5), (0.5000001, 0.5), (0.5, 0.5000001), (0.5, 0.5)],
            1.0,
            1e-16,
        );
        let polygon = feature(ProjectedGeometry::Polygon(vec![tiny]));
        let tile = create_tile(&[polygon], 0, 0, 0, &options);

        assert!(tile.features.is_empty());
        assert_eq!(tile.num_points, 4);
        assert_eq!(tile.num_simplified, 0);
    }

    #[test]
    fn test_max_zoom_keeps_every_vertex() {
        let options = TileOptions::default().with_max_zoom(3).with_index_max_zoom(3);
        let line = ring(&[(0.1, 0.1), (0.2, 0.2), (0.3, 0.1)], 0.0, 1e-9);
        let tile = create_tile(
            &[feature(ProjectedGeometry::LineString(line))],
            3,
            0,
            0,
            &options,
        );

        let TileGeometry::Rings(rings) = &tile.features[0].geometry else {
            panic!("expected rings");
        };
        assert_eq!(rings[0].len(), 3);
    }

    #[test]
    fn test_polygon_rings_rewound() {
        let outer = ring(
            &[(0.1, 0.1), (0.1, 0.4), (0.4, 0.4), (0.4, 0.1), (0.1, 0.1)],
            1.0,
            0.09,
        );
        let hole = ring(
            &[(0.2, 0.2), (0.3, 0.2), (0.3, 0.3), (0.2, 0.3), (0.2, 0.2)],
            1.0,
            0.01,
        );
        let polygon = feature(ProjectedGeometry::Polygon(vec![outer, hole]));
        let tile = create_tile(&[polygon], 0, 0, 0, &TileOptions::default());

        let TileGeometry::Rings(rings) = &tile.features[0].geometry else {
            panic!("expected rings");
        };
        assert!(signed_area(&rings[0]) < 0.0);
        assert!(signed_area(&rings[1]) > 0.0);
    }

    #[test]
    fn test_line_metrics_tags() {
        let options = TileOptions::default().with_line_metrics(true);
        let mut line = ring(&[(0.1, 0.5), (0.2, 0.5)], 1.0, 0.4);
        line.start = 0.1;
        line.end = 0.2;
        let tile = create_tile(
            &[feature(ProjectedGeometry::LineString(line))],
            0,
            0,
            0,
            &options,
        );

        let tags = &tile.features[0].tags;
        assert_eq!(tags["mapbox_clip_start"], json!(0.25));
        assert_eq!(tags["mapbox_clip_end"], json!(0.5));
    }

    #[test]
    fn test_tile_bounds_track_features() {
        let a = feature(ProjectedGeometry::Point(vec![Vertex::new(0.2, 0.3, 0.0)]));
        let b = feature(ProjectedGeometry::Point(vec![Vertex::new(0.6, 0.1, 0.0)]));
        let tile = create_tile(&[a, b], 0, 0, 0, &TileOptions::default());
        assert_eq!(
            [tile.min_x, tile.min_y, tile.max_x, tile.max_y],
            [0.2, 0.1, 0.6, 0.3]
        );
    }
}
