//! Axis-aligned stripe clipping of projected features.

use super::types::{ProjectedFeature, ProjectedGeometry, Ring, Vertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline]
    fn of(self, v: &Vertex) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }

    fn bounds(self, f: &ProjectedFeature) -> (f64, f64) {
        match self {
            Axis::X => (f.min_x, f.max_x),
            Axis::Y => (f.min_y, f.max_y),
        }
    }

    /// Add the crossing of `a-b` with the line `axis = k` to `out`, returning
    /// its parameter along the segment.
    fn intersect(self, out: &mut Vec<Vertex>, a: &Vertex, b: &Vertex, k: f64) -> f64 {
        match self {
            Axis::X => {
                let t = (k - a.x) / (b.x - a.x);
                out.push(Vertex::new(k, a.y + (b.y - a.y) * t, 1.0));
                t
            }
            Axis::Y => {
                let t = (k - a.y) / (b.y - a.y);
                out.push(Vertex::new(a.x + (b.x - a.x) * t, k, 1.0));
                t
            }
        }
    }
}

/// Clip `features` to the stripe `k1 <= axis < k2`, where `k1`/`k2` are in
/// units of `1 / scale` and `min_all`/`max_all` bound all features on `axis`.
///
/// Returns `None` when nothing survives.
#[allow(clippy::too_many_arguments)]
pub(crate) fn clip(
    features: &[ProjectedFeature],
    scale: f64,
    k1: f64,
    k2: f64,
    axis: Axis,
    min_all: f64,
    max_all: f64,
    line_metrics: bool,
) -> Option<Vec<ProjectedFeature>> {
    let k1 = k1 / scale;
    let k2 = k2 / scale;

    if min_all >= k1 && max_all < k2 {
        return Some(features.to_vec());
    }
    if max_all < k1 || min_all >= k2 {
        return None;
    }

    let mut clipped = Vec::new();

    for feature in features {
        let (min, max) = axis.bounds(feature);

        if min >= k1 && max < k2 {
            clipped.push(feature.clone());
            continue;
        }
        if max < k1 || min >= k2 {
            continue;
        }

        let geometry = match &feature.geometry {
            ProjectedGeometry::Point(points) | ProjectedGeometry::MultiPoint(points) => {
                let points: Vec<_> = points
                    .iter()
                    .filter(|p| {
                        let a = axis.of(p);
                        a >= k1 && a <= k2
                    })
                    .copied()
                    .collect();

                match points.len() {
                    0 => continue,
                    1 => ProjectedGeometry::Point(points),
                    _ => ProjectedGeometry::MultiPoint(points),
                }
            }
            ProjectedGeometry::LineString(line) => {
                let mut slices = Vec::new();
                clip_line(line, &mut slices, k1, k2, axis, false, line_metrics);

                if line_metrics {
                    for slice in slices {
                        clipped.push(ProjectedFeature::new(
                            feature.id.clone(),
                            ProjectedGeometry::LineString(slice),
                            feature.tags.clone(),
                        ));
                    }
                    continue;
                }
                match lines_geometry(slices) {
                    Some(geometry) => geometry,
                    None => continue,
                }
            }
            ProjectedGeometry::MultiLineString(lines) => {
                match lines_geometry(clip_lines(lines, k1, k2, axis, false)) {
                    Some(geometry) => geometry,
                    None => continue,
                }
            }
            ProjectedGeometry::Polygon(rings) => {
                let rings = clip_lines(rings, k1, k2, axis, true);
                if rings.is_empty() {
                    continue;
                }
                ProjectedGeometry::Polygon(rings)
            }
            ProjectedGeometry::MultiPolygon(polygons) => {
                let polygons: Vec<_> = polygons
                    .iter()
                    .map(|rings| clip_lines(rings, k1, k2, axis, true))
                    .filter(|rings| !rings.is_empty())
                    .collect();
                if polygons.is_empty() {
                    continue;
                }
                ProjectedGeometry::MultiPolygon(polygons)
            }
        };

        clipped.push(ProjectedFeature::new(
            feature.id.clone(),
            geometry,
            feature.tags.clone(),
        ));
    }

    (!clipped.is_empty()).then_some(clipped)
}

/// Line slices become a LineString when there is exactly one.
fn lines_geometry(mut slices: Vec<Ring>) -> Option<ProjectedGeometry> {
    match slices.len() {
        0 => None,
        1 => slices.pop().map(ProjectedGeometry::LineString),
        _ => Some(ProjectedGeometry::MultiLineString(slices)),
    }
}

fn clip_lines(lines: &[Ring], k1: f64, k2: f64, axis: Axis, is_polygon: bool) -> Vec<Ring> {
    let mut out = Vec::new();
    for line in lines {
        clip_line(line, &mut out, k1, k2, axis, is_polygon, false);
    }
    out
}

/// Clip one line or ring. Lines may split into several slices; rings stay
/// whole and are re-closed if clipping opened them.
fn clip_line(
    line: &Ring,
    out: &mut Vec<Ring>,
    k1: f64,
    k2: f64,
    axis: Axis,
    is_polygon: bool,
    track_metrics: bool,
) {
    let Some(last) = line.points.last() else {
        return;
    };

    let mut slice = Ring::empty_like(line);
    let mut len = line.start;
    let mut seg_len = 0.0;
    let mut t = 0.0;

    for pair in line.points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let (ak, bk) = (axis.of(a), axis.of(b));
        let mut exited = false;

        if track_metrics {
            seg_len = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        }

        if ak < k1 {
            // ---|-->  |
            if bk > k1 {
                t = axis.intersect(&mut slice.points, a, b, k1);
                if track_metrics {
                    slice.start = len + seg_len * t;
                }
            }
        } else if ak > k2 {
            // |  <--|---
            if bk < k2 {
                t = axis.intersect(&mut slice.points, a, b, k2);
                if track_metrics {
                    slice.start = len + seg_len * t;
                }
            }
        } else {
            slice.points.push(*a);
        }

        if bk < k1 && ak >= k1 {
            // <--|---  |
            t = axis.intersect(&mut slice.points, a, b, k1);
            exited = true;
        }
        if bk > k2 && ak <= k2 {
            // |  ---|-->
            t = axis.intersect(&mut slice.points, a, b, k2);
            exited = true;
        }

        if !is_polygon && exited {
            if track_metrics {
                slice.end = len + seg_len * t;
            }
            out.push(std::mem::replace(&mut slice, Ring::empty_like(line)));
        }

        if track_metrics {
            len += seg_len;
        }
    }

    let a = axis.of(last);
    if a >= k1 && a <= k2 {
        slice.points.push(*last);
    }

    if is_polygon && slice.points.len() >= 2 {
        let first = slice.points[0];
        if let Some(end) = slice.points.last()
            && (end.x != first.x || end.y != first.y)
        {
            slice.points.push(first);
        }
    }

    if !slice.points.is_empty() {
        out.push(slice);
    }
}
