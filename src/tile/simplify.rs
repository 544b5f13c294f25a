//! Douglas-Peucker importance weights.
//!
//! Rather than dropping vertices, each interior vertex of `points[first..=last]`
//! is tagged with the squared distance at which it would be removed, so a
//! single pass serves every zoom level. Tiles keep a vertex when its weight
//! exceeds their squared tolerance.

use super::types::Vertex;

pub(crate) fn simplify(points: &mut [Vertex], first: usize, last: usize, sq_tolerance: f64) {
    let mut stack = vec![(first, last)];

    while let Some((first, last)) = stack.pop() {
        let mut max_sq_dist = sq_tolerance;
        let mid = first + ((last - first) >> 1);
        let mut min_pos_to_mid = last - first;
        let mut index = None;

        let (a, b) = (points[first], points[last]);
        for (i, p) in points.iter().enumerate().take(last).skip(first + 1) {
            let d = sq_seg_dist(p.x, p.y, a.x, a.y, b.x, b.y);

            if d > max_sq_dist {
                index = Some(i);
                max_sq_dist = d;
            } else if d == max_sq_dist {
                // Prefer splits near the middle to bound the worklist on
                // degenerate input
                let pos_to_mid = i.abs_diff(mid);
                if pos_to_mid < min_pos_to_mid {
                    index = Some(i);
                    min_pos_to_mid = pos_to_mid;
                }
            }
        }

        let Some(index) = index else { continue };
        if max_sq_dist > sq_tolerance {
            points[index].z = max_sq_dist;
            if index - first > 1 {
                stack.push((first, index));
            }
            if last - index > 1 {
                stack.push((index, last));
            }
        }
    }
}

/// Squared distance from `(px, py)` to the segment `(x, y)-(bx, by)`.
fn sq_seg_dist(px: f64, py: f64, mut x: f64, mut y: f64, bx: f64, by: f64) -> f64 {
    let mut dx = bx - x;
    let mut dy = by - y;

    if dx != 0.0 || dy != 0.0 {
        let t = ((px - x) * dx + (py - y) * dy) / (dx * dx + dy * dy);

        if t > 1.0 {
            x = bx;
            y = by;
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    dx = px - x;
    dy = py - y;

    dx * dx + dy * dy
}
