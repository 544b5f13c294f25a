//! Static 2D point index backed by a flat k-d tree.
//!
//! The tree is implicit: points live in two parallel arrays (`ids` and
//! interleaved `coords`) partitioned in place so that, for every range the
//! build visits, the middle element is the median along the axis chosen by
//! recursion depth. Nothing is sorted beyond that; ranges no longer than
//! `node_size` are left as unsorted leaf blocks and scanned linearly.
//!
//! ```rust
//! use spatio_tiles::kdtree::KdTree;
//!
//! let points = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 0.5)];
//! let tree = KdTree::<f64>::build(&points, |p| p.0, |p| p.1, 2);
//!
//! let mut hits = tree.range(0.5, 0.5, 3.0, 1.5);
//! hits.sort_unstable();
//! assert_eq!(hits, vec![1, 3]);
//!
//! let mut near = tree.within(0.0, 0.0, 1.5);
//! near.sort_unstable();
//! assert_eq!(near, vec![0, 1]);
//! ```

use crate::compute::validation::is_finite_box;
use smallvec::SmallVec;
use std::fmt::Debug;

/// Default leaf block size.
pub const DEFAULT_NODE_SIZE: usize = 64;

/// Ranges longer than this use Floyd-Rivest sampling before partitioning.
const SELECT_SAMPLE_THRESHOLD: isize = 600;

type QueryStack = SmallVec<[(usize, usize, u8); 32]>;

/// Coordinate storage type of a [`KdTree`].
///
/// `f64` keeps full precision; `f32` halves memory for callers that already
/// work with single-precision-rounded positions.
pub trait IndexCoord: Copy + PartialOrd + Debug + Default + 'static {
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl IndexCoord for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

impl IndexCoord for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// Input positions, stored in the narrowest integer type that fits.
#[derive(Debug, Clone)]
enum Ids {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Ids {
    fn identity(n: usize) -> Self {
        if n < 65_536 {
            Ids::U16((0..n as u16).collect())
        } else {
            Ids::U32((0..n as u32).collect())
        }
    }

    #[inline]
    fn get(&self, i: usize) -> usize {
        match self {
            Ids::U16(ids) => ids[i] as usize,
            Ids::U32(ids) => ids[i] as usize,
        }
    }

    #[inline]
    fn swap(&mut self, i: usize, j: usize) {
        match self {
            Ids::U16(ids) => ids.swap(i, j),
            Ids::U32(ids) => ids.swap(i, j),
        }
    }
}

/// Incremental construction of a [`KdTree`].
#[derive(Debug, Clone)]
pub struct KdTreeBuilder<T: IndexCoord = f64> {
    coords: Vec<T>,
    node_size: usize,
}

impl<T: IndexCoord> KdTreeBuilder<T> {
    pub fn new(node_size: usize) -> Self {
        Self::with_capacity(0, node_size)
    }

    pub fn with_capacity(capacity: usize, node_size: usize) -> Self {
        Self {
            coords: Vec::with_capacity(capacity * 2),
            node_size: node_size.max(1),
        }
    }

    /// Add a point and return its id (insertion order).
    pub fn add(&mut self, x: f64, y: f64) -> usize {
        let id = self.coords.len() / 2;
        self.coords.push(T::from_f64(x));
        self.coords.push(T::from_f64(y));
        id
    }

    /// Partition the points and freeze the index.
    pub fn finish(self) -> KdTree<T> {
        let n = self.coords.len() / 2;
        let mut tree = KdTree {
            ids: Ids::identity(n),
            coords: self.coords,
            node_size: self.node_size,
        };
        tree.sort();
        tree
    }
}

/// Immutable k-d tree answering box and radius queries with input positions.
#[derive(Debug, Clone)]
pub struct KdTree<T: IndexCoord = f64> {
    ids: Ids,
    coords: Vec<T>,
    node_size: usize,
}

impl<T: IndexCoord> KdTree<T> {
    /// Index `points` using the given coordinate accessors.
    ///
    /// Query results are indexes into `points`. A `node_size` of zero is
    /// treated as one.
    pub fn build<P>(
        points: &[P],
        get_x: impl Fn(&P) -> f64,
        get_y: impl Fn(&P) -> f64,
        node_size: usize,
    ) -> Self {
        let mut builder = KdTreeBuilder::with_capacity(points.len(), node_size);
        for p in points {
            builder.add(get_x(p), get_y(p));
        }
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.coords.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Interleaved `x, y` coordinates in tree order.
    pub fn coords(&self) -> &[T] {
        &self.coords
    }

    /// All ids whose coordinates fall inside the closed box.
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        if !is_finite_box(min_x, min_y, max_x, max_y) {
            log::warn!("Rejecting range query with non-finite bounds");
            return Vec::new();
        }

        let mut result = Vec::new();
        if self.is_empty() {
            return result;
        }

        let mut stack: QueryStack = SmallVec::new();
        stack.push((0, self.len() - 1, 0));

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for i in left..=right {
                    let (x, y) = self.point(i);
                    if x >= min_x && x <= max_x && y >= min_y && y <= max_y {
                        result.push(self.ids.get(i));
                    }
                }
                continue;
            }

            let m = (left + right) >> 1;
            let (x, y) = self.point(m);
            if x >= min_x && x <= max_x && y >= min_y && y <= max_y {
                result.push(self.ids.get(m));
            }

            let (go_left, go_right) = if axis == 0 {
                (min_x <= x, max_x >= x)
            } else {
                (min_y <= y, max_y >= y)
            };
            if go_left {
                stack.push((left, m - 1, 1 - axis));
            }
            if go_right {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result
    }

    /// All ids within Euclidean distance `r` of `(qx, qy)`.
    pub fn within(&self, qx: f64, qy: f64, r: f64) -> Vec<usize> {
        if !qx.is_finite() || !qy.is_finite() || !r.is_finite() {
            log::warn!("Rejecting radius query with non-finite parameters");
            return Vec::new();
        }
        if r < 0.0 {
            log::warn!("Rejecting radius query with negative radius {}", r);
            return Vec::new();
        }

        let mut result = Vec::new();
        if self.is_empty() {
            return result;
        }

        let r2 = r * r;
        let mut stack: QueryStack = SmallVec::new();
        stack.push((0, self.len() - 1, 0));

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for i in left..=right {
                    let (x, y) = self.point(i);
                    if sq_dist(x, y, qx, qy) <= r2 {
                        result.push(self.ids.get(i));
                    }
                }
                continue;
            }

            let m = (left + right) >> 1;
            let (x, y) = self.point(m);
            if sq_dist(x, y, qx, qy) <= r2 {
                result.push(self.ids.get(m));
            }

            let (go_left, go_right) = if axis == 0 {
                (qx - r <= x, qx + r >= x)
            } else {
                (qy - r <= y, qy + r >= y)
            };
            if go_left {
                stack.push((left, m - 1, 1 - axis));
            }
            if go_right {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result
    }

    #[inline]
    fn point(&self, i: usize) -> (f64, f64) {
        (self.coords[2 * i].to_f64(), self.coords[2 * i + 1].to_f64())
    }

    #[inline]
    fn coord(&self, i: isize, axis: usize) -> T {
        self.coords[2 * i as usize + axis]
    }

    fn sort(&mut self) {
        if self.len() <= 1 {
            return;
        }

        let mut stack: Vec<(usize, usize, usize)> = vec![(0, self.len() - 1, 0)];
        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                continue;
            }

            let m = (left + right) >> 1;
            self.select(m as isize, left as isize, right as isize, axis);

            stack.push((left, m - 1, 1 - axis));
            stack.push((m + 1, right, 1 - axis));
        }
    }

    /// Floyd-Rivest selection: place the k-th smallest element along `axis`
    /// at `k`, smaller ones before it and larger ones after.
    fn select(&mut self, k: isize, mut left: isize, mut right: isize, axis: usize) {
        while right > left {
            if right - left > SELECT_SAMPLE_THRESHOLD {
                let n = (right - left + 1) as f64;
                let m = (k - left + 1) as f64;
                let z = n.ln();
                let s = 0.5 * (2.0 * z / 3.0).exp();
                let sign = if m - n / 2.0 < 0.0 { -1.0 } else { 1.0 };
                let sd = 0.5 * (z * s * (n - s) / n).sqrt() * sign;
                let new_left = left.max((k as f64 - m * s / n + sd).floor() as isize);
                let new_right = right.min((k as f64 + (n - m) * s / n + sd).floor() as isize);
                self.select(k, new_left, new_right, axis);
            }

            let t = self.coord(k, axis);
            let mut i = left;
            let mut j = right;

            self.swap_item(left, k);
            if self.coord(right, axis) > t {
                self.swap_item(left, right);
            }

            while i < j {
                self.swap_item(i, j);
                i += 1;
                j -= 1;
                while self.coord(i, axis) < t {
                    i += 1;
                }
                while self.coord(j, axis) > t {
                    j -= 1;
                }
            }

            if self.coord(left, axis) == t {
                self.swap_item(left, j);
            } else {
                j += 1;
                self.swap_item(j, right);
            }

            if j <= k {
                left = j + 1;
            }
            if k <= j {
                right = j - 1;
            }
        }
    }

    #[inline]
    fn swap_item(&mut self, i: isize, j: isize) {
        let (i, j) = (i as usize, j as usize);
        self.ids.swap(i, j);
        self.coords.swap(2 * i, 2 * j);
        self.coords.swap(2 * i + 1, 2 * j + 1);
    }
}

#[inline]
fn sq_dist(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    dx * dx + dy * dy
}
