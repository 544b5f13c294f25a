//! World-copy wrapping across the antimeridian.

use super::clip::{Axis, clip};
use super::types::ProjectedFeature;
use crate::config::TileOptions;

/// Fold geometry that spills past `x = 0` or `x = 1` back into the primary
/// world, keeping a `buffer`-wide overlap on both edges.
///
/// The result holds the left copy shifted right, the center clip, then the
/// right copy shifted left.
pub(crate) fn wrap(features: Vec<ProjectedFeature>, options: &TileOptions) -> Vec<ProjectedFeature> {
    let buffer = options.buffer as f64 / options.extent as f64;
    let line_metrics = options.line_metrics;

    let stripe = |k1: f64, k2: f64| clip(&features, 1.0, k1, k2, Axis::X, -1.0, 2.0, line_metrics);

    let left = stripe(-1.0 - buffer, buffer);
    let right = stripe(1.0 - buffer, 2.0 + buffer);
    let center = stripe(-buffer, 1.0 + buffer).unwrap_or_default();

    let mut merged = Vec::with_capacity(center.len());
    if let Some(left) = left {
        merged.extend(left.into_iter().map(|f| f.shifted(1.0)));
    }
    merged.extend(center);
    if let Some(right) = right {
        merged.extend(right.into_iter().map(|f| f.shifted(-1.0)));
    }

    log::debug!(
        "wrapped {} features into {} world copies",
        features.len(),
        merged.len()
    );
    merged
}
