//! Builder for cluster indexes with property aggregation hooks.

use super::ClusterIndex;
use crate::config::ClusterOptions;
use crate::error::{Result, SpatioError};
use geojson::JsonObject;

/// Maps an input point's properties to the value folded into its cluster.
pub type MapFn = Box<dyn Fn(&JsonObject) -> JsonObject>;

/// Folds mapped properties into a cluster's accumulated properties.
pub type ReduceFn = Box<dyn Fn(&mut JsonObject, &JsonObject)>;

/// Builder for a [`ClusterIndex`] with custom options and `map`/`reduce`
/// property aggregation.
///
/// ```rust
/// use spatio_tiles::cluster::ClusterIndexBuilder;
/// use spatio_tiles::ClusterOptions;
/// use serde_json::json;
///
/// let index = ClusterIndexBuilder::new()
///     .options(ClusterOptions::default().with_radius(60.0))
///     .map(|props| {
///         let mut out = serde_json::Map::new();
///         out.insert("sum".into(), props.get("value").cloned().unwrap_or(json!(0)));
///         out
///     })
///     .reduce(|acc, props| {
///         let a = acc["sum"].as_f64().unwrap_or(0.0);
///         let b = props["sum"].as_f64().unwrap_or(0.0);
///         acc.insert("sum".into(), json!(a + b));
///     })
///     .build()
///     .unwrap();
/// # let _ = index;
/// ```
#[derive(Default)]
pub struct ClusterIndexBuilder {
    options: ClusterOptions,
    map: Option<MapFn>,
    reduce: Option<ReduceFn>,
}

impl ClusterIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clustering options (zoom range, radius, extent...).
    pub fn options(mut self, options: ClusterOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the property mapper. Only consulted when a reducer is set.
    pub fn map<F>(mut self, map: F) -> Self
    where
        F: Fn(&JsonObject) -> JsonObject + 'static,
    {
        self.map = Some(Box::new(map));
        self
    }

    /// Set the property reducer, enabling aggregated cluster properties.
    pub fn reduce<F>(mut self, reduce: F) -> Self
    where
        F: Fn(&mut JsonObject, &JsonObject) + 'static,
    {
        self.reduce = Some(Box::new(reduce));
        self
    }

    /// Validate the options and create an empty index, ready for `load`.
    pub fn build(self) -> Result<ClusterIndex> {
        self.options
            .validate()
            .map_err(SpatioError::InvalidConfig)?;

        Ok(ClusterIndex::from_parts(self.options, self.map, self.reduce))
    }
}

impl std::fmt::Debug for ClusterIndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterIndexBuilder")
            .field("options", &self.options)
            .field("map", &self.map.is_some())
            .field("reduce", &self.reduce.is_some())
            .finish()
    }
}
