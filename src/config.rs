//! Immutable configuration for the tile and cluster indexes.
//!
//! Both option sets are plain serializable structs merged with their defaults
//! once, at construction time, and never mutated afterwards.
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Highest zoom level either index accepts for tile addressing.
pub const MAX_TILE_ZOOM: u8 = 24;

/// Cluster zoom levels are packed into 5 bits of a cluster id.
pub const MAX_CLUSTER_ZOOM: u8 = 30;

/// Options for [`TileIndex`](crate::tile::TileIndex).
///
/// # Example
///
/// ```rust
/// use spatio_tiles::TileOptions;
///
/// let json = r#"{ "max_zoom": 10, "buffer": 32 }"#;
/// let options = TileOptions::from_json(json).unwrap();
/// assert_eq!(options.max_zoom, 10);
/// assert_eq!(options.extent, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileOptions {
    /// Max zoom to preserve detail on (0-24)
    #[serde(default = "TileOptions::default_max_zoom")]
    pub max_zoom: u8,

    /// Max zoom in the initial tile index
    #[serde(default = "TileOptions::default_index_max_zoom")]
    pub index_max_zoom: u8,

    /// Max number of points per tile in the initial index
    #[serde(default = "TileOptions::default_index_max_points")]
    pub index_max_points: usize,

    /// Simplification tolerance, in tile pixels (higher means simpler)
    #[serde(default = "TileOptions::default_tolerance")]
    pub tolerance: f64,

    /// Tile extent
    #[serde(default = "TileOptions::default_extent")]
    pub extent: u32,

    /// Tile buffer on each side, in tile pixels
    #[serde(default = "TileOptions::default_buffer")]
    pub buffer: u32,

    /// Track clipped line distances as `mapbox_clip_start` / `mapbox_clip_end` tags
    #[serde(default)]
    pub line_metrics: bool,

    /// Property to promote to the feature id
    #[serde(default)]
    pub promote_id: Option<String>,

    /// Use the feature's index in the collection as its id
    #[serde(default)]
    pub generate_id: bool,
}

impl TileOptions {
    const fn default_max_zoom() -> u8 {
        14
    }

    const fn default_index_max_zoom() -> u8 {
        5
    }

    const fn default_index_max_points() -> usize {
        100_000
    }

    const fn default_tolerance() -> f64 {
        3.0
    }

    const fn default_extent() -> u32 {
        4096
    }

    const fn default_buffer() -> u32 {
        64
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_index_max_zoom(mut self, index_max_zoom: u8) -> Self {
        self.index_max_zoom = index_max_zoom;
        self
    }

    pub fn with_index_max_points(mut self, index_max_points: usize) -> Self {
        self.index_max_points = index_max_points;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_line_metrics(mut self, line_metrics: bool) -> Self {
        self.line_metrics = line_metrics;
        self
    }

    pub fn with_promote_id(mut self, property: impl Into<String>) -> Self {
        self.promote_id = Some(property.into());
        self
    }

    pub fn with_generate_id(mut self, generate_id: bool) -> Self {
        self.generate_id = generate_id;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.max_zoom > MAX_TILE_ZOOM {
            return Err(format!(
                "max_zoom should be in the 0-{} range, got {}",
                MAX_TILE_ZOOM, self.max_zoom
            ));
        }

        if self.index_max_zoom > self.max_zoom {
            return Err(format!(
                "index_max_zoom ({}) must be <= max_zoom ({})",
                self.index_max_zoom, self.max_zoom
            ));
        }

        if self.promote_id.is_some() && self.generate_id {
            return Err("promote_id and generate_id cannot be used together".to_string());
        }

        if self.extent == 0 {
            return Err("extent must be greater than zero".to_string());
        }

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            ));
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let options: TileOptions = serde_json::from_str(json)?;
        if let Err(e) = options.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(options)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let options: TileOptions = toml::from_str(toml_str)?;
        if let Err(e) = options.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(options)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            max_zoom: Self::default_max_zoom(),
            index_max_zoom: Self::default_index_max_zoom(),
            index_max_points: Self::default_index_max_points(),
            tolerance: Self::default_tolerance(),
            extent: Self::default_extent(),
            buffer: Self::default_buffer(),
            line_metrics: false,
            promote_id: None,
            generate_id: false,
        }
    }
}

/// Options for [`ClusterIndex`](crate::cluster::ClusterIndex).
///
/// The `map`/`reduce` property aggregation hooks are closures and are attached
/// through [`ClusterIndexBuilder`](crate::cluster::ClusterIndexBuilder) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    /// Min zoom to generate clusters on
    #[serde(default)]
    pub min_zoom: u8,

    /// Max zoom level to cluster the points on
    #[serde(default = "ClusterOptions::default_max_zoom")]
    pub max_zoom: u8,

    /// Minimum points to form a cluster
    #[serde(default = "ClusterOptions::default_min_points")]
    pub min_points: usize,

    /// Cluster radius in pixels
    #[serde(default = "ClusterOptions::default_radius")]
    pub radius: f64,

    /// Tile extent (radius is calculated relative to it)
    #[serde(default = "ClusterOptions::default_extent")]
    pub extent: f64,

    /// Size of the k-d tree leaf node, affects performance
    #[serde(default = "ClusterOptions::default_node_size")]
    pub node_size: usize,

    /// Whether to generate numeric ids for input features in tiles
    #[serde(default)]
    pub generate_id: bool,
}

impl ClusterOptions {
    const fn default_max_zoom() -> u8 {
        16
    }

    const fn default_min_points() -> usize {
        2
    }

    const fn default_radius() -> f64 {
        40.0
    }

    const fn default_extent() -> f64 {
        512.0
    }

    const fn default_node_size() -> usize {
        64
    }

    pub fn with_min_zoom(mut self, min_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_extent(mut self, extent: f64) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_node_size(mut self, node_size: usize) -> Self {
        self.node_size = node_size;
        self
    }

    pub fn with_generate_id(mut self, generate_id: bool) -> Self {
        self.generate_id = generate_id;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.max_zoom > MAX_CLUSTER_ZOOM {
            return Err(format!(
                "max_zoom must be <= {} so zoom + 1 fits the 5-bit cluster id field, got {}",
                MAX_CLUSTER_ZOOM, self.max_zoom
            ));
        }

        if self.min_zoom > self.max_zoom {
            return Err(format!(
                "min_zoom ({}) must be <= max_zoom ({})",
                self.min_zoom, self.max_zoom
            ));
        }

        if self.min_points == 0 {
            return Err("min_points must be greater than zero".to_string());
        }

        if self.node_size == 0 {
            return Err("node_size must be greater than zero".to_string());
        }

        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(format!(
                "radius must be finite and non-negative, got {}",
                self.radius
            ));
        }

        if !self.extent.is_finite() || self.extent <= 0.0 {
            return Err(format!(
                "extent must be finite and positive, got {}",
                self.extent
            ));
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let options: ClusterOptions = serde_json::from_str(json)?;
        if let Err(e) = options.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(options)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let options: ClusterOptions = toml::from_str(toml_str)?;
        if let Err(e) = options.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(options)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: Self::default_max_zoom(),
            min_points: Self::default_min_points(),
            radius: Self::default_radius(),
            extent: Self::default_extent(),
            node_size: Self::default_node_size(),
            generate_id: false,
        }
    }
}
