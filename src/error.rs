//! Error types for tiling, clustering and encoding.

use thiserror::Error;

/// Errors returned by the tiling and clustering engines.
///
/// Absence of data is never an error: empty inputs, out-of-range zooms and
/// tiles without features are reported as `None` or an empty result.
#[derive(Debug, Error)]
pub enum SpatioError {
    /// Options rejected at construction time. Nothing was built.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported or malformed GeoJSON. The whole conversion is abandoned.
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    /// The id does not name a cluster of the currently loaded point set.
    #[error("No cluster with the specified id: {0}")]
    ClusterNotFound(u64),

    /// Input too large for the packed `(index << 5) + zoom + count` cluster id.
    #[error("Cluster id packing overflow: {points} points exceeds the limit of {limit}")]
    ClusterIdOverflow { points: usize, limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),
}

impl From<geojson::Error> for SpatioError {
    fn from(err: geojson::Error) -> Self {
        SpatioError::GeoJson(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, SpatioError>;
