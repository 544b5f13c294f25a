//! Vector tile slicing, point clustering and MVT encoding for GeoJSON data.
//!
//! ```rust
//! use spatio_tiles::prelude::*;
//!
//! // Slice geometry into tiles on demand
//! let mut tiles = TileIndex::from_json_str(
//!     r#"{"type":"LineString","coordinates":[[-10,0],[10,5]]}"#,
//!     TileOptions::default(),
//! )?;
//! let tile = tiles.get_tile(0, 0, 0).expect("tile with the line");
//! let bytes = encode(&[Layer::from_tile("lines", tile, 4096)]);
//! assert!(!bytes.is_empty());
//!
//! // Cluster points per zoom level
//! let mut clusters = ClusterIndex::new(ClusterOptions::default())?;
//! clusters.load(vec![
//!     ClusterPoint::new(Point::new(-74.0060, 40.7128)),
//!     ClusterPoint::new(Point::new(-74.0059, 40.7127)),
//! ])?;
//! let found = clusters.get_clusters([-180.0, -85.0, 180.0, 85.0], 0.0);
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].point_count(), 2);
//! # Ok::<(), spatio_tiles::SpatioError>(())
//! ```

pub mod cluster;
pub mod codec;
pub mod compute;
pub mod config;
pub mod error;
pub mod kdtree;
pub mod tile;

pub use cluster::{ClusterFeature, ClusterIndex, ClusterIndexBuilder, ClusterPoint};
pub use codec::{Layer, encode};
pub use config::{ClusterOptions, TileOptions};
pub use error::{Result, SpatioError};
pub use kdtree::{KdTree, KdTreeBuilder};
pub use tile::{Tile, TileIndex};

pub use geo::Point;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, SpatioError};

    pub use crate::{ClusterOptions, TileOptions};

    pub use crate::cluster::{ClusterFeature, ClusterIndex, ClusterIndexBuilder, ClusterPoint};

    pub use crate::tile::{GeomType, Tile, TileGeometry, TileIndex};

    pub use crate::codec::{Layer, encode};

    pub use crate::kdtree::KdTree;

    pub use geo::Point;
}
