//! Shared geometry computations.
//!
//! Both the tile slicer and the point clusterer work in the same normalized
//! Web-Mercator plane; the projection helpers and input validation that
//! feed that plane live here.

pub mod projection;
pub mod validation;
