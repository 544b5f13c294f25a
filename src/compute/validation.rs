//! Validation for input coordinates.
//!
//! Longitudes outside `[-180, 180]` are legal input: the tiler wraps them
//! into neighbouring world copies. Only positions that cannot be projected
//! at all are rejected.

use crate::error::{Result, SpatioError};
use geo::Point;

/// Validates a GeoJSON position and returns its `(lng, lat)` pair.
///
/// Extra ordinates (altitude) are ignored.
///
/// # Examples
///
/// ```
/// use spatio_tiles::compute::validation::validate_position;
///
/// assert_eq!(validate_position(&[10.0, 20.0, 300.0]).unwrap(), (10.0, 20.0));
/// assert!(validate_position(&[10.0]).is_err());
/// assert!(validate_position(&[f64::NAN, 0.0]).is_err());
/// ```
pub fn validate_position(position: &[f64]) -> Result<(f64, f64)> {
    if position.len() < 2 {
        return Err(SpatioError::InvalidGeoJson(format!(
            "Position must have at least 2 coordinates, got {}",
            position.len()
        )));
    }

    let (x, y) = (position[0], position[1]);
    if !x.is_finite() || !y.is_finite() {
        return Err(SpatioError::InvalidGeoJson(format!(
            "Position coordinates must be finite, got [{}, {}]",
            x, y
        )));
    }

    Ok((x, y))
}

/// GeoJSON type name of a geometry value, for error messages.
pub fn geometry_type_name(value: &geojson::Value) -> &'static str {
    use geojson::Value;

    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Validates that a point to be clustered has finite coordinates.
pub fn validate_finite_point(point: &Point) -> Result<()> {
    let (x, y) = (point.x(), point.y());

    if !x.is_finite() {
        return Err(SpatioError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            x
        )));
    }

    if !y.is_finite() {
        return Err(SpatioError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            y
        )));
    }

    Ok(())
}

/// Validates multiple points.
pub fn validate_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Result<()> {
    for (idx, point) in points.into_iter().enumerate() {
        validate_finite_point(point)
            .map_err(|e| SpatioError::InvalidInput(format!("Point at index {}: {}", idx, e)))?;
    }
    Ok(())
}

/// Returns true when every value in a query box is finite.
pub fn is_finite_box(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
    [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite())
}
