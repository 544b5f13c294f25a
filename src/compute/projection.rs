//! Spherical Web-Mercator projection onto the unit square.
//!
//! Longitude maps linearly onto `x`; latitude maps onto `y` growing
//! southwards, clamped to `[0, 1]` so polar inputs stay on the map.

use std::f64::consts::PI;

/// Project a longitude in degrees to normalized `x`.
///
/// ```
/// use spatio_tiles::compute::projection::lng_x;
///
/// assert_eq!(lng_x(0.0), 0.5);
/// assert_eq!(lng_x(-180.0), 0.0);
/// assert_eq!(lng_x(180.0), 1.0);
/// ```
#[inline]
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Project a latitude in degrees to normalized `y`, clamped to `[0, 1]`.
///
/// ```
/// use spatio_tiles::compute::projection::lat_y;
///
/// assert_eq!(lat_y(0.0), 0.5);
/// assert_eq!(lat_y(90.0), 0.0);
/// assert_eq!(lat_y(-90.0), 1.0);
/// ```
#[inline]
pub fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Inverse of [`lng_x`].
#[inline]
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Inverse of [`lat_y`].
#[inline]
pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Round half up, the way map renderers snap projected coordinates to pixels.
///
/// Differs from [`f64::round`] for negative halves: `-0.5` rounds to `0`.
#[inline]
pub fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}
