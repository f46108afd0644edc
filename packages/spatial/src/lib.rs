#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial primitives for the risk map.
//!
//! Provides the haversine distance used by every proximity check and the
//! uniform latitude/longitude lattice the risk engine scores. There is no
//! spatial index: point sets are small and every lookup is a brute-force
//! scan.

use risk_map_point_models::Coordinates;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used by [`distance_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Tolerance applied when counting lattice steps so that a bound which is
/// an exact multiple of the step is not lost to rounding.
const STEP_EPSILON: f64 = 1e-9;

/// Great-circle distance in meters between two WGS84 points.
///
/// The haversine term is clamped to `[0, 1]` before the inverse
/// trigonometric step so floating-point overshoot near zero or antipodal
/// inputs never yields `NaN`.
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// [`distance_meters`] over [`Coordinates`].
#[must_use]
pub fn distance_between(a: Coordinates, b: Coordinates) -> f64 {
    distance_meters(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// A latitude/longitude bounding box, inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern latitude boundary.
    pub min_lat: f64,
    /// Northern latitude boundary.
    pub max_lat: f64,
    /// Western longitude boundary.
    pub min_lon: f64,
    /// Eastern longitude boundary.
    pub max_lon: f64,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[must_use]
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }
}

/// A uniform lattice over a [`BoundingBox`].
///
/// Each axis holds `floor((max - min) / step) + 1` coordinates starting at
/// the minimum bound. Coordinates are computed as `min + i * step` rather
/// than by repeated addition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Area covered by the lattice.
    pub bounds: BoundingBox,
    /// Latitude step in degrees.
    pub step_lat: f64,
    /// Longitude step in degrees.
    pub step_lon: f64,
}

impl GridSpec {
    /// Creates a lattice over `bounds` with the given steps.
    #[must_use]
    pub const fn new(bounds: BoundingBox, step_lat: f64, step_lon: f64) -> Self {
        Self {
            bounds,
            step_lat,
            step_lon,
        }
    }

    /// Number of latitude rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        axis_len(self.bounds.min_lat, self.bounds.max_lat, self.step_lat)
    }

    /// Number of longitude columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        axis_len(self.bounds.min_lon, self.bounds.max_lon, self.step_lon)
    }

    /// Total number of lattice coordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows().saturating_mul(self.cols())
    }

    /// Whether the lattice has no coordinates (inverted bounds or a
    /// non-positive step).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the lattice row by row (latitude outer, longitude inner).
    pub fn iter(&self) -> impl Iterator<Item = Coordinates> + '_ {
        let cols = self.cols();
        (0..self.rows()).flat_map(move |row| {
            #[allow(clippy::cast_precision_loss)]
            let lat = self.step_lat.mul_add(row as f64, self.bounds.min_lat);
            (0..cols).map(move |col| {
                #[allow(clippy::cast_precision_loss)]
                let lon = self.step_lon.mul_add(col as f64, self.bounds.min_lon);
                Coordinates::new(lat, lon)
            })
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_len(min: f64, max: f64, step: f64) -> usize {
    if step.is_nan() || step <= 0.0 || !min.is_finite() || !max.is_finite() || max < min {
        return 0;
    }
    ((max - min) / step + STEP_EPSILON).floor() as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert!(distance_meters(37.4, 127.1, 37.4, 127.1).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_meters(37.0, 127.0, 38.0, 127.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = distance_meters(37.441, 127.140, 37.401, 127.111);
        let b = distance_meters(37.401, 127.111, 37.441, 127.140);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn lattice_includes_both_bounds() {
        let grid = GridSpec::new(BoundingBox::new(37.0, 37.01, 127.0, 127.02), 0.005, 0.01);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.len(), 9);

        let cells: Vec<Coordinates> = grid.iter().collect();
        assert_eq!(cells.len(), 9);
        assert!((cells[0].latitude - 37.0).abs() < 1e-12);
        assert!((cells[8].latitude - 37.01).abs() < 1e-9);
        assert!((cells[8].longitude - 127.02).abs() < 1e-9);
    }

    #[test]
    fn lattice_stops_before_exceeding_upper_bound() {
        let grid = GridSpec::new(BoundingBox::new(0.0, 1.0, 0.0, 1.0), 0.3, 0.4);
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.cols(), 3);
        assert!(grid.iter().all(|c| c.latitude <= 1.0 && c.longitude <= 1.0));
    }

    #[test]
    fn degenerate_lattices_are_empty() {
        assert!(GridSpec::new(BoundingBox::new(1.0, 0.0, 0.0, 1.0), 0.1, 0.1).is_empty());
        assert!(GridSpec::new(BoundingBox::new(0.0, 1.0, 0.0, 1.0), 0.0, 0.1).is_empty());

        let single = GridSpec::new(BoundingBox::new(37.0, 37.0, 127.0, 127.0), 0.1, 0.1);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn huge_lattice_len_saturates() {
        let grid = GridSpec::new(BoundingBox::new(-90.0, 90.0, -180.0, 180.0), 1e-12, 1e-12);
        assert_eq!(grid.len(), usize::MAX);
        assert!(!grid.is_empty());
    }
}
