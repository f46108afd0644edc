//! Coordinate column auto-detection.
//!
//! Facility datasets published by different agencies put latitude and
//! longitude in different columns, often next to other numeric fields. Any
//! value inside South Korea's latitude or longitude band is taken as the
//! coordinate for that axis.

use std::ops::RangeInclusive;

/// Plausible latitudes for points in South Korea.
pub const LATITUDE_RANGE: RangeInclusive<f64> = 33.0..=43.0;

/// Plausible longitudes for points in South Korea.
pub const LONGITUDE_RANGE: RangeInclusive<f64> = 124.0..=132.0;

/// Column indices of a detected coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPositions {
    /// Latitude column.
    pub latitude: usize,
    /// Longitude column.
    pub longitude: usize,
}

/// Parses a CSV field as a coordinate value, ignoring stray quotes and
/// surrounding whitespace.
#[must_use]
pub fn parse_coordinate(field: &str) -> Option<f64> {
    let value = field.replace('"', "");
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Returns the first field whose value lies in `range`.
#[must_use]
pub fn detect_axis<S: AsRef<str>>(fields: &[S], range: &RangeInclusive<f64>) -> Option<usize> {
    fields.iter().position(|field| {
        parse_coordinate(field.as_ref()).is_some_and(|value| range.contains(&value))
    })
}

/// Scans `fields` for a latitude and a longitude by value range.
///
/// The first field in each range wins. Non-numeric and out-of-range fields
/// are ignored. Returns `None` unless both axes are found.
#[must_use]
pub fn detect_columns<S: AsRef<str>>(fields: &[S]) -> Option<ColumnPositions> {
    Some(ColumnPositions {
        latitude: detect_axis(fields, &LATITUDE_RANGE)?,
        longitude: detect_axis(fields, &LONGITUDE_RANGE)?,
    })
}
