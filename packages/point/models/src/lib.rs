#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point types shared across the risk map workspace.
//!
//! Facility points ([`RiskPoint`]) mitigate risk around them, population
//! points ([`PopulationPoint`]) amplify it, and [`HeatmapCell`]s are the
//! transient scored lattice coordinates produced by the risk engine.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The kind of safety facility a [`RiskPoint`] represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RiskType {
    /// Closed-circuit surveillance camera.
    Cctv,
    /// Police box or patrol post.
    Police,
    /// Street lamp.
    StreetLight,
}

impl RiskType {
    /// Returns every facility type in import order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Cctv, Self::Police, Self::StreetLight]
    }

    /// Risk-mitigation weight assigned to every point of this type at
    /// ingestion time.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Cctv => 0.7,
            Self::Police => 1.0,
            Self::StreetLight => 0.4,
        }
    }
}

/// A facility-derived point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Risk-mitigation strength.
    pub weight: f64,
    /// Facility type.
    #[serde(rename = "type")]
    pub risk_type: RiskType,
}

impl RiskPoint {
    /// Creates a point whose weight is derived from its type.
    #[must_use]
    pub const fn new(coordinates: Coordinates, risk_type: RiskType) -> Self {
        Self {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            weight: risk_type.weight(),
            risk_type,
        }
    }

    /// Returns the point's location.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Aggregate headcount anchored to an approximate sub-district centroid.
///
/// Coordinates are resolved once at ingestion and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationPoint {
    /// District (gu) name.
    pub district: String,
    /// Sub-district (dong) name.
    pub dong: String,
    /// Resident count.
    pub count: u32,
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
}

impl PopulationPoint {
    /// Creates a population point at the given centroid.
    #[must_use]
    pub fn new(
        district: impl Into<String>,
        dong: impl Into<String>,
        count: u32,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            district: district.into(),
            dong: dong.into(),
            count,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }

    /// Returns the centroid.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// One scored lattice coordinate. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// Lattice latitude.
    pub lat: f64,
    /// Lattice longitude.
    pub lon: f64,
    /// Clamped risk score.
    pub score: f64,
}
