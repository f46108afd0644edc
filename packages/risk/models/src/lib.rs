#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parameter and result types for the risk grid engine.
//!
//! A [`RiskParams`] bundle fully determines how a lattice is scored. The two
//! named [`RiskProfile`]s differ only in these numbers; the scoring logic is
//! shared.

use risk_map_point_models::HeatmapCell;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Radius (meters) a cell must fall within of some population point to
/// survive strict clipping.
pub const DEFAULT_CLIP_RADIUS_METERS: f64 = 1200.0;

/// Radius (meters) used by the soft population mask when clipping is off.
pub const DEFAULT_SOFT_MASK_RADIUS_METERS: f64 = 1800.0;

/// Inclusive output range every emitted score is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    /// Lower clamp bound.
    pub min: f64,
    /// Upper clamp bound.
    pub max: f64,
}

impl ScoreRange {
    /// Creates a new range. `min` must not exceed `max`.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamps `score` into the range.
    #[must_use]
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.min, self.max)
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self::new(0.0, 3.0)
    }
}

/// Numeric inputs to one grid computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Score every cell starts from.
    pub base_score: f64,
    /// Facility influence radius in meters.
    pub facility_radius_m: f64,
    /// Multiplier applied to a population point's share of the maximum count.
    pub population_weight: f64,
    /// Population influence radius in meters.
    pub population_radius_m: f64,
    /// Drop cells not near any population point (and everything when there
    /// is no population data).
    pub clip_to_population: bool,
    /// Output clamp range.
    #[serde(default)]
    pub score_range: ScoreRange,
    /// Strict clipping radius in meters.
    #[serde(default = "default_clip_radius")]
    pub clip_radius_m: f64,
    /// Soft mask radius in meters, applied when clipping is off but
    /// population data exists.
    #[serde(default = "default_soft_mask_radius")]
    pub soft_mask_radius_m: f64,
}

const fn default_clip_radius() -> f64 {
    DEFAULT_CLIP_RADIUS_METERS
}

const fn default_soft_mask_radius() -> f64 {
    DEFAULT_SOFT_MASK_RADIUS_METERS
}

impl RiskParams {
    /// Creates parameters with the default clamp range and mask radii.
    #[must_use]
    pub const fn new(
        base_score: f64,
        facility_radius_m: f64,
        population_weight: f64,
        population_radius_m: f64,
        clip_to_population: bool,
    ) -> Self {
        Self {
            base_score,
            facility_radius_m,
            population_weight,
            population_radius_m,
            clip_to_population,
            score_range: ScoreRange::new(0.0, 3.0),
            clip_radius_m: DEFAULT_CLIP_RADIUS_METERS,
            soft_mask_radius_m: DEFAULT_SOFT_MASK_RADIUS_METERS,
        }
    }

    /// Replaces the clamp range.
    #[must_use]
    pub const fn with_score_range(mut self, score_range: ScoreRange) -> Self {
        self.score_range = score_range;
        self
    }
}

/// The named scoring profiles exposed to callers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskProfile {
    /// Integrated blind-spot map: soft population mask.
    BlindSpots,
    /// Refined heatmap: strict clipping to populated areas.
    Refined,
}

impl RiskProfile {
    /// Canonical parameters for this profile.
    ///
    /// Base score 2.0 plus at most 1.0 from population, clamped to
    /// `[0, 3]`.
    #[must_use]
    pub const fn default_params(self) -> RiskParams {
        match self {
            Self::BlindSpots => RiskParams::new(2.0, 200.0, 0.5, 600.0, false),
            Self::Refined => RiskParams::new(2.0, 200.0, 0.5, 700.0, true),
        }
    }
}

/// Parameters for both named profiles, typically loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    /// Parameters for [`RiskProfile::BlindSpots`].
    pub blind_spots: RiskParams,
    /// Parameters for [`RiskProfile::Refined`].
    pub refined: RiskParams,
}

impl ProfileSet {
    /// Returns the parameters for `profile`.
    #[must_use]
    pub const fn get(&self, profile: RiskProfile) -> &RiskParams {
        match profile {
            RiskProfile::BlindSpots => &self.blind_spots,
            RiskProfile::Refined => &self.refined,
        }
    }
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            blind_spots: RiskProfile::BlindSpots.default_params(),
            refined: RiskProfile::Refined.default_params(),
        }
    }
}

/// Output of one grid computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResult {
    /// Every unmasked lattice cell, row-major.
    pub cells: Vec<HeatmapCell>,
    /// Number of population points considered.
    pub population_count: usize,
}
