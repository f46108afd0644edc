#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Risk grid engine.
//!
//! Scores every coordinate of a [`GridSpec`] lattice. Each cell starts at
//! the profile's base score, loses risk for every nearby facility and gains
//! risk for every nearby population center, both with linear distance
//! decay, and is finally clamped into the profile's score range. Cells far
//! from any population center can be masked out.
//!
//! The cost is `O(cells × (facilities + population points))`. There is no
//! spatial index; point counts are in the hundreds to low thousands.

use risk_map_database::{PointStore, StoreError};
use risk_map_point_models::{Coordinates, HeatmapCell, PopulationPoint, RiskPoint};
use risk_map_risk_models::{GridResult, ProfileSet, RiskParams, RiskProfile};
use risk_map_spatial::{GridSpec, distance_between};

/// Multiplier applied to the population term on top of the profile weight.
pub const POPULATION_IMPACT_SCALE: f64 = 2.0;

/// Errors from grid computation. The engine itself cannot fail; only reading
/// the point sets can.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// Reading facility or population points failed.
    #[error("Failed to load points: {0}")]
    Store(#[from] StoreError),
    /// The scoring task panicked or was cancelled.
    #[error("Risk scoring task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Amount of risk a facility removes from a cell `distance_m` away.
///
/// Full `weight` at distance zero, decaying linearly to zero at `radius_m`;
/// zero at or beyond the radius.
#[must_use]
pub fn facility_mitigation(distance_m: f64, weight: f64, radius_m: f64) -> f64 {
    if distance_m < radius_m {
        weight * (1.0 - distance_m / radius_m)
    } else {
        0.0
    }
}

/// Amount of risk a population center adds to a cell `distance_m` away.
///
/// Scaled by the center's share of the largest observed count, then decays
/// linearly like [`facility_mitigation`].
#[must_use]
pub fn population_amplification(
    distance_m: f64,
    count: u32,
    max_count: u32,
    population_weight: f64,
    radius_m: f64,
) -> f64 {
    if distance_m >= radius_m {
        return 0.0;
    }
    let share = f64::from(count) / f64::from(max_count.max(1));
    share * population_weight * POPULATION_IMPACT_SCALE * (1.0 - distance_m / radius_m)
}

/// Largest population count, or 1 when there are no points (or every count
/// is zero) so the share never divides by zero.
#[must_use]
pub fn max_population_count(population: &[PopulationPoint]) -> u32 {
    population.iter().map(|p| p.count).max().unwrap_or(1).max(1)
}

/// Whether `cell` lies strictly within `radius_m` of any population point.
fn near_population(cell: Coordinates, population: &[PopulationPoint], radius_m: f64) -> bool {
    population
        .iter()
        .any(|p| distance_between(cell, p.coordinates()) < radius_m)
}

/// Scores a single cell, or returns `None` when the cell is masked out.
#[must_use]
pub fn score_cell(
    cell: Coordinates,
    facilities: &[RiskPoint],
    population: &[PopulationPoint],
    max_count: u32,
    params: &RiskParams,
) -> Option<f64> {
    let has_population = !population.is_empty();

    if params.clip_to_population {
        if !has_population || !near_population(cell, population, params.clip_radius_m) {
            return None;
        }
    } else if has_population && !near_population(cell, population, params.soft_mask_radius_m) {
        return None;
    }

    let mut score = params.base_score;

    for facility in facilities {
        let distance = distance_between(cell, facility.coordinates());
        score -= facility_mitigation(distance, facility.weight, params.facility_radius_m);
    }

    for center in population {
        let distance = distance_between(cell, center.coordinates());
        score += population_amplification(
            distance,
            center.count,
            max_count,
            params.population_weight,
            params.population_radius_m,
        );
    }

    Some(params.score_range.clamp(score))
}

/// Scores every unmasked cell of `grid` against the given point sets.
#[must_use]
pub fn score_grid(
    grid: &GridSpec,
    facilities: &[RiskPoint],
    population: &[PopulationPoint],
    params: &RiskParams,
) -> Vec<HeatmapCell> {
    if params.clip_to_population && population.is_empty() {
        return Vec::new();
    }

    let max_count = max_population_count(population);

    grid.iter()
        .filter_map(|cell| {
            score_cell(cell, facilities, population, max_count, params).map(|score| HeatmapCell {
                lat: cell.latitude,
                lon: cell.longitude,
                score,
            })
        })
        .collect()
}

/// Loads the current point sets from `store` and scores `grid`.
///
/// # Errors
///
/// Returns [`RiskError`] if either point set cannot be read or the
/// scoring task fails. There is no partial result.
pub async fn compute_grid(
    store: &dyn PointStore,
    grid: &GridSpec,
    params: &RiskParams,
) -> Result<GridResult, RiskError> {
    let facilities = store.find_all().await?;
    let population = store.find_all_population().await?;

    log::info!(
        "Computing risk grid: {} lattice cells, {} facilities, {} population points",
        grid.len(),
        facilities.len(),
        population.len()
    );

    let population_count = population.len();
    let grid = *grid;
    let params = *params;

    let cells = tokio::task::spawn_blocking(move || {
        score_grid(&grid, &facilities, &population, &params)
    })
    .await?;

    log::debug!("Risk grid produced {} unmasked cells", cells.len());

    Ok(GridResult {
        cells,
        population_count,
    })
}

/// [`compute_grid`] with the parameters of a named profile.
///
/// # Errors
///
/// Returns [`RiskError`] if either point set cannot be read.
pub async fn compute_profile(
    store: &dyn PointStore,
    grid: &GridSpec,
    profiles: &ProfileSet,
    profile: RiskProfile,
) -> Result<GridResult, RiskError> {
    log::debug!("Using risk profile {profile}");
    compute_grid(store, grid, profiles.get(profile)).await
}

#[cfg(test)]
mod tests {
    use risk_map_database::MemoryPointStore;
    use risk_map_point_models::RiskType;
    use risk_map_risk_models::ScoreRange;
    use risk_map_spatial::BoundingBox;

    use super::*;

    const LAT: f64 = 37.401;
    const LON: f64 = 127.111;

    fn single_cell_grid() -> GridSpec {
        GridSpec::new(BoundingBox::new(LAT, LAT, LON, LON), 0.001, 0.001)
    }

    fn small_grid() -> GridSpec {
        GridSpec::new(BoundingBox::new(37.39, 37.41, 127.10, 127.12), 0.002, 0.002)
    }

    fn unclipped() -> RiskParams {
        RiskParams::new(2.0, 200.0, 0.5, 600.0, false)
    }

    fn facility(lat: f64, lon: f64, risk_type: RiskType) -> RiskPoint {
        RiskPoint::new(Coordinates::new(lat, lon), risk_type)
    }

    #[test]
    fn facility_at_zero_distance_subtracts_full_weight() {
        assert!((facility_mitigation(0.0, 0.7, 200.0) - 0.7).abs() < 1e-12);

        let cells = score_grid(
            &single_cell_grid(),
            &[facility(LAT, LON, RiskType::Cctv)],
            &[],
            &unclipped(),
        );
        assert_eq!(cells.len(), 1);
        assert!((cells[0].score - (2.0 - 0.7)).abs() < 1e-9);
    }

    #[test]
    fn facility_at_or_beyond_radius_contributes_nothing() {
        assert!(facility_mitigation(200.0, 1.0, 200.0).abs() < f64::EPSILON);
        assert!(facility_mitigation(5_000.0, 1.0, 200.0).abs() < f64::EPSILON);

        // ~1.1 km north of the cell.
        let cells = score_grid(
            &single_cell_grid(),
            &[facility(LAT + 0.01, LON, RiskType::Police)],
            &[],
            &unclipped(),
        );
        assert!((cells[0].score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn facility_decays_linearly() {
        assert!((facility_mitigation(100.0, 1.0, 200.0) - 0.5).abs() < 1e-12);
        assert!((facility_mitigation(150.0, 0.4, 200.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn overlapping_facilities_subtract_cumulatively_before_clamping() {
        let facilities = vec![
            facility(LAT, LON, RiskType::Police),
            facility(LAT, LON, RiskType::Police),
            facility(LAT, LON, RiskType::Cctv),
        ];
        let cells = score_grid(&single_cell_grid(), &facilities, &[], &unclipped());
        assert!(cells[0].score.abs() < f64::EPSILON, "clamped to zero");
    }

    #[test]
    fn population_at_cell_adds_full_share() {
        let population = vec![PopulationPoint::new(
            "분당구",
            "삼평동",
            1_000,
            Coordinates::new(LAT, LON),
        )];
        let params = unclipped().with_score_range(ScoreRange::new(0.0, 8.0));
        let cells = score_grid(&single_cell_grid(), &[], &population, &params);
        assert_eq!(cells.len(), 1);
        assert!((cells[0].score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn population_share_is_relative_to_maximum() {
        let half = population_amplification(0.0, 500, 1_000, 0.5, 600.0);
        assert!((half - 0.5).abs() < 1e-12);
        assert!(population_amplification(600.0, 1_000, 1_000, 0.5, 600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_counts_do_not_divide_by_zero() {
        let population = vec![PopulationPoint::new("a", "b", 0, Coordinates::new(LAT, LON))];
        assert_eq!(max_population_count(&population), 1);
        let cells = score_grid(&single_cell_grid(), &[], &population, &unclipped());
        assert!((cells[0].score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn no_population_with_clipping_is_empty() {
        let params = RiskParams::new(2.0, 200.0, 0.5, 700.0, true);
        let cells = score_grid(
            &small_grid(),
            &[facility(37.4, 127.11, RiskType::Cctv)],
            &[],
            &params,
        );
        assert!(cells.is_empty());
    }

    #[test]
    fn no_population_without_clipping_is_unmasked() {
        let grid = small_grid();
        let cells = score_grid(&grid, &[], &[], &unclipped());
        assert_eq!(cells.len(), grid.len());
        assert!(cells.iter().all(|c| (c.score - 2.0).abs() < 1e-12));
    }

    #[test]
    fn soft_mask_drops_cells_far_from_population() {
        // Rows at 0 m, ~1.33 km, ~2.67 km and ~4 km from the population point.
        let grid = GridSpec::new(BoundingBox::new(37.40, 37.44, 127.11, 127.11), 0.012, 0.01);
        let population = vec![PopulationPoint::new("a", "b", 10, Coordinates::new(37.40, 127.11))];
        let cells = score_grid(&grid, &[], &population, &unclipped());
        assert_eq!(grid.len(), 4);
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.lat < 37.415));
    }

    #[test]
    fn strict_clip_is_tighter_than_soft_mask() {
        let grid = GridSpec::new(BoundingBox::new(37.40, 37.44, 127.11, 127.11), 0.012, 0.01);
        let population = vec![PopulationPoint::new("a", "b", 10, Coordinates::new(37.40, 127.11))];
        let params = RiskParams::new(2.0, 200.0, 0.5, 700.0, true);
        let cells = score_grid(&grid, &[], &population, &params);
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn scores_always_within_range() {
        // Deterministic LCG scatter of points across the grid.
        let mut seed: u64 = 0x5eed;
        let mut next = || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            #[allow(clippy::cast_precision_loss)]
            let unit = (seed >> 11) as f64 / (1u64 << 53) as f64;
            unit
        };

        let mut facilities = Vec::new();
        let mut population = Vec::new();
        for i in 0..200 {
            let coords = Coordinates::new(37.39 + next() * 0.02, 127.10 + next() * 0.02);
            let risk_type = RiskType::all()[i % 3];
            facilities.push(RiskPoint::new(coords, risk_type));
            if i % 4 == 0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = (next() * 50_000.0) as u32;
                population.push(PopulationPoint::new("d", "n", count, coords));
            }
        }

        for params in [
            RiskProfile::BlindSpots.default_params(),
            RiskProfile::Refined.default_params(),
        ] {
            for (f, p) in [
                (&facilities[..], &population[..]),
                (&[][..], &population[..]),
                (&facilities[..], &[][..]),
                (&[][..], &[][..]),
            ] {
                for cell in score_grid(&small_grid(), f, p, &params) {
                    assert!(
                        (params.score_range.min..=params.score_range.max).contains(&cell.score),
                        "score {} out of range",
                        cell.score
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn compute_grid_reads_store_and_reports_population_count() {
        let store = MemoryPointStore::new();
        store
            .save_all(&[facility(LAT, LON, RiskType::Police)])
            .await
            .unwrap();
        store
            .save_all_population(&[
                PopulationPoint::new("분당구", "삼평동", 100, Coordinates::new(LAT, LON)),
                PopulationPoint::new("분당구", "백현동", 50, Coordinates::new(37.387, 127.107)),
            ])
            .await
            .unwrap();

        let result = compute_profile(
            &store,
            &single_cell_grid(),
            &ProfileSet::default(),
            RiskProfile::Refined,
        )
        .await
        .unwrap();

        assert_eq!(result.population_count, 2);
        assert_eq!(result.cells.len(), 1);
        // 2.0 base - 1.0 police + 1.0 full population share.
        assert!((result.cells[0].score - 2.0).abs() < 1e-9);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_grids_on_one_thread_match_direct_scoring() {
        let store = MemoryPointStore::new();
        let facilities = vec![
            facility(37.40, 127.11, RiskType::Cctv),
            facility(37.395, 127.105, RiskType::StreetLight),
        ];
        store.save_all(&facilities).await.unwrap();

        let grid = small_grid();
        let params = unclipped();
        let expected = score_grid(&grid, &facilities, &[], &params);

        let (first, second) = tokio::join!(
            compute_grid(&store, &grid, &params),
            compute_grid(&store, &grid, &params)
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.cells, expected);
        assert_eq!(second.cells, expected);
        assert_eq!(first.population_count, 0);
    }
}
