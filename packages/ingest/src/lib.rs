#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting facility and population CSVs into the point store.
//!
//! Each dataset is a separate sub-import. The file is read and decoded up
//! front; its rows are then streamed through coordinate resolution
//! (configured columns, then range-based auto-detection, then geocoding)
//! and written in batches inside a single store transaction that first
//! deletes the dataset's previous points. A sub-import that fails leaves the
//! previously stored points untouched and does not stop the remaining
//! sub-imports.

pub mod columns;
pub mod dong;
pub mod reader;

use std::path::{Path, PathBuf};

use risk_map_database::{PointStore, StoreError};
use risk_map_geocoder::address::clean_address;
use risk_map_geocoder::{GeocodeOutcome, Geocoder, UnresolvedReason};
use risk_map_ingest_models::{
    ColumnMode, DatasetDefinition, DatasetEncoding, DatasetOutcome, ImportReport, ImportSummary,
    PopulationDataset,
};
use risk_map_point_models::{Coordinates, PopulationPoint, RiskPoint, RiskType};

use crate::columns::{
    LATITUDE_RANGE, LONGITUDE_RANGE, detect_axis, detect_columns, parse_coordinate,
};

/// Maximum number of points written to the store per call.
pub const BATCH_SIZE: usize = 1000;

/// Row failures logged per file before the rest are suppressed.
pub const FAILURE_LOG_LIMIT: u64 = 10;

/// Label used for the population sub-import in reports.
pub const POPULATION_LABEL: &str = "POPULATION";

/// Errors that abort a single sub-import.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The dataset file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid in its declared encoding.
    #[error("File is not valid {encoding} text")]
    Encoding {
        /// Declared encoding.
        encoding: DatasetEncoding,
    },

    /// CSV tokenisation failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing to the point store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No dataset is configured for the requested facility type.
    #[error("No dataset configured for {0}")]
    UnknownDataset(RiskType),
}

/// Why a row produced no point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFailure {
    /// No usable coordinates in the row and geocoding is off.
    NoCoordinates,
    /// The count column has no digits or overflows.
    InvalidCount(String),
    /// Geocoding was attempted and failed.
    Geocode {
        /// Cleaned address or query that was sent.
        address: String,
        /// Why it failed.
        reason: UnresolvedReason,
    },
}

impl std::fmt::Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCoordinates => f.write_str("no coordinates found"),
            Self::InvalidCount(raw) => write!(f, "invalid count [{raw}]"),
            Self::Geocode { address, reason } => {
                write!(f, "geocoding failed for [{address}]: {reason}")
            }
        }
    }
}

/// Coordinate resolution result for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowResolution {
    /// The row yields a point here.
    Resolved(Coordinates),
    /// The row lacks a configured column and is ignored without counting
    /// as a failure.
    Skipped,
    /// The row is counted as a failure.
    Unresolved(RowFailure),
}

fn field_coordinate(fields: &[String], index: usize) -> Option<f64> {
    fields.get(index).and_then(|field| parse_coordinate(field))
}

fn axis_coordinate(
    mode: ColumnMode,
    fields: &[String],
    range: &std::ops::RangeInclusive<f64>,
) -> Option<f64> {
    match mode {
        ColumnMode::Fixed(index) => field_coordinate(fields, index),
        ColumnMode::AutoDetect => field_coordinate(fields, detect_axis(fields, range)?),
        ColumnMode::Unused => None,
    }
}

/// Coordinates from the configured column modes, axis by axis: a fixed axis
/// is read from its column and an auto-detected axis is found by range.
fn configured_coordinates(def: &DatasetDefinition, fields: &[String]) -> Option<Coordinates> {
    let lat = axis_coordinate(def.latitude, fields, &LATITUDE_RANGE)?;
    let lon = axis_coordinate(def.longitude, fields, &LONGITUDE_RANGE)?;
    Some(Coordinates::new(lat, lon))
}

fn detected_coordinates(fields: &[String]) -> Option<Coordinates> {
    let positions = detect_columns(fields)?;
    let lat = field_coordinate(fields, positions.latitude)?;
    let lon = field_coordinate(fields, positions.longitude)?;
    Some(Coordinates::new(lat, lon))
}

/// Resolves one facility row to coordinates.
///
/// The configured columns are tried first (fixed axes read directly,
/// auto-detected axes found by range), then range-based auto-detection of
/// both axes, then (when enabled) geocoding of the cleaned address column.
pub async fn resolve_row(
    def: &DatasetDefinition,
    fields: &[String],
    geocoder: &dyn Geocoder,
) -> RowResolution {
    if let Some(coords) = configured_coordinates(def, fields) {
        return RowResolution::Resolved(coords);
    }

    if let Some(coords) = detected_coordinates(fields) {
        return RowResolution::Resolved(coords);
    }

    if def.geocode {
        let Some(raw) = def.address.fixed().and_then(|i| fields.get(i)) else {
            return RowResolution::Skipped;
        };
        let address = clean_address(raw);
        return match geocoder.geocode(&address).await {
            GeocodeOutcome::Resolved(coords) => RowResolution::Resolved(coords),
            GeocodeOutcome::Unresolved(reason) => {
                RowResolution::Unresolved(RowFailure::Geocode { address, reason })
            }
        };
    }

    let out_of_range = [def.latitude.fixed(), def.longitude.fixed()]
        .into_iter()
        .flatten()
        .any(|i| i >= fields.len());
    if out_of_range {
        return RowResolution::Skipped;
    }

    RowResolution::Unresolved(RowFailure::NoCoordinates)
}

/// Per-file tally of row outcomes with bounded failure logging.
struct RowTally {
    label: String,
    report: ImportReport,
    logged: u64,
}

impl RowTally {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            report: ImportReport::begin(label),
            logged: 0,
        }
    }

    fn fail(&mut self, failure: &RowFailure) {
        if self.logged < FAILURE_LOG_LIMIT {
            log::warn!("{}: {failure}", self.label);
            self.logged += 1;
        }
        self.report.failure += 1;
    }

    fn finish(self) -> ImportReport {
        let suppressed = self.report.failure - self.logged;
        if suppressed > 0 {
            log::warn!("{}: {suppressed} further row failures not logged", self.label);
        }
        self.report.finish()
    }
}

/// Imports one facility dataset, replacing every stored point of its type.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or decoded, a row
/// cannot be tokenised, or a store write fails. Nothing is replaced in that
/// case.
pub async fn import_file(
    store: &dyn PointStore,
    geocoder: &dyn Geocoder,
    data_dir: &Path,
    def: &DatasetDefinition,
) -> Result<ImportReport, IngestError> {
    let label = def.risk_type.to_string();
    let path = def.path_in(data_dir);
    log::info!("Importing {label} data from {}", path.display());

    let mut tally = RowTally::new(&label);
    let text = reader::read_dataset(&path, def.encoding).await?;

    let mut tx = store.begin().await?;
    let deleted = tx.delete_all_by_type(def.risk_type).await?;
    log::debug!("Deleted {deleted} existing {label} points");

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    for row in reader::data_rows(&text) {
        let row = row?;
        if reader::is_blank(&row) {
            tally.report.skipped += 1;
            continue;
        }
        match resolve_row(def, &row, geocoder).await {
            RowResolution::Resolved(coords) => {
                batch.push(RiskPoint::new(coords, def.risk_type));
                tally.report.success += 1;
                if batch.len() == BATCH_SIZE {
                    tx.save_all(&batch).await?;
                    tally.report.batches_flushed += 1;
                    batch.clear();
                }
            }
            RowResolution::Skipped => tally.report.skipped += 1,
            RowResolution::Unresolved(failure) => tally.fail(&failure),
        }
    }
    if !batch.is_empty() {
        tx.save_all(&batch).await?;
        tally.report.batches_flushed += 1;
    }

    tx.commit().await?;
    let report = tally.finish();

    log::info!(
        "Imported {label}: success={}, fail={}, skipped={}",
        report.success,
        report.failure,
        report.skipped
    );

    Ok(report)
}

/// Imports the configured dataset for `risk_type`.
///
/// # Errors
///
/// Returns [`IngestError::UnknownDataset`] if no dataset has that type, or
/// any error from [`import_file`].
pub async fn import_dataset(
    store: &dyn PointStore,
    geocoder: &dyn Geocoder,
    data_dir: &Path,
    datasets: &[DatasetDefinition],
    risk_type: RiskType,
) -> Result<ImportReport, IngestError> {
    let def = datasets
        .iter()
        .find(|d| d.risk_type == risk_type)
        .ok_or(IngestError::UnknownDataset(risk_type))?;
    import_file(store, geocoder, data_dir, def).await
}

/// Parses a population count, ignoring every non-digit character
/// (thousands separators, units).
fn parse_count(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Imports the population dataset, replacing every stored population point.
///
/// Rows with fewer than three columns are skipped. Dongs are placed with
/// the centroid table first and geocoded otherwise.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or decoded, a row
/// cannot be tokenised, or a store write fails. Nothing is replaced in that
/// case.
pub async fn import_population(
    store: &dyn PointStore,
    geocoder: &dyn Geocoder,
    data_dir: &Path,
    dataset: &PopulationDataset,
) -> Result<ImportReport, IngestError> {
    let path = data_dir.join(&dataset.file);
    log::info!("Importing population data from {}", path.display());

    let mut tally = RowTally::new(POPULATION_LABEL);
    let text = reader::read_dataset(&path, DatasetEncoding::Utf8).await?;

    let mut tx = store.begin().await?;
    let deleted = tx.delete_all_population().await?;
    log::debug!("Deleted {deleted} existing population points");

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    for row in reader::data_rows(&text) {
        let row = row?;
        if row.len() < 3 || reader::is_blank(&row) {
            tally.report.skipped += 1;
            continue;
        }

        let district = &row[0];
        let dong = &row[1];
        let Some(count) = parse_count(&row[2]) else {
            tally.fail(&RowFailure::InvalidCount(row[2].clone()));
            continue;
        };

        let coords = if let Some(coords) = dong::resolve(dong) {
            coords
        } else {
            let query = dataset.geocode_query(district, dong);
            match geocoder.geocode(&query).await {
                GeocodeOutcome::Resolved(coords) => {
                    log::debug!(
                        "Geocoded {dong} to {},{}",
                        coords.latitude,
                        coords.longitude
                    );
                    coords
                }
                GeocodeOutcome::Unresolved(reason) => {
                    tally.fail(&RowFailure::Geocode {
                        address: query,
                        reason,
                    });
                    continue;
                }
            }
        };

        batch.push(PopulationPoint::new(district.as_str(), dong.as_str(), count, coords));
        tally.report.success += 1;
        if batch.len() == BATCH_SIZE {
            tx.save_all_population(&batch).await?;
            tally.report.batches_flushed += 1;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        tx.save_all_population(&batch).await?;
        tally.report.batches_flushed += 1;
    }

    tx.commit().await?;
    let report = tally.finish();

    log::info!(
        "Imported {} population points (fail={}, skipped={})",
        report.success,
        report.failure,
        report.skipped
    );

    Ok(report)
}

/// Runs every facility sub-import in order, then the population import.
///
/// Never short-circuits: a failed sub-import is recorded in the summary and
/// the next one still runs.
pub async fn import_all(
    store: &dyn PointStore,
    geocoder: &dyn Geocoder,
    data_dir: &Path,
    datasets: &[DatasetDefinition],
    population: &PopulationDataset,
) -> ImportSummary {
    log::info!("Starting import of {} datasets", datasets.len() + 1);

    let mut summary = ImportSummary::default();

    for def in datasets {
        let outcome = match import_file(store, geocoder, data_dir, def).await {
            Ok(report) => DatasetOutcome::Ok { report },
            Err(e) => {
                log::error!("{} import failed: {e}", def.risk_type);
                DatasetOutcome::Error {
                    dataset: def.risk_type.to_string(),
                    message: e.to_string(),
                }
            }
        };
        summary.outcomes.push(outcome);
    }

    let outcome = match import_population(store, geocoder, data_dir, population).await {
        Ok(report) => DatasetOutcome::Ok { report },
        Err(e) => {
            log::error!("Population import failed: {e}");
            DatasetOutcome::Error {
                dataset: POPULATION_LABEL.to_string(),
                message: e.to_string(),
            }
        }
    };
    summary.outcomes.push(outcome);

    if summary.all_ok() {
        log::info!("All data import completed");
    } else {
        log::warn!(
            "Data import completed with failures: {}",
            summary.failed_datasets().join(", ")
        );
    }

    summary
}
