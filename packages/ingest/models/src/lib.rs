#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset definitions and import result types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use risk_map_point_models::RiskType;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How a coordinate or address column is located in each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMode {
    /// Read this zero-based column.
    Fixed(usize),
    /// Scan the row for a value in the plausible coordinate range.
    #[default]
    AutoDetect,
    /// The dataset has no such column.
    Unused,
}

impl ColumnMode {
    /// Returns the column index when fixed.
    #[must_use]
    pub const fn fixed(self) -> Option<usize> {
        match self {
            Self::Fixed(index) => Some(index),
            Self::AutoDetect | Self::Unused => None,
        }
    }
}

/// Character encoding of a dataset file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DatasetEncoding {
    /// UTF-8, with or without a byte-order mark.
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    /// Windows code page 949 (Unified Hangul Code, a superset of EUC-KR).
    #[serde(alias = "euc-kr", alias = "cp949")]
    Ms949,
}

/// One facility dataset: which file, how to decode it, and how each row
/// yields coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    /// Facility type every row becomes.
    #[serde(rename = "type")]
    pub risk_type: RiskType,
    /// File path, relative to the data directory unless absolute.
    pub file: PathBuf,
    /// File encoding.
    #[serde(default)]
    pub encoding: DatasetEncoding,
    /// Latitude column.
    #[serde(default)]
    pub latitude: ColumnMode,
    /// Longitude column.
    #[serde(default)]
    pub longitude: ColumnMode,
    /// Address column used for geocoding.
    #[serde(default = "unused_column")]
    pub address: ColumnMode,
    /// Fall back to geocoding the address column when coordinates are not
    /// found in the row.
    #[serde(default)]
    pub geocode: bool,
}

const fn unused_column() -> ColumnMode {
    ColumnMode::Unused
}

impl DatasetDefinition {
    /// Creates an auto-detecting, non-geocoding definition.
    #[must_use]
    pub fn new(risk_type: RiskType, file: impl Into<PathBuf>, encoding: DatasetEncoding) -> Self {
        Self {
            risk_type,
            file: file.into(),
            encoding,
            latitude: ColumnMode::AutoDetect,
            longitude: ColumnMode::AutoDetect,
            address: ColumnMode::Unused,
            geocode: false,
        }
    }

    /// Reads coordinates from fixed columns.
    #[must_use]
    pub const fn with_fixed_columns(mut self, latitude: usize, longitude: usize) -> Self {
        self.latitude = ColumnMode::Fixed(latitude);
        self.longitude = ColumnMode::Fixed(longitude);
        self
    }

    /// Geocodes the given column when a row has no usable coordinates.
    #[must_use]
    pub const fn with_geocoding(mut self, address: usize) -> Self {
        self.address = ColumnMode::Fixed(address);
        self.geocode = true;
        self
    }

    /// Resolves [`Self::file`] against `data_dir`.
    #[must_use]
    pub fn path_in(&self, data_dir: &std::path::Path) -> PathBuf {
        data_dir.join(&self.file)
    }
}

/// The population dataset. Always UTF-8 with district, dong and count as
/// the first three columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationDataset {
    /// File path, relative to the data directory unless absolute.
    pub file: PathBuf,
    /// Prepended to `"{district} {dong}"` when geocoding a dong that is not
    /// in the centroid table.
    pub geocode_prefix: String,
}

impl PopulationDataset {
    /// Builds the geocoding query for a district/dong pair.
    #[must_use]
    pub fn geocode_query(&self, district: &str, dong: &str) -> String {
        let prefix = self.geocode_prefix.trim();
        if prefix.is_empty() {
            format!("{district} {dong}")
        } else {
            format!("{prefix} {district} {dong}")
        }
    }
}

/// Tally of one completed sub-import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Dataset label (facility type name or `"POPULATION"`).
    pub dataset: String,
    /// Rows that became points.
    pub success: u64,
    /// Rows that could not be resolved.
    pub failure: u64,
    /// Rows ignored without counting as failures (blank or too short).
    pub skipped: u64,
    /// Number of store writes the points were flushed in.
    pub batches_flushed: u64,
    /// When the sub-import started.
    pub started_at: DateTime<Utc>,
    /// When the sub-import committed.
    pub finished_at: DateTime<Utc>,
}

impl ImportReport {
    /// Starts an empty tally for `dataset`, timestamped now.
    #[must_use]
    pub fn begin(dataset: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            dataset: dataset.into(),
            success: 0,
            failure: 0,
            skipped: 0,
            batches_flushed: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// Stamps the finish time.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Result of one sub-import within an `import_all` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetOutcome {
    /// The sub-import committed.
    Ok {
        /// Its tally.
        report: ImportReport,
    },
    /// The sub-import failed at file level and was rolled back.
    Error {
        /// Dataset label.
        dataset: String,
        /// What went wrong.
        message: String,
    },
}

impl DatasetOutcome {
    /// Dataset label regardless of outcome.
    #[must_use]
    pub fn dataset(&self) -> &str {
        match self {
            Self::Ok { report } => &report.dataset,
            Self::Error { dataset, .. } => dataset,
        }
    }

    /// Whether the sub-import committed.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Outcomes of every sub-import of one `import_all` run, in run order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    /// One entry per dataset.
    pub outcomes: Vec<DatasetOutcome>,
}

impl ImportSummary {
    /// Whether every sub-import committed.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(DatasetOutcome::is_ok)
    }

    /// Labels of the sub-imports that failed.
    #[must_use]
    pub fn failed_datasets(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_ok())
            .map(DatasetOutcome::dataset)
            .collect()
    }
}
