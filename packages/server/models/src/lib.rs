#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the risk map server.
//!
//! Every JSON payload except `/api/health` and `/api/config` carries a
//! `status` of `"OK"` or `"ERROR"`. Failures use [`ApiError`].

use risk_map_ingest_models::DatasetOutcome;
use risk_map_point_models::{HeatmapCell, RiskPoint, RiskType};
use serde::{Deserialize, Serialize};

/// Response status marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiStatus {
    /// The request succeeded.
    Ok,
    /// The request failed.
    Error,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Always `true` when the server answers.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Always [`ApiStatus::Error`].
    pub status: ApiStatus,
    /// What went wrong.
    pub message: String,
}

impl ApiError {
    /// Builds an error body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            message: message.into(),
        }
    }
}

/// `POST /api/import` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiImport {
    /// `OK` when every sub-import committed.
    pub status: ApiStatus,
    /// Human-readable summary.
    pub message: String,
    /// Per-dataset outcomes in run order.
    pub outcomes: Vec<DatasetOutcome>,
}

/// Query parameters for `GET /api/risks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RisksQueryParams {
    /// Restrict to one facility type.
    #[serde(rename = "type")]
    pub risk_type: Option<RiskType>,
}

/// `GET /api/risks` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRisks {
    /// Always [`ApiStatus::Ok`].
    pub status: ApiStatus,
    /// Facility points.
    pub result: Vec<RiskPoint>,
}

/// Heatmap response for both risk profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHeatmap {
    /// Always [`ApiStatus::Ok`].
    pub status: ApiStatus,
    /// Scored cells.
    pub result: Vec<HeatmapCell>,
    /// Population points consulted; reported by the refined profile only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_count: Option<usize>,
}

/// `GET /api/config` response: the values the map client needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClientConfig {
    /// VWorld settings for the client's map tiles.
    pub vworld: ApiVWorldConfig,
    /// Initial map view.
    pub map: ApiMapConfig,
}

/// VWorld settings exposed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiVWorldConfig {
    /// API key.
    pub key: String,
}

/// Map settings exposed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMapConfig {
    /// Initial center.
    pub center: ApiCenter,
}

/// A map center.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApiCenter {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// Query parameters for `GET /api/proxy/address`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AddressQueryParams {
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
}

/// `GET /api/proxy/address` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAddress {
    /// Always [`ApiStatus::Ok`].
    pub status: ApiStatus,
    /// Raw VWorld response.
    pub data: String,
}

/// Query parameters for `GET /api/proxy/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQueryParams {
    /// Free-text place, address, or district.
    pub address: Option<String>,
}

/// `GET /api/proxy/search` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearch {
    /// Always [`ApiStatus::Ok`], even when every stage missed.
    pub status: ApiStatus,
    /// Raw VWorld response of the last stage that ran.
    pub data: Option<String>,
    /// Result kind of the last stage that ran.
    pub found_type: String,
    /// The trimmed query.
    pub query: String,
}
