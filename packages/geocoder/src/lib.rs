#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for the risk map.
//!
//! Forward geocoding turns dataset addresses (and population
//! district/dong names) into coordinates during ingestion. It never fails
//! the caller: every problem, from a blank address to a timed-out request,
//! becomes a [`GeocodeOutcome::Unresolved`] carrying the reason, and the
//! ingestion pipeline counts the row as a failure.
//!
//! [`vworld::VWorldClient`] is the production implementation. It also
//! provides reverse geocoding and the staged address search used by the
//! map's search box. [`address`] holds the address cleaning and query
//! refinement helpers.

pub mod address;
pub mod vworld;

use async_trait::async_trait;
use risk_map_point_models::Coordinates;
use thiserror::Error;

pub use vworld::{SearchResult, SearchStage, VWorldClient, VWorldSettings};

/// Errors from geocoding API calls.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed (connection, timeout, or non-success status).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// No VWorld API key is configured.
    #[error("VWorld API key is not configured (set VWORLD_API_KEY)")]
    MissingKey,

    /// A search was requested with a blank query.
    #[error("Search query is empty")]
    EmptyQuery,
}

/// Why an address could not be turned into coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Nothing left to geocode after cleaning.
    EmptyAddress,
    /// The service answered with a non-`OK` status.
    NotFound(String),
    /// The request could not be made or failed in transit.
    Transport(String),
    /// The service answered with a body of unexpected shape.
    Malformed(String),
    /// The request exceeded its timeout.
    Timeout,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAddress => f.write_str("empty address"),
            Self::NotFound(status) => write!(f, "not found (status {status})"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Malformed(message) => write!(f, "malformed response: {message}"),
            Self::Timeout => f.write_str("request timed out"),
        }
    }
}

impl From<GeocodeError> for UnresolvedReason {
    fn from(e: GeocodeError) -> Self {
        match e {
            GeocodeError::Http(e) if e.is_timeout() => Self::Timeout,
            GeocodeError::Http(e) => Self::Transport(e.to_string()),
            GeocodeError::Parse { message } => Self::Malformed(message),
            GeocodeError::MissingKey | GeocodeError::EmptyQuery => Self::Transport(e.to_string()),
        }
    }
}

/// Result of geocoding one address.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// The address resolved to a coordinate pair.
    Resolved(Coordinates),
    /// The address could not be resolved.
    Unresolved(UnresolvedReason),
}

/// Forward geocoding service.
///
/// Implementations must not panic or return early errors; every failure
/// mode is reported through [`GeocodeOutcome::Unresolved`].
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves a cleaned address string to coordinates.
    async fn geocode(&self, address: &str) -> GeocodeOutcome;
}
