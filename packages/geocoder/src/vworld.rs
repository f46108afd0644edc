//! VWorld (Korean national spatial data portal) API client.
//!
//! Three services are used:
//! - `address` / `getcoord` for forward geocoding during ingestion,
//! - `address` / `getAddress` for reverse geocoding (passed through raw),
//! - `search` for the staged address search behind the map's search box.
//!
//! Forward geocoding sleeps `rate_limit` before every request and is meant
//! to be awaited serially; VWorld rejects bursts from a single key.
//!
//! See <https://www.vworld.kr/dev/v4dv_geocoderguide2_s001.do>

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use risk_map_point_models::Coordinates;
use serde::Serialize;
use strum_macros::Display;

use crate::address::{is_not_found, refine_parcel_query, refine_road_query};
use crate::{GeocodeError, GeocodeOutcome, Geocoder, UnresolvedReason};

/// Default VWorld request base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.vworld.kr/req";

/// Connection settings for [`VWorldClient`].
#[derive(Debug, Clone)]
pub struct VWorldSettings {
    /// API key. May be empty, in which case every request fails with
    /// [`GeocodeError::MissingKey`].
    pub key: String,
    /// Base URL without a trailing slash (e.g. `"https://api.vworld.kr/req"`).
    pub base_url: String,
    /// Delay before every forward geocoding request.
    pub rate_limit: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for VWorldSettings {
    fn default() -> Self {
        Self {
            key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the VWorld APIs.
#[derive(Debug, Clone)]
pub struct VWorldClient {
    client: reqwest::Client,
    settings: VWorldSettings,
}

impl VWorldClient {
    /// Builds a client whose requests time out after `settings.timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(settings: VWorldSettings) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    fn key(&self) -> Result<&str, GeocodeError> {
        if self.settings.key.is_empty() {
            Err(GeocodeError::MissingKey)
        } else {
            Ok(&self.settings.key)
        }
    }

    async fn request_coordinates(&self, address: &str) -> Result<GeocodeOutcome, GeocodeError> {
        let key = self.key()?;

        tokio::time::sleep(self.settings.rate_limit).await;

        let body = self
            .client
            .get(format!("{}/address", self.settings.base_url))
            .query(&[
                ("service", "address"),
                ("request", "getcoord"),
                ("version", "2.0"),
                ("crs", "epsg:4326"),
                ("address", address),
                ("refine", "true"),
                ("simple", "false"),
                ("format", "json"),
                ("type", "PARCEL"),
                ("key", key),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_geocode_response(&body)
    }

    /// Looks up the address at a coordinate pair and returns VWorld's raw
    /// JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if no key is configured or the request
    /// fails.
    pub async fn reverse_geocode(&self, lon: f64, lat: f64) -> Result<String, GeocodeError> {
        let key = self.key()?;
        let point = format!("{lon:.7},{lat:.7}");

        log::info!("VWorld getAddress lat={lat}, lon={lon}");

        Ok(self
            .client
            .get(format!("{}/address", self.settings.base_url))
            .query(&[
                ("service", "address"),
                ("request", "getAddress"),
                ("version", "2.0"),
                ("crs", "epsg:4326"),
                ("point", point.as_str()),
                ("format", "json"),
                ("type", "both"),
                ("key", key),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }

    /// Runs one search API call. Failures are logged and reported as `None`
    /// so the pipeline moves on to the next stage.
    async fn search_stage(&self, stage: SearchStage, query: &str) -> Option<String> {
        let key = match self.key() {
            Ok(key) => key,
            Err(e) => {
                log::error!("VWorld search [{stage}] skipped: {e}");
                return None;
            }
        };

        let mut params = vec![
            ("service", "search"),
            ("request", "search"),
            ("version", "2.0"),
            ("crs", "epsg:3857"),
            ("size", "1"),
            ("type", stage.api_type()),
            ("query", query),
            ("key", key),
        ];
        if let Some(category) = stage.category() {
            params.push(("category", category));
        }

        log::info!("VWorld search [{stage}] for: {query}");

        match self.fetch_search(&params).await {
            Ok(body) => Some(body),
            Err(e) => {
                log::error!("VWorld search [{stage}] failed: {e}");
                None
            }
        }
    }

    async fn fetch_search(&self, params: &[(&str, &str)]) -> Result<String, reqwest::Error> {
        self.client
            .get(format!("{}/search", self.settings.base_url))
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Resolves free text through the staged search pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::EmptyQuery`] for a blank query. Individual
    /// stage failures are not errors; if every stage misses, the result
    /// carries the last stage's (possibly absent) response.
    pub async fn search(&self, query: &str) -> Result<SearchResult, GeocodeError> {
        run_search_pipeline(query, |stage, q| async move { self.search_stage(stage, &q).await })
            .await
    }
}

#[async_trait]
impl Geocoder for VWorldClient {
    async fn geocode(&self, address: &str) -> GeocodeOutcome {
        let address = address.trim();
        if address.is_empty() {
            return GeocodeOutcome::Unresolved(UnresolvedReason::EmptyAddress);
        }

        match self.request_coordinates(address).await {
            Ok(outcome) => outcome,
            Err(e) => GeocodeOutcome::Unresolved(UnresolvedReason::from(e)),
        }
    }
}

/// Parses a `getcoord` response body.
///
/// A non-`OK` status is a "not found" outcome; a body that cannot be read
/// as the expected shape is an error.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body is not JSON or an `OK`
/// response lacks a numeric `result.point.x`/`y`.
pub fn parse_geocode_response(body: &str) -> Result<GeocodeOutcome, GeocodeError> {
    let root: serde_json::Value = serde_json::from_str(body).map_err(|e| GeocodeError::Parse {
        message: format!("VWorld response is not JSON: {e}"),
    })?;

    let response = &root["response"];
    let status = response["status"].as_str().unwrap_or("MISSING");
    if status != "OK" {
        return Ok(GeocodeOutcome::Unresolved(UnresolvedReason::NotFound(
            status.to_string(),
        )));
    }

    let point = &response["result"]["point"];
    let x = coordinate_value(&point["x"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing result.point.x in VWorld response".to_string(),
    })?;
    let y = coordinate_value(&point["y"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing result.point.y in VWorld response".to_string(),
    })?;

    Ok(GeocodeOutcome::Resolved(Coordinates::new(y, x)))
}

/// VWorld sends coordinates as strings; accept plain numbers too.
fn coordinate_value(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

// ── Staged search ───────────────────────────────────────────────────

/// One stage of the address search pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SearchStage {
    /// Points of interest by name.
    Place,
    /// Road addresses, original query.
    Road,
    /// Road addresses, narrowed to the road fragment.
    RefinedRoad,
    /// Parcel (lot) addresses, original query.
    Parcel,
    /// Parcel addresses, narrowed to the dong/lot fragment.
    RefinedParcel,
    /// Administrative districts.
    District,
}

impl SearchStage {
    /// Every stage in execution order.
    pub const ALL: [Self; 6] = [
        Self::Place,
        Self::Road,
        Self::RefinedRoad,
        Self::Parcel,
        Self::RefinedParcel,
        Self::District,
    ];

    /// The search API `type` parameter.
    #[must_use]
    pub const fn api_type(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Road | Self::RefinedRoad | Self::Parcel | Self::RefinedParcel => "address",
            Self::District => "district",
        }
    }

    /// The search API `category` parameter, for address searches.
    #[must_use]
    pub const fn category(self) -> Option<&'static str> {
        match self {
            Self::Road | Self::RefinedRoad => Some("road"),
            Self::Parcel | Self::RefinedParcel => Some("parcel"),
            Self::Place | Self::District => None,
        }
    }

    /// The result kind reported to clients (`foundType`).
    #[must_use]
    pub const fn found_type(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Road | Self::RefinedRoad => "road",
            Self::Parcel | Self::RefinedParcel => "parcel",
            Self::District => "district",
        }
    }

    /// The query this stage sends, or `None` when a refined stage would
    /// repeat the original query.
    #[must_use]
    pub fn query_for(self, query: &str) -> Option<String> {
        let refined = match self {
            Self::RefinedRoad => refine_road_query(query),
            Self::RefinedParcel => refine_parcel_query(query),
            Self::Place | Self::Road | Self::Parcel | Self::District => {
                return Some(query.to_string());
            }
        };
        (refined != query).then_some(refined)
    }
}

/// Outcome of the staged search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Raw VWorld response of the last stage that ran, if it answered.
    pub data: Option<String>,
    /// Result kind of the last stage that ran.
    pub found_type: &'static str,
    /// The trimmed query.
    pub query: String,
    /// Whether some stage produced a hit.
    #[serde(skip)]
    pub found: bool,
}

/// Runs the staged search with `fetch` performing each API call.
///
/// The first stage always runs; each later stage runs only while the
/// current response is "not found".
///
/// # Errors
///
/// Returns [`GeocodeError::EmptyQuery`] if `query` is blank.
pub async fn run_search_pipeline<F, Fut>(
    query: &str,
    mut fetch: F,
) -> Result<SearchResult, GeocodeError>
where
    F: FnMut(SearchStage, String) -> Fut + Send,
    Fut: Future<Output = Option<String>> + Send,
{
    let query = query.trim();
    if query.is_empty() {
        return Err(GeocodeError::EmptyQuery);
    }

    let mut response: Option<String> = None;
    let mut found_type = SearchStage::Place.found_type();

    for (i, stage) in SearchStage::ALL.into_iter().enumerate() {
        if i > 0 && !is_not_found(response.as_deref()) {
            break;
        }
        let Some(stage_query) = stage.query_for(query) else {
            continue;
        };
        response = fetch(stage, stage_query).await;
        found_type = stage.found_type();
    }

    let found = !is_not_found(response.as_deref());
    if !found {
        log::warn!("All search stages failed for query: {query}");
    }

    Ok(SearchResult {
        data: response,
        found_type,
        query: query.to_string(),
        found,
    })
}
