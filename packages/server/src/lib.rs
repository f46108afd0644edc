#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the risk map application.
//!
//! Serves the facility points, both risk heatmap profiles, the client
//! configuration, and thin VWorld proxies for reverse geocoding and address
//! search. `POST /api/import` re-runs the full dataset import against the
//! shared point store while readers keep being served.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use risk_map_config::AppConfig;
use risk_map_database::PointStore;
use risk_map_geocoder::VWorldClient;
use risk_map_spatial::GridSpec;

/// Shared application state.
pub struct AppState {
    /// Facility and population points.
    pub store: Arc<dyn PointStore>,
    /// Loaded configuration.
    pub config: AppConfig,
    /// Scoring lattice derived from the configured map bounds.
    pub grid: GridSpec,
    /// VWorld client used for import geocoding and the proxy endpoints.
    pub vworld: VWorldClient,
}

impl AppState {
    /// Builds the state for `config` over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`risk_map_geocoder::GeocodeError`] if the HTTP client cannot
    /// be constructed.
    pub fn new(
        store: Arc<dyn PointStore>,
        config: AppConfig,
    ) -> Result<Self, risk_map_geocoder::GeocodeError> {
        let vworld = VWorldClient::new(config.vworld.settings())?;
        Ok(Self {
            store,
            grid: config.grid(),
            config,
            vworld,
        })
    }
}

/// Registers every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ping", web::get().to(handlers::ping)).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/import", web::post().to(handlers::import))
            .route("/risks", web::get().to(handlers::risks))
            .route("/risks/blind-spots", web::get().to(handlers::blind_spots))
            .route("/risks/refined-risk", web::get().to(handlers::refined_risk))
            .route("/config", web::get().to(handlers::client_config))
            .route("/proxy/address", web::get().to(handlers::proxy_address))
            .route("/proxy/search", web::get().to(handlers::proxy_search)),
    );
}

/// Starts the risk map API server.
///
/// Loads configuration, opens the point store, and starts the Actix-Web
/// HTTP server. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if configuration or the store cannot
/// be loaded, or the HTTP server fails to bind or encounters a runtime
/// error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Loading configuration...");
    let config = AppConfig::load().map_err(std::io::Error::other)?;

    log::info!("Opening point store...");
    let store = risk_map_database::open_from_env().map_err(std::io::Error::other)?;

    let bind_addr = config.server.bind_addr.clone();
    let port = config.server.port;
    log::info!(
        "Risk grid is {} x {} cells",
        config.grid().rows(),
        config.grid().cols()
    );

    let state = web::Data::new(AppState::new(store, config).map_err(std::io::Error::other)?);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
