//! HTTP handler functions for the risk map API.

use actix_web::{HttpResponse, web};
use risk_map_risk::compute_profile;
use risk_map_risk_models::RiskProfile;
use risk_map_server_models::{
    AddressQueryParams, ApiAddress, ApiCenter, ApiClientConfig, ApiError, ApiHealth, ApiHeatmap,
    ApiImport, ApiMapConfig, ApiRisks, ApiSearch, ApiStatus, ApiVWorldConfig, RisksQueryParams,
    SearchQueryParams,
};

use crate::AppState;

fn internal_error(context: &str, e: &dyn std::fmt::Display) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
}

/// `GET /ping`
pub async fn ping() -> &'static str {
    "pong"
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/import`
///
/// Re-imports every configured dataset. Responds 500 if any sub-import
/// failed; the others are still committed.
pub async fn import(state: web::Data<AppState>) -> HttpResponse {
    let summary = risk_map_ingest::import_all(
        state.store.as_ref(),
        &state.vworld,
        &state.config.data.dir,
        &state.config.datasets,
        &state.config.population,
    )
    .await;

    if summary.all_ok() {
        HttpResponse::Ok().json(ApiImport {
            status: ApiStatus::Ok,
            message: "Data import completed".to_string(),
            outcomes: summary.outcomes,
        })
    } else {
        let message = format!(
            "Data import failed for: {}",
            summary.failed_datasets().join(", ")
        );
        log::error!("{message}");
        HttpResponse::InternalServerError().json(ApiImport {
            status: ApiStatus::Error,
            message,
            outcomes: summary.outcomes,
        })
    }
}

/// `GET /api/risks`
///
/// Lists facility points, optionally restricted to one `type`.
pub async fn risks(
    state: web::Data<AppState>,
    params: web::Query<RisksQueryParams>,
) -> HttpResponse {
    let result = match params.risk_type {
        Some(risk_type) => state.store.find_by_type(risk_type).await,
        None => state.store.find_all().await,
    };

    match result {
        Ok(points) => HttpResponse::Ok().json(ApiRisks {
            status: ApiStatus::Ok,
            result: points,
        }),
        Err(e) => internal_error("Failed to query risk points", &e),
    }
}

/// `GET /api/risks/blind-spots`
pub async fn blind_spots(state: web::Data<AppState>) -> HttpResponse {
    match compute_profile(
        state.store.as_ref(),
        &state.grid,
        &state.config.profiles,
        RiskProfile::BlindSpots,
    )
    .await
    {
        Ok(grid) => HttpResponse::Ok().json(ApiHeatmap {
            status: ApiStatus::Ok,
            result: grid.cells,
            pop_count: None,
        }),
        Err(e) => internal_error("Failed to compute blind-spot map", &e),
    }
}

/// `GET /api/risks/refined-risk`
pub async fn refined_risk(state: web::Data<AppState>) -> HttpResponse {
    match compute_profile(
        state.store.as_ref(),
        &state.grid,
        &state.config.profiles,
        RiskProfile::Refined,
    )
    .await
    {
        Ok(grid) => HttpResponse::Ok().json(ApiHeatmap {
            status: ApiStatus::Ok,
            result: grid.cells,
            pop_count: Some(grid.population_count),
        }),
        Err(e) => internal_error("Failed to compute refined risk map", &e),
    }
}

/// `GET /api/config`
pub async fn client_config(state: web::Data<AppState>) -> HttpResponse {
    let center = state.config.map.center;
    HttpResponse::Ok().json(ApiClientConfig {
        vworld: ApiVWorldConfig {
            key: state.config.vworld.key.clone(),
        },
        map: ApiMapConfig {
            center: ApiCenter {
                lat: center.lat,
                lon: center.lon,
            },
        },
    })
}

/// `GET /api/proxy/address`
///
/// Reverse geocodes `lon`/`lat` and passes VWorld's response through.
pub async fn proxy_address(
    state: web::Data<AppState>,
    params: web::Query<AddressQueryParams>,
) -> HttpResponse {
    match state.vworld.reverse_geocode(params.lon, params.lat).await {
        Ok(data) => HttpResponse::Ok().json(ApiAddress {
            status: ApiStatus::Ok,
            data,
        }),
        Err(e) => internal_error("Reverse geocoding failed", &e),
    }
}

/// `GET /api/proxy/search`
///
/// Runs the staged place/road/parcel/district search. A query that misses
/// every stage still answers `OK` with the last stage's response.
pub async fn proxy_search(
    state: web::Data<AppState>,
    params: web::Query<SearchQueryParams>,
) -> HttpResponse {
    let query = params.address.as_deref().unwrap_or_default().trim();
    if query.is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("Search query is empty"));
    }

    match state.vworld.search(query).await {
        Ok(found) => HttpResponse::Ok().json(ApiSearch {
            status: ApiStatus::Ok,
            data: found.data,
            found_type: found.found_type.to_string(),
            query: found.query,
        }),
        Err(e) => internal_error("Address search failed", &e),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use actix_web::{App, test};
    use risk_map_config::{AppConfig, DEFAULT_CONFIG_TOML};
    use risk_map_database::{MemoryPointStore, PointStore};
    use risk_map_ingest_models::DatasetOutcome;
    use risk_map_point_models::{Coordinates, PopulationPoint, RiskPoint, RiskType};
    use risk_map_spatial::BoundingBox;

    use super::*;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::from_toml(DEFAULT_CONFIG_TOML).unwrap();
        config.map.bounds = BoundingBox::new(37.400, 37.404, 127.110, 127.115);
        config
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("risk_map_server_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn state(store: Arc<dyn PointStore>, config: AppConfig) -> web::Data<AppState> {
        web::Data::new(AppState::new(store, config).unwrap())
    }

    async fn seeded_store() -> Arc<MemoryPointStore> {
        let store = Arc::new(MemoryPointStore::new());
        store
            .save_all(&[
                RiskPoint::new(Coordinates::new(37.401, 127.111), RiskType::Cctv),
                RiskPoint::new(Coordinates::new(37.402, 127.112), RiskType::Police),
            ])
            .await
            .unwrap();
        store
    }

    #[actix_web::test]
    async fn ping_answers_pong() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryPointStore::new()), test_config()))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/ping").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "pong");
    }

    #[actix_web::test]
    async fn risks_filter_by_type() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store().await, test_config()))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/risks").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["result"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/risks?type=POLICE")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let result = body["result"].as_array().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["type"], "POLICE");
    }

    #[actix_web::test]
    async fn unknown_risk_type_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store().await, test_config()))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/risks?type=FIRE_STATION")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn blind_spots_cover_grid_without_population() {
        let config = test_config();
        let cells = config.grid().len();
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store().await, config))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/risks/blind-spots")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["result"].as_array().unwrap().len(), cells);
        assert!(body.get("popCount").is_none());
    }

    #[actix_web::test]
    async fn refined_risk_is_empty_without_population() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store().await, test_config()))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/risks/refined-risk")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "OK");
        assert!(body["result"].as_array().unwrap().is_empty());
        assert_eq!(body["popCount"], 0);
    }

    #[actix_web::test]
    async fn refined_risk_reports_population_count() {
        let store = seeded_store().await;
        store
            .save_all_population(&[PopulationPoint::new(
                "분당구",
                "삼평동",
                1200,
                Coordinates::new(37.402, 127.112),
            )])
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(state(store, test_config()))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/risks/refined-risk")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["popCount"], 1);
        assert!(!body["result"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn client_config_exposes_key_and_center() {
        let mut config = test_config();
        config.vworld.key = "abc".to_string();
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryPointStore::new()), config))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["vworld"]["key"], "abc");
        assert_eq!(body["map"]["center"]["lat"], 37.42);
        assert_eq!(body["map"]["center"]["lon"], 127.127);
    }

    #[actix_web::test]
    async fn blank_search_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryPointStore::new()), test_config()))
                .configure(crate::configure),
        )
        .await;

        for uri in ["/api/proxy/search?address=%20%20", "/api/proxy/search"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "ERROR");
        }
    }

    #[actix_web::test]
    async fn reverse_geocoding_without_key_is_an_error() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryPointStore::new()), test_config()))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/proxy/address?lon=127.1&lat=37.4")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ERROR");
    }

    #[actix_web::test]
    async fn import_loads_every_dataset() {
        let dir = test_dir("import_ok");
        std::fs::write(dir.join("cctv.csv"), "id,lat,lon\nC1,37.401,127.111\n").unwrap();
        std::fs::write(dir.join("police.csv"), "lon,lat\n127.112,37.402\n").unwrap();
        std::fs::write(
            dir.join("streetlight.csv"),
            "id,lat,lon\nL1,37.403,127.113\nL2,37.404,127.114\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("population.csv"),
            "district,dong,count\n분당구,삼평동,\"1,200\"\n",
        )
        .unwrap();

        let mut config = test_config();
        config.data.dir = dir;
        let store = Arc::new(MemoryPointStore::new());
        let app = test::init_service(
            App::new()
                .app_data(state(store.clone(), config))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/import").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["outcomes"].as_array().unwrap().len(), 4);

        assert_eq!(store.find_all().await.unwrap().len(), 4);
        assert_eq!(
            store.find_by_type(RiskType::StreetLight).await.unwrap().len(),
            2
        );
        let population = store.find_all_population().await.unwrap();
        assert_eq!(population.len(), 1);
        assert_eq!(population[0].count, 1200);
    }

    #[actix_web::test]
    async fn import_reports_failed_datasets() {
        let dir = test_dir("import_partial");
        std::fs::write(dir.join("cctv.csv"), "id,lat,lon\nC1,37.401,127.111\n").unwrap();

        let mut config = test_config();
        config.data.dir = dir;
        let store = Arc::new(MemoryPointStore::new());
        let app = test::init_service(
            App::new()
                .app_data(state(store.clone(), config))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/import").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ERROR");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("POLICE"));
        assert!(message.contains("POPULATION"));
        assert!(!message.contains("CCTV"));

        let outcomes: Vec<DatasetOutcome> =
            serde_json::from_value(body["outcomes"].clone()).unwrap();
        assert!(outcomes[0].is_ok());
        assert_eq!(store.find_by_type(RiskType::Cctv).await.unwrap().len(), 1);
    }
}
