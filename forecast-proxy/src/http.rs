//! HTTP API for the browser app and the extension overlay.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use forecast_core::{ForecastService, LocationQuery};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

/// Forecasts go stale quickly; nothing in between may store them.
const NO_STORE: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: ForecastService,
}

/// Query params for the forecast endpoint. Kept as strings so that garbage
/// coordinates fall through to `city` instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ForecastParams {
    pub city: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl ForecastParams {
    pub fn to_query(&self) -> LocationQuery {
        LocationQuery::from_params(self.city.as_deref(), self.lat.as_deref(), self.lon.as_deref())
    }
}

/// JSON body returned with 502
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// GET /api/forecast - Normalized forecast for a city or coordinate pair
async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastParams>,
) -> Response {
    let query = params.to_query();

    match state.service.forecast(&query).await {
        Ok(payload) => (StatusCode::OK, NO_STORE, Json(payload)).into_response(),
        Err(e) => {
            tracing::error!(?query, error = %e, "forecast request failed");
            let body = ErrorBody {
                error: e.summary().to_string(),
                detail: e.to_string(),
            };
            (StatusCode::BAD_GATEWAY, NO_STORE, Json(body)).into_response()
        }
    }
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Create the HTTP router
pub fn create_router(service: ForecastService) -> Router {
    let state = AppState { service };

    // The extension overlay calls in from arbitrary origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/forecast", get(get_forecast))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_http_server(service: ForecastService, bind: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
