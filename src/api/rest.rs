// =============================================================================
// REST API Endpoints -- Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//
//   GET  health     liveness + state version
//   GET  candles    current envelope, `?order=desc` (default) or `asc`
//   POST refresh    manual refresh; 503 if the invocation itself fails
//   POST selection  `{symbol, interval}`; 400 on an unsupported interval
//   GET  status     selection, freshness, origin, bounds, budget
//   GET  symbols    watchlist and supported intervals
//
// CORS is configured permissively for development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::FeedError;
use crate::market_data::{Candle, EnvelopeStatus};
use crate::orchestrator::{FallbackReason, FetchOutcome};
use crate::types::{DataOrigin, FetchState, Interval};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/candles", get(candles))
        .route("/api/v1/refresh", post(refresh))
        .route("/api/v1/selection", post(select))
        .route("/api/v1/status", get(status))
        .route("/api/v1/symbols", get(symbols))
        .layer(cors)
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

/// Map a failed invocation to a 503 with a transient message. The error log
/// entry is written by the notice listener.
fn invocation_failed(err: FeedError) -> ApiError {
    warn!(error = %err, "refresh request failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "error": err.kind(),
            "message": "Refresh failed; showing previously loaded data.",
        })),
    )
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Candles
// =============================================================================

#[derive(Deserialize)]
struct CandlesQuery {
    #[serde(default)]
    order: Option<String>,
}

#[derive(Serialize)]
struct ChronologicalEnvelope {
    status: EnvelopeStatus,
    data: Vec<Candle>,
}

async fn candles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CandlesQuery>,
) -> Result<Response, ApiError> {
    let envelope = state.controller.envelope();

    match query.order.as_deref().map(str::trim) {
        None | Some("") | Some("desc") => Ok(Json(envelope).into_response()),
        Some("asc") => Ok(Json(ChronologicalEnvelope {
            status: envelope.status(),
            data: envelope.data().chronological(),
        })
        .into_response()),
        Some(other) => Err(bad_request(format!(
            "Invalid order: '{other}'. Use 'asc' or 'desc'."
        ))),
    }
}

// =============================================================================
// Refresh & selection
// =============================================================================

#[derive(Serialize)]
struct RefreshResponse {
    symbol: String,
    interval: Interval,
    state: FetchState,
    origin: DataOrigin,
    bars: usize,
    refreshed_at: DateTime<Utc>,
    fallback: Option<FallbackReason>,
}

impl From<FetchOutcome> for RefreshResponse {
    fn from(outcome: FetchOutcome) -> Self {
        Self {
            bars: outcome.envelope.data().len(),
            symbol: outcome.request.symbol,
            interval: outcome.request.interval,
            state: outcome.state,
            origin: outcome.origin,
            refreshed_at: outcome.completed_at,
            fallback: outcome.fallback,
        }
    }
}

async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let outcome = state
        .controller
        .refresh()
        .await
        .map_err(invocation_failed)?;

    info!(symbol = %outcome.request.symbol, state = %outcome.state, "manual refresh");
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
struct SelectionRequest {
    symbol: String,
    interval: String,
}

async fn select(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(bad_request("Symbol must not be empty.".to_string()));
    }
    let interval = Interval::parse(&req.interval).ok_or_else(|| {
        let supported: Vec<&str> = Interval::ALL.iter().map(Interval::as_str).collect();
        bad_request(format!(
            "Unsupported interval: '{}'. Use one of {}.",
            req.interval,
            supported.join(", ")
        ))
    })?;

    {
        let mut config = state.runtime_config.write();
        config.default_symbol = symbol.clone();
        config.default_interval = interval;
    }
    state.increment_version();

    let outcome = state
        .controller
        .select(&symbol, interval)
        .await
        .map_err(invocation_failed)?;

    Ok(Json(outcome.into()))
}

// =============================================================================
// Status & symbols
// =============================================================================

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_status())
}

#[derive(Serialize)]
struct IntervalOption {
    value: Interval,
    label: &'static str,
}

#[derive(Serialize)]
struct SymbolsResponse {
    symbols: Vec<String>,
    intervals: Vec<IntervalOption>,
}

async fn symbols(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let symbols = state.runtime_config.read().symbols.clone();
    let intervals = Interval::ALL
        .iter()
        .map(|i| IntervalOption {
            value: *i,
            label: i.label(),
        })
        .collect();
    Json(SymbolsResponse { symbols, intervals })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rand::rngs::mock::StepRng;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::orchestrator::tests::{live_payload, StubTransport};
    use crate::orchestrator::{DataFetchOrchestrator, FetchRequest, FetchSettings};
    use crate::refresh::{RefreshController, DEFAULT_REFRESH_PERIOD};
    use crate::runtime_config::RuntimeConfig;

    fn app_with(explode: Arc<AtomicBool>) -> Arc<AppState> {
        let transport = StubTransport::new(move |_| {
            if explode.load(Ordering::SeqCst) {
                panic!("transport blew up");
            }
            Ok(live_payload())
        });
        let settings = FetchSettings {
            max_requests_per_minute: 1000,
            ..FetchSettings::default()
        };
        let orchestrator = Arc::new(DataFetchOrchestrator::with_rng(
            transport,
            settings,
            Box::new(StepRng::new(0, 0)),
        ));
        let controller = Arc::new(RefreshController::new(
            orchestrator,
            FetchRequest::new("IBM", Interval::FiveMinutes),
            DEFAULT_REFRESH_PERIOD,
        ));
        Arc::new(AppState::new(RuntimeConfig::default(), controller))
    }

    fn app() -> Arc<AppState> {
        app_with(Arc::new(AtomicBool::new(false)))
    }

    async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = call(&app(), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn candles_empty_before_first_refresh() {
        let (status, body) = call(&app(), get("/api/v1/candles")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "success", "data": [] }));
    }

    #[tokio::test]
    async fn refresh_then_candles_in_both_orders() {
        let state = app();
        let (status, body) = call(&state, post_json("/api/v1/refresh", Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "Succeeded");
        assert_eq!(body["origin"], "live");
        assert_eq!(body["bars"], 2);

        let (_, desc) = call(&state, get("/api/v1/candles")).await;
        let (_, asc) = call(&state, get("/api/v1/candles?order=asc")).await;
        assert_eq!(desc["data"][0]["close"], 101.0);
        assert_eq!(asc["data"][0]["close"], 100.5);
        assert_eq!(asc["status"], "success");
        assert!(desc["data"][0]["putVolume"].is_u64());
    }

    #[tokio::test]
    async fn bad_order_is_rejected() {
        let (status, _) = call(&app(), get("/api/v1/candles?order=sideways")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_invocation_is_503_and_keeps_data() {
        let explode = Arc::new(AtomicBool::new(false));
        let state = app_with(explode.clone());
        call(&state, post_json("/api/v1/refresh", Value::Null)).await;

        explode.store(true, Ordering::SeqCst);
        let (status, body) = call(&state, post_json("/api/v1/refresh", Value::Null)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "RefreshInvocationError");

        let (_, candles) = call(&state, get("/api/v1/candles")).await;
        assert_eq!(candles["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn selection_switches_symbol() {
        let state = app();
        let (status, body) = call(
            &state,
            post_json(
                "/api/v1/selection",
                serde_json::json!({ "symbol": "msft", "interval": "1h" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "MSFT");
        assert_eq!(body["interval"], "1h");
        assert_eq!(state.runtime_config.read().default_symbol, "MSFT");

        let (_, status_body) = call(&state, get("/api/v1/status")).await;
        assert_eq!(status_body["symbol"], "MSFT");
        assert_eq!(status_body["interval"], "1h");
        assert_eq!(status_body["fetch_state"], "Succeeded");
        assert!(status_body["last_refreshed"].is_string());
    }

    #[tokio::test]
    async fn unsupported_interval_is_rejected() {
        let state = app();
        let (status, body) = call(
            &state,
            post_json(
                "/api/v1/selection",
                serde_json::json!({ "symbol": "IBM", "interval": "2h" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("2h"));
        assert_eq!(state.controller.selection().interval, Interval::FiveMinutes);
    }

    #[tokio::test]
    async fn symbols_lists_watchlist_and_intervals() {
        let (status, body) = call(&app(), get("/api/v1/symbols")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbols"][0], "IBM");
        assert_eq!(body["intervals"].as_array().unwrap().len(), 5);
        assert_eq!(body["intervals"][4]["value"], "1h");
    }
}
