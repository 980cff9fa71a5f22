// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// Read-only surface for the presentation layer, all under `/api/v1/`.  The
// only write is the selection, which drives both background loops.
//
// CORS is configured permissively for development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::{AppState, DashboardView, Selection};
use crate::indicators::macd::{MacdValue, DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;
use crate::indicators::IndicatorSnapshot;
use crate::market_data::{Bar, DataStatus, FetchStatus};
use crate::types::{RsiZone, RunMode};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not_found: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

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
        .route("/api/v1/selection", get(get_selection).post(set_selection))
        .route("/api/v1/view", get(view))
        .route("/api/v1/bars/:market/:timeframe", get(bars))
        .route("/api/v1/indicators/:market/:timeframe", get(indicators))
        .route("/api/v1/indicators/:market/:timeframe/closes", get(closes))
        .route("/api/v1/indicators/:market/:timeframe/rsi", get(rsi))
        .route("/api/v1/indicators/:market/:timeframe/macd", get(macd))
        .route("/api/v1/indicators/:market/:timeframe/trend", get(trend))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    mode: RunMode,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
    cached_keys: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        mode: state.runtime_config.read().mode,
        state_version: state.current_state_version(),
        server_time: Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        cached_keys: state.bar_cache.len(),
    };
    Json(resp)
}

// =============================================================================
// Selection
// =============================================================================

#[derive(Deserialize)]
struct SelectionRequest {
    market: String,
    timeframe: String,
}

async fn get_selection(State(state): State<Arc<AppState>>) -> Json<Selection> {
    Json(state.selection())
}

async fn set_selection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<Selection>, ApiError> {
    let market = req.market.trim();
    let timeframe = req.timeframe.trim();
    if market.is_empty() || timeframe.is_empty() {
        return Err(ApiError::BadRequest(
            "market and timeframe must be non-empty".to_string(),
        ));
    }

    let selection = Selection {
        market: market.to_string(),
        timeframe: timeframe.to_string(),
    };
    info!(market = %selection.market, timeframe = %selection.timeframe, "selection changed");
    state.set_selection(selection.clone());
    Ok(Json(selection))
}

// =============================================================================
// View + per-key reads
// =============================================================================

async fn view(State(state): State<Arc<AppState>>) -> Json<Option<DashboardView>> {
    Json(state.latest_view.read().clone())
}

#[derive(Serialize)]
struct BarsResponse {
    market: String,
    timeframe: String,
    status: FetchStatus,
    /// Failed refresh still serving bars from an earlier fetch.
    stale: bool,
    error_kind: Option<String>,
    error: Option<String>,
    last_refresh: DateTime<Utc>,
    data_status: DataStatus,
    bars: Vec<Bar>,
}

async fn bars(
    State(state): State<Arc<AppState>>,
    Path((market, timeframe)): Path<(String, String)>,
) -> Result<Json<BarsResponse>, ApiError> {
    let entry = state
        .bar_cache
        .get(&market, &timeframe)
        .ok_or_else(|| ApiError::NotFound(format!("no cache entry for {market} / TF {timeframe}")))?;

    let data_status = DataStatus::classify(Some(&entry));
    Ok(Json(BarsResponse {
        status: entry.status,
        stale: entry.is_stale(),
        error_kind: entry.error.as_ref().map(|e| e.kind().to_string()),
        error: entry.error.as_ref().map(|e| e.to_string()),
        last_refresh: entry.last_refresh,
        data_status,
        bars: entry.bars,
        market,
        timeframe,
    }))
}

async fn indicators(
    State(state): State<Arc<AppState>>,
    Path((market, timeframe)): Path<(String, String)>,
) -> Json<IndicatorSnapshot> {
    Json(state.indicator_engine.snapshot(&market, &timeframe))
}

// =============================================================================
// Single indicators with caller-chosen periods
// =============================================================================

#[derive(Serialize)]
struct IndicatorValue<T> {
    market: String,
    timeframe: String,
    /// `null` when there is not enough valid data.
    value: Option<T>,
}

fn require_period(name: &str, period: usize) -> Result<(), ApiError> {
    if period == 0 {
        return Err(ApiError::BadRequest(format!("{name} must be at least 1")));
    }
    Ok(())
}

async fn closes(
    State(state): State<Arc<AppState>>,
    Path((market, timeframe)): Path<(String, String)>,
) -> Result<Json<IndicatorValue<Vec<f64>>>, ApiError> {
    let closes = state
        .indicator_engine
        .closes(&market, &timeframe)
        .ok_or_else(|| ApiError::NotFound(format!("no valid closes for {market} / TF {timeframe}")))?;
    Ok(Json(IndicatorValue {
        market,
        timeframe,
        value: Some(closes),
    }))
}

#[derive(Deserialize)]
struct RsiParams {
    #[serde(default = "default_rsi_period")]
    period: usize,
}

fn default_rsi_period() -> usize {
    DEFAULT_RSI_PERIOD
}

#[derive(Serialize)]
struct RsiReading {
    period: usize,
    rsi: f64,
    zone: RsiZone,
}

async fn rsi(
    State(state): State<Arc<AppState>>,
    Path((market, timeframe)): Path<(String, String)>,
    Query(params): Query<RsiParams>,
) -> Result<Json<IndicatorValue<RsiReading>>, ApiError> {
    require_period("period", params.period)?;
    let value = state
        .indicator_engine
        .rsi(&market, &timeframe, params.period)
        .map(|rsi| RsiReading {
            period: params.period,
            rsi,
            zone: RsiZone::from_rsi(rsi),
        });
    Ok(Json(IndicatorValue {
        market,
        timeframe,
        value,
    }))
}

#[derive(Deserialize)]
struct MacdParams {
    #[serde(default = "default_fast")]
    fast: usize,
    #[serde(default = "default_slow")]
    slow: usize,
    #[serde(default = "default_signal")]
    signal: usize,
}

fn default_fast() -> usize {
    DEFAULT_FAST
}

fn default_slow() -> usize {
    DEFAULT_SLOW
}

fn default_signal() -> usize {
    DEFAULT_SIGNAL
}

async fn macd(
    State(state): State<Arc<AppState>>,
    Path((market, timeframe)): Path<(String, String)>,
    Query(params): Query<MacdParams>,
) -> Result<Json<IndicatorValue<MacdValue>>, ApiError> {
    require_period("fast", params.fast)?;
    require_period("slow", params.slow)?;
    require_period("signal", params.signal)?;
    let value = state.indicator_engine.macd(
        &market,
        &timeframe,
        params.fast,
        params.slow,
        params.signal,
    );
    Ok(Json(IndicatorValue {
        market,
        timeframe,
        value,
    }))
}

async fn trend(
    State(state): State<Arc<AppState>>,
    Path((market, timeframe)): Path<(String, String)>,
) -> Json<IndicatorValue<f64>> {
    let value = state.indicator_engine.trend_score(&market, &timeframe);
    Json(IndicatorValue {
        market,
        timeframe,
        value,
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::bar_cache::tests::{bars_from_closes, ScriptedSource};
    use crate::market_data::fetcher::FetchError;
    use crate::runtime_config::RuntimeConfig;
    use crate::scheduler;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state_with(source: ScriptedSource) -> Arc<AppState> {
        Arc::new(AppState::new(RuntimeConfig::default(), Arc::new(source)))
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
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

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let state = state_with(ScriptedSource::default());
        let (status, body) = send(&state, get_req("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mode"], "DevLocal");
        assert_eq!(body["cached_keys"], 0);
    }

    #[tokio::test]
    async fn selection_roundtrip_and_validation() {
        let state = state_with(ScriptedSource::default());

        let (status, body) = send(&state, get_req("/api/v1/selection")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["market"], "KRW-BTC");
        assert_eq!(body["timeframe"], "1");

        let req = post_json(
            "/api/v1/selection",
            serde_json::json!({ "market": " KRW-ETH ", "timeframe": "15" }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["market"], "KRW-ETH");
        assert_eq!(state.selection().timeframe, "15");

        let req = post_json(
            "/api/v1/selection",
            serde_json::json!({ "market": "KRW-ETH", "timeframe": "  " }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("non-empty"));
        assert_eq!(state.selection().timeframe, "15");
    }

    #[tokio::test]
    async fn view_is_null_until_first_tick() {
        let source = ScriptedSource::default();
        source.push("1", Ok(bars_from_closes(&[1.0, 2.0, 3.0])));
        let state = state_with(source);

        let (status, body) = send(&state, get_req("/api/v1/view")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());

        scheduler::refresh_once(&state).await;
        scheduler::update_view(&state);

        let (_, body) = send(&state, get_req("/api/v1/view")).await;
        assert_eq!(body["market"], "KRW-BTC");
        assert_eq!(body["mode"], "DevLocal");
        assert_eq!(body["data_status"]["kind"], "ok");
        assert!(body["rsi"].is_null());
    }

    #[tokio::test]
    async fn bars_endpoint_reports_entry_or_404() {
        let source = ScriptedSource::default();
        source.push("1", Ok(bars_from_closes(&[10.0, 11.0])));
        source.push("1", Err(FetchError::Protocol { status: 429, body: "slow down".into() }));
        let state = state_with(source);

        let (status, body) = send(&state, get_req("/api/v1/bars/KRW-BTC/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("KRW-BTC"));

        let tfs = vec!["1".to_string()];
        state.bar_cache.refresh_all("KRW-BTC", &tfs).await;
        let (status, body) = send(&state, get_req("/api/v1/bars/KRW-BTC/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Ok");
        assert_eq!(body["stale"], false);
        assert_eq!(body["bars"].as_array().unwrap().len(), 2);
        assert!(body["error"].is_null());

        state.bar_cache.refresh_all("KRW-BTC", &tfs).await;
        let (_, body) = send(&state, get_req("/api/v1/bars/KRW-BTC/1")).await;
        assert_eq!(body["status"], "Failed");
        assert_eq!(body["stale"], true);
        assert_eq!(body["bars"].as_array().unwrap().len(), 2);
        assert_eq!(body["data_status"]["kind"], "fetch_failed");
        assert!(body["error"].as_str().unwrap().contains("429"));
    }

    #[tokio::test]
    async fn indicators_endpoint_serves_any_key() {
        let state = state_with(ScriptedSource::default());
        let (status, body) = send(&state, get_req("/api/v1/indicators/KRW-XRP/60")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status_text"], "CACHE MISS: KRW-XRP / TF 60");
        assert!(body["macd"].is_null());
    }

    async fn state_with_rising_closes() -> Arc<AppState> {
        let source = ScriptedSource::default();
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        source.push("1", Ok(bars_from_closes(&closes)));
        let state = state_with(source);
        state.bar_cache.refresh_all("KRW-BTC", &["1".to_string()]).await;
        state
    }

    #[tokio::test]
    async fn closes_endpoint_serves_valid_closes_or_404() {
        let state = state_with_rising_closes().await;

        let (status, body) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/closes")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"].as_array().unwrap().len(), 30);
        assert_eq!(body["value"][0], 1.0);

        let (status, _) = send(&state, get_req("/api/v1/indicators/KRW-BTC/5/closes")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rsi_endpoint_honours_period() {
        let state = state_with_rising_closes().await;

        let (status, body) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/rsi")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"]["period"], 14);
        assert_eq!(body["value"]["rsi"], 100.0);
        assert_eq!(body["value"]["zone"], "Overbought");

        let (_, body) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/rsi?period=40")).await;
        assert!(body["value"].is_null());

        let (status, _) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/rsi?period=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn macd_and_trend_endpoints() {
        let state = state_with_rising_closes().await;

        let (status, body) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/macd?fast=1&slow=3&signal=1")).await;
        assert_eq!(status, StatusCode::OK);
        let macd = body["value"]["macd"].as_f64().unwrap();
        let signal = body["value"]["signal"].as_f64().unwrap();
        assert!(macd > 0.0);
        assert_eq!(macd, signal);

        let (status, _) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/macd?slow=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&state, get_req("/api/v1/indicators/KRW-BTC/1/trend")).await;
        assert_eq!(body["value"], 100.0);

        let (_, body) = send(&state, get_req("/api/v1/indicators/KRW-ETH/1/trend")).await;
        assert!(body["value"].is_null());
    }
}
