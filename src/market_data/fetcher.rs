// =============================================================================
// Bar Fetcher: one REST round-trip per (market, timeframe)
// =============================================================================
//
// Resolves a timeframe to the minute or day candle endpoint, issues a single
// GET with a short timeout and turns the newest-first response into an
// oldest-first `Vec<Bar>`.
//
// Failure kinds are kept distinct:
//   Transport: the request never completed (timeout, refused, reset).
//   Protocol : non-2xx status; status code + truncated body are captured.
//   Decode   : body is not JSON.
//   Shape    : body is JSON but not a top-level array.
//
// The fetcher holds no cache state.  Falling back to previously stored bars
// is the cache's job.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::market_data::bar::Bar;

/// Minute counts served by the minute-candle endpoint.
pub const MINUTE_UNITS: [u32; 8] = [1, 3, 5, 10, 15, 30, 60, 240];

/// Default number of bars requested per fetch (provider maximum).
pub const DEFAULT_BAR_COUNT: u32 = 200;

/// Maximum number of response-body characters kept for protocol diagnostics.
const BODY_SNIPPET_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Endpoint resolution
// ---------------------------------------------------------------------------

/// Candle endpoint a timeframe maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Minutes(u32),
    Days,
}

impl Endpoint {
    /// Canonical spellings of [`MINUTE_UNITS`] ("1", "3", ... "240") map to the
    /// minute endpoint; any other string (including "05", "D", "day") maps to
    /// daily candles.
    pub fn resolve(timeframe: &str) -> Self {
        let normalized = timeframe.trim().to_uppercase();
        MINUTE_UNITS
            .iter()
            .copied()
            .find(|unit| unit.to_string() == normalized)
            .map_or(Self::Days, Self::Minutes)
    }

    /// Path segment appended to the candle base URL.
    pub fn path(&self) -> String {
        match self {
            Self::Minutes(unit) => format!("minutes/{unit}"),
            Self::Days => "days".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Discriminant of [`FetchError`], handy for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Protocol,
    Decode,
    Shape,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "Transport"),
            Self::Protocol => write!(f, "Protocol"),
            Self::Decode => write!(f, "Decode"),
            Self::Shape => write!(f, "Shape"),
        }
    }
}

/// Why a single fetch produced no bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Transport(String),
    Protocol { status: u16, body: String },
    Decode(String),
    Shape(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Transport(_) => FetchErrorKind::Transport,
            Self::Protocol { .. } => FetchErrorKind::Protocol,
            Self::Decode(_) => FetchErrorKind::Decode,
            Self::Shape(_) => FetchErrorKind::Shape,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Decode(msg) => write!(f, "invalid JSON body: {msg}"),
            Self::Shape(msg) => write!(f, "unexpected response shape: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// BarSource
// ---------------------------------------------------------------------------

/// Anything that can produce an oldest-first bar sequence for a key.
///
/// The cache holds an `Arc<dyn BarSource>`, so the returned future is boxed.
pub trait BarSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        market: &'a str,
        timeframe: &'a str,
        count: u32,
    ) -> BoxFuture<'a, std::result::Result<Vec<Bar>, FetchError>>;
}

// ---------------------------------------------------------------------------
// UpbitFetcher
// ---------------------------------------------------------------------------

/// REST fetcher for the Upbit candle API.
#[derive(Debug, Clone)]
pub struct UpbitFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl UpbitFetcher {
    /// Build a fetcher for `base_url` (e.g. `https://api.upbit.com/v1/candles`)
    /// with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "UpbitFetcher initialised");

        Ok(Self { base_url, client })
    }

    /// GET `{base}/minutes/{unit}` or `{base}/days` with `market` and `count`.
    #[instrument(skip(self), name = "upbit::fetch_bars")]
    pub async fn fetch_bars(
        &self,
        market: &str,
        timeframe: &str,
        count: u32,
    ) -> std::result::Result<Vec<Bar>, FetchError> {
        let endpoint = Endpoint::resolve(timeframe);
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let count_param = count.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("market", market), ("count", count_param.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => truncate_chars(&body, BODY_SNIPPET_CHARS),
                Err(e) => {
                    warn!(status = status.as_u16(), error = %e, "failed to read error body");
                    String::new()
                }
            };
            return Err(FetchError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {e}")))?;

        let bars = parse_bars(&body)?;
        debug!(market, timeframe, count = bars.len(), "bars fetched");
        Ok(bars)
    }
}

impl BarSource for UpbitFetcher {
    fn fetch<'a>(
        &'a self,
        market: &'a str,
        timeframe: &'a str,
        count: u32,
    ) -> BoxFuture<'a, std::result::Result<Vec<Bar>, FetchError>> {
        Box::pin(self.fetch_bars(market, timeframe, count))
    }
}

/// Decode a provider body into oldest-first bars.
///
/// Non-object array elements are dropped (and logged); the remaining records
/// are reversed because the provider sends newest first.
pub fn parse_bars(body: &str) -> std::result::Result<Vec<Bar>, FetchError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let raw = match root {
        Value::Array(items) => items,
        other => {
            return Err(FetchError::Shape(format!(
                "expected array, got {}",
                truncate_chars(&other.to_string(), BODY_SNIPPET_CHARS)
            )))
        }
    };

    let total = raw.len();
    let bars: Vec<Bar> = raw.iter().rev().filter_map(Bar::from_json).collect();
    if bars.len() < total {
        warn!(
            rejected = total - bars.len(),
            total, "dropped non-object candle records"
        );
    }
    Ok(bars)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
