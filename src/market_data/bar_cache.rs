// =============================================================================
// Bar Cache: latest fetch outcome per (market, timeframe)
// =============================================================================
//
// A failed refresh never wipes a key: the entry is marked FAILED and keeps
// whatever bars the previous entry held.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::market_data::bar::Bar;
use crate::market_data::fetcher::{BarSource, FetchError};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Composite key that identifies one cached bar series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    pub market: String,
    pub timeframe: String,
}

impl CacheKey {
    pub fn new(market: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.market, self.timeframe)
    }
}

/// Outcome of the most recent fetch attempt for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    Ok,
    Failed,
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// What the cache holds for one key.
///
/// On a failed refresh the bars are the ones from the previous entry (stale
/// fallback), or empty when the key never fetched successfully.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bars: Vec<Bar>,
    pub status: FetchStatus,
    pub error: Option<FetchError>,
    pub last_refresh: DateTime<Utc>,
}

impl CacheEntry {
    /// Human-readable failure description, if the last fetch failed.
    pub fn failure_description(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// True when the entry failed but still carries bars from an earlier fetch.
    pub fn is_stale(&self) -> bool {
        self.status == FetchStatus::Failed && !self.bars.is_empty()
    }
}

/// Per-cycle counters returned by [`BarCache::refresh_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub ok: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// BarCache
// ---------------------------------------------------------------------------

/// Thread-safe store of the latest fetch outcome per `(market, timeframe)`.
///
/// Entries are created on the first refresh of a key and only ever replaced
/// by later refreshes; nothing removes them.  Each `get` is atomic, but two
/// consecutive `get`s may straddle a refresh.
pub struct BarCache {
    source: Arc<dyn BarSource>,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    bar_count: u32,
}

impl BarCache {
    /// Create an empty cache that pulls `bar_count` bars per fetch from `source`.
    pub fn new(source: Arc<dyn BarSource>, bar_count: u32) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            bar_count,
        }
    }

    /// Snapshot of the entry for `(market, timeframe)`, if one was ever written.
    pub fn get(&self, market: &str, timeframe: &str) -> Option<CacheEntry> {
        self.get_key(&CacheKey::new(market, timeframe))
    }

    pub fn get_key(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Number of keys that have been refreshed at least once.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Refresh every timeframe of `market`, one after another.
    ///
    /// Fetches run without the lock held; each outcome is written in a single
    /// short write-lock section.  Failures never escape: they are recorded on
    /// the entry, keeping the previous bars when there are any.
    pub async fn refresh_all(&self, market: &str, timeframes: &[String]) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        for timeframe in timeframes {
            let outcome = self.source.fetch(market, timeframe, self.bar_count).await;
            let key = CacheKey::new(market, timeframe.as_str());
            let now = Utc::now();

            match outcome {
                Ok(bars) => {
                    debug!(key = %key, count = bars.len(), "bars refreshed");
                    summary.ok += 1;
                    self.entries.write().insert(
                        key,
                        CacheEntry {
                            bars,
                            status: FetchStatus::Ok,
                            error: None,
                            last_refresh: now,
                        },
                    );
                }
                Err(err) => {
                    error!(key = %key, kind = %err.kind(), error = %err, "bar fetch failed");
                    summary.failed += 1;

                    let mut map = self.entries.write();
                    let previous = map.remove(&key).map(|e| e.bars).unwrap_or_default();
                    if !previous.is_empty() {
                        warn!(key = %key, count = previous.len(), "keeping previous bars after failed fetch");
                    }
                    map.insert(
                        key,
                        CacheEntry {
                            bars: previous,
                            status: FetchStatus::Failed,
                            error: Some(err),
                            last_refresh: now,
                        },
                    );
                }
            }
        }

        debug!(
            market,
            ok = summary.ok,
            failed = summary.failed,
            "refresh cycle complete"
        );
        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    type Scripted = Result<Vec<Bar>, FetchError>;

    /// In-memory source that replays scripted outcomes per timeframe.
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        script: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        pub(crate) fn push(&self, timeframe: &str, outcome: Scripted) {
            self.script
                .lock()
                .entry(timeframe.to_string())
                .or_default()
                .push_back(outcome);
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl BarSource for ScriptedSource {
        fn fetch<'a>(
            &'a self,
            _market: &'a str,
            timeframe: &'a str,
            _count: u32,
        ) -> BoxFuture<'a, Result<Vec<Bar>, FetchError>> {
            self.calls.lock().push(timeframe.to_string());
            let next = self
                .script
                .lock()
                .get_mut(timeframe)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(FetchError::Transport("no scripted response".into())));
            Box::pin(async move { next })
        }
    }

    pub(crate) fn bar(close: Option<f64>) -> Bar {
        Bar {
            open: close,
            high: close,
            low: close,
            close,
            time_kst: None,
            time_utc: None,
        }
    }

    pub(crate) fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes.iter().map(|&c| bar(Some(c))).collect()
    }

    fn tfs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn cache_with(source: &Arc<ScriptedSource>) -> BarCache {
        BarCache::new(source.clone(), 200)
    }

    #[test]
    fn get_on_unknown_key_is_none() {
        let cache = cache_with(&Arc::new(ScriptedSource::default()));
        assert!(cache.get("KRW-BTC", "1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn success_stores_ok_entry() {
        let source = Arc::new(ScriptedSource::default());
        source.push("5", Ok(bars_from_closes(&[1.0, 2.0, 3.0])));
        let cache = cache_with(&source);

        let summary = cache.refresh_all("KRW-BTC", &tfs(&["5"])).await;
        assert_eq!(summary, RefreshSummary { ok: 1, failed: 0 });

        let entry = cache.get("KRW-BTC", "5").unwrap();
        assert_eq!(entry.status, FetchStatus::Ok);
        assert_eq!(entry.bars.len(), 3);
        assert!(entry.error.is_none());
        assert!(!entry.is_stale());
    }

    #[tokio::test]
    async fn transport_failure_keeps_previous_bars() {
        let source = Arc::new(ScriptedSource::default());
        source.push("1", Ok(bars_from_closes(&[10.0, 11.0])));
        source.push("1", Err(FetchError::Transport("timed out".into())));
        let cache = cache_with(&source);

        cache.refresh_all("KRW-BTC", &tfs(&["1"])).await;
        let first = cache.get("KRW-BTC", "1").unwrap();

        cache.refresh_all("KRW-BTC", &tfs(&["1"])).await;
        let entry = cache.get("KRW-BTC", "1").unwrap();

        assert_eq!(entry.status, FetchStatus::Failed);
        assert_eq!(entry.bars, first.bars);
        assert!(entry.is_stale());
        assert!(entry.last_refresh >= first.last_refresh);
        assert!(entry.failure_description().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn protocol_failure_without_history_is_empty_failed_entry() {
        let source = Arc::new(ScriptedSource::default());
        source.push(
            "3",
            Err(FetchError::Protocol {
                status: 429,
                body: "Too Many Requests".into(),
            }),
        );
        let cache = cache_with(&source);

        let summary = cache.refresh_all("KRW-ETH", &tfs(&["3"])).await;
        assert_eq!(summary.failed, 1);

        let entry = cache.get("KRW-ETH", "3").expect("failed fetch still writes an entry");
        assert!(entry.bars.is_empty());
        assert_eq!(entry.status, FetchStatus::Failed);
        let desc = entry.failure_description().unwrap();
        assert!(!desc.is_empty());
        assert!(desc.contains("429"));
    }

    #[tokio::test]
    async fn later_success_replaces_failed_entry() {
        let source = Arc::new(ScriptedSource::default());
        source.push("1", Err(FetchError::Decode("eof".into())));
        source.push("1", Ok(bars_from_closes(&[5.0])));
        let cache = cache_with(&source);

        cache.refresh_all("KRW-XRP", &tfs(&["1"])).await;
        cache.refresh_all("KRW-XRP", &tfs(&["1"])).await;

        let entry = cache.get("KRW-XRP", "1").unwrap();
        assert_eq!(entry.status, FetchStatus::Ok);
        assert!(entry.error.is_none());
        assert_eq!(entry.bars.len(), 1);
    }

    #[tokio::test]
    async fn timeframes_refresh_in_order_and_independently() {
        let source = Arc::new(ScriptedSource::default());
        source.push("1", Ok(bars_from_closes(&[1.0])));
        source.push("5", Err(FetchError::Shape("object".into())));
        source.push("60", Ok(bars_from_closes(&[1.0, 2.0])));
        let cache = cache_with(&source);

        let summary = cache.refresh_all("KRW-BTC", &tfs(&["1", "5", "60"])).await;

        assert_eq!(summary, RefreshSummary { ok: 2, failed: 1 });
        assert_eq!(source.calls(), vec!["1", "5", "60"]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("KRW-BTC", "5").unwrap().status, FetchStatus::Failed);
        assert_eq!(cache.get("KRW-BTC", "60").unwrap().bars.len(), 2);
    }

    #[tokio::test]
    async fn markets_do_not_share_entries() {
        let source = Arc::new(ScriptedSource::default());
        source.push("1", Ok(bars_from_closes(&[1.0])));
        source.push("1", Err(FetchError::Transport("refused".into())));
        let cache = cache_with(&source);

        cache.refresh_all("KRW-BTC", &tfs(&["1"])).await;
        cache.refresh_all("KRW-ETH", &tfs(&["1"])).await;

        // The ETH failure must not borrow BTC's bars.
        assert!(cache.get("KRW-ETH", "1").unwrap().bars.is_empty());
        assert_eq!(cache.get("KRW-BTC", "1").unwrap().status, FetchStatus::Ok);
    }

    #[tokio::test]
    async fn refresh_against_http_fetcher() {
        use crate::market_data::fetcher::tests::{mock_provider, serve};
        use crate::market_data::fetcher::UpbitFetcher;
        use std::time::Duration;

        let base = serve(mock_provider()).await;
        let fetcher = UpbitFetcher::new(base, Duration::from_secs(3)).unwrap();
        let cache = BarCache::new(Arc::new(fetcher), 200);

        cache.refresh_all("KRW-OK", &tfs(&["1", "D"])).await;
        cache.refresh_all("KRW-429", &tfs(&["1"])).await;

        assert_eq!(cache.get("KRW-OK", "1").unwrap().bars.len(), 3);
        assert_eq!(cache.get("KRW-OK", "D").unwrap().bars.len(), 1);
        let failed = cache.get("KRW-429", "1").unwrap();
        assert_eq!(failed.status, FetchStatus::Failed);
        assert!(failed.bars.is_empty());
    }
}
