// =============================================================================
// Indicator Engine: cache-backed RSI / MACD / trend readings
// =============================================================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::indicators::macd::{calculate_macd, MacdValue, DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::indicators::rsi::{calculate_rsi, current_rsi, DEFAULT_RSI_PERIOD};
use crate::indicators::trend::trend_score;
use crate::market_data::bar_cache::CacheEntry;
use crate::market_data::{BarCache, CacheKey, DataStatus};
use crate::types::RsiZone;

/// Indicator readings for one key, as shown by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub market: String,
    pub timeframe: String,
    pub data_status: DataStatus,
    pub status_text: String,
    pub rsi: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
    pub macd: Option<MacdValue>,
    pub trend_score: Option<f64>,
    /// Interval end of the newest stored bar.
    pub last_bar_at: Option<NaiveDateTime>,
}

/// Valid close prices of `entry`, oldest first; `None` when there are none.
fn closes_of(entry: &CacheEntry) -> Option<Vec<f64>> {
    let closes: Vec<f64> = entry.bars.iter().filter_map(|b| b.close).collect();
    (!closes.is_empty()).then_some(closes)
}

/// Computes indicators from whatever the [`BarCache`] currently holds for a
/// key, stale fallback bars included.
///
/// Every method returns `None` for "no result": missing entry, no valid
/// closes, or not enough history for the indicator's window.
#[derive(Clone)]
pub struct IndicatorEngine {
    cache: Arc<BarCache>,
}

impl IndicatorEngine {
    pub fn new(cache: Arc<BarCache>) -> Self {
        Self { cache }
    }

    /// Valid close prices for the key, oldest first.
    ///
    /// Bars whose close did not coerce are skipped.  `None` when there is no
    /// entry or no valid close at all.
    pub fn closes(&self, market: &str, timeframe: &str) -> Option<Vec<f64>> {
        closes_of(&self.cache.get(market, timeframe)?)
    }

    pub fn rsi(&self, market: &str, timeframe: &str, period: usize) -> Option<f64> {
        calculate_rsi(&self.closes(market, timeframe)?, period)
    }

    pub fn macd(
        &self,
        market: &str,
        timeframe: &str,
        fast: usize,
        slow: usize,
        signal: usize,
    ) -> Option<MacdValue> {
        calculate_macd(&self.closes(market, timeframe)?, fast, slow, signal)
    }

    pub fn trend_score(&self, market: &str, timeframe: &str) -> Option<f64> {
        trend_score(&self.closes(market, timeframe)?)
    }

    /// Status plus RSI(14), MACD(12, 26, 9) and trend score for one key.
    ///
    /// Reads the cache entry once so status and indicators describe the same
    /// bars even if a refresh lands mid-call.
    pub fn snapshot(&self, market: &str, timeframe: &str) -> IndicatorSnapshot {
        let entry = self.cache.get(market, timeframe);
        let key = CacheKey::new(market, timeframe);
        let data_status = DataStatus::classify(entry.as_ref());
        let status_text = data_status.describe(&key);

        let last_bar_at = entry
            .as_ref()
            .and_then(|e| e.bars.last())
            .and_then(|b| b.interval_end());

        let closes = entry.as_ref().and_then(closes_of);
        let (rsi, macd, trend) = match closes.as_deref() {
            Some(c) => (
                current_rsi(c, DEFAULT_RSI_PERIOD),
                calculate_macd(c, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL),
                trend_score(c),
            ),
            None => (None, None, None),
        };

        IndicatorSnapshot {
            market: key.market,
            timeframe: key.timeframe,
            data_status,
            status_text,
            rsi: rsi.map(|(value, _)| value),
            rsi_zone: rsi.map(|(_, zone)| zone),
            macd,
            trend_score: trend,
            last_bar_at,
        }
    }
}
