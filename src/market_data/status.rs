// =============================================================================
// Data status: what the dashboard should say about one cache key
// =============================================================================
//
// Classification order:
//   1. no entry at all              => CacheMiss
//   2. last fetch failed            => FetchFailed (even if stale bars remain)
//   3. fetch ok but zero bars       => Empty
//   4. bars present, no valid close => BadValues
//   5. otherwise                    => Ok
// =============================================================================

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::market_data::bar_cache::{CacheEntry, CacheKey, FetchStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataStatus {
    CacheMiss,
    FetchFailed {
        error_kind: Option<String>,
        error: String,
        stale_bars: usize,
    },
    Empty,
    BadValues {
        total: usize,
    },
    Ok {
        valid: usize,
        total: usize,
        last_refresh: DateTime<Utc>,
    },
}

impl DataStatus {
    pub fn classify(entry: Option<&CacheEntry>) -> Self {
        let Some(entry) = entry else {
            return Self::CacheMiss;
        };

        if entry.status == FetchStatus::Failed {
            return Self::FetchFailed {
                error_kind: entry.error.as_ref().map(|e| e.kind().to_string()),
                error: entry
                    .failure_description()
                    .unwrap_or_else(|| "unknown error".to_string()),
                stale_bars: entry.bars.len(),
            };
        }

        let total = entry.bars.len();
        if total == 0 {
            return Self::Empty;
        }

        let valid = entry.bars.iter().filter(|b| b.has_valid_close()).count();
        if valid == 0 {
            return Self::BadValues { total };
        }

        Self::Ok {
            valid,
            total,
            last_refresh: entry.last_refresh,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// One-line status text for the dashboard status bar.
    pub fn describe(&self, key: &CacheKey) -> String {
        match self {
            Self::CacheMiss => format!("CACHE MISS: {} / TF {}", key.market, key.timeframe),
            Self::FetchFailed { error, .. } => format!("FETCH FAIL: {error}"),
            Self::Empty => format!("NO DATA: EMPTY ({} / TF {})", key.market, key.timeframe),
            Self::BadValues { .. } => format!(
                "BAD VALUES: 0 valid prices ({} / TF {})",
                key.market, key.timeframe
            ),
            Self::Ok {
                valid,
                total,
                last_refresh,
            } => format!(
                "DATA OK: {valid}/{total} candles / last {}",
                last_refresh.with_timezone(&Local).format("%H:%M:%S")
            ),
        }
    }
}
