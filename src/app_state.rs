// =============================================================================
// Central Application State
// =============================================================================
//
// Ties the bar cache, the indicator engine and the current selection together
// so the refresh loop, the UI tick loop and the HTTP surface share one store.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for every mutable shared field; no guard is held
//     across an `.await`.
//   - The bar cache guards its own map.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::indicators::{IndicatorEngine, IndicatorSnapshot};
use crate::market_data::{BarCache, BarSource, RefreshSummary};
use crate::runtime_config::RuntimeConfig;
use crate::types::RunMode;

/// The (market, timeframe) pair the dashboard is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub market: String,
    pub timeframe: String,
}

/// What the presentation layer renders for the current selection.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub mode: RunMode,
    pub built_at: DateTime<Utc>,
    /// True only for a DATA OK status; drives the status-bar colour.
    pub data_ok: bool,
    #[serde(flatten)]
    pub indicators: IndicatorSnapshot,
}

/// Bookkeeping for the most recent refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshCycle {
    pub market: String,
    pub finished_at: DateTime<Utc>,
    pub ok: usize,
    pub failed: usize,
}

/// Shared state handed to every task via `Arc<AppState>`.
pub struct AppState {
    /// Bumped on every refresh cycle, view rebuild and selection change.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    pub bar_cache: Arc<BarCache>,
    pub indicator_engine: IndicatorEngine,

    pub selection: RwLock<Selection>,
    pub latest_view: RwLock<Option<DashboardView>>,
    pub last_refresh_cycle: RwLock<Option<RefreshCycle>>,

    /// Wakes the refresh loop ahead of its next tick (e.g. after a selection change).
    pub refresh_requested: Notify,

    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build state around `source`.  The first configured symbol and timeframe
    /// are selected.
    pub fn new(config: RuntimeConfig, source: Arc<dyn BarSource>) -> Self {
        let bar_cache = Arc::new(BarCache::new(source, config.candle_count));
        let indicator_engine = IndicatorEngine::new(bar_cache.clone());

        let selection = Selection {
            market: config.symbols.first().cloned().unwrap_or_default(),
            timeframe: config.timeframes.first().cloned().unwrap_or_default(),
        };

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            bar_cache,
            indicator_engine,
            selection: RwLock::new(selection),
            latest_view: RwLock::new(None),
            last_refresh_cycle: RwLock::new(None),
            refresh_requested: Notify::new(),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Selection ───────────────────────────────────────────────────────

    pub fn selection(&self) -> Selection {
        self.selection.read().clone()
    }

    /// Switch the selected pair and ask the refresh loop to run right away.
    pub fn set_selection(&self, selection: Selection) {
        *self.selection.write() = selection;
        self.refresh_requested.notify_one();
        self.increment_version();
    }

    /// Timeframes to refresh this cycle: the configured list, plus the
    /// selected timeframe when it is not part of it.
    pub fn refresh_timeframes(&self) -> Vec<String> {
        let mut timeframes = self.runtime_config.read().timeframes.clone();
        let selected = self.selection.read().timeframe.clone();
        if !selected.is_empty() && !timeframes.contains(&selected) {
            timeframes.push(selected);
        }
        timeframes
    }

    pub fn record_refresh(&self, market: String, summary: RefreshSummary) {
        *self.last_refresh_cycle.write() = Some(RefreshCycle {
            market,
            finished_at: Utc::now(),
            ok: summary.ok,
            failed: summary.failed,
        });
        self.increment_version();
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
