// =============================================================================
// Scheduler: data refresh loop + UI tick loop
// =============================================================================
//
// Two independent tokio tasks share `AppState`:
//
//   refresh loop   every `refresh_interval`, fetches all configured timeframes
//                  of the selected market into the bar cache.  A selection
//                  change wakes it early.
//   UI tick loop   every `ui_tick_interval`, rebuilds the `DashboardView` for
//                  the selected key from whatever the cache holds.
//
// Both intervals use `MissedTickBehavior::Delay`: a slow cycle pushes the next
// one back instead of queueing a burst.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app_state::{AppState, DashboardView};
use crate::market_data::RefreshSummary;

/// Run one refresh cycle for the selected market.
pub async fn refresh_once(state: &AppState) -> RefreshSummary {
    let market = state.selection().market;
    if market.is_empty() {
        warn!("no market selected, skipping refresh");
        return RefreshSummary::default();
    }
    let timeframes = state.refresh_timeframes();

    let summary = state.bar_cache.refresh_all(&market, &timeframes).await;
    if summary.failed > 0 {
        warn!(
            market = %market,
            ok = summary.ok,
            failed = summary.failed,
            "refresh cycle finished with failures"
        );
    }
    state.record_refresh(market, summary);
    summary
}

/// Rebuild the view for the current selection and publish it.
pub fn update_view(state: &AppState) -> DashboardView {
    let selection = state.selection();
    let indicators = state
        .indicator_engine
        .snapshot(&selection.market, &selection.timeframe);

    debug!(
        market = %selection.market,
        timeframe = %selection.timeframe,
        status = %indicators.status_text,
        rsi = ?indicators.rsi,
        "dashboard view rebuilt"
    );

    let view = DashboardView {
        mode: state.runtime_config.read().mode,
        built_at: Utc::now(),
        data_ok: indicators.data_status.is_ok(),
        indicators,
    };
    *state.latest_view.write() = Some(view.clone());
    state.increment_version();
    view
}

pub async fn run_refresh_loop(state: Arc<AppState>) {
    let period = state.runtime_config.read().refresh_interval();
    info!(period_ms = period.as_millis() as u64, "refresh loop starting");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = state.refresh_requested.notified() => {
                debug!("refresh requested ahead of schedule");
                ticker.reset();
            }
        }
        refresh_once(&state).await;
    }
}

pub async fn run_ui_tick_loop(state: Arc<AppState>) {
    let period = state.runtime_config.read().ui_tick_interval();
    info!(period_ms = period.as_millis() as u64, "UI tick loop starting");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        update_view(&state);
    }
}
