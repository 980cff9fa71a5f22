// =============================================================================
// Relative Strength Index (RSI): Wilder's Smoothing
// =============================================================================
//
// Step 1: Per-step gain = max(delta, 0), loss = max(-delta, 0).
// Step 2: Seed average gain / average loss with the arithmetic mean of the
//          first `period` gains / losses.
// Step 3: Wilder smoothing for every later step:
//            avg = (avg * (period - 1) + value) / period
// Step 4: If the final average loss is exactly zero, RSI = 100.
//          Otherwise RS = avg_gain / avg_loss, RSI = 100 - 100 / (1 + RS).
//
// A flat series therefore reads 100, not 50: zero losses means RSI 100.
// =============================================================================

use crate::types::RsiZone;

/// Default look-back used by the dashboard.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Final RSI value for `closes` (oldest first).
///
/// Returns `None` when `period == 0`, there are fewer than `period + 1`
/// closes, or the averages overflow.  Non-finite results are dropped.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            if delta >= 0.0 {
                (delta, 0.0)
            } else {
                (0.0, -delta)
            }
        })
        .unzip();

    let period_f = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period_f;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period_f;

    for (&gain, &loss) in gains[period..].iter().zip(&losses[period..]) {
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}

/// Latest RSI together with its zone.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<(f64, RsiZone)> {
    let value = calculate_rsi(closes, period)?;
    Some((value, RsiZone::from_rsi(value)))
}
