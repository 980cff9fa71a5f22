// =============================================================================
// MACD (Moving Average Convergence Divergence)
// =============================================================================
//
//   macd      = EMA(fast) - EMA(slow)
//   signal    = EMA(macd, signal)
//   histogram = macd - signal
//
// Computed over the full close series with first-value-seeded EMAs.
// =============================================================================

use serde::Serialize;

use super::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Last values of the MACD, signal and histogram series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD over the whole close series.
///
/// Both EMAs start at the first close (see [`calculate_ema`]), so the MACD
/// line has one value per close.  The signal line is the EMA of that line and
/// `histogram = macd - signal`.  Returns `None` for an empty input or when
/// any of the three values is not finite.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdValue> {
    if closes.is_empty() {
        return None;
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = calculate_ema(&macd_line, signal);

    let macd = *macd_line.last()?;
    let signal = *signal_line.last()?;
    let histogram = macd - signal;

    if !(macd.is_finite() && signal.is_finite() && histogram.is_finite()) {
        return None;
    }

    Some(MacdValue {
        macd,
        signal,
        histogram,
    })
}
