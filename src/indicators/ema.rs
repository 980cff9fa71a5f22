// =============================================================================
// Exponential Moving Average (EMA), seeded from the first value
// =============================================================================
//
//   k     = 2 / (period + 1)
//   EMA_0 = x_0
//   EMA_t = x_t * k + EMA_{t-1} * (1 - k)
//
// There is no SMA warm-up window: the series starts at the first input and
// has exactly one output per input.  Early values lean toward x_0 and converge
// over time.  MACD depends on this exact series, so do not swap in an
// SMA-seeded EMA here.
// =============================================================================

/// EMA series over `values`, same length as the input.
///
/// An empty input yields an empty series.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);

    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &value in values {
        let ema = match prev {
            None => value,
            Some(p) => value * k + p * (1.0 - k),
        };
        result.push(ema);
        prev = Some(ema);
    }

    result
}
