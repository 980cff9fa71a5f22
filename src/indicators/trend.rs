// =============================================================================
// Linear trend score
// =============================================================================
//
// Ordinary least-squares slope of the closes against their index 0..n-1,
// mapped onto [0, 100]:
//
//   score = clamp(50 + slope * 1000, 0, 100)
//
// 50 is "flat"; the 1000 scale is fixed so scores stay comparable with
// existing dashboards.
// =============================================================================

/// Minimum number of closes for a trend score.
pub const MIN_TREND_CLOSES: usize = 10;

const SCORE_MIDPOINT: f64 = 50.0;
const SLOPE_SCALE: f64 = 1000.0;

/// OLS slope of `values` against their index.
///
/// `None` for an empty slice, or when the sums overflow and the slope is not
/// finite.
pub fn ols_slope(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let x_mean = (0..values.len()).map(|i| i as f64).sum::<f64>() / n;
    let y_mean = values.iter().sum::<f64>() / n;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0_f64, 0.0_f64), |(num, den), (i, &y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });

    let den = if den == 0.0 { 1.0 } else { den };
    let slope = num / den;
    slope.is_finite().then_some(slope)
}

/// Trend score in [0, 100], or `None` with fewer than [`MIN_TREND_CLOSES`].
pub fn trend_score(closes: &[f64]) -> Option<f64> {
    if closes.len() < MIN_TREND_CLOSES {
        return None;
    }
    let slope = ols_slope(closes)?;
    Some((SCORE_MIDPOINT + slope * SLOPE_SCALE).clamp(0.0, 100.0))
}
