// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math over oldest-first close slices, plus
// the `IndicatorEngine` that feeds them from the bar cache.  Every public
// function returns `Option<T>` so callers must handle insufficient data.

pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod trend;

pub use engine::{IndicatorEngine, IndicatorSnapshot};
