// =============================================================================
// Market Data Module: candle fetch, cache and status classification
// =============================================================================

pub mod bar;
pub mod bar_cache;
pub mod fetcher;
pub mod status;

// Re-exports for convenient access (e.g. `use crate::market_data::BarCache`).
pub use bar::Bar;
pub use bar_cache::{BarCache, CacheKey, FetchStatus, RefreshSummary};
pub use fetcher::{BarSource, UpbitFetcher, DEFAULT_BAR_COUNT};
pub use status::DataStatus;
