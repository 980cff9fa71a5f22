// =============================================================================
// Runtime Configuration: dashboard settings with atomic save
// =============================================================================
//
// Every tunable lives here: which markets and timeframes are offered, where
// candles come from, and how often the refresh and UI cycles run.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::DEFAULT_BAR_COUNT;
use crate::types::RunMode;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dashboard_config.json";

// Lower bounds for the two cycles so a typo cannot spin the provider.
const MIN_REFRESH_INTERVAL_MS: u64 = 500;
const MIN_UI_TICK_INTERVAL_MS: u64 = 100;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "KRW-BTC".to_string(),
        "KRW-ETH".to_string(),
        "KRW-XRP".to_string(),
    ]
}

fn default_timeframes() -> Vec<String> {
    ["1", "3", "5", "15", "60"].iter().map(|s| s.to_string()).collect()
}

fn default_base_url() -> String {
    "https://api.upbit.com/v1/candles".to_string()
}

fn default_candle_count() -> u32 {
    DEFAULT_BAR_COUNT
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

fn default_refresh_interval_ms() -> u64 {
    3_000
}

fn default_ui_tick_interval_ms() -> u64 {
    1_000
}

fn default_bind_addr() -> String {
    "127.0.0.1:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Markets offered in the symbol picker; the first one is selected at startup.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Timeframes refreshed every cycle for the selected market.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,

    #[serde(default)]
    pub mode: RunMode,

    /// Candle API root; `/minutes/{unit}` or `/days` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bars requested per fetch.
    #[serde(default = "default_candle_count")]
    pub candle_count: u32,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default = "default_ui_tick_interval_ms")]
    pub ui_tick_interval_ms: u64,

    /// Listen address of the read-only HTTP surface.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframes: default_timeframes(),
            mode: RunMode::default(),
            base_url: default_base_url(),
            candle_count: default_candle_count(),
            request_timeout_ms: default_request_timeout_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            ui_tick_interval_ms: default_ui_tick_interval_ms(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist or is malformed, returns an error so the
    /// caller can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dashboard config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dashboard config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            timeframes = ?config.timeframes,
            mode = %config.mode,
            "dashboard config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise dashboard config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "dashboard config saved (atomic)");
        Ok(())
    }

    /// Restore defaults for list fields left empty by the file or env.
    pub fn normalize(&mut self) {
        self.symbols = clean_list(&self.symbols, true);
        self.timeframes = clean_list(&self.timeframes, false);
        if self.symbols.is_empty() {
            self.symbols = default_symbols();
        }
        if self.timeframes.is_empty() {
            self.timeframes = default_timeframes();
        }
        if self.candle_count == 0 {
            self.candle_count = default_candle_count();
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_REFRESH_INTERVAL_MS))
    }

    pub fn ui_tick_interval(&self) -> Duration {
        Duration::from_millis(self.ui_tick_interval_ms.max(MIN_UI_TICK_INTERVAL_MS))
    }
}

/// Parse a comma-separated override such as `DASHBOARD_SYMBOLS=krw-btc, KRW-ETH`.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_list(items: &[String], upper: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        let item = if upper { item.to_uppercase() } else { item.to_string() };
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
