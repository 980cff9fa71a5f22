// =============================================================================
// Shared types used across the dashboard core
// =============================================================================

use serde::{Deserialize, Serialize};

/// RSI band used by the gauge: `<= 30` oversold, `>= 70` overbought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

impl RsiZone {
    pub const OVERSOLD_MAX: f64 = 30.0;
    pub const OVERBOUGHT_MIN: f64 = 70.0;

    /// Classify an RSI reading after clamping it to [0, 100].
    pub fn from_rsi(rsi: f64) -> Self {
        let clamped = rsi.clamp(0.0, 100.0);
        if clamped <= Self::OVERSOLD_MAX {
            Self::Oversold
        } else if clamped >= Self::OVERBOUGHT_MIN {
            Self::Overbought
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Overbought => write!(f, "OVERBOUGHT"),
        }
    }
}

/// Which environment the dashboard is pointed at.  Informational only: the
/// core never places orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    DevLocal,
    Paper,
    Live,
}

impl Default for RunMode {
    fn default() -> Self {
        Self::DevLocal
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DevLocal => write!(f, "DEV_LOCAL"),
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}
