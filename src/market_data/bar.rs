// =============================================================================
// Bar: one typed candle record parsed from the provider
// =============================================================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::numeric::coerce_field;

// ---------------------------------------------------------------------------
// Provider field names (Upbit candle objects)
// ---------------------------------------------------------------------------

const FIELD_OPEN: &str = "opening_price";
const FIELD_HIGH: &str = "high_price";
const FIELD_LOW: &str = "low_price";
const FIELD_CLOSE: &str = "trade_price";
const FIELD_TIME_KST: &str = "candle_date_time_kst";
const FIELD_TIME_UTC: &str = "candle_date_time_utc";

/// Interval timestamps are sent without an offset, e.g. `2024-03-01T09:15:00`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// Bar
// ---------------------------------------------------------------------------

/// One OHLC observation as received from the provider.
///
/// Prices are optional because the provider occasionally sends nulls, empty
/// strings or garbage; a bar with a broken close is still stored so that the
/// status layer can tell "no bars" apart from "bars with no usable price".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    /// Interval end in the provider's local timezone (KST).
    pub time_kst: Option<NaiveDateTime>,
    /// Interval end in UTC.
    pub time_utc: Option<NaiveDateTime>,
}

impl Bar {
    /// Parse one element of the provider's candle array.
    ///
    /// Returns `None` when the element is not a JSON object; individual
    /// fields that fail to coerce become `None` instead of rejecting the bar.
    pub fn from_json(val: &Value) -> Option<Self> {
        let obj = val.as_object()?;

        Some(Self {
            open: coerce_field(obj.get(FIELD_OPEN)),
            high: coerce_field(obj.get(FIELD_HIGH)),
            low: coerce_field(obj.get(FIELD_LOW)),
            close: coerce_field(obj.get(FIELD_CLOSE)),
            time_kst: parse_timestamp(obj.get(FIELD_TIME_KST)),
            time_utc: parse_timestamp(obj.get(FIELD_TIME_UTC)),
        })
    }

    /// Interval end, preferring the KST field and falling back to UTC.
    pub fn interval_end(&self) -> Option<NaiveDateTime> {
        self.time_kst.or(self.time_utc)
    }

    pub fn has_valid_close(&self) -> bool {
        self.close.is_some()
    }
}

fn parse_timestamp(val: Option<&Value>) -> Option<NaiveDateTime> {
    let s = val?.as_str()?;
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}
