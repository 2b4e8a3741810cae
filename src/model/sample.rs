use serde::{Deserialize, Serialize};

use crate::store::LogRecord;

/// One ticker reading as reported by the price source.
///
/// `timestamp` is the source's own string, kept verbatim. Windowing runs on
/// receipt time and never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: String,
    pub best_ask: f64,
    pub best_bid: f64,
    #[serde(rename = "ltp")]
    pub last_traded_price: f64,
}

impl Sample {
    pub fn new(timestamp: impl Into<String>, best_ask: f64, best_bid: f64, ltp: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            best_ask,
            best_bid,
            last_traded_price: ltp,
        }
    }
}

impl LogRecord for Sample {
    const HEADER: &'static [&'static str] = &["timestamp", "best_ask", "best_bid", "ltp"];
}
