use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sample::Sample;
use super::window::Window;
use crate::store::LogRecord;

/// OHLC summary of one window, stamped with the window start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    #[serde(with = "bar_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcBar {
    /// Reduce a window's buffer in capture order. Returns `None` for an empty
    /// buffer.
    pub fn from_samples(window: Window, samples: &[Sample]) -> Option<Self> {
        let (first, rest) = samples.split_first()?;
        let mut builder = BarBuilder::new(window, first.last_traded_price);
        for sample in rest {
            builder.update(sample.last_traded_price);
        }
        Some(builder.finish())
    }
}

impl LogRecord for OhlcBar {
    const HEADER: &'static [&'static str] = &["timestamp", "open", "high", "low", "close"];
}

/// Folds last-traded prices into a bar for a fixed window.
#[derive(Debug, Clone)]
pub struct BarBuilder {
    pub window: Window,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl BarBuilder {
    pub fn new(window: Window, price: f64) -> Self {
        Self {
            window,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    pub fn finish(&self) -> OhlcBar {
        OhlcBar {
            timestamp: self.window.start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

mod bar_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
