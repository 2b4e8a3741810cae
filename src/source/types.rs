use serde::Deserialize;

use crate::error::FetchError;
use crate::model::sample::Sample;

/// Accept a JSON number, a numeric string, or null.
pub fn optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("invalid number")),
        _ => Err(serde::de::Error::custom("invalid numeric value")),
    }
}

/// bitFlyer ticker response (GET /v1/ticker). Only the fields the collector
/// records are modelled.
#[derive(Debug, Deserialize)]
pub struct BitflyerTicker {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub best_ask: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub best_bid: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub ltp: Option<f64>,
}

impl BitflyerTicker {
    /// Presence check only; values, the timestamp string included, pass
    /// through as reported.
    pub fn into_sample(self) -> Result<Sample, FetchError> {
        let timestamp = self.timestamp.ok_or(FetchError::MissingField("timestamp"))?;
        let best_ask = self.best_ask.ok_or(FetchError::MissingField("best_ask"))?;
        let best_bid = self.best_bid.ok_or(FetchError::MissingField("best_bid"))?;
        let ltp = self.ltp.ok_or(FetchError::MissingField("ltp"))?;
        Ok(Sample::new(timestamp, best_ask, best_bid, ltp))
    }
}
