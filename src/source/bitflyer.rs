use std::time::Duration;

use async_trait::async_trait;

use super::types::BitflyerTicker;
use super::PriceSource;
use crate::error::FetchError;
use crate::model::sample::Sample;

pub struct BitflyerRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl BitflyerRestClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn ticker_url(&self) -> String {
        format!("{}/v1/ticker", self.base_url)
    }
}

#[async_trait]
impl PriceSource for BitflyerRestClient {
    async fn fetch_ticker(&self, product_code: &str) -> Result<Sample, FetchError> {
        let resp = self
            .http
            .get(self.ticker_url())
            .query(&[("product_code", product_code)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let body = resp.text().await?;
        let ticker: BitflyerTicker = serde_json::from_str(&body)?;
        ticker.into_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_url_ignores_trailing_slash() {
        let client =
            BitflyerRestClient::new("https://api.bitflyer.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.ticker_url(), "https://api.bitflyer.com/v1/ticker");
    }
}
