//! Price source abstraction.
//!
//! The collector only needs "latest ticker for a product code"; anything that
//! can answer that implements [`PriceSource`]. [`bitflyer::BitflyerRestClient`]
//! is the live implementation.

pub mod bitflyer;
pub mod types;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::sample::Sample;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current ticker. Every error is treated as transient by the
    /// caller.
    async fn fetch_ticker(&self, product_code: &str) -> Result<Sample, FetchError>;
}
