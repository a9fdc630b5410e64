//! Outside collaborators: the price data source and the digest transport.
//!
//! The pipeline only sees the two traits below; tests swap in fakes.

use chrono::NaiveDateTime;
use crate::models::{Digest, PricePoint};

pub mod mailer;
pub mod yahoo;

pub use mailer::{SmtpMailer, TransportError};
pub use yahoo::{FetchError, YahooClient};

/// Source of daily OHLC history
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    /// Daily bars for `ticker` between `start` and `end`, in date order.
    /// An empty vector means the source had nothing for the range.
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PricePoint>, FetchError>;
}

/// Delivery of a composed digest
#[allow(async_fn_in_trait)]
pub trait DigestTransport {
    async fn send_digest(&self, digest: &Digest) -> Result<(), TransportError>;
}
