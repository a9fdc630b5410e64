use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::models::PricePoint;

/// Top-level body of `GET /v8/finance/chart/{ticker}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartErrorBody>,
}

/// Error object the API embeds in the chart envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartErrorBody {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    pub currency: Option<String>,
    /// Exchange offset from UTC in seconds
    pub gmtoffset: Option<i64>,
    pub exchange_timezone_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

/// OHLC columns; missing bars come through as `null`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Daily bars in date order.
    ///
    /// Rows with any missing price are dropped. Timestamps are shifted into
    /// exchange-local time before taking the calendar date, and when two rows
    /// land on the same date the later one wins.
    pub fn into_price_points(self) -> Vec<PricePoint> {
        let offset = self.meta.gmtoffset.unwrap_or(0);
        let Some(quote) = self.indicators.quote.into_iter().next() else {
            return Vec::new();
        };

        let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut points: Vec<PricePoint> = self
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let open = column(&quote.open, i)?;
                let high = column(&quote.high, i)?;
                let low = column(&quote.low, i)?;
                let close = column(&quote.close, i)?;
                let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
                Some(PricePoint::new(date, open, high, low, close))
            })
            .collect();

        points.sort_by_key(|p| p.date);
        points.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                *earlier = later.clone();
                true
            } else {
                false
            }
        });
        points
    }
}

/// Error type for data source requests
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// 404, usually an unknown or delisted symbol
    #[error("Not Found: {0}")]
    NotFound(String),
    /// 429 Too Many Requests
    #[error("Rate Limited: {0}")]
    RateLimited(String),
    /// 5xx
    #[error("Server Error ({0}): {1}")]
    ServerError(u16, String),
    /// Other non-success statuses
    #[error("HTTP Error ({0}): {1}")]
    HttpError(u16, String),
    /// Error reported inside a 200 response body
    #[error("API Error ({code}): {description}")]
    Api { code: String, description: String },
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),
}
