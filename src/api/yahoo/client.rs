use std::time::Duration;
use chrono::NaiveDateTime;
use reqwest::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use super::models::{ChartResponse, FetchError};
use crate::api::PriceSource;
use crate::models::PricePoint;
use tracing::{debug, warn};

/// Yahoo Finance chart API client for daily price history
pub struct YahooClient {
    http_client: HttpClient,
    base_url: String,
}

impl YahooClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://query1.finance.yahoo.com";
    const USER_AGENT: &'static str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a client against `base_url`, normally [`Self::DEFAULT_BASE_URL`]
    pub fn with_base_url(base_url: String) -> Result<Self, FetchError> {
        let http_client = HttpClient::builder()
            .user_agent(Self::USER_AGENT)
            .default_headers(Self::create_headers())
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| FetchError::RequestError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn create_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    pub fn chart_url(&self, ticker: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, ticker)
    }

    /// Map a non-success status to an error, preferring the API's own description
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> FetchError {
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ChartResponse>(&body_text)
            .ok()
            .and_then(|r| r.chart.error)
            .map(|e| e.description)
            .unwrap_or(body_text);

        match status_code {
            404 => FetchError::NotFound(message),
            429 => {
                warn!("Rate limited by data source: {}", message);
                FetchError::RateLimited(message)
            }
            500..=599 => {
                warn!("Server error {}: {}", status_code, message);
                FetchError::ServerError(status_code, message)
            }
            _ => FetchError::HttpError(status_code, message),
        }
    }

    /// GET /v8/finance/chart/{ticker}
    ///
    /// Daily bars between `start` and `end` (interpreted as UTC). An
    /// empty vector means the source had no bars for the range.
    pub async fn get_daily_history(
        &self,
        ticker: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let url = self.chart_url(ticker);
        let query = [
            ("period1", start.and_utc().timestamp().to_string()),
            ("period2", end.and_utc().timestamp().to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];
        debug!("GET {} {:?}", url, query);

        let response = self.http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::handle_error_response(status, response).await);
        }

        let body = response
            .json::<ChartResponse>()
            .await
            .map_err(|e| FetchError::DeserializationError(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = body.chart.error {
            return Err(FetchError::Api {
                code: error.code,
                description: error.description,
            });
        }

        let points = body
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(|result| result.into_price_points())
            .unwrap_or_default();

        debug!("{}: {} daily bars", ticker, points.len());
        Ok(points)
    }
}

impl PriceSource for YahooClient {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.get_daily_history(ticker, start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_url_trims_trailing_slash() {
        let client = YahooClient::with_base_url("http://localhost:8080/".to_string()).unwrap();
        assert_eq!(client.chart_url("NVDA"), "http://localhost:8080/v8/finance/chart/NVDA");
    }
}
