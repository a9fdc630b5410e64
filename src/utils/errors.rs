use chrono::NaiveDate;
use thiserror::Error;
use crate::api::yahoo::FetchError;

/// Why a single ticker produced no chart
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no price data returned")]
    NoData,
    #[error("no price data on or after {cutoff}")]
    EmptyWindow { cutoff: NaiveDate },
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("render failed: {0}")]
    Render(String),
}

/// Digest composition errors
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("no charts were generated")]
    NoCharts,
}

/// Trim a multi-line error chain down to its first line for summary logs.
///
/// reqwest and lettre errors carry their source chain in `Display`;
/// the summary table only needs the headline.
pub fn extract_clean_error(error_msg: &str) -> String {
    error_msg
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
