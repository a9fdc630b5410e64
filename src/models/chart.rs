//! Chart generation models

use chrono::NaiveDate;

/// One daily OHLC bar
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { date, open, high, low, close }
    }

    /// Bottom and top of the candle body
    pub fn body(&self) -> (f64, f64) {
        (self.open.min(self.close), self.open.max(self.close))
    }

    pub fn is_rising(&self) -> bool {
        self.close >= self.open
    }
}

/// Price change of the latest close against the previous one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub current: f64,
    pub change: f64,
    pub change_pct: f64,
}

/// Figures shown next to a rendered chart in the digest
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    pub last_close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub rsi: Option<f64>,
}

/// A rendered chart for one ticker
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    pub ticker: String,
    pub png: Vec<u8>,
    pub summary: ChartSummary,
    /// Optional layers that failed to draw and were left out
    pub skipped_layers: Vec<String>,
}
