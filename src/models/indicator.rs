//! Indicator-annotated price series

use super::chart::PricePoint;

/// Simple moving average column, aligned with the price points
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverage {
    pub period: usize,
    pub values: Vec<Option<f64>>,
}

impl MovingAverage {
    pub fn label(&self) -> String {
        format!("{}-Day MA", self.period)
    }

    /// `(index, value)` for every position where the average is defined
    pub fn defined_points(&self) -> Vec<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .collect()
    }
}

/// Price series with its moving averages and RSI.
///
/// Every column has exactly `points.len()` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub points: Vec<PricePoint>,
    pub moving_averages: Vec<MovingAverage>,
    pub rsi: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn moving_average(&self, period: usize) -> Option<&MovingAverage> {
        self.moving_averages.iter().find(|ma| ma.period == period)
    }

    /// Suffix of the series starting at `start`, columns sliced alongside
    pub fn tail_from(&self, start: usize) -> IndicatorSeries {
        let start = start.min(self.points.len());
        IndicatorSeries {
            points: self.points[start..].to_vec(),
            moving_averages: self
                .moving_averages
                .iter()
                .map(|ma| MovingAverage {
                    period: ma.period,
                    values: ma.values[start..].to_vec(),
                })
                .collect(),
            rsi: self.rsi[start..].to_vec(),
        }
    }
}

/// The trailing part of an indicator series that actually gets drawn
#[derive(Debug, Clone)]
pub struct DisplayWindow {
    pub ticker: String,
    pub series: IndicatorSeries,
}

impl DisplayWindow {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.series.points
    }

    pub fn latest_rsi(&self) -> Option<f64> {
        self.series.rsi.last().copied().flatten()
    }
}
