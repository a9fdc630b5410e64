use crate::models::{IndicatorSeries, MovingAverage, PricePoint};

/// Relative Strength Index over closing prices.
///
/// Gains and losses are averaged with a simple rolling mean over the
/// trailing `period` deltas, so the first defined value sits at index
/// `period`. No losses in the window saturates to 100; a window with
/// neither gains nor losses has no RSI.
pub fn calculate_rsi(series: &[PricePoint], period: usize) -> Vec<Option<f64>> {
    let mut rsi = vec![None; series.len()];
    if period == 0 || series.len() <= period {
        return rsi;
    }

    // deltas[i] is the change from close i to close i + 1
    let deltas: Vec<f64> = series.windows(2).map(|w| w[1].close - w[0].close).collect();
    let period_f = period as f64;

    for (offset, window) in deltas.windows(period).enumerate() {
        let (gain_sum, loss_sum) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            (g + d.max(0.0), l + (-d).max(0.0))
        });
        rsi[offset + period] = rsi_from_means(gain_sum / period_f, loss_sum / period_f);
    }

    rsi
}

fn rsi_from_means(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None;
        }
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}

/// Simple moving average of the close over the trailing `period` points
pub fn calculate_moving_average(series: &[PricePoint], period: usize) -> Vec<Option<f64>> {
    let mut averages = vec![None; series.len()];
    if period == 0 || series.len() < period {
        return averages;
    }

    let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
    for (offset, window) in closes.windows(period).enumerate() {
        averages[offset + period - 1] = Some(window.iter().sum::<f64>() / period as f64);
    }

    averages
}

/// Attach one MA column per period plus the RSI column
pub fn annotate(series: Vec<PricePoint>, ma_periods: &[usize], rsi_period: usize) -> IndicatorSeries {
    let moving_averages = ma_periods
        .iter()
        .map(|&period| MovingAverage {
            period,
            values: calculate_moving_average(&series, period),
        })
        .collect();
    let rsi = calculate_rsi(&series, rsi_period);

    IndicatorSeries {
        points: series,
        moving_averages,
        rsi,
    }
}
