use chrono::{Duration, NaiveDate, NaiveDateTime};
use crate::models::{DisplayWindow, IndicatorSeries};
use crate::utils::errors::ChartError;

/// Calendar days per display month
pub const DAYS_PER_MONTH: i64 = 30;

/// Extra calendar days fetched ahead of the display window so the
/// 200-period average is already defined where the window starts.
pub const WARMUP_PAD_DAYS: i64 = 300;

/// `now` minus `days`, clamped to the earliest representable instant
fn days_before(now: NaiveDateTime, days: i64) -> NaiveDateTime {
    Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Date range to request from the data source
pub fn select_fetch_range(now: NaiveDateTime, display_months: u32) -> (NaiveDateTime, NaiveDateTime) {
    let days = display_months as i64 * DAYS_PER_MONTH + WARMUP_PAD_DAYS;
    (days_before(now, days), now)
}

/// First calendar date that belongs to the display window
pub fn display_cutoff(now: NaiveDateTime, display_months: u32) -> NaiveDate {
    days_before(now, display_months as i64 * DAYS_PER_MONTH).date()
}

/// Trim an annotated series to the points dated on or after the cutoff.
///
/// Indicator values computed over the warm-up range are kept.
pub fn select_display_window(
    ticker: &str,
    series: &IndicatorSeries,
    now: NaiveDateTime,
    display_months: u32,
) -> Result<DisplayWindow, ChartError> {
    let cutoff = display_cutoff(now, display_months);

    let start = series
        .points
        .iter()
        .position(|p| p.date >= cutoff)
        .ok_or(ChartError::EmptyWindow { cutoff })?;

    Ok(DisplayWindow {
        ticker: ticker.to_string(),
        series: series.tail_from(start),
    })
}
