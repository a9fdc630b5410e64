use std::io::Cursor;
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, warn};
use crate::models::{DisplayWindow, PriceChange, PricePoint};
use crate::utils::errors::ChartError;

pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 900;

const MAX_X_TICKS: usize = 6;
const TITLE_HEIGHT: u32 = 70;
const RIGHT_LABEL_AREA: u32 = 70;
const BOTTOM_LABEL_AREA: u32 = 40;
const CANDLE_HALF_WIDTH: f64 = 0.3;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

const UP_COLOR: RGBColor = RGBColor(0, 160, 0);
const DOWN_COLOR: RGBColor = RGBColor(210, 0, 0);
const RSI_COLOR: RGBColor = RGBColor(128, 0, 128);
const GRID_COLOR: RGBColor = RGBColor(128, 128, 128);
const ANNOTATION_BG: RGBColor = RGBColor(245, 222, 179);
const MA_COLORS: [RGBColor; 4] = [BLUE, RED, RGBColor(255, 140, 0), RGBColor(0, 128, 128)];
const MA_COLOR_NAMES: [&str; 4] = ["blue", "red", "orange", "teal"];

/// Colour name of the `i`-th moving-average overlay
pub fn ma_color_name(i: usize) -> &'static str {
    MA_COLOR_NAMES[i % MA_COLOR_NAMES.len()]
}

/// Body of a single candlestick in chart coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandleBody {
    /// Filled rectangle between open and close
    Box { bottom: f64, top: f64, rising: bool },
    /// open == close: a flat tick, never a zero-height rectangle
    Tick { price: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleShape {
    pub x: f64,
    pub low: f64,
    pub high: f64,
    pub body: CandleBody,
}

/// Geometry of the candle drawn at index `index`
pub fn candle_shape(index: usize, point: &PricePoint) -> CandleShape {
    let body = if point.open == point.close {
        CandleBody::Tick { price: point.close }
    } else {
        let (bottom, top) = point.body();
        CandleBody::Box { bottom, top, rising: point.is_rising() }
    };

    CandleShape {
        x: index as f64,
        low: point.low,
        high: point.high,
        body,
    }
}

/// Latest close against the previous close.
///
/// Change is zero for a single point; the percentage is zero when the
/// previous close is zero.
pub fn price_change(points: &[PricePoint]) -> Option<PriceChange> {
    let current = points.last()?.close;
    let (change, change_pct) = if points.len() > 1 {
        let previous = points[points.len() - 2].close;
        let change = current - previous;
        let change_pct = if previous != 0.0 { change / previous * 100.0 } else { 0.0 };
        (change, change_pct)
    } else {
        (0.0, 0.0)
    };

    Some(PriceChange { current, change, change_pct })
}

pub fn price_annotation(change: &PriceChange) -> [String; 2] {
    [
        format!("Current: ${:.2}", change.current),
        format!("Change: {:+.2} ({:+.2}%)", change.change, change.change_pct),
    ]
}

pub fn rsi_label(rsi: Option<f64>) -> String {
    match rsi {
        Some(value) => format!("RSI: {:.1}", value),
        None => "RSI: N/A".to_string(),
    }
}

pub fn chart_title(ticker: &str, rendered_at: NaiveDateTime) -> [String; 2] {
    [
        format!("{} - Daily Chart with Moving Averages", ticker),
        format!("Last Updated: {}", rendered_at.format("%Y-%m-%d %I:%M %p")),
    ]
}

/// At most six evenly spaced indices across `0..len`
pub fn tick_positions(len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let num_ticks = MAX_X_TICKS.min(len);
    let spacing = len.div_ceil(num_ticks).max(1);
    (0..len).step_by(spacing).collect()
}

/// Tick indices labelled with the month and year of the bar at that index
pub fn tick_labels(points: &[PricePoint]) -> Vec<(usize, String)> {
    tick_positions(points.len())
        .into_iter()
        .map(|i| (i, points[i].date.format("%b %y").to_string()))
        .collect()
}

/// Contiguous runs of defined values, as `(index, value)` line segments
pub fn defined_runs(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(v) => current.push((i as f64, *v)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Vertical range of the price panel, covering wicks and every drawn average
pub fn price_range(window: &DisplayWindow) -> (f64, f64) {
    let ma_values = window
        .series
        .moving_averages
        .iter()
        .flat_map(|ma| ma.values.iter().flatten().copied());
    let (min_price, max_price) = window
        .points()
        .iter()
        .flat_map(|p| [p.low, p.high])
        .chain(ma_values)
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min_price.is_finite() || !max_price.is_finite() {
        return (0.0, 1.0);
    }

    let range = max_price - min_price;
    let padding = if range < 1e-8 {
        (max_price.abs() * 0.02).max(1.0)
    } else {
        range * 0.05
    };
    (min_price - padding, max_price + padding)
}

/// Outcome of the optional drawing steps
#[derive(Debug, Default)]
pub struct LayerReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

impl LayerReport {
    fn apply(&mut self, ticker: &str, layer: &str, result: Result<(), String>) {
        match result {
            Ok(()) => self.applied.push(layer.to_string()),
            Err(e) => {
                warn!("Could not draw {} for {}: {}", layer, ticker, e);
                self.skipped.push(layer.to_string());
            }
        }
    }
}

/// PNG bytes plus what was left out of the figure
#[derive(Debug)]
pub struct RenderedChart {
    pub png: Vec<u8>,
    pub layers: LayerReport,
}

fn render_err<E: std::fmt::Display>(step: &'static str) -> impl Fn(E) -> ChartError {
    move |e| ChartError::Render(format!("Failed to {}: {}", step, e))
}

/// Render the two-panel chart for a display window as PNG bytes.
///
/// Candles, the RSI line and encoding must succeed; titles, axes,
/// overlays, legend and annotations are each dropped on failure.
pub fn render_chart(
    window: &DisplayWindow,
    rendered_at: NaiveDateTime,
    width: u32,
    height: u32,
) -> Result<RenderedChart, ChartError> {
    if window.series.is_empty() {
        return Err(ChartError::Render("Nothing to draw".to_string()));
    }

    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    let layers = {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        let layers = draw_figure(&root, window, rendered_at)?;
        root.present().map_err(render_err("render chart"))?;
        layers
    };

    let png = encode_png(buffer, width, height)?;
    debug!(
        "Rendered {} chart: {} bytes, drew {}, skipped {}",
        window.ticker,
        png.len(),
        layers.applied.join(", "),
        layers.skipped.len()
    );

    Ok(RenderedChart { png, layers })
}

fn draw_figure(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    window: &DisplayWindow,
    rendered_at: NaiveDateTime,
) -> Result<LayerReport, ChartError> {
    let ticker = window.ticker.as_str();
    let points = window.points();
    let mut layers = LayerReport::default();

    root.fill(&WHITE).map_err(render_err("fill canvas"))?;

    let (title_area, body) = root.split_vertically(TITLE_HEIGHT);
    let price_height = body.dim_in_pixel().1 * 3 / 4;
    let (price_area, rsi_area) = body.split_vertically(price_height);

    let x_range = -1.0..points.len() as f64;
    let (y_min, y_max) = price_range(window);
    let ticks = tick_labels(points);

    let mut price_chart = ChartBuilder::on(&price_area)
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Right, RIGHT_LABEL_AREA)
        .build_cartesian_2d(x_range.clone(), y_min..y_max)
        .map_err(render_err("build price panel"))?;

    let mut rsi_chart = ChartBuilder::on(&rsi_area)
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Right, RIGHT_LABEL_AREA)
        .set_label_area_size(LabelAreaPosition::Bottom, BOTTOM_LABEL_AREA)
        .build_cartesian_2d(x_range.clone(), 0.0..100.0)
        .map_err(render_err("build RSI panel"))?;

    layers.apply(ticker, "title", draw_title(&title_area, ticker, rendered_at));

    let price_mesh = price_chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Price ($)")
        .y_label_formatter(&|v| format!("{:.2}", v))
        .light_line_style(GRID_COLOR.mix(0.15))
        .draw()
        .map_err(|e| e.to_string());
    layers.apply(ticker, "price axis", price_mesh);

    let grid = ticks.iter().map(|(i, _)| *i as f64).collect::<Vec<_>>();
    let price_grid = price_chart
        .draw_series(grid.iter().map(|&x| {
            PathElement::new(vec![(x, y_min), (x, y_max)], GRID_COLOR.mix(0.3))
        }))
        .map(|_| ())
        .map_err(|e| e.to_string());
    layers.apply(ticker, "price grid", price_grid);

    // Candles
    let shapes: Vec<CandleShape> = points.iter().enumerate().map(|(i, p)| candle_shape(i, p)).collect();
    price_chart
        .draw_series(shapes.iter().map(|c| {
            PathElement::new(vec![(c.x, c.low), (c.x, c.high)], BLACK.stroke_width(1))
        }))
        .map_err(render_err("draw wicks"))?;
    price_chart
        .draw_series(shapes.iter().filter_map(|c| match c.body {
            CandleBody::Box { bottom, top, rising } => {
                let color = if rising { UP_COLOR } else { DOWN_COLOR };
                Some(Rectangle::new(
                    [(c.x - CANDLE_HALF_WIDTH, bottom), (c.x + CANDLE_HALF_WIDTH, top)],
                    color.filled(),
                ))
            }
            CandleBody::Tick { .. } => None,
        }))
        .map_err(render_err("draw candle bodies"))?;
    price_chart
        .draw_series(shapes.iter().filter_map(|c| match c.body {
            CandleBody::Box { bottom, top, .. } => Some(Rectangle::new(
                [(c.x - CANDLE_HALF_WIDTH, bottom), (c.x + CANDLE_HALF_WIDTH, top)],
                BLACK.stroke_width(1),
            )),
            CandleBody::Tick { .. } => None,
        }))
        .map_err(render_err("draw candle outlines"))?;
    price_chart
        .draw_series(shapes.iter().filter_map(|c| match c.body {
            CandleBody::Tick { price } => Some(PathElement::new(
                vec![(c.x - CANDLE_HALF_WIDTH, price), (c.x + CANDLE_HALF_WIDTH, price)],
                BLACK.stroke_width(2),
            )),
            CandleBody::Box { .. } => None,
        }))
        .map_err(render_err("draw candle ticks"))?;

    // Moving average overlays
    let mut labelled = 0;
    for (i, ma) in window.series.moving_averages.iter().enumerate() {
        let label = ma.label();
        let line: Vec<(f64, f64)> = ma
            .defined_points()
            .into_iter()
            .map(|(x, v)| (x as f64, v))
            .collect();
        if line.is_empty() {
            debug!("{} undefined across the {} window, not drawn", label, ticker);
            continue;
        }

        let color = MA_COLORS[i % MA_COLORS.len()];
        let overlay = price_chart
            .draw_series(LineSeries::new(line, color.stroke_width(2)))
            .map(|series| {
                series
                    .label(label.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            })
            .map_err(|e| e.to_string());
        if overlay.is_ok() {
            labelled += 1;
        }
        layers.apply(ticker, &format!("{} overlay", label), overlay);
    }

    if labelled > 0 {
        let legend = price_chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperMiddle)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| e.to_string());
        layers.apply(ticker, "legend", legend);
    }

    let annotation = match price_change(points) {
        Some(change) => draw_annotation(&price_area, &price_annotation(&change), (20, 20)),
        None => Err("no closing price".to_string()),
    };
    layers.apply(ticker, "price annotation", annotation);

    // RSI panel
    let x_start = x_range.start;
    let x_end = x_range.end;
    rsi_chart
        .draw_series(std::iter::once(Rectangle::new(
            [(x_start, RSI_OVERSOLD), (x_end, RSI_OVERBOUGHT)],
            GRID_COLOR.mix(0.1).filled(),
        )))
        .map_err(render_err("shade RSI band"))?;
    rsi_chart
        .draw_series([
            PathElement::new(vec![(x_start, RSI_OVERBOUGHT), (x_end, RSI_OVERBOUGHT)], RED.mix(0.5)),
            PathElement::new(vec![(x_start, RSI_OVERSOLD), (x_end, RSI_OVERSOLD)], GREEN.mix(0.5)),
        ])
        .map_err(render_err("draw RSI reference lines"))?;

    let rsi_mesh = rsi_chart
        .configure_mesh()
        .disable_x_mesh()
        .y_labels(5)
        .y_desc("RSI")
        .x_label_formatter(&|_| String::new())
        .light_line_style(GRID_COLOR.mix(0.15))
        .draw()
        .map_err(|e| e.to_string());
    layers.apply(ticker, "RSI axis", rsi_mesh);

    for run in defined_runs(&window.series.rsi) {
        rsi_chart
            .draw_series(LineSeries::new(run, RSI_COLOR.stroke_width(2)))
            .map_err(render_err("draw RSI line"))?;
    }

    let rsi_annotation = draw_annotation(&rsi_area, &[rsi_label(window.latest_rsi())], (20, 15));
    layers.apply(ticker, "RSI annotation", rsi_annotation);

    let date_axis = draw_date_labels(root, &rsi_chart, &ticks);
    layers.apply(ticker, "date axis", date_axis);

    Ok(layers)
}

fn draw_title(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    ticker: &str,
    rendered_at: NaiveDateTime,
) -> Result<(), String> {
    let [headline, updated] = chart_title(ticker, rendered_at);
    let headline_style = ("sans-serif", 28).into_font().style(FontStyle::Bold).color(&BLACK);
    let updated_style = ("sans-serif", 16).into_font().color(&BLACK);

    area.draw(&Text::new(headline, (20, 8), headline_style))
        .map_err(|e| e.to_string())?;
    area.draw(&Text::new(updated, (20, 42), updated_style))
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn draw_annotation(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    lines: &[String],
    origin: (i32, i32),
) -> Result<(), String> {
    let line_height = 20;
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
    let corner = (origin.0 + widest * 9 + 16, origin.1 + lines.len() as i32 * line_height + 10);

    area.draw(&Rectangle::new([origin, corner], ANNOTATION_BG.mix(0.6).filled()))
        .map_err(|e| e.to_string())?;

    let style = ("sans-serif", 16).into_font().color(&BLACK);
    for (i, line) in lines.iter().enumerate() {
        let at = (origin.0 + 8, origin.1 + 5 + i as i32 * line_height);
        area.draw(&Text::new(line.as_str(), at, style.clone()))
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn draw_date_labels(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    rsi_chart: &ChartContext<'_, BitMapBackend<'_>, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>,
    ticks: &[(usize, String)],
) -> Result<(), String> {
    let style = ("sans-serif", 14).into_font().color(&BLACK);
    for (i, label) in ticks {
        let (x, y) = rsi_chart.backend_coord(&(*i as f64, 0.0));
        root.draw(&Text::new(label.as_str(), (x - 18, y + 8), style.clone()))
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ChartError> {
    let image = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| ChartError::Render("Pixel buffer does not match canvas size".to_string()))?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(render_err("encode PNG"))?;
    Ok(png)
}

pub fn chart_file_name(ticker: &str) -> String {
    let safe: String = ticker
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_chart.png", safe)
}

/// Write a PNG copy of a chart under `dir`, creating it if needed
pub fn save_chart(dir: &Path, ticker: &str, png: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(chart_file_name(ticker));
    std::fs::write(&path, png)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use crate::services::indicator_service::annotate;
    use crate::services::window_service::select_display_window;
    use tempfile::TempDir;

    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i)
    }

    fn window_from(points: Vec<PricePoint>, ma_periods: &[usize]) -> DisplayWindow {
        DisplayWindow {
            ticker: "TEST".to_string(),
            series: annotate(points, ma_periods, 14),
        }
    }

    #[test]
    fn test_candle_shape_rising_and_falling() {
        let up = candle_shape(3, &PricePoint::new(day(0), 10.0, 12.0, 9.0, 11.0));
        assert_eq!(up.x, 3.0);
        assert_eq!(up.body, CandleBody::Box { bottom: 10.0, top: 11.0, rising: true });

        let down = candle_shape(0, &PricePoint::new(day(0), 11.0, 12.0, 9.0, 10.0));
        assert_eq!(down.body, CandleBody::Box { bottom: 10.0, top: 11.0, rising: false });
        assert_eq!((down.low, down.high), (9.0, 12.0));
    }

    #[test]
    fn test_candle_shape_flat_is_tick() {
        let flat = candle_shape(0, &PricePoint::new(day(0), 10.0, 10.5, 9.5, 10.0));
        assert_eq!(flat.body, CandleBody::Tick { price: 10.0 });
    }

    #[test]
    fn test_price_change() {
        let points = vec![
            PricePoint::new(day(0), 100.0, 100.0, 100.0, 100.0),
            PricePoint::new(day(1), 100.0, 105.0, 100.0, 105.0),
        ];
        let change = price_change(&points).unwrap();
        assert_eq!(change.current, 105.0);
        assert_eq!(change.change, 5.0);
        assert!((change.change_pct - 5.0).abs() < 1e-12);
        assert_eq!(
            price_annotation(&change),
            ["Current: $105.00".to_string(), "Change: +5.00 (+5.00%)".to_string()]
        );
    }

    #[test]
    fn test_price_change_edge_cases() {
        assert!(price_change(&[]).is_none());

        let single = [PricePoint::new(day(0), 5.0, 5.0, 5.0, 5.0)];
        let change = price_change(&single).unwrap();
        assert_eq!((change.change, change.change_pct), (0.0, 0.0));

        let from_zero = [
            PricePoint::new(day(0), 0.0, 0.0, 0.0, 0.0),
            PricePoint::new(day(1), 0.0, 2.0, 0.0, 2.0),
        ];
        let change = price_change(&from_zero).unwrap();
        assert_eq!(change.change, 2.0);
        assert_eq!(change.change_pct, 0.0);
    }

    #[test]
    fn test_rsi_label() {
        assert_eq!(rsi_label(Some(55.26)), "RSI: 55.3");
        assert_eq!(rsi_label(Some(100.0)), "RSI: 100.0");
        assert_eq!(rsi_label(None), "RSI: N/A");
    }

    #[test]
    fn test_chart_title_format() {
        let at = day(10).and_hms_opt(16, 5, 0).unwrap();
        let [headline, updated] = chart_title("NVDA", at);
        assert_eq!(headline, "NVDA - Daily Chart with Moving Averages");
        assert_eq!(updated, "Last Updated: 2024-01-11 04:05 PM");
    }

    #[test]
    fn test_tick_positions_at_most_six() {
        assert!(tick_positions(0).is_empty());
        assert_eq!(tick_positions(1), vec![0]);
        assert_eq!(tick_positions(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(tick_positions(120), vec![0, 20, 40, 60, 80, 100]);
        for len in 1..400 {
            let ticks = tick_positions(len);
            assert!(ticks.len() <= 6, "len {len} gave {} ticks", ticks.len());
            assert!(ticks.iter().all(|&t| t < len));
        }
    }

    #[test]
    fn test_tick_labels_use_month_year() {
        let points: Vec<PricePoint> = (0..3)
            .map(|i| PricePoint::new(day(i * 40), 1.0, 1.0, 1.0, 1.0))
            .collect();
        let labels = tick_labels(&points);
        assert_eq!(
            labels,
            vec![(0, "Jan 24".to_string()), (1, "Feb 24".to_string()), (2, "Mar 24".to_string())]
        );
    }

    #[test]
    fn test_defined_runs_skip_gaps() {
        let runs = defined_runs(&[None, None, Some(1.0), Some(2.0), None, Some(3.0)]);
        assert_eq!(runs, vec![vec![(2.0, 1.0), (3.0, 2.0)], vec![(5.0, 3.0)]]);
        assert!(defined_runs(&[None, None]).is_empty());
    }

    #[test]
    fn test_price_range_degenerate_point_has_height() {
        let window = window_from(vec![PricePoint::new(day(0), 50.0, 50.0, 50.0, 50.0)], &[50, 200]);
        let (lo, hi) = price_range(&window);
        assert!(lo < 50.0 && hi > 50.0);
    }

    #[test]
    fn test_render_single_flat_candle() {
        let window = window_from(vec![PricePoint::new(day(0), 42.0, 42.0, 42.0, 42.0)], &[50, 200]);
        let rendered_at = day(0).and_hms_opt(17, 0, 0).unwrap();

        let chart = render_chart(&window, rendered_at, 400, 300).unwrap();
        assert!(chart.png.starts_with(&PNG_MAGIC));
        assert_eq!(candle_shape(0, &window.points()[0]).body, CandleBody::Tick { price: 42.0 });
        // No MA is defined on a single bar, so no overlay is attempted
        assert!(!chart.layers.applied.iter().any(|l| l.contains("overlay")));
        assert!(!chart.layers.skipped.iter().any(|l| l.contains("overlay")));
    }

    #[test]
    fn test_render_rising_series_end_to_end() {
        // 220 bars rising linearly from 100 to 210 with open == close
        let n = 220;
        let step = 110.0 / (n - 1) as f64;
        let points: Vec<PricePoint> = (0..n)
            .map(|i| {
                let c = 100.0 + step * i as f64;
                PricePoint::new(day(i as i64), c, c, c, c)
            })
            .collect();
        let series = annotate(points, &[50, 200], 14);
        let now = day(n as i64 - 1).and_hms_opt(16, 0, 0).unwrap();
        let window = select_display_window("RISE", &series, now, 6).unwrap();

        for period in [50, 200] {
            let ma = window.series.moving_average(period).unwrap();
            let trailing: Vec<f64> = ma.values.iter().rev().take(20).rev().map(|v| v.unwrap()).collect();
            assert!(trailing.windows(2).all(|w| w[1] > w[0]), "MA{period} not increasing");
        }
        assert!(window.series.rsi.iter().flatten().all(|&v| v == 100.0));
        assert_eq!(window.latest_rsi(), Some(100.0));

        let chart = render_chart(&window, now, DEFAULT_WIDTH, DEFAULT_HEIGHT).unwrap();
        assert!(chart.png.len() > PNG_MAGIC.len());
        assert!(chart.png.starts_with(&PNG_MAGIC));
    }

    #[test]
    fn test_render_empty_window_fails() {
        let window = window_from(Vec::new(), &[50]);
        let rendered_at = day(0).and_hms_opt(17, 0, 0).unwrap();
        assert!(matches!(render_chart(&window, rendered_at, 400, 300), Err(ChartError::Render(_))));
    }

    #[test]
    fn test_layer_failure_is_skipped_not_fatal() {
        let mut layers = LayerReport::default();
        layers.apply("NVDA", "title", Ok(()));
        layers.apply("NVDA", "legend", Err("font not found".to_string()));
        layers.apply("NVDA", "date axis", Ok(()));

        assert_eq!(layers.applied, vec!["title", "date axis"]);
        assert_eq!(layers.skipped, vec!["legend"]);
    }

    #[test]
    fn test_save_chart_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("charts");
        let path = save_chart(&dir, "XBI", &PNG_MAGIC).unwrap();
        assert_eq!(path.file_name().unwrap(), "XBI_chart.png");
        assert_eq!(std::fs::read(&path).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_chart_file_name_sanitizes_separators() {
        assert_eq!(chart_file_name("BRK/B"), "BRK_B_chart.png");
    }
}
