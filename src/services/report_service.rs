use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};
use crate::api::{DigestTransport, PriceSource};
use crate::config::AppConfig;
use crate::models::{ChartArtifact, ChartSummary, DisplayWindow};
use crate::services::chart_service::{price_change, render_chart, save_chart, RenderedChart};
use crate::services::digest_service::compose_digest;
use crate::services::indicator_service::annotate;
use crate::services::window_service::{select_display_window, select_fetch_range};
use crate::utils::errors::{extract_clean_error, ChartError};

/// Fetch, annotate, window and render one ticker.
///
/// Writing the PNG copy to disk is best effort: a failed write is logged
/// and the in-memory artifact is still returned.
pub async fn create_stock_chart<S: PriceSource>(
    source: &S,
    ticker: &str,
    config: &AppConfig,
    now: NaiveDateTime,
) -> Result<ChartArtifact, ChartError> {
    let (start, end) = select_fetch_range(now, config.display_months);
    info!("Downloading data for {}...", ticker);
    let series = source.fetch_daily(ticker, start, end).await?;

    if series.is_empty() {
        return Err(ChartError::NoData);
    }
    debug!("{}: {} bars from {} to {}", ticker, series.len(), series[0].date, series[series.len() - 1].date);

    let annotated = annotate(series, &config.ma_periods, config.rsi_period);
    let window = select_display_window(ticker, &annotated, now, config.display_months)?;

    let longest = config.longest_ma_period();
    if let Some(ma) = window.series.moving_average(longest) {
        if ma.values.first().copied().flatten().is_none() {
            warn!(
                "{}: {} not yet defined at the start of the display window ({} bars fetched)",
                ticker,
                ma.label(),
                annotated.len()
            );
        }
    }

    let rendered = render_chart(&window, now, config.chart_width, config.chart_height)?;
    let artifact = build_artifact(&window, rendered)?;

    if config.save_charts {
        match save_chart(&config.output_dir, ticker, &artifact.png) {
            Ok(path) => info!("Saved chart for {} to {}", ticker, path.display()),
            Err(e) => warn!("Could not save chart for {}: {}", ticker, e),
        }
    }

    Ok(artifact)
}

/// Pair the rendered image with the window's closing summary.
/// Layers the renderer had to leave out travel with the artifact.
fn build_artifact(window: &DisplayWindow, rendered: RenderedChart) -> Result<ChartArtifact, ChartError> {
    let change = price_change(window.points())
        .ok_or_else(|| ChartError::Render("no closing price in window".to_string()))?;

    Ok(ChartArtifact {
        ticker: window.ticker.clone(),
        png: rendered.png,
        summary: ChartSummary {
            last_close: change.current,
            change: change.change,
            change_pct: change.change_pct,
            rsi: window.latest_rsi(),
        },
        skipped_layers: rendered.layers.skipped,
    })
}

/// Charts that rendered and tickers that did not, in configured order
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub artifacts: Vec<ChartArtifact>,
    pub failed: Vec<(String, ChartError)>,
}

impl BatchOutcome {
    pub fn successful_tickers(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.ticker.as_str()).collect()
    }

    pub fn failed_tickers(&self) -> Vec<&str> {
        self.failed.iter().map(|(t, _)| t.as_str()).collect()
    }
}

/// Process every configured ticker one after another.
/// A failure for one ticker never stops the others.
pub async fn generate_charts<S: PriceSource>(
    source: &S,
    config: &AppConfig,
    now: NaiveDateTime,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for ticker in &config.tickers {
        info!("📊 Processing {}...", ticker);
        match create_stock_chart(source, ticker, config, now).await {
            Ok(artifact) => {
                if artifact.skipped_layers.is_empty() {
                    info!("✅ {} chart created successfully", ticker);
                } else {
                    info!(
                        "✅ {} chart created without: {}",
                        ticker,
                        artifact.skipped_layers.join(", ")
                    );
                }
                outcome.artifacts.push(artifact);
            }
            Err(e) => {
                error!("❌ {} chart failed: {}", ticker, e);
                outcome.failed.push((ticker.clone(), e));
            }
        }
    }

    outcome
}

/// Batch result, mapped onto the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one chart rendered and the digest was delivered
    Sent,
    /// Every ticker failed; no digest was composed
    NoCharts,
    /// Charts rendered but delivery failed
    TransportFailed,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Sent => 0,
            RunStatus::NoCharts | RunStatus::TransportFailed => 1,
        }
    }
}

fn log_summary(outcome: &BatchOutcome) {
    info!(
        "📈 Summary: {} successful, {} failed",
        outcome.artifacts.len(),
        outcome.failed.len()
    );
    if !outcome.artifacts.is_empty() {
        info!("Successful: {}", outcome.successful_tickers().join(", "));
    }
    if !outcome.failed.is_empty() {
        info!("Failed: {}", outcome.failed_tickers().join(", "));
        for (ticker, e) in &outcome.failed {
            debug!("  {}: {}", ticker, extract_clean_error(&e.to_string()));
        }
    }
}

/// Generate every chart, then compose and send one digest
pub async fn generate_and_send<S, T>(
    source: &S,
    transport: &T,
    config: &AppConfig,
    now: NaiveDateTime,
) -> RunStatus
where
    S: PriceSource,
    T: DigestTransport,
{
    info!("🚀 Starting stock chart generation at {}", now.format("%Y-%m-%d %H:%M:%S"));
    info!("Processing {} stocks: {}", config.tickers.len(), config.tickers.join(", "));

    let outcome = generate_charts(source, config, now).await;
    log_summary(&outcome);

    let digest = match compose_digest(&outcome.artifacts, now.date(), config.display_months, &config.ma_periods) {
        Ok(digest) => digest,
        Err(e) => {
            error!("❌ {}", e);
            return RunStatus::NoCharts;
        }
    };

    info!("📧 Sending email with {} charts...", outcome.artifacts.len());
    match transport.send_digest(&digest).await {
        Ok(()) => {
            info!("✅ Job completed successfully!");
            RunStatus::Sent
        }
        Err(e) => {
            error!("❌ Error sending email: {}", e);
            RunStatus::TransportFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use chrono::{Duration, NaiveDate};
    use crate::api::{FetchError, TransportError};
    use crate::models::{Digest, PricePoint};
    use crate::services::chart_service::LayerReport;
    use tempfile::TempDir;

    struct FakeSource {
        series: HashMap<String, Result<Vec<PricePoint>, FetchError>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(entries: Vec<(&str, Result<Vec<PricePoint>, FetchError>)>) -> Self {
            Self {
                series: entries.into_iter().map(|(t, r)| (t.to_string(), r)).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PriceSource for FakeSource {
        async fn fetch_daily(
            &self,
            ticker: &str,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> Result<Vec<PricePoint>, FetchError> {
            self.calls.borrow_mut().push(ticker.to_string());
            self.series.get(ticker).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        fail: bool,
        sent: RefCell<Vec<Digest>>,
    }

    impl DigestTransport for FakeTransport {
        async fn send_digest(&self, digest: &Digest) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Smtp("connection refused".to_string()));
            }
            self.sent.borrow_mut().push(digest.clone());
            Ok(())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap().and_hms_opt(16, 30, 0).unwrap()
    }

    /// `days` daily bars ending on `end`, wandering around 100
    fn wavy_series(end: NaiveDate, days: i64) -> Vec<PricePoint> {
        (0..days)
            .map(|i| {
                let c = 100.0 + 10.0 * (i as f64 / 7.0).sin() + i as f64 * 0.05;
                let o = c - (i as f64 / 3.0).cos();
                PricePoint::new(end - Duration::days(days - 1 - i), o, c.max(o) + 1.0, c.min(o) - 1.0, c)
            })
            .collect()
    }

    fn test_config(tickers: &[&str]) -> AppConfig {
        AppConfig {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            save_charts: false,
            chart_width: 400,
            chart_height: 300,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_create_stock_chart_summary() {
        let source = FakeSource::new(vec![("NVDA", Ok(wavy_series(now().date(), 400)))]);
        let config = test_config(&["NVDA"]);

        let artifact = create_stock_chart(&source, "NVDA", &config, now()).await.unwrap();
        assert_eq!(artifact.ticker, "NVDA");
        assert!(!artifact.png.is_empty());
        assert!(artifact.summary.rsi.is_some());
        let bars = wavy_series(now().date(), 400);
        assert_eq!(artifact.summary.last_close, bars[399].close);
        assert!((artifact.summary.change - (bars[399].close - bars[398].close)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_fetch_skips_ticker_and_continues() {
        let source = FakeSource::new(vec![
            ("XBI", Ok(Vec::new())),
            ("HOOD", Ok(wavy_series(now().date(), 300))),
        ]);
        let transport = FakeTransport::default();
        let config = test_config(&["XBI", "HOOD"]);

        let outcome = generate_charts(&source, &config, now()).await;
        assert_eq!(*source.calls.borrow(), vec!["XBI", "HOOD"]);
        assert_eq!(outcome.successful_tickers(), vec!["HOOD"]);
        assert_eq!(outcome.failed_tickers(), vec!["XBI"]);
        assert!(matches!(outcome.failed[0].1, ChartError::NoData));

        let status = generate_and_send(&source, &transport, &config, now()).await;
        assert_eq!(status, RunStatus::Sent);
        assert_eq!(status.exit_code(), 0);
        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text_body.contains("generated for: HOOD\n"));
    }

    #[tokio::test]
    async fn test_fetch_error_and_stale_series_are_isolated() {
        let stale_end = now().date() - Duration::days(400);
        let source = FakeSource::new(vec![
            ("HUMN", Err(FetchError::NotFound("No data found, symbol may be delisted".to_string()))),
            ("KOID", Ok(wavy_series(stale_end, 50))),
            ("COST", Ok(wavy_series(now().date(), 250))),
        ]);
        let config = test_config(&["HUMN", "KOID", "COST"]);

        let outcome = generate_charts(&source, &config, now()).await;
        assert_eq!(outcome.successful_tickers(), vec!["COST"]);
        assert!(matches!(outcome.failed[0].1, ChartError::Fetch(FetchError::NotFound(_))));
        assert!(matches!(outcome.failed[1].1, ChartError::EmptyWindow { .. }));
    }

    #[tokio::test]
    async fn test_all_tickers_fail_never_sends() {
        let source = FakeSource::new(vec![("XBI", Ok(Vec::new()))]);
        let transport = FakeTransport::default();
        let config = test_config(&["XBI", "RKLB"]);

        let status = generate_and_send(&source, &transport, &config, now()).await;
        assert_eq!(status, RunStatus::NoCharts);
        assert_eq!(status.exit_code(), 1);
        assert!(transport.sent.borrow().is_empty());
        assert_eq!(source.calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_batch_failure() {
        let source = FakeSource::new(vec![("PLTR", Ok(wavy_series(now().date(), 300)))]);
        let transport = FakeTransport { fail: true, ..FakeTransport::default() };
        let config = test_config(&["PLTR"]);

        let status = generate_and_send(&source, &transport, &config, now()).await;
        assert_eq!(status, RunStatus::TransportFailed);
        assert_eq!(status.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_saves_chart_file_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(vec![("RSP", Ok(wavy_series(now().date(), 120)))]);
        let config = AppConfig {
            save_charts: true,
            output_dir: tmp.path().join("charts"),
            ..test_config(&["RSP"])
        };

        let artifact = create_stock_chart(&source, "RSP", &config, now()).await.unwrap();
        let saved = std::fs::read(tmp.path().join("charts").join("RSP_chart.png")).unwrap();
        assert_eq!(saved, artifact.png);
    }

    #[test]
    fn test_skipped_layers_carried_into_artifact() {
        let series = annotate(wavy_series(now().date(), 60), &[50, 200], 14);
        let window = select_display_window("KOID", &series, now(), 6).unwrap();
        let rendered = RenderedChart {
            png: vec![1, 2, 3],
            layers: LayerReport {
                applied: vec!["title".to_string()],
                skipped: vec!["legend".to_string(), "RSI annotation".to_string()],
            },
        };

        let artifact = build_artifact(&window, rendered).unwrap();
        assert_eq!(artifact.ticker, "KOID");
        assert_eq!(artifact.png, vec![1, 2, 3]);
        assert_eq!(artifact.skipped_layers, vec!["legend", "RSI annotation"]);
        assert_eq!(artifact.summary.last_close, window.points()[window.len() - 1].close);
    }
}
