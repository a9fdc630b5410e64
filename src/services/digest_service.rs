use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::NaiveDate;
use crate::models::{ChartArtifact, ChartSummary, Digest};
use crate::services::chart_service::ma_color_name;
use crate::utils::errors::DigestError;
use crate::utils::table::{Align, Table};

/// "50-day (blue) and 200-day (red)"
pub fn describe_overlays(ma_periods: &[usize]) -> String {
    let parts: Vec<String> = ma_periods
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}-day ({})", p, ma_color_name(i)))
        .collect();
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        n => format!("{} and {}", parts[..n - 1].join(", "), parts[n - 1]),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn summary_row(ticker: &str, summary: &ChartSummary) -> Vec<String> {
    vec![
        ticker.to_string(),
        format!("${:.2}", summary.last_close),
        format!("{:+.2} ({:+.2}%)", summary.change, summary.change_pct),
        summary.rsi.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "N/A".to_string()),
    ]
}

fn summary_table(artifacts: &[&ChartArtifact]) -> String {
    let mut table = Table::new(vec!["Ticker", "Close", "Change", "RSI"])
        .align(1, Align::Right)
        .align(2, Align::Right)
        .align(3, Align::Right);
    for artifact in artifacts {
        table.add_row(summary_row(&artifact.ticker, &artifact.summary));
    }
    table.render()
}

fn chart_block(artifact: &ChartArtifact) -> String {
    let ticker = escape_html(&artifact.ticker);
    format!(
        r#"
    <div style="margin-bottom: 40px; page-break-inside: avoid;">
      <h3 style="color: #333; margin-bottom: 10px;">{ticker}</h3>
      <img src="data:image/png;base64,{encoded}"
           alt="{ticker} Chart"
           style="max-width: 100%; width: 800px; height: auto; display: block; border: 1px solid #ddd;">
    </div>
"#,
        ticker = ticker,
        encoded = BASE64.encode(&artifact.png),
    )
}

/// Compose the text and HTML bodies for every rendered chart.
///
/// Images are embedded as base64 `data:` URIs so the message needs no
/// attachments. An empty artifact list is an error: nothing gets sent.
pub fn compose_digest(
    artifacts: &[ChartArtifact],
    date: NaiveDate,
    display_months: u32,
    ma_periods: &[usize],
) -> Result<Digest, DigestError> {
    let artifacts: Vec<&ChartArtifact> = artifacts.iter().filter(|a| !a.png.is_empty()).collect();
    if artifacts.is_empty() {
        return Err(DigestError::NoCharts);
    }

    let long_date = date.format("%B %d, %Y");
    let overlays = describe_overlays(ma_periods);
    let tickers: Vec<&str> = artifacts.iter().map(|a| a.ticker.as_str()).collect();

    let text_body = format!(
        "Daily Stock Portfolio Update - {long_date}\n\n\
         Your stock charts have been generated for: {tickers}\n\n\
         Each chart shows daily candlesticks with {overlays} moving averages.\n\n\
         {table}\n\n\
         Note: If images don't display, you may need to click \"Download pictures\" in Outlook.\n",
        long_date = long_date,
        tickers = tickers.join(", "),
        overlays = overlays,
        table = summary_table(&artifacts),
    );

    let mut html_body = format!(
        r#"<html>
  <head></head>
  <body style="font-family: Arial, sans-serif;">
    <h2 style="color: #333;">Daily Stock Portfolio Update</h2>
    <p>Here are your stock charts for {long_date}:</p>
    <p style="color: #666;">Each chart shows daily candlesticks with {overlays} moving averages.</p>
    <br>
"#,
        long_date = long_date,
        overlays = overlays,
    );

    for artifact in &artifacts {
        html_body.push_str(&chart_block(artifact));
    }

    html_body.push_str(&format!(
        r#"    <br>
    <hr style="border: none; border-top: 1px solid #ddd;">
    <p style="color: gray; font-size: 12px;">
      This is an automated message. Charts show the last {display_months} months of daily data.<br>
      If images don't display, you may need to click "Download pictures" or check your email security settings.
    </p>
  </body>
</html>
"#,
        display_months = display_months,
    ));

    Ok(Digest {
        subject: format!("Stock Portfolio Charts - {}", date.format("%Y-%m-%d")),
        text_body,
        html_body,
    })
}
