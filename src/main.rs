use std::process::ExitCode;
use chrono::Local;
use tracing::{info, warn, error};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod models;
mod services;
mod utils;

use api::{SmtpMailer, YahooClient};
use config::AppConfig;
use services::report_service;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ticker_digest=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("📈 Starting ticker-digest v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(1);
        }
    };

    if config.email.is_none() {
        warn!("Email configuration missing. Charts will be generated but the digest cannot be sent.");
    }

    let source = match YahooClient::with_base_url(config.data_base_url.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create data client: {}", e);
            return ExitCode::from(1);
        }
    };
    let mailer = SmtpMailer::new(config.email.clone());

    let now = Local::now().naive_local();
    let status = report_service::generate_and_send(&source, &mailer, &config, now).await;

    ExitCode::from(status.exit_code())
}
