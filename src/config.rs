use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use crate::api::YahooClient;
use crate::services::chart_service::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

pub const DEFAULT_TICKERS: [&str; 15] = [
    "XBI", "HOOD", "UBER", "CIBR", "NLR", "RKLB", "COST", "QQQM", "SPLG", "HUMN", "KOID", "GOOGL",
    "NVDA", "RSP", "PLTR",
];
pub const DEFAULT_DISPLAY_MONTHS: u32 = 6;
pub const DEFAULT_MA_PERIODS: [usize; 2] = [50, 200];
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_OUTPUT_DIR: &str = "charts";
pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

const MIN_CANVAS_SIDE: u32 = 300;
const MAX_DISPLAY_MONTHS: u32 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// SMTP relay and addresses for the digest
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub smtp_server: String,
    pub smtp_port: u16,
}

/// Everything a run needs, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tickers: Vec<String>,
    pub display_months: u32,
    pub ma_periods: Vec<usize>,
    pub rsi_period: usize,
    pub output_dir: PathBuf,
    pub save_charts: bool,
    pub chart_width: u32,
    pub chart_height: u32,
    pub data_base_url: String,
    /// `None` unless sender, password and recipient are all set
    pub email: Option<EmailConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            display_months: DEFAULT_DISPLAY_MONTHS,
            ma_periods: DEFAULT_MA_PERIODS.to_vec(),
            rsi_period: DEFAULT_RSI_PERIOD,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            save_charts: true,
            chart_width: DEFAULT_WIDTH,
            chart_height: DEFAULT_HEIGHT,
            data_base_url: YahooClient::DEFAULT_BASE_URL.to_string(),
            email: None,
        }
    }
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| invalid(key, value, e))
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match parse_number::<usize>(key, value)? {
        0 => Err(invalid(key, value, "must be greater than zero")),
        n => Ok(n),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl AppConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = AppConfig::default();

        if let Some(value) = get("TICKERS") {
            config.tickers = split_list(&value).map(|t| t.to_uppercase()).collect();
            if config.tickers.is_empty() {
                return Err(ConfigError::Empty("TICKERS"));
            }
        }

        if let Some(value) = get("DISPLAY_MONTHS") {
            config.display_months = parse_number("DISPLAY_MONTHS", &value)?;
            if config.display_months == 0 {
                return Err(invalid("DISPLAY_MONTHS", &value, "must be greater than zero"));
            }
            if config.display_months > MAX_DISPLAY_MONTHS {
                return Err(invalid("DISPLAY_MONTHS", &value, format!("must be at most {}", MAX_DISPLAY_MONTHS)));
            }
        }

        if let Some(value) = get("MA_PERIODS") {
            config.ma_periods = split_list(&value)
                .map(|p| parse_positive("MA_PERIODS", p))
                .collect::<Result<_, _>>()?;
            if config.ma_periods.is_empty() {
                return Err(ConfigError::Empty("MA_PERIODS"));
            }
        }

        if let Some(value) = get("RSI_PERIOD") {
            config.rsi_period = parse_positive("RSI_PERIOD", &value)?;
        }

        if let Some(value) = get("CHART_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(value.trim());
        }

        if let Some(value) = get("SAVE_CHARTS") {
            config.save_charts = parse_bool("SAVE_CHARTS", &value)?;
        }

        for (key, side) in [("CHART_WIDTH", &mut config.chart_width), ("CHART_HEIGHT", &mut config.chart_height)] {
            if let Some(value) = get(key) {
                *side = parse_number(key, &value)?;
                if *side < MIN_CANVAS_SIDE {
                    return Err(invalid(key, &value, format!("must be at least {} pixels", MIN_CANVAS_SIDE)));
                }
            }
        }

        if let Some(value) = get("YAHOO_BASE_URL") {
            config.data_base_url = value.trim().to_string();
        }

        let smtp_port = match get("SMTP_PORT") {
            Some(value) => parse_number("SMTP_PORT", &value)?,
            None => DEFAULT_SMTP_PORT,
        };

        config.email = match (get("EMAIL_SENDER"), get("EMAIL_PASSWORD"), get("EMAIL_RECIPIENT")) {
            (Some(sender), Some(password), Some(recipient)) => Some(EmailConfig {
                sender: sender.trim().to_string(),
                password,
                recipient: recipient.trim().to_string(),
                smtp_server: get("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
                smtp_port,
            }),
            _ => None,
        };

        Ok(config)
    }

    /// Longest configured moving-average period
    pub fn longest_ma_period(&self) -> usize {
        self.ma_periods.iter().copied().max().unwrap_or(0)
    }
}
