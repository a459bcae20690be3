use crate::models::{Exchange, StockDescriptor};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub investment: InvestmentConfig,
    #[serde(default)]
    pub exchange_rate: ExchangeRateConfig,
    #[serde(default)]
    pub stocks: PerExchange<String>,
    #[serde(default)]
    pub catalog: PerExchange<StockDescriptor>,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause between two symbols, success or not.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Capital and tier parameters for the dip-buy rule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvestmentConfig {
    #[serde(default = "default_total_capital_aed")]
    pub total_capital_aed: f64,

    #[serde(default = "default_allocation_per_stock_aed")]
    pub allocation_per_stock_aed: f64,

    #[serde(default = "default_max_stocks_high_dip")]
    pub max_stocks_high_dip: usize,

    #[serde(default = "default_max_stocks_low_dip")]
    pub max_stocks_low_dip: usize,

    #[serde(default = "default_dip_threshold_percent")]
    pub dip_threshold_percent: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeRateConfig {
    #[serde(default = "default_usd_to_aed")]
    pub usd_to_aed: f64,
}

/// A list per exchange: symbol allowlists and descriptor overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de>"))]
pub struct PerExchange<T> {
    pub dfm: Vec<T>,
    pub adx: Vec<T>,
}

impl<T> Default for PerExchange<T> {
    fn default() -> Self {
        Self {
            dfm: Vec::new(),
            adx: Vec::new(),
        }
    }
}

impl<T> PerExchange<T> {
    pub fn get(&self, exchange: Exchange) -> &[T] {
        match exchange {
            Exchange::Dfm => &self.dfm,
            Exchange::Adx => &self.adx,
        }
    }
}

/// Archive configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_string()
}
fn default_total_capital_aed() -> f64 {
    50_000.0
}
fn default_allocation_per_stock_aed() -> f64 {
    1_250.0
}
fn default_max_stocks_high_dip() -> usize {
    3
}
fn default_max_stocks_low_dip() -> usize {
    1
}
fn default_dip_threshold_percent() -> f64 {
    -10.0
}
fn default_usd_to_aed() -> f64 {
    3.67
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("data/archive")
}
fn default_true() -> bool {
    true
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_delay_ms: default_request_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for InvestmentConfig {
    fn default() -> Self {
        Self {
            total_capital_aed: default_total_capital_aed(),
            allocation_per_stock_aed: default_allocation_per_stock_aed(),
            max_stocks_high_dip: default_max_stocks_high_dip(),
            max_stocks_low_dip: default_max_stocks_low_dip(),
            dip_threshold_percent: default_dip_threshold_percent(),
        }
    }
}

impl Default for ExchangeRateConfig {
    fn default() -> Self {
        Self {
            usd_to_aed: default_usd_to_aed(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            enabled: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides.
    ///
    /// A broken source never stops the process: it is logged and the
    /// built-in defaults are used.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::load_from("config")
    }

    fn load_from(dir: &str) -> Self {
        match Self::try_load(dir) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Invalid configuration, falling back to defaults: {:#}", e);
                AppConfig::default()
            }
        }
    }

    fn try_load(dir: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("{}/default", dir))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name(&format!("{}/local", dir))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("DIPTRACK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Allowlist for one exchange; `None` means every known symbol.
    pub fn symbol_filter(&self, exchange: Exchange) -> Option<Vec<String>> {
        let symbols: Vec<String> = self
            .stocks
            .get(exchange)
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if symbols.is_empty() { None } else { Some(symbols) }
    }
}
